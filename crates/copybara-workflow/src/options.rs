use copybara_core::Author;
use std::time::Duration;

pub const CHANGE_REQUEST_PARENT_FLAG: &str = "--change-request-parent";
pub const LAST_REV_FLAG: &str = "--last-rev";
pub const INIT_HISTORY_FLAG: &str = "--init-history";
pub const CHECK_LAST_REV_STATE_FLAG: &str = "--check-last-rev-state";
pub const DRY_RUN_FLAG: &str = "--dry-run";
pub const CHANGE_REQUEST_FROM_SOT_LIMIT_DEFAULT: usize = 500;

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GeneralOptions {
    pub dry_run: bool,
    pub force: bool,
    pub verbose: bool,
}

/// Flags that change how a workflow runs.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Destination baseline to use for change requests.
    pub change_request_parent: Option<String>,
    /// Origin revision to treat as the last migrated one.
    pub last_revision: Option<String>,
    pub init_history: bool,
    pub iterative_limit_changes: usize,
    pub ignore_noop: bool,
    pub squash_skip_history: bool,
    /// Migrate changes even when they touch no origin_files.
    pub import_noop_changes: bool,
    pub workflow_identity_user: Option<String>,
    pub check_last_rev_state: bool,
    pub change_request_from_sot_limit: usize,
    /// Delays between lookups of the source-of-truth change in the
    /// destination.
    pub change_request_from_sot_retry: Vec<Duration>,
    pub default_author: Option<Author>,
    pub forced_message: Option<String>,
    pub forced_author: Option<Author>,
    /// Run SQUASH regardless of the configured mode.
    pub squash: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            change_request_parent: None,
            last_revision: None,
            init_history: false,
            iterative_limit_changes: usize::MAX,
            ignore_noop: false,
            squash_skip_history: false,
            import_noop_changes: false,
            workflow_identity_user: None,
            check_last_rev_state: false,
            change_request_from_sot_limit: CHANGE_REQUEST_FROM_SOT_LIMIT_DEFAULT,
            change_request_from_sot_retry: Vec::new(),
            default_author: None,
            forced_message: None,
            forced_author: None,
            squash: false,
        }
    }
}

impl WorkflowOptions {
    pub fn forced_change_message(&self, message: &str) -> String {
        self.forced_message
            .clone()
            .unwrap_or_else(|| message.to_string())
    }

    pub fn final_author(&self, author: Author) -> Author {
        self.forced_author.clone().unwrap_or(author)
    }
}
