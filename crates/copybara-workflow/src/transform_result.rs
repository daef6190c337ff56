use crate::fs_util::DiffFile;
use chrono::{DateTime, Utc};
use copybara_core::{Author, Changes, Fingerprint, Labels, Revision};
use std::path::PathBuf;

/// Everything a writer needs for one write. Built once per migrate call.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub path: PathBuf,
    /// Revision being written.
    pub current_revision: Revision,
    /// Revision requested on the command line.
    pub requested_revision: Revision,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub changes: Changes,
    pub baseline: Option<String>,
    pub raw_source_ref: Option<String>,
    pub ask_for_confirmation: bool,
    pub identity: Option<Fingerprint>,
    pub workflow_name: String,
    pub set_rev_id: bool,
    pub rev_id_label: String,
    pub affected_files_for_smart_prune: Option<Vec<DiffFile>>,
    pub dry_run: bool,
    pub labels: Labels,
}

impl TransformResult {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path: PathBuf,
        current_revision: Revision,
        author: Author,
        summary: String,
        requested_revision: Revision,
        workflow_name: String,
        changes: Changes,
        raw_source_ref: Option<String>,
        set_rev_id: bool,
        labels: Labels,
        rev_id_label: String,
    ) -> Self {
        let timestamp = current_revision.timestamp.unwrap_or_else(Utc::now);
        Self {
            path,
            current_revision,
            requested_revision,
            author,
            timestamp,
            summary,
            changes,
            baseline: None,
            raw_source_ref,
            ask_for_confirmation: false,
            identity: None,
            workflow_name,
            set_rev_id,
            rev_id_label,
            affected_files_for_smart_prune: None,
            dry_run: false,
            labels,
        }
    }

    pub fn with_baseline(self, baseline: String) -> Self {
        Self {
            baseline: Some(baseline),
            ..self
        }
    }

    pub fn with_ask_for_confirmation(self, ask_for_confirmation: bool) -> Self {
        Self {
            ask_for_confirmation,
            ..self
        }
    }

    pub fn with_identity(self, identity: Fingerprint) -> Self {
        Self {
            identity: Some(identity),
            ..self
        }
    }

    pub fn with_affected_files_for_smart_prune(self, files: Vec<DiffFile>) -> Self {
        Self {
            affected_files_for_smart_prune: Some(files),
            ..self
        }
    }

    pub fn with_dry_run(self, dry_run: bool) -> Self {
        Self { dry_run, ..self }
    }

    pub fn with_summary(self, summary: String) -> Self {
        Self { summary, ..self }
    }
}
