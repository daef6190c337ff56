use crate::destination::{Destination, DestinationEffect, Writer, WriterContext};
use crate::error::{ErrorKind, Result, WorkflowError};
use crate::hooks::{run_hooks, MigrationHook};
use crate::info::{Info, MigrationReference};
use crate::mode::WorkflowMode;
use crate::options::{
    GeneralOptions, WorkflowOptions, CHECK_LAST_REV_STATE_FLAG, INIT_HISTORY_FLAG,
};
use crate::origin::{ChangesResponse, Origin};
use crate::run_helper::{should_skip_change, WorkflowRunHelper};
use crate::transform::{Sequence, TransformWork, Transformation};
use copybara_core::identity::{
    compute_identity, default_identity_user, IdentityContext, IdentityTemplate, CHANGE_IDENTITY,
};
use copybara_core::{Authoring, Fingerprint, Glob, Revision};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{info, warn};

static CUSTOM_REV_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][A-Z_0-9]{1,30}_REV_ID$").expect("invalid custom rev id pattern")
});

/// Everything a workflow is configured with. Turned into a [`Workflow`] by
/// [`WorkflowBuilder::build`], which validates the combination.
pub struct WorkflowBuilder {
    pub name: String,
    pub description: Option<String>,
    pub origin: Box<dyn Origin>,
    pub destination: Box<dyn Destination>,
    pub authoring: Authoring,
    pub transformations: Vec<Box<dyn Transformation>>,
    pub origin_files: Glob,
    pub destination_files: Glob,
    pub mode: WorkflowMode,
    /// Defaults to true for CHANGE_REQUEST, false otherwise.
    pub reversible_check: Option<bool>,
    pub check_last_rev_state: bool,
    pub ask_for_confirmation: bool,
    pub checkout: bool,
    pub migrate_noop_changes: bool,
    pub custom_rev_id: Option<String>,
    pub set_rev_id: bool,
    pub smart_prune: bool,
    pub change_identity: Option<String>,
    pub after_migration: Vec<Box<dyn MigrationHook>>,
    pub after_all_migrations: Vec<Box<dyn MigrationHook>>,
    /// Path of the config file that declares the workflow.
    pub config_path: String,
    /// Every file the config is made of. Changes touching them are never
    /// skipped.
    pub config_paths: BTreeSet<String>,
}

impl WorkflowBuilder {
    pub fn new(
        name: impl Into<String>,
        origin: Box<dyn Origin>,
        destination: Box<dyn Destination>,
        authoring: Authoring,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            origin,
            destination,
            authoring,
            transformations: Vec::new(),
            origin_files: Glob::all_files(),
            destination_files: Glob::all_files(),
            mode: WorkflowMode::Squash,
            reversible_check: None,
            check_last_rev_state: false,
            ask_for_confirmation: false,
            checkout: true,
            migrate_noop_changes: false,
            custom_rev_id: None,
            set_rev_id: true,
            smart_prune: false,
            change_identity: None,
            after_migration: Vec::new(),
            after_all_migrations: Vec::new(),
            config_path: String::new(),
            config_paths: BTreeSet::new(),
        }
    }

    pub fn build(self, general: GeneralOptions, options: WorkflowOptions) -> Result<Workflow> {
        if self.name.is_empty() {
            return Err(WorkflowError::Validation(
                "Workflow name cannot be empty".to_string(),
            ));
        }
        let mode = if options.squash {
            WorkflowMode::Squash
        } else {
            self.mode
        };
        let authoring = match &options.default_author {
            Some(author) => self.authoring.with_default_author(author.clone()),
            None => self.authoring,
        };

        if let Some(rev_id) = &self.custom_rev_id {
            if !CUSTOM_REV_ID_RE.is_match(rev_id) {
                return Err(WorkflowError::Validation(format!(
                    "Invalid experimental_custom_rev_id format '{}'. Format: {}",
                    rev_id,
                    CUSTOM_REV_ID_RE.as_str()
                )));
            }
            if mode == WorkflowMode::ChangeRequest && self.set_rev_id {
                return Err(WorkflowError::Validation(
                    "experimental_custom_rev_id is not allowed to be used in CHANGE_REQUEST \
                     mode if set_rev_id is set to true. experimental_custom_rev_id is used for \
                     looking for the baseline in the origin. No revId is stored in the \
                     destination."
                        .to_string(),
                ));
            }
        }
        if !self.set_rev_id && mode != WorkflowMode::ChangeRequest {
            return Err(WorkflowError::Validation(
                "'set_rev_id = false' is only supported for CHANGE_REQUEST mode.".to_string(),
            ));
        }
        if self.smart_prune && mode != WorkflowMode::ChangeRequest {
            return Err(WorkflowError::Validation(
                "'smart_prune = true' is only supported for CHANGE_REQUEST mode.".to_string(),
            ));
        }
        if self.check_last_rev_state && mode == WorkflowMode::ChangeRequest {
            return Err(WorkflowError::Validation(
                "'check_last_rev_state = true' is not compatible with CHANGE_REQUEST mode."
                    .to_string(),
            ));
        }

        let change_identity = self
            .change_identity
            .as_deref()
            .map(IdentityTemplate::parse)
            .transpose()?;

        let transformation = Sequence::new(self.transformations);
        let reversible_check = self
            .reversible_check
            .unwrap_or(mode == WorkflowMode::ChangeRequest);
        let reverse_transform_for_check = if reversible_check {
            let reverse = transformation.reverse().map_err(|e| match e {
                WorkflowError::NonReversibleTransform(msg) => WorkflowError::Validation(format!(
                    "Couldn't create a reverse transformation for the reversible_check of \
                     workflow '{}': {}",
                    self.name, msg
                )),
                other => other,
            })?;
            Some(reverse)
        } else {
            None
        };

        let identity_user = options
            .workflow_identity_user
            .clone()
            .unwrap_or_else(default_identity_user);

        Ok(Workflow {
            name: self.name,
            description: self.description,
            origin: self.origin,
            destination: self.destination,
            authoring,
            transformation,
            reverse_transform_for_check,
            origin_files: self.origin_files,
            destination_files: self.destination_files,
            mode,
            check_last_rev_state: self.check_last_rev_state,
            ask_for_confirmation: self.ask_for_confirmation,
            checkout: self.checkout,
            migrate_noop_changes: self.migrate_noop_changes,
            custom_rev_id: self.custom_rev_id,
            set_rev_id: self.set_rev_id,
            smart_prune: self.smart_prune,
            change_identity,
            after_migration: self.after_migration,
            after_all_migrations: self.after_all_migrations,
            config_path: self.config_path,
            config_paths: self.config_paths,
            identity_user,
            general,
            options,
        })
    }
}

/// A validated migration from one origin to one destination.
pub struct Workflow {
    name: String,
    description: Option<String>,
    origin: Box<dyn Origin>,
    destination: Box<dyn Destination>,
    authoring: Authoring,
    transformation: Sequence,
    reverse_transform_for_check: Option<Box<dyn Transformation>>,
    origin_files: Glob,
    destination_files: Glob,
    mode: WorkflowMode,
    check_last_rev_state: bool,
    ask_for_confirmation: bool,
    checkout: bool,
    migrate_noop_changes: bool,
    custom_rev_id: Option<String>,
    set_rev_id: bool,
    smart_prune: bool,
    change_identity: Option<IdentityTemplate>,
    after_migration: Vec<Box<dyn MigrationHook>>,
    after_all_migrations: Vec<Box<dyn MigrationHook>>,
    config_path: String,
    config_paths: BTreeSet<String>,
    identity_user: String,
    general: GeneralOptions,
    options: WorkflowOptions,
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("origin", &self.origin)
            .field("destination", &self.destination)
            .field("origin_files", &self.origin_files)
            .field("destination_files", &self.destination_files)
            .finish_non_exhaustive()
    }
}

impl Workflow {
    /// Migrate `source_refs` (at most one; none means the origin's default).
    /// Returns every effect recorded during the run.
    pub fn run(&self, workdir: &Path, source_refs: &[String]) -> Result<Vec<DestinationEffect>> {
        if source_refs.len() > 1 {
            return Err(WorkflowError::CommandLine(format!(
                "Workflow does not support multiple source_ref arguments yet: {}",
                source_refs.join(", ")
            )));
        }
        self.validate_flags()?;

        let raw_source_ref = source_refs.first().cloned();
        let resolved = self.origin.resolve(raw_source_ref.as_deref())?;
        info!(
            "Running Copybara for workflow '{}' and ref '{}'{}",
            self.name,
            resolved,
            self.description
                .as_deref()
                .map(|d| format!(": {}", d))
                .unwrap_or_default()
        );

        let reader = self.origin.new_reader(&self.origin_files, &self.authoring)?;
        let writer = self.destination.new_writer(&WriterContext {
            workflow_name: self.name.clone(),
            identity_user: self.identity_user.clone(),
            dry_run: self.general.dry_run,
            original_revision: Some(resolved.clone()),
        })?;

        let mut helper = WorkflowRunHelper::new(
            self,
            workdir.to_path_buf(),
            resolved.clone(),
            reader,
            writer,
            raw_source_ref,
        );
        let result = self.mode.run(&mut helper);
        let effects = helper.take_effects();

        let effects = if self.general.dry_run {
            if !self.after_all_migrations.is_empty() {
                info!("Not calling 'after_workflow' actions because of --dry-run mode");
            }
            effects
        } else {
            run_hooks(effects, &self.after_all_migrations, &resolved)
        };
        result.map(|_| effects)
    }

    /// Flag combinations that only become invalid once the mode is known.
    pub fn validate_flags(&self) -> Result<()> {
        if self.mode == WorkflowMode::ChangeRequest {
            for (set, flag) in [
                (self.options.init_history, INIT_HISTORY_FLAG),
                (self.options.check_last_rev_state, CHECK_LAST_REV_STATE_FLAG),
            ] {
                if set {
                    return Err(WorkflowError::Validation(format!(
                        "{} is not compatible with {}",
                        flag, self.mode
                    )));
                }
            }
        }
        Ok(())
    }

    /// What has been migrated and what is pending, without writing anything.
    pub fn get_info(&self) -> Result<Info> {
        let writer = self.create_dry_run_writer(None)?;
        let last_migrated = match writer.destination_status(&self.destination_files, &self.rev_id_label())? {
            Some(status) => Some(self.origin.resolve(Some(&status.baseline))?),
            None => None,
        };

        let available = match self.origin.resolve(None) {
            Ok(head) => {
                let reader = self.origin.new_reader(&self.origin_files, &self.authoring)?;
                match reader.changes(last_migrated.as_ref(), &head)? {
                    ChangesResponse::Changes(changes) => changes
                        .into_iter()
                        .filter(|c| {
                            !should_skip_change(
                                c,
                                &self.origin_files,
                                self.is_migrate_noop_changes(),
                                &self.config_paths,
                            )
                        })
                        .collect(),
                    ChangesResponse::Empty(_) => Vec::new(),
                }
            }
            Err(e) if e.kind() == ErrorKind::Repository => {
                warn!("Cannot resolve the origin default reference: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Info {
            origin_description: self.origin.describe(),
            destination_description: self.destination.describe(),
            migration_references: vec![MigrationReference::new(&self.name, last_migrated, available)],
        })
    }

    /// Identity of the migration of `revision`, stable across runs.
    pub fn migration_identity(&self, revision: &Revision, work: &TransformWork) -> Result<Fingerprint> {
        let reference = revision.identity_reference();
        let identity = match &self.change_identity {
            None => compute_identity(
                CHANGE_IDENTITY,
                reference,
                &self.name,
                &self.config_path,
                &self.identity_user,
            )?,
            Some(template) => {
                let ctx = IdentityContext {
                    config_path: &self.config_path,
                    workflow_name: &self.name,
                    reference,
                    identity_user: &self.identity_user,
                };
                template.identity(CHANGE_IDENTITY, &ctx, |label| work.label(label))?
            }
        };
        Ok(identity)
    }

    pub fn create_dry_run_writer(&self, original_revision: Option<&Revision>) -> Result<Box<dyn Writer>> {
        self.destination.new_writer(&WriterContext {
            workflow_name: self.name.clone(),
            identity_user: self.identity_user.clone(),
            dry_run: true,
            original_revision: original_revision.cloned(),
        })
    }

    /// Label recording the origin revision in destination messages.
    pub fn rev_id_label(&self) -> String {
        self.custom_rev_id
            .clone()
            .unwrap_or_else(|| self.origin.label_name())
    }

    /// Label a change request looks for in origin history to find its
    /// baseline.
    pub fn label_name_when_origin(&self) -> String {
        self.custom_rev_id
            .clone()
            .unwrap_or_else(|| self.destination.label_name_when_origin())
    }

    pub fn is_migrate_noop_changes(&self) -> bool {
        self.migrate_noop_changes || self.options.import_noop_changes
    }

    pub fn check_last_rev_state(&self) -> bool {
        self.check_last_rev_state || self.options.check_last_rev_state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn mode(&self) -> WorkflowMode {
        self.mode
    }

    pub fn origin(&self) -> &dyn Origin {
        self.origin.as_ref()
    }

    pub fn destination(&self) -> &dyn Destination {
        self.destination.as_ref()
    }

    pub fn authoring(&self) -> &Authoring {
        &self.authoring
    }

    pub fn transformation(&self) -> &Sequence {
        &self.transformation
    }

    pub fn reverse_transform_for_check(&self) -> Option<&dyn Transformation> {
        self.reverse_transform_for_check.as_deref()
    }

    pub fn origin_files(&self) -> &Glob {
        &self.origin_files
    }

    pub fn destination_files(&self) -> &Glob {
        &self.destination_files
    }

    pub fn ask_for_confirmation(&self) -> bool {
        self.ask_for_confirmation
    }

    pub fn checkout(&self) -> bool {
        self.checkout
    }

    pub fn set_rev_id(&self) -> bool {
        self.set_rev_id
    }

    pub fn smart_prune(&self) -> bool {
        self.smart_prune
    }

    pub fn after_migration_hooks(&self) -> &[Box<dyn MigrationHook>] {
        &self.after_migration
    }

    pub fn config_paths(&self) -> &BTreeSet<String> {
        &self.config_paths
    }

    pub fn identity_user(&self) -> &str {
        &self.identity_user
    }

    pub fn general_options(&self) -> &GeneralOptions {
        &self.general
    }

    pub fn workflow_options(&self) -> &WorkflowOptions {
        &self.options
    }
}
