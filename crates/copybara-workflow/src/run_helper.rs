use crate::destination::{DestinationEffect, EffectType, Writer};
use crate::error::{ErrorKind, Result, WorkflowError};
use crate::fs_util::{self, OutsideSymlinks};
use crate::hooks::run_hooks;
use crate::options::{GeneralOptions, WorkflowOptions, CHANGE_REQUEST_PARENT_FLAG, LAST_REV_FLAG};
use crate::origin::{Baseline, ChangesResponse, Reader};
use crate::transform::{TransformWork, Transformation, TransformationStatus};
use crate::transform_result::TransformResult;
use crate::workflow::Workflow;
use copybara_core::{Author, Authoring, Change, Changes, Glob, Revision};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, info_span, warn};

/// Inputs for a single write.
#[derive(Debug, Clone)]
pub struct MigrationRequest {
    /// Origin revision to check out and write.
    pub revision: Revision,
    pub last_revision: Option<Revision>,
    pub message: String,
    pub author: Author,
    pub changes: Changes,
    pub destination_baseline: Option<Baseline>,
    /// Revision the migration identity is computed from. Defaults to
    /// `revision`.
    pub identity_revision: Option<Revision>,
}

/// State for one `Workflow::run`: the resolved reference, one reader and one
/// writer, and the effects collected so far.
pub struct WorkflowRunHelper<'a> {
    workflow: &'a Workflow,
    workdir: PathBuf,
    resolved_ref: Revision,
    reader: Box<dyn Reader>,
    writer: Box<dyn Writer>,
    raw_source_ref: Option<String>,
    effects: Vec<DestinationEffect>,
}

impl<'a> WorkflowRunHelper<'a> {
    pub fn new(
        workflow: &'a Workflow,
        workdir: PathBuf,
        resolved_ref: Revision,
        reader: Box<dyn Reader>,
        writer: Box<dyn Writer>,
        raw_source_ref: Option<String>,
    ) -> Self {
        Self {
            workflow,
            workdir,
            resolved_ref,
            reader,
            writer,
            raw_source_ref,
            effects: Vec::new(),
        }
    }

    pub fn workflow(&self) -> &'a Workflow {
        self.workflow
    }

    pub fn resolved_ref(&self) -> &Revision {
        &self.resolved_ref
    }

    pub fn reader(&self) -> &dyn Reader {
        self.reader.as_ref()
    }

    pub fn writer(&self) -> &dyn Writer {
        self.writer.as_ref()
    }

    pub fn workflow_options(&self) -> &'a WorkflowOptions {
        self.workflow.workflow_options()
    }

    pub fn general_options(&self) -> &'a GeneralOptions {
        self.workflow.general_options()
    }

    pub fn authoring(&self) -> &'a Authoring {
        self.workflow.authoring()
    }

    pub fn is_force(&self) -> bool {
        self.general_options().force
    }

    pub fn is_squash_without_history(&self) -> bool {
        self.workflow_options().squash_skip_history
    }

    pub fn destination_supports_previous_ref(&self) -> bool {
        self.writer.supports_history()
    }

    pub fn origin_label_name(&self) -> String {
        self.workflow.rev_id_label()
    }

    pub fn label_name_when_origin(&self) -> String {
        self.workflow.label_name_when_origin()
    }

    pub fn changes(&self, from: Option<&Revision>, to: &Revision) -> Result<ChangesResponse> {
        self.reader.changes(from, to)
    }

    pub fn should_skip_change(&self, change: &Change) -> bool {
        should_skip_change(
            change,
            self.workflow.origin_files(),
            self.workflow.is_migrate_noop_changes(),
            self.workflow.config_paths(),
        )
    }

    pub fn migrate(&mut self, request: MigrationRequest) -> Result<Vec<DestinationEffect>> {
        ChangeMigrator {
            workflow: self.workflow,
            workdir: &self.workdir,
            reader: self.reader.as_ref(),
            writer: self.writer.as_mut(),
            resolved_ref: &self.resolved_ref,
            raw_source_ref: self.raw_source_ref.as_deref(),
            dry_run: self.workflow.general_options().dry_run,
            monitor: &mut self.effects,
        }
        .migrate(request)
    }

    /// Last migrated origin revision, required unless `--init-history`.
    pub fn get_last_rev(&self) -> Result<Option<Revision>> {
        let last_rev = self.maybe_get_last_rev()?;
        if last_rev.is_none() && !self.workflow_options().init_history {
            return Err(WorkflowError::cannot_resolve(format!(
                "Previous revision label {} could not be found in {} and {} or {} flags \
                 were not passed",
                self.workflow.rev_id_label(),
                self.workflow.destination().describe(),
                LAST_REV_FLAG,
                crate::options::INIT_HISTORY_FLAG,
            )));
        }
        Ok(last_rev)
    }

    pub fn maybe_get_last_rev(&self) -> Result<Option<Revision>> {
        let options = self.workflow_options();
        if let Some(flag) = &options.last_revision {
            return match self.workflow.origin().resolve(Some(flag)) {
                Ok(rev) => Ok(Some(rev)),
                Err(e) if e.kind() == ErrorKind::Repository => {
                    Err(WorkflowError::CannotResolveRevision {
                        message: format!(
                            "Could not resolve {} flag. Please make sure it exists in the origin: {}",
                            LAST_REV_FLAG, flag
                        ),
                        source: Some(Box::new(e)),
                    })
                }
                Err(e) => Err(e),
            };
        }

        let status = self
            .writer
            .destination_status(self.workflow.destination_files(), &self.workflow.rev_id_label())?;
        let Some(status) = status else {
            return Ok(None);
        };
        match self.workflow.origin().resolve(Some(&status.baseline)) {
            Ok(rev) => {
                if options.init_history {
                    warn!(
                        "Ignoring --init-history because a previous imported revision '{}' was \
                         found in the destination.",
                        rev
                    );
                }
                Ok(Some(rev))
            }
            Err(WorkflowError::CannotResolveRevision { .. }) if options.init_history => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Re-migrate the last revision with a dry-run writer. Only an empty
    /// result proves the destination was not modified outside the tool.
    pub fn maybe_validate_repo_in_last_rev_state(
        &mut self,
        metadata: Option<(String, Author)>,
    ) -> Result<()> {
        if !self.workflow.check_last_rev_state() || self.is_force() {
            return Ok(());
        }
        let Some(last_rev) = self.maybe_get_last_rev()? else {
            return Ok(());
        };
        info!("Validating that the destination is in the state of last-rev {}", last_rev);
        let change = self.reader.change(&last_rev)?;
        let (message, author) =
            metadata.unwrap_or_else(|| (change.message.clone(), change.author.clone()));

        let mut writer = self.workflow.create_dry_run_writer(Some(&self.resolved_ref))?;
        let mut scratch = Vec::new();
        let mut migrator = ChangeMigrator {
            workflow: self.workflow,
            workdir: &self.workdir,
            reader: self.reader.as_ref(),
            writer: writer.as_mut(),
            resolved_ref: &self.resolved_ref,
            raw_source_ref: self.raw_source_ref.as_deref(),
            dry_run: true,
            monitor: &mut scratch,
        };
        let request = MigrationRequest {
            revision: last_rev.clone(),
            last_revision: Some(last_rev.clone()),
            message,
            author,
            changes: Changes::new(vec![change], Vec::new()),
            destination_baseline: None,
            identity_revision: Some(last_rev.clone()),
        };
        match migrator.do_migrate(&request) {
            Ok(_) => Err(WorkflowError::Validation(format!(
                "Migration of last-rev '{}' didn't result in an empty change. This means that \
                 the result change of that migration was modified outside of Copybara or that \
                 new changes happened later in the destination without using Copybara. Use \
                 --force if you really want to do the migration.",
                last_rev
            ))),
            Err(WorkflowError::EmptyChange(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Effects recorded by every `migrate` call so far.
    pub fn take_effects(&mut self) -> Vec<DestinationEffect> {
        std::mem::take(&mut self.effects)
    }
}

/// A change can be skipped when it is known not to touch any origin file or
/// config file, and noop changes are not requested.
pub fn should_skip_change<'p, P>(
    change: &Change,
    origin_files: &Glob,
    migrate_noop_changes: bool,
    config_paths: P,
) -> bool
where
    P: IntoIterator<Item = &'p String> + Clone,
{
    if migrate_noop_changes {
        return false;
    }
    let Some(files) = &change.changed_files else {
        return false;
    };
    for file in files {
        if config_paths.clone().into_iter().any(|p| file.ends_with(p.as_str())) {
            info!(
                "Migrating {} because {} config file changed at that revision",
                change.revision, file
            );
            return false;
        }
        if origin_files.matches(file) {
            return false;
        }
    }
    debug!(
        "Skipping {} because none of the changed files match origin_files",
        change.revision
    );
    true
}

struct ChangeMigrator<'h> {
    workflow: &'h Workflow,
    workdir: &'h Path,
    reader: &'h dyn Reader,
    writer: &'h mut dyn Writer,
    resolved_ref: &'h Revision,
    raw_source_ref: Option<&'h str>,
    dry_run: bool,
    monitor: &'h mut Vec<DestinationEffect>,
}

impl ChangeMigrator<'_> {
    fn migrate(&mut self, request: MigrationRequest) -> Result<Vec<DestinationEffect>> {
        let current = &request.changes.current;
        let result = self.do_migrate(&request);
        let effects = match &result {
            Ok(effects) => effects.clone(),
            Err(WorkflowError::EmptyChange(msg)) => {
                let ids = if current.is_empty() {
                    "Unknown".to_string()
                } else {
                    current
                        .iter()
                        .map(|c| c.revision.id.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                vec![DestinationEffect::new(
                    EffectType::Noop,
                    format!("Cannot migrate revisions [{}]: {}", ids, msg),
                    current,
                )]
            }
            Err(e) => {
                let kind = if e.is_user_error() {
                    EffectType::Error
                } else {
                    EffectType::TemporaryError
                };
                vec![DestinationEffect::new(kind, "Errors happened during the migration", current)
                    .with_errors(vec![e.to_string()])]
            }
        };

        let effects = if self.dry_run {
            if !self.workflow.after_migration_hooks().is_empty() {
                info!("Not calling 'after_migration' actions because of --dry-run mode");
            }
            effects
        } else {
            run_hooks(effects, self.workflow.after_migration_hooks(), self.resolved_ref)
        };
        self.monitor.extend(effects.iter().cloned());
        result.map(|_| effects)
    }

    fn do_migrate(&mut self, request: &MigrationRequest) -> Result<Vec<DestinationEffect>> {
        let workflow = self.workflow;
        let span = info_span!("migrate", workflow = %workflow.name(), revision = %request.revision);
        let _enter = span.enter();

        if self.workdir.exists() {
            fs_util::delete_recursively(self.workdir)?;
        }
        let checkout_dir = self.workdir.join("checkout");
        fs::create_dir_all(&checkout_dir)?;

        self.checkout(&request.revision, &checkout_dir)?;

        let origin_copy = match workflow.reverse_transform_for_check() {
            Some(_) => {
                let dir = self.workdir.join("origin");
                fs_util::copy_tree(&checkout_dir, &dir, OutsideSymlinks::Fail)?;
                Some(dir)
            }
            None => None,
        };

        let mut work = TransformWork::new(
            &checkout_dir,
            request.message.clone(),
            request.author.clone(),
            request.changes.clone(),
            self.resolved_ref.clone(),
            workflow.workflow_options().ignore_noop,
        )
        .with_current_revision(request.revision.clone())
        .with_last_revision(request.last_revision.clone());

        if let TransformationStatus::Noop(reason) = workflow.transformation().transform(&mut work)? {
            if !work.ignore_noop {
                return Err(WorkflowError::Validation(reason));
            }
            warn!("{}", reason);
        }

        if let (Some(reverse), Some(origin_copy)) = (workflow.reverse_transform_for_check(), &origin_copy) {
            info!("Checking that the transformations can be reverted");
            let reverse_dir = self.workdir.join("reverse");
            fs_util::copy_tree(&checkout_dir, &reverse_dir, OutsideSymlinks::Fail)?;
            let mut reverse_work = work.with_checkout_dir(&reverse_dir);
            reverse_work.ignore_noop = false;
            if let TransformationStatus::Noop(reason) = reverse.transform(&mut reverse_work)? {
                debug!("Reverse transformation was a noop: {}", reason);
            }
            let diff = fs_util::diff_trees(origin_copy, &reverse_dir)?;
            if !diff.trim().is_empty() {
                error!("Non reversible transformations:\n{}", diff);
                return Err(WorkflowError::NotReversible {
                    workflow: workflow.name().to_string(),
                    diff,
                });
            }
        }

        validate_destination_files(&checkout_dir, workflow.destination_files())?;

        let mut result = TransformResult::new(
            checkout_dir.clone(),
            request.revision.clone(),
            work.author.clone(),
            work.message.clone(),
            self.resolved_ref.clone(),
            workflow.name().to_string(),
            request.changes.clone(),
            self.raw_source_ref.map(str::to_string),
            workflow.set_rev_id(),
            work.all_labels(),
            workflow.rev_id_label(),
        );

        if let Some(baseline) = &request.destination_baseline {
            result = result.with_baseline(baseline.baseline.clone());
            if workflow.smart_prune() {
                let origin_rev = baseline.origin_revision.as_ref().ok_or_else(|| {
                    WorkflowError::Validation(format!(
                        "smart_prune is not compatible with {} flag for now",
                        CHANGE_REQUEST_PARENT_FLAG
                    ))
                })?;
                let baseline_dir = self.workdir.join("baseline");
                fs::create_dir_all(&baseline_dir)?;
                self.checkout(origin_rev, &baseline_dir)?;
                let mut baseline_work = TransformWork::new(
                    &baseline_dir,
                    request.message.clone(),
                    request.author.clone(),
                    request.changes.clone(),
                    self.resolved_ref.clone(),
                    true,
                )
                .with_current_revision(origin_rev.clone())
                .with_last_revision(request.last_revision.clone());
                workflow.transformation().transform(&mut baseline_work)?;
                let affected = fs_util::diff_files(&baseline_dir, &checkout_dir)?;
                debug!("{} file(s) changed against the baseline", affected.len());
                result = result.with_affected_files_for_smart_prune(affected);
            }
        }

        let identity_revision = request.identity_revision.as_ref().unwrap_or(&request.revision);
        let identity = workflow.migration_identity(identity_revision, &work)?;
        let result = result
            .with_ask_for_confirmation(workflow.ask_for_confirmation())
            .with_identity(identity)
            .with_dry_run(self.dry_run);

        let effects = self.writer.write(&result, workflow.destination_files())?;
        if effects.is_empty() {
            return Err(WorkflowError::Internal(format!(
                "Destination {} returned an empty set of effects",
                workflow.destination().describe()
            )));
        }
        Ok(effects)
    }

    fn checkout(&self, revision: &Revision, dir: &Path) -> Result<()> {
        if self.workflow.checkout() {
            info!("Checking out {}", revision);
            self.reader.checkout(revision, dir)?;
        }
        let removed = fs_util::delete_files_not_matching(dir, self.workflow.origin_files())?;
        info!(
            "Removed {} files from workdir that do not match origin_files",
            removed
        );
        Ok(())
    }
}

fn validate_destination_files(checkout_dir: &Path, destination_files: &Glob) -> Result<()> {
    let outside: Vec<String> = fs_util::list_files(checkout_dir)?
        .into_iter()
        .filter(|f| !destination_files.matches(f))
        .collect();
    if outside.is_empty() {
        return Ok(());
    }
    Err(WorkflowError::NotADestinationFile(format!(
        "Attempted to write {} file(s) that are not covered by destination_files {}: {}. \
         Either exclude them from origin_files or add them to destination_files.",
        outside.len(),
        destination_files,
        outside.join(", ")
    )))
}
