use crate::error::{Result, WorkflowError};
use crate::origin::{Baseline, ChangesResponse, EmptyReason};
use crate::run_helper::{MigrationRequest, WorkflowRunHelper};
use copybara_core::{Change, Changes, Revision};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

const DEFAULT_SQUASH_MESSAGE: &str = "Project import generated by Copybara.\n";

/// How origin changes are grouped into destination writes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowMode {
    /// One write with the whole origin state, attributed to the default author.
    Squash,
    /// One write per origin change, oldest first.
    Iterative,
    /// One write diffed against a baseline already in the destination.
    ChangeRequest,
    /// Like change request, with the baseline taken from the source of truth.
    ChangeRequestFromSot,
}

impl WorkflowMode {
    pub fn run(self, helper: &mut WorkflowRunHelper<'_>) -> Result<()> {
        match self {
            Self::Squash => run_squash(helper),
            Self::Iterative => run_iterative(helper),
            Self::ChangeRequest => run_change_request(helper),
            Self::ChangeRequestFromSot => run_change_request_from_sot(helper),
        }
    }

    pub fn is_change_request(self) -> bool {
        matches!(self, Self::ChangeRequest | Self::ChangeRequestFromSot)
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Squash => "SQUASH",
            Self::Iterative => "ITERATIVE",
            Self::ChangeRequest => "CHANGE_REQUEST",
            Self::ChangeRequestFromSot => "CHANGE_REQUEST_FROM_SOT",
        })
    }
}

fn run_squash(helper: &mut WorkflowRunHelper<'_>) -> Result<()> {
    let resolved = helper.resolved_ref().clone();
    let force = helper.is_force();

    let mut last_rev = None;
    if helper.destination_supports_previous_ref() {
        match helper.get_last_rev() {
            Ok(rev) => last_rev = rev,
            Err(e @ WorkflowError::CannotResolveRevision { .. }) => {
                if !force {
                    return Err(WorkflowError::Validation(format!(
                        "Cannot find last imported revision. Use --force if you really want \
                         to proceed with the migration: {}",
                        e
                    )));
                }
                warn!("Cannot find last imported revision, but proceeding because of --force flag");
            }
            Err(e) => return Err(e),
        }
    }

    let mut current = resolved.clone();
    let mut detected = Vec::new();
    match helper.changes(last_rev.as_ref(), &resolved)? {
        ChangesResponse::Changes(changes) => {
            // Prefer the newest change that touched origin_files over an
            // unrelated tip.
            if let Some(last) = changes.last() {
                current = last.revision.clone();
            }
            detected = changes;
        }
        ChangesResponse::Empty(reason) => {
            let from = last_rev
                .as_ref()
                .map(|r| format!(" from {}", r))
                .unwrap_or_default();
            let err = match reason {
                EmptyReason::NoChanges => WorkflowError::EmptyChange(format!(
                    "No changes{} up to {} match any origin_files. Use --force if you really \
                     want to run the migration anyway.",
                    from, resolved
                )),
                EmptyReason::ToIsAncestor => WorkflowError::EmptyChange(format!(
                    "'{}' has been already migrated. Use --force if you really want to run \
                     the migration again (For example if the copybara config has changed).",
                    resolved
                )),
                EmptyReason::UnrelatedRevisions => WorkflowError::Validation(format!(
                    "Last imported revision '{}' is not an ancestor of the revision currently \
                     being migrated ('{}'). Use --force if you really want to migrate the \
                     reference.",
                    last_rev.as_ref().map(Revision::as_str).unwrap_or("none"),
                    resolved
                )),
            };
            if !force {
                return Err(err);
            }
            warn!("{} Proceeding because of --force", err);
        }
    }

    if helper.is_squash_without_history() {
        detected.clear();
    }

    helper.maybe_validate_repo_in_last_rev_state(None)?;

    let options = helper.workflow_options();
    let author = options.final_author(helper.authoring().default_author.clone());
    let message = options.forced_change_message(DEFAULT_SQUASH_MESSAGE);
    helper.migrate(MigrationRequest {
        revision: current,
        last_revision: last_rev,
        message,
        author,
        changes: Changes::new(detected, Vec::new()),
        destination_baseline: None,
        identity_revision: Some(resolved),
    })?;
    Ok(())
}

fn run_iterative(helper: &mut WorkflowRunHelper<'_>) -> Result<()> {
    let resolved = helper.resolved_ref().clone();
    let mut last_rev = helper.get_last_rev()?;

    let mut changes = match helper.changes(last_rev.as_ref(), &resolved)? {
        ChangesResponse::Changes(changes) => changes,
        ChangesResponse::Empty(EmptyReason::UnrelatedRevisions) => {
            return Err(WorkflowError::Validation(format!(
                "last imported revision {} is not ancestor of requested revision {}",
                last_rev.as_ref().map(Revision::as_str).unwrap_or("none"),
                resolved
            )));
        }
        ChangesResponse::Empty(_) => {
            return Err(WorkflowError::EmptyChange(format!(
                "No new changes to import for resolved ref: {}",
                resolved
            )));
        }
    };

    let limit = helper.workflow_options().iterative_limit_changes;
    if changes.len() > limit {
        info!(
            "Importing first {} change(s) out of {}",
            limit,
            changes.len()
        );
        changes.truncate(limit);
    }

    helper.maybe_validate_repo_in_last_rev_state(None)?;

    let total = changes.len();
    let mut migrated: Vec<Change> = Vec::new();
    let mut migrated_count = 0;
    for (i, change) in changes.into_iter().enumerate() {
        let prefix = format!("Change {} of {} ({})", i + 1, total, change.revision);
        if helper.should_skip_change(&change) {
            info!("{}: skipped, it would create an empty result", prefix);
            continue;
        }
        info!("{}: migrating", prefix);

        let options = helper.workflow_options();
        let message = options.forced_change_message(&change.message);
        let author = options.final_author(helper.authoring().resolve(&change.author));
        let revision = change.revision.clone();
        let request = MigrationRequest {
            revision: revision.clone(),
            last_revision: last_rev.clone(),
            message,
            author,
            changes: Changes::new(vec![change.clone()], migrated.clone()),
            destination_baseline: None,
            identity_revision: Some(revision.clone()),
        };
        match helper.migrate(request) {
            Ok(_) => migrated_count += 1,
            Err(WorkflowError::EmptyChange(msg)) => {
                warn!("{}: Migration of origin revision '{}' resulted in an empty change in the destination: {}", prefix, revision, msg);
            }
            Err(e) => {
                error!("{}: Error migrating change: {}", prefix, e);
                return Err(e);
            }
        }
        migrated.insert(0, change);
        last_rev = Some(revision);
    }

    if migrated_count == 0 {
        return Err(WorkflowError::EmptyChange(format!(
            "Iterative workflow produced no changes in the destination for resolved ref: {}",
            resolved
        )));
    }
    Ok(())
}

fn run_change_request(helper: &mut WorkflowRunHelper<'_>) -> Result<()> {
    let resolved = helper.resolved_ref().clone();
    let baseline = match helper.workflow_options().change_request_parent.clone() {
        Some(parent) if !parent.is_empty() => Baseline {
            baseline: parent,
            origin_revision: None,
        },
        _ => {
            let label = helper.label_name_when_origin();
            helper
                .reader()
                .find_baseline(&resolved, &label)?
                .ok_or_else(|| {
                    WorkflowError::Validation(format!(
                        "Cannot find matching parent commit in the destination. Use '{}' flag \
                         to force a parent commit to use as baseline in the destination.",
                        crate::options::CHANGE_REQUEST_PARENT_FLAG
                    ))
                })?
        }
    };
    info!("Found baseline {}", baseline.baseline);
    migrate_change_request(helper, resolved, baseline)
}

fn run_change_request_from_sot(helper: &mut WorkflowRunHelper<'_>) -> Result<()> {
    let resolved = helper.resolved_ref().clone();
    let limit = helper.workflow_options().change_request_from_sot_limit;
    let candidates = helper.reader().find_baselines_without_label(&resolved, limit)?;
    let Some(first) = candidates.first().cloned() else {
        return Err(WorkflowError::Validation(format!(
            "Couldn't find any parent change for {} and origin_files = {}",
            resolved,
            helper.workflow().origin_files()
        )));
    };

    let label = helper.origin_label_name();
    let delays = helper.workflow_options().change_request_from_sot_retry.clone();
    let mut attempt = 0;
    let baseline = loop {
        let mut found = None;
        for candidate in &candidates {
            if let Some(dest) = helper.writer().find_change_with_label(&label, candidate.as_str())? {
                found = Some(Baseline {
                    baseline: dest,
                    origin_revision: Some(candidate.clone()),
                });
                break;
            }
        }
        if let Some(found) = found {
            break found;
        }
        let Some(delay) = delays.get(attempt) else {
            return Err(WorkflowError::Validation(format!(
                "Couldn't find a change in the destination with {} label and {} value. \
                 Make sure to sync the submitted changes first",
                label, first
            )));
        };
        warn!(
            "Couldn't find a change in the destination with {} label and {} value. Retrying in {} seconds...",
            label,
            first,
            delay.as_secs()
        );
        std::thread::sleep(*delay);
        attempt += 1;
    };
    migrate_change_request(helper, resolved, baseline)
}

fn migrate_change_request(
    helper: &mut WorkflowRunHelper<'_>,
    resolved: Revision,
    baseline: Baseline,
) -> Result<()> {
    let change = helper.reader().change(&resolved)?;
    let options = helper.workflow_options();
    let message = options.forced_change_message(&change.message);
    let author = options.final_author(helper.authoring().resolve(&change.author));
    helper.migrate(MigrationRequest {
        revision: resolved.clone(),
        last_revision: None,
        message,
        author,
        changes: Changes::new(vec![change], Vec::new()),
        destination_baseline: Some(baseline),
        identity_revision: Some(resolved),
    })?;
    Ok(())
}
