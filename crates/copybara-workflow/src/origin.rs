use crate::error::{Result, WorkflowError};
use copybara_core::{Authoring, Change, Glob, Revision};
use std::fmt;
use std::path::Path;

/// Why a change range came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// There are changes in the range but none touch origin_files.
    NoChanges,
    /// `from` and `to` do not share history.
    UnrelatedRevisions,
    /// `to` is an ancestor of (or equal to) `from`.
    ToIsAncestor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangesResponse {
    /// Oldest first.
    Changes(Vec<Change>),
    Empty(EmptyReason),
}

impl ChangesResponse {
    pub fn for_changes(changes: Vec<Change>) -> Self {
        if changes.is_empty() {
            Self::Empty(EmptyReason::NoChanges)
        } else {
            Self::Changes(changes)
        }
    }
}

/// A destination side reference a change request is based on.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub baseline: String,
    /// The origin revision that produced `baseline`, when known.
    pub origin_revision: Option<Revision>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    Continue,
    Terminate,
}

/// Where code is migrated from.
pub trait Origin: fmt::Debug {
    /// Resolve a reference given on the command line. `None` asks for the
    /// origin's default reference.
    fn resolve(&self, reference: Option<&str>) -> Result<Revision>;

    fn new_reader(&self, origin_files: &Glob, authoring: &Authoring) -> Result<Box<dyn Reader>>;

    /// Label used to record origin revisions in destination messages.
    fn label_name(&self) -> String;

    fn describe(&self) -> String;
}

pub trait Reader {
    /// Materialize `revision` into `dest`, which exists and is empty.
    fn checkout(&self, revision: &Revision, dest: &Path) -> Result<()>;

    /// Changes after `from` up to and including `to`, oldest first.
    fn changes(&self, from: Option<&Revision>, to: &Revision) -> Result<ChangesResponse>;

    fn change(&self, revision: &Revision) -> Result<Change>;

    /// Walk history backwards from `start`, newest first.
    fn visit_changes(
        &self,
        start: &Revision,
        visitor: &mut dyn FnMut(&Change) -> VisitResult,
    ) -> Result<()> {
        let _ = (start, visitor);
        Err(WorkflowError::Repo(
            "This origin does not support visiting changes".to_string(),
        ))
    }

    /// Nearest ancestor of `start` (excluding `start` itself) that carries
    /// `label`. The last value of the label wins.
    fn find_baseline(&self, start: &Revision, label: &str) -> Result<Option<Baseline>> {
        let mut found = None;
        self.visit_changes(start, &mut |change| {
            if change.revision.id == start.id {
                return VisitResult::Continue;
            }
            match change.labels.last(label) {
                Some(value) => {
                    found = Some(Baseline {
                        baseline: value.to_string(),
                        origin_revision: Some(change.revision.clone()),
                    });
                    VisitResult::Terminate
                }
                None => VisitResult::Continue,
            }
        })?;
        Ok(found)
    }

    /// Ancestors of `start` that could be the submitted parent of a change
    /// request, newest first, at most `limit`.
    fn find_baselines_without_label(&self, start: &Revision, limit: usize) -> Result<Vec<Revision>> {
        let mut found = Vec::new();
        self.visit_changes(start, &mut |change| {
            if change.revision.id == start.id {
                return VisitResult::Continue;
            }
            found.push(change.revision.clone());
            if found.len() >= limit {
                VisitResult::Terminate
            } else {
                VisitResult::Continue
            }
        })?;
        Ok(found)
    }
}
