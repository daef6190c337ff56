pub mod metadata;
pub mod move_files;
pub mod replace;

use crate::error::{Result, WorkflowError};
use copybara_core::{Author, ChangeMessage, Changes, Labels, Revision};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{info, warn};

pub use metadata::{AddLabel, ExposeLabel, RemoveLabel};
pub use move_files::Move;
pub use replace::Replace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformationStatus {
    Success,
    /// The transformation had nothing to do.
    Noop(String),
}

impl TransformationStatus {
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop(_))
    }
}

/// A step that rewrites the checkout and/or the change metadata.
pub trait Transformation: fmt::Debug {
    fn transform(&self, work: &mut TransformWork) -> Result<TransformationStatus>;

    /// The inverse step. Fails with a non-reversible error when there is none.
    fn reverse(&self) -> Result<Box<dyn Transformation>>;

    fn describe(&self) -> String;
}

/// Mutable state handed to transformations: the checkout directory plus the
/// message and author that will be written.
#[derive(Debug, Clone)]
pub struct TransformWork {
    checkout_dir: PathBuf,
    pub message: String,
    pub author: Author,
    pub changes: Changes,
    /// Revision requested on the command line.
    pub resolved_reference: Revision,
    /// Revision being migrated by this write.
    pub current_revision: Revision,
    pub last_revision: Option<Revision>,
    pub ignore_noop: bool,
}

impl TransformWork {
    pub fn new(
        checkout_dir: impl Into<PathBuf>,
        message: impl Into<String>,
        author: Author,
        changes: Changes,
        resolved_reference: Revision,
        ignore_noop: bool,
    ) -> Self {
        let current_revision = resolved_reference.clone();
        Self {
            checkout_dir: checkout_dir.into(),
            message: message.into(),
            author,
            changes,
            resolved_reference,
            current_revision,
            last_revision: None,
            ignore_noop,
        }
    }

    pub fn with_current_revision(mut self, revision: Revision) -> Self {
        self.current_revision = revision;
        self
    }

    pub fn with_last_revision(mut self, revision: Option<Revision>) -> Self {
        self.last_revision = revision;
        self
    }

    /// Same metadata, different tree.
    pub fn with_checkout_dir(&self, checkout_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkout_dir: checkout_dir.into(),
            ..self.clone()
        }
    }

    pub fn checkout_dir(&self) -> &Path {
        &self.checkout_dir
    }

    pub fn parsed_message(&self) -> ChangeMessage {
        ChangeMessage::parse_message(&self.message)
    }

    pub fn add_label(&mut self, name: &str, value: &str, separator: &str) -> Result<()> {
        self.message = self
            .parsed_message()
            .with_label(name, separator, value)?
            .to_string();
        Ok(())
    }

    pub fn add_or_replace_label(&mut self, name: &str, value: &str, separator: &str) -> Result<()> {
        self.message = self
            .parsed_message()
            .with_new_or_replaced_label(name, separator, value)?
            .to_string();
        Ok(())
    }

    pub fn remove_label(&mut self, name: &str) -> Result<()> {
        self.message = self
            .parsed_message()
            .with_removed_label_by_name(name)?
            .to_string();
        Ok(())
    }

    /// Find a label: first in the message being built, then in the changes
    /// being migrated (newest first), then in the requested revision.
    pub fn label(&self, name: &str) -> Option<String> {
        if let Some(v) = self.parsed_message().labels_as_multimap().last(name) {
            return Some(v.to_string());
        }
        for change in self.changes.current.iter().rev() {
            if let Some(v) = change.labels.last(name) {
                return Some(v.to_string());
            }
        }
        self.resolved_reference.labels.last(name).map(str::to_string)
    }

    /// Every label visible to this migration, message labels first.
    pub fn all_labels(&self) -> Labels {
        let mut labels = self.parsed_message().labels_as_multimap();
        for change in self.changes.current.iter().rev() {
            labels = labels.merged(&change.labels);
        }
        labels.merged(&self.resolved_reference.labels)
    }
}

/// Runs steps in order. A noop step stops the sequence unless noops are
/// ignored for this run.
#[derive(Debug)]
pub struct Sequence {
    steps: Vec<Box<dyn Transformation>>,
}

impl Sequence {
    pub fn new(steps: Vec<Box<dyn Transformation>>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Transformation for Sequence {
    fn transform(&self, work: &mut TransformWork) -> Result<TransformationStatus> {
        let total = self.steps.len();
        for (i, step) in self.steps.iter().enumerate() {
            info!("[{:2}/{}] Transform {}", i + 1, total, step.describe());
            let status = step.transform(work)?;
            if let TransformationStatus::Noop(reason) = status {
                if !work.ignore_noop {
                    return Ok(TransformationStatus::Noop(reason));
                }
                warn!("{}", reason);
            }
        }
        Ok(TransformationStatus::Success)
    }

    fn reverse(&self) -> Result<Box<dyn Transformation>> {
        let steps = self
            .steps
            .iter()
            .rev()
            .map(|s| s.reverse())
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(Sequence::new(steps)))
    }

    fn describe(&self) -> String {
        "sequence".to_string()
    }
}

/// A step with an explicitly declared inverse.
#[derive(Debug)]
pub struct ExplicitReversal {
    forward: Rc<dyn Transformation>,
    reverse: Rc<dyn Transformation>,
}

impl ExplicitReversal {
    pub fn new(forward: Box<dyn Transformation>, reverse: Box<dyn Transformation>) -> Self {
        Self {
            forward: Rc::from(forward),
            reverse: Rc::from(reverse),
        }
    }
}

impl Transformation for ExplicitReversal {
    fn transform(&self, work: &mut TransformWork) -> Result<TransformationStatus> {
        self.forward.transform(work)
    }

    fn reverse(&self) -> Result<Box<dyn Transformation>> {
        Ok(Box::new(ExplicitReversal {
            forward: Rc::clone(&self.reverse),
            reverse: Rc::clone(&self.forward),
        }))
    }

    fn describe(&self) -> String {
        self.forward.describe()
    }
}

/// Does nothing. Used as the inverse of metadata-only steps.
#[derive(Debug, Clone, Default)]
pub struct IntentionalNoop;

impl Transformation for IntentionalNoop {
    fn transform(&self, _work: &mut TransformWork) -> Result<TransformationStatus> {
        Ok(TransformationStatus::Success)
    }

    fn reverse(&self) -> Result<Box<dyn Transformation>> {
        Ok(Box::new(IntentionalNoop))
    }

    fn describe(&self) -> String {
        "intentional noop".to_string()
    }
}

pub(crate) fn non_reversible(what: &str) -> WorkflowError {
    WorkflowError::NonReversibleTransform(format!("'{}' is not automatically reversible", what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use copybara_core::Glob;
    use std::fs;
    use tempfile::tempdir;

    fn work(dir: &Path, ignore_noop: bool) -> TransformWork {
        TransformWork::new(
            dir,
            "Title\n",
            Author::new("A", "a@x.com"),
            Changes::empty(),
            Revision::new("1").with_label("Origin-Label", "o"),
            ignore_noop,
        )
    }

    fn replace(before: &str, after: &str) -> Box<dyn Transformation> {
        Box::new(Replace::new(before, after, Glob::all_files()).unwrap())
    }

    #[test]
    fn sequence_stops_on_noop_unless_ignored() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "one two").unwrap();
        let seq = Sequence::new(vec![replace("missing", "x"), replace("one", "1")]);

        let status = seq.transform(&mut work(dir.path(), false)).unwrap();
        assert!(status.is_noop());
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "one two");

        let status = seq.transform(&mut work(dir.path(), true)).unwrap();
        assert_eq!(status, TransformationStatus::Success);
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "1 two");
    }

    #[test]
    fn sequence_reverse_runs_inverses_backwards() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        let seq = Sequence::new(vec![replace("a", "b"), replace("b", "c")]);
        let mut w = work(dir.path(), false);
        seq.transform(&mut w).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "c");
        seq.reverse().unwrap().transform(&mut w).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "a");
    }

    #[test]
    fn sequence_with_non_reversible_step_fails_to_reverse() {
        let seq = Sequence::new(vec![
            replace("a", "b"),
            Box::new(RemoveLabel::new("x").unwrap()),
        ]);
        let err = seq.reverse().unwrap_err();
        assert!(matches!(err, WorkflowError::NonReversibleTransform(_)));
    }

    #[test]
    fn explicit_reversal_uses_declared_inverse() {
        let step = ExplicitReversal::new(
            Box::new(RemoveLabel::new("x").unwrap()),
            Box::new(IntentionalNoop),
        );
        let reversed = step.reverse().unwrap();
        assert_eq!(reversed.describe(), "intentional noop");
        assert_eq!(reversed.reverse().unwrap().describe(), "Removing label x");
    }

    #[test]
    fn label_lookup_order() {
        let dir = tempdir().unwrap();
        let mut w = work(dir.path(), false);
        assert_eq!(w.label("Origin-Label").as_deref(), Some("o"));
        w.add_label("Origin-Label", "from-message", ": ").unwrap();
        assert_eq!(w.label("Origin-Label").as_deref(), Some("from-message"));
        assert_eq!(w.all_labels().get("Origin-Label").len(), 2);
    }
}
