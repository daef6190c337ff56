//! In-memory origin and destination used by the workflow tests.

use crate::destination::{
    Destination, DestinationEffect, DestinationRef, DestinationStatus, EffectType, Writer,
    WriterContext,
};
use crate::error::{Result, WorkflowError};
use crate::fs_util;
use crate::origin::{ChangesResponse, EmptyReason, Origin, Reader, VisitResult};
use crate::transform_result::TransformResult;
use chrono::{TimeZone, Utc};
use copybara_core::{Author, Authoring, Change, Glob, Revision};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::rc::Rc;

pub const DUMMY_LABEL: &str = "DummyOrigin-RevId";
pub const DEST_LABEL: &str = "Dest-RevId";

pub type Files = BTreeMap<String, String>;

pub fn files(entries: &[(&str, &str)]) -> Files {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Debug, Clone)]
struct DummyChange {
    files: Files,
    author: Author,
    message: String,
    changed_files: BTreeSet<String>,
}

/// Linear history. Revision ids are the change indexes: "0", "1", ...
#[derive(Debug, Clone, Default)]
pub struct DummyOrigin {
    history: Rc<RefCell<Vec<DummyChange>>>,
}

impl DummyOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change whose tree is exactly `files`.
    pub fn add_change(&self, files: Files, author: Author, message: &str) -> String {
        let mut history = self.history.borrow_mut();
        let previous = history.last().map(|c| c.files.clone()).unwrap_or_default();
        let changed_files = files
            .keys()
            .chain(previous.keys())
            .filter(|k| files.get(*k) != previous.get(*k))
            .cloned()
            .collect();
        history.push(DummyChange {
            files,
            author,
            message: message.to_string(),
            changed_files,
        });
        (history.len() - 1).to_string()
    }

    fn index(&self, id: &str) -> Result<usize> {
        id.parse::<usize>()
            .ok()
            .filter(|i| *i < self.history.borrow().len())
            .ok_or_else(|| WorkflowError::cannot_resolve(format!("Cannot find revision {}", id)))
    }

    fn revision(&self, index: usize) -> Revision {
        let ts = Utc.timestamp_opt(1_600_000_000 + index as i64, 0).single();
        let rev = Revision::new(index.to_string());
        match ts {
            Some(ts) => rev.with_timestamp(ts),
            None => rev,
        }
    }

    fn change_at(&self, index: usize) -> Change {
        let history = self.history.borrow();
        let c = &history[index];
        let rev = self.revision(index);
        let date = rev.timestamp.unwrap_or_else(Utc::now);
        Change::new(rev, c.author.clone(), c.message.clone(), date)
            .with_changed_files(c.changed_files.iter().cloned())
    }
}

impl Origin for DummyOrigin {
    fn resolve(&self, reference: Option<&str>) -> Result<Revision> {
        let index = match reference {
            Some(r) => self.index(r)?,
            None => self
                .history
                .borrow()
                .len()
                .checked_sub(1)
                .ok_or_else(|| WorkflowError::cannot_resolve("Empty history"))?,
        };
        Ok(self.revision(index))
    }

    fn new_reader(&self, _: &Glob, _: &Authoring) -> Result<Box<dyn Reader>> {
        Ok(Box::new(self.clone()))
    }

    fn label_name(&self) -> String {
        DUMMY_LABEL.to_string()
    }

    fn describe(&self) -> String {
        "dummy.origin".to_string()
    }
}

impl Reader for DummyOrigin {
    fn checkout(&self, revision: &Revision, dest: &Path) -> Result<()> {
        let index = self.index(&revision.id)?;
        for (name, content) in &self.history.borrow()[index].files {
            let path = dest.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)?;
        }
        Ok(())
    }

    fn changes(&self, from: Option<&Revision>, to: &Revision) -> Result<ChangesResponse> {
        let to = self.index(&to.id)?;
        let start = match from {
            Some(from) => {
                let from = self.index(&from.id)?;
                if from >= to {
                    return Ok(ChangesResponse::Empty(EmptyReason::ToIsAncestor));
                }
                from + 1
            }
            None => 0,
        };
        Ok(ChangesResponse::for_changes(
            (start..=to).map(|i| self.change_at(i)).collect(),
        ))
    }

    fn change(&self, revision: &Revision) -> Result<Change> {
        Ok(self.change_at(self.index(&revision.id)?))
    }

    fn visit_changes(
        &self,
        start: &Revision,
        visitor: &mut dyn FnMut(&Change) -> VisitResult,
    ) -> Result<()> {
        for i in (0..=self.index(&start.id)?).rev() {
            if visitor(&self.change_at(i)) == VisitResult::Terminate {
                break;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedWrite {
    pub files: Files,
    /// `(label, origin revision)` recorded with the write.
    pub rev_id: Option<(String, String)>,
    pub result: Option<TransformResult>,
}

#[derive(Debug, Default)]
pub struct DestinationState {
    pub writes: Vec<RecordedWrite>,
    pub dry_run_writes: usize,
}

/// Keeps every write in memory. Writing a tree identical to the previous
/// one is an empty change.
#[derive(Debug, Clone, Default)]
pub struct RecordingDestination {
    pub state: Rc<RefCell<DestinationState>>,
}

impl RecordingDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `origin_rev` was already migrated with this tree.
    pub fn seed(&self, label: &str, origin_rev: &str, files: Files) {
        self.state.borrow_mut().writes.push(RecordedWrite {
            files,
            rev_id: Some((label.to_string(), origin_rev.to_string())),
            result: None,
        });
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state.borrow().writes.clone()
    }

    /// Writes made by this run, skipping seeded ones.
    pub fn results(&self) -> Vec<TransformResult> {
        self.state
            .borrow()
            .writes
            .iter()
            .filter_map(|w| w.result.clone())
            .collect()
    }
}

impl Destination for RecordingDestination {
    fn new_writer(&self, ctx: &WriterContext) -> Result<Box<dyn Writer>> {
        Ok(Box::new(RecordingWriter {
            state: Rc::clone(&self.state),
            dry_run: ctx.dry_run,
        }))
    }

    fn label_name_when_origin(&self) -> String {
        DEST_LABEL.to_string()
    }

    fn describe(&self) -> String {
        "recording.destination".to_string()
    }
}

struct RecordingWriter {
    state: Rc<RefCell<DestinationState>>,
    dry_run: bool,
}

impl Writer for RecordingWriter {
    fn destination_status(&self, _: &Glob, label: &str) -> Result<Option<DestinationStatus>> {
        let state = self.state.borrow();
        Ok(state.writes.iter().rev().find_map(|w| match &w.rev_id {
            Some((l, rev)) if l == label => Some(DestinationStatus {
                baseline: rev.clone(),
                affected_files: Vec::new(),
            }),
            _ => None,
        }))
    }

    fn supports_history(&self) -> bool {
        true
    }

    fn write(&mut self, result: &TransformResult, _: &Glob) -> Result<Vec<DestinationEffect>> {
        let mut tree = Files::new();
        for name in fs_util::list_files(&result.path)? {
            tree.insert(name.clone(), fs::read_to_string(result.path.join(&name))?);
        }
        let mut state = self.state.borrow_mut();
        if state.writes.last().map(|w| &w.files) == Some(&tree) {
            return Err(WorkflowError::EmptyChange(
                "Migration of the revision resulted in an empty change".to_string(),
            ));
        }
        let effect = DestinationEffect::new(
            EffectType::Created,
            format!("Created revision {}", state.writes.len()),
            &result.changes.current,
        )
        .with_destination_ref(DestinationRef {
            id: state.writes.len().to_string(),
            ref_type: "commit".to_string(),
            url: None,
        });
        if self.dry_run || result.dry_run {
            state.dry_run_writes += 1;
            return Ok(vec![effect]);
        }
        let rev_id = result
            .set_rev_id
            .then(|| (result.rev_id_label.clone(), result.current_revision.id.clone()));
        state.writes.push(RecordedWrite {
            files: tree,
            rev_id,
            result: Some(result.clone()),
        });
        Ok(vec![effect])
    }

    fn find_change_with_label(&self, label: &str, value: &str) -> Result<Option<String>> {
        let state = self.state.borrow();
        Ok(state.writes.iter().enumerate().rev().find_map(|(i, w)| match &w.rev_id {
            Some((l, v)) if l == label && v == value => Some(i.to_string()),
            _ => None,
        }))
    }
}
