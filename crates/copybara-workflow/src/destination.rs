use crate::error::Result;
use crate::transform_result::TransformResult;
use copybara_core::{Change, Glob, Revision};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectType {
    Created,
    Updated,
    Noop,
    InsufficientApprovals,
    /// User error, retrying will not help.
    Error,
    TemporaryError,
    Started,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DestinationRef {
    pub id: String,
    #[serde(rename = "type")]
    pub ref_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Something that happened in the destination as a result of a migration.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DestinationEffect {
    pub kind: EffectType,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub origin_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_ref: Option<DestinationRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl DestinationEffect {
    pub fn new(kind: EffectType, summary: impl Into<String>, changes: &[Change]) -> Self {
        Self {
            kind,
            summary: summary.into(),
            origin_refs: changes.iter().map(|c| c.revision.id.clone()).collect(),
            destination_ref: None,
            errors: Vec::new(),
        }
    }

    pub fn with_destination_ref(mut self, destination_ref: DestinationRef) -> Self {
        self.destination_ref = Some(destination_ref);
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }
}

/// What the destination last recorded about a migration.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationStatus {
    /// The origin revision, as a string the origin can resolve.
    pub baseline: String,
    pub affected_files: Vec<String>,
}

/// Everything a destination needs to create a writer for one run.
#[derive(Debug, Clone)]
pub struct WriterContext {
    pub workflow_name: String,
    pub identity_user: String,
    pub dry_run: bool,
    pub original_revision: Option<Revision>,
}

/// Where code is migrated to.
pub trait Destination: fmt::Debug {
    fn new_writer(&self, ctx: &WriterContext) -> Result<Box<dyn Writer>>;

    /// Label this system uses when it acts as an origin. Change requests
    /// look for it to find their baseline.
    fn label_name_when_origin(&self) -> String;

    fn describe(&self) -> String;
}

pub trait Writer {
    /// Last migrated origin revision recorded under `label_name`, if any.
    fn destination_status(
        &self,
        destination_files: &Glob,
        label_name: &str,
    ) -> Result<Option<DestinationStatus>>;

    fn supports_history(&self) -> bool;

    /// Write one transformed tree. Must return at least one effect, or fail
    /// with an empty-change error when the destination would not change.
    fn write(
        &mut self,
        result: &TransformResult,
        destination_files: &Glob,
    ) -> Result<Vec<DestinationEffect>>;

    /// Destination change carrying `label` with `value`.
    fn find_change_with_label(&self, label: &str, value: &str) -> Result<Option<String>> {
        let _ = (label, value);
        Ok(None)
    }
}
