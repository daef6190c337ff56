use crate::authoring::Author;
use crate::labels::Labels;
use crate::message::ChangeMessage;
use crate::revision::Revision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One historical change in the origin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Change {
    pub revision: Revision,
    /// Origin author, before authoring is applied.
    pub author: Author,
    pub message: String,
    pub date_time: DateTime<Utc>,
    /// Labels from the message's label group plus the revision's labels.
    pub labels: Labels,
    /// Files touched by the change. `None` means unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_files: Option<BTreeSet<String>>,
}

impl Change {
    pub fn new(
        revision: Revision,
        author: Author,
        message: impl Into<String>,
        date_time: DateTime<Utc>,
    ) -> Self {
        let message = message.into();
        let labels = ChangeMessage::parse_message(&message)
            .labels_as_multimap()
            .merged(&revision.labels);
        Self {
            revision,
            author,
            message,
            date_time,
            labels,
            changed_files: None,
        }
    }

    pub fn with_changed_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changed_files = Some(files.into_iter().map(Into::into).collect());
        self
    }

    pub fn first_line_message(&self) -> &str {
        self.message.split('\n').next().unwrap_or("")
    }

    pub fn parsed_message(&self) -> ChangeMessage {
        ChangeMessage::parse_message(&self.message)
    }
}

/// The changes a write represents: `current` oldest first, and the changes
/// migrated earlier in the same run, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Changes {
    pub current: Vec<Change>,
    pub migrated: Vec<Change>,
}

impl Changes {
    pub fn new(current: Vec<Change>, migrated: Vec<Change>) -> Self {
        Self { current, migrated }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}
