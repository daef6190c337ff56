use crate::labels::Labels;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An origin-specific pointer to one point in history.
///
/// `id` is whatever the origin needs to resolve the revision again (a commit
/// sha, a folder path, a review number). The other fields are optional
/// metadata attached at resolve time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Revision {
    pub id: String,
    /// A stable, human friendly reference this revision was resolved from,
    /// such as a branch or a pull request number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context_reference: None,
            timestamp: None,
            labels: Labels::new(),
            url: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// Reference used for identity computation: the context reference when
    /// known, else the revision id.
    pub fn identity_reference(&self) -> &str {
        self.context_reference.as_deref().unwrap_or(&self.id)
    }

    pub fn with_context_reference(mut self, reference: impl Into<String>) -> Self {
        self.context_reference = Some(reference.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_label(mut self, name: &str, value: &str) -> Self {
        self.labels.put(name, value);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Copy with `labels` merged in, skipping pairs already present.
    pub fn add_new_labels(&self, labels: &Labels) -> Self {
        Self {
            labels: self.labels.merged(labels),
            ..self.clone()
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_reference_prefers_context() {
        let r = Revision::new("abc123");
        assert_eq!(r.identity_reference(), "abc123");
        let r = r.with_context_reference("refs/heads/main");
        assert_eq!(r.identity_reference(), "refs/heads/main");
        assert_eq!(r.as_str(), "abc123");
    }

    #[test]
    fn add_new_labels_does_not_duplicate() {
        let r = Revision::new("1").with_label("Bug", "1");
        let extra: Labels = [("Bug", "1"), ("Bug", "2")].into_iter().collect();
        let merged = r.add_new_labels(&extra);
        assert_eq!(merged.labels.get("Bug"), ["1".to_string(), "2".to_string()]);
        assert_eq!(r.labels.get("Bug").len(), 1);
    }
}
