use crate::error::CoreError;
use crate::label::{validate_label_name, LabelFinder};
use crate::labels::Labels;
use std::fmt;

const DOUBLE_NEWLINE: &str = "\n\n";
const DASH_DASH: &str = "\n--\n";

fn trim_newlines(s: &str) -> &str {
    s.trim_matches('\n')
}

/// A change description split into body text and a trailing group of label
/// lines.
///
/// All mutators return a new message. `parse_message(m.to_string())` gives
/// back the same text and labels for any `m` built through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMessage {
    text: String,
    group_separator: &'static str,
    labels: Vec<LabelFinder>,
}

impl ChangeMessage {
    fn build(text: &str, group_separator: &'static str, labels: Vec<LabelFinder>) -> Self {
        Self {
            text: trim_newlines(text).to_string(),
            group_separator,
            labels,
        }
    }

    /// Split on whichever of `\n\n` or `\n--\n` occurs last.
    pub fn parse_message(message: &str) -> Self {
        let trimmed = trim_newlines(message);
        let double_newline = trimmed.rfind(DOUBLE_NEWLINE);
        let dash_dash = trimmed.rfind(DASH_DASH);
        let (idx, separator) = match (double_newline, dash_dash) {
            (None, None) => {
                return if message.starts_with(DOUBLE_NEWLINE) {
                    Self::build("", DOUBLE_NEWLINE, lines_as_labels(trimmed))
                } else {
                    Self::build(trimmed, DOUBLE_NEWLINE, Vec::new())
                };
            }
            (Some(dn), Some(dd)) if dd > dn => (dd, DASH_DASH),
            (Some(dn), _) => (dn, DOUBLE_NEWLINE),
            (None, Some(dd)) => (dd, DASH_DASH),
        };
        Self::build(
            &trimmed[..idx],
            separator,
            lines_as_labels(&trimmed[idx + separator.len()..]),
        )
    }

    /// Treat every line as a candidate label.
    pub fn parse_all_as_labels(message: &str) -> Self {
        Self::build("", DOUBLE_NEWLINE, lines_as_labels(message))
    }

    pub fn first_line(&self) -> &str {
        self.text.split('\n').next().unwrap_or("")
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn labels(&self) -> &[LabelFinder] {
        &self.labels
    }

    pub fn labels_as_multimap(&self) -> Labels {
        self.labels
            .iter()
            .filter_map(|l| Some((l.name()?, l.value()?)))
            .collect()
    }

    pub fn label_values(&self, name: &str) -> Vec<String> {
        self.labels_as_multimap().get(name).to_vec()
    }

    /// Append a label. A blank line is inserted first when the existing
    /// label group holds no real label.
    pub fn with_label(&self, name: &str, separator: &str, value: &str) -> Result<Self, CoreError> {
        let mut labels = self.labels.clone();
        if !labels.is_empty() && !labels.iter().any(LabelFinder::is_label) {
            labels.push(LabelFinder::new(""));
        }
        labels.push(LabelFinder::from_parts(name, separator, value)?);
        Ok(Self::build(&self.text, self.group_separator, labels))
    }

    pub fn with_replaced_label(
        &self,
        name: &str,
        separator: &str,
        value: &str,
    ) -> Result<Self, CoreError> {
        let replacement = LabelFinder::from_parts(name, separator, value)?;
        let labels = self
            .labels
            .iter()
            .map(|l| {
                if l.is_label_named(name) {
                    replacement.clone()
                } else {
                    l.clone()
                }
            })
            .collect();
        Ok(Self::build(&self.text, self.group_separator, labels))
    }

    pub fn with_new_or_replaced_label(
        &self,
        name: &str,
        separator: &str,
        value: &str,
    ) -> Result<Self, CoreError> {
        if self.labels.iter().any(|l| l.is_label_named(name)) {
            self.with_replaced_label(name, separator, value)
        } else {
            self.with_label(name, separator, value)
        }
    }

    pub fn with_removed_label_by_name(&self, name: &str) -> Result<Self, CoreError> {
        validate_label_name(name)?;
        let labels = self
            .labels
            .iter()
            .filter(|l| !l.is_label_named(name))
            .cloned()
            .collect();
        Ok(Self::build(&self.text, self.group_separator, labels))
    }

    pub fn with_removed_label_by_name_and_value(
        &self,
        name: &str,
        value: &str,
    ) -> Result<Self, CoreError> {
        validate_label_name(name)?;
        let labels = self
            .labels
            .iter()
            .filter(|l| !(l.is_label_named(name) && l.value() == Some(value)))
            .cloned()
            .collect();
        Ok(Self::build(&self.text, self.group_separator, labels))
    }

    pub fn with_text(&self, text: &str) -> Self {
        Self::build(text, self.group_separator, self.labels.clone())
    }
}

fn lines_as_labels(message: &str) -> Vec<LabelFinder> {
    message
        .trim_end_matches('\n')
        .split('\n')
        .map(LabelFinder::new)
        .collect()
}

impl fmt::Display for ChangeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        if !self.text.is_empty() {
            out.push_str(&self.text);
            out.push_str(if self.labels.is_empty() {
                "\n"
            } else {
                self.group_separator
            });
        }
        for label in &self.labels {
            out.push_str(label.line());
            out.push('\n');
        }
        // Normalizes messages whose labels were all removed.
        writeln!(f, "{}", trim_newlines(&out))
    }
}
