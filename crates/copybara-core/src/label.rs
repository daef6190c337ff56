use crate::error::CoreError;
use regex::Regex;
use std::sync::LazyLock;

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w-]+)( *[:=] *)(.*)$").expect("label pattern"));

static VALID_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w-]+$").expect("label name pattern"));

// Lines like "http://example.com" look like labels but are not.
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w-]+://.*$").expect("url pattern"));

/// One line of a message, parsed as a `name: value` or `name=value` label
/// when it has that shape. Lines that do not match are kept verbatim so the
/// message can be reproduced exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFinder {
    line: String,
    parts: Option<(String, String, String)>,
}

impl LabelFinder {
    pub fn new(line: impl Into<String>) -> Self {
        let line = line.into();
        let parts = if URL_RE.is_match(&line) {
            None
        } else {
            LABEL_RE
                .captures(&line)
                .map(|c| (c[1].to_string(), c[2].to_string(), c[3].to_string()))
        };
        Self { line, parts }
    }

    /// Build a label line from its components.
    pub fn from_parts(name: &str, separator: &str, value: &str) -> Result<Self, CoreError> {
        validate_label_name(name)?;
        Ok(Self::new(format!("{}{}{}", name, separator, value)))
    }

    pub fn is_label(&self) -> bool {
        self.parts.is_some()
    }

    pub fn is_label_named(&self, name: &str) -> bool {
        self.name() == Some(name)
    }

    pub fn name(&self) -> Option<&str> {
        self.parts.as_ref().map(|(n, _, _)| n.as_str())
    }

    pub fn separator(&self) -> Option<&str> {
        self.parts.as_ref().map(|(_, s, _)| s.as_str())
    }

    pub fn value(&self) -> Option<&str> {
        self.parts.as_ref().map(|(_, _, v)| v.as_str())
    }

    pub fn line(&self) -> &str {
        &self.line
    }
}

/// Label names are word characters and dashes.
pub fn validate_label_name(name: &str) -> Result<&str, CoreError> {
    if VALID_LABEL_RE.is_match(name) {
        Ok(name)
    } else {
        Err(CoreError::InvalidLabelName(name.to_string()))
    }
}
