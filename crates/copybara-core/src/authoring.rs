use crate::error::CoreError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

static AUTHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<name>[^<>]+?)\s*<(?P<email>[^<>]*)>\s*$").expect("author pattern")
});

/// A change author.
///
/// Equality compares both name and email, so two spellings of the same
/// person's name are distinct authors. Destinations may rely on that.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Parse the canonical `Name <email>` form.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let caps = AUTHOR_RE
            .captures(text)
            .ok_or_else(|| CoreError::InvalidAuthor(text.to_string()))?;
        Ok(Self::new(&caps["name"], &caps["email"]))
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// How origin authors are mapped to destination authors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthoringMode {
    /// Every change is attributed to the default author.
    UseDefault,
    /// Origin authors are kept unchanged.
    PassThru,
    /// Origin authors are kept only when their email is whitelisted.
    Whitelisted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Authoring {
    pub default_author: Author,
    pub mode: AuthoringMode,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub whitelist: BTreeSet<String>,
}

impl Authoring {
    /// Build and validate an authoring policy. Whitelist mode requires a
    /// non-empty list without duplicates; the other modes ignore the list.
    pub fn new(
        default_author: Author,
        mode: AuthoringMode,
        whitelist: Vec<String>,
    ) -> Result<Self, CoreError> {
        let mut set = BTreeSet::new();
        if mode == AuthoringMode::Whitelisted {
            if whitelist.is_empty() {
                return Err(CoreError::InvalidAuthoring(
                    "'whitelisted' function requires a non-empty 'whitelist' field. \
                     For default mapping, use 'overwrite(...)' mode instead."
                        .to_string(),
                ));
            }
            for entry in whitelist {
                if !set.insert(entry.clone()) {
                    return Err(CoreError::InvalidAuthoring(format!(
                        "Duplicated whitelist entry '{}'",
                        entry
                    )));
                }
            }
        }
        Ok(Self {
            default_author,
            mode,
            whitelist: set,
        })
    }

    pub fn overwrite(default_author: Author) -> Self {
        Self {
            default_author,
            mode: AuthoringMode::UseDefault,
            whitelist: BTreeSet::new(),
        }
    }

    pub fn pass_thru(default_author: Author) -> Self {
        Self {
            default_author,
            mode: AuthoringMode::PassThru,
            whitelist: BTreeSet::new(),
        }
    }

    pub fn whitelisted(default_author: Author, whitelist: Vec<String>) -> Result<Self, CoreError> {
        Self::new(default_author, AuthoringMode::Whitelisted, whitelist)
    }

    /// Same policy with a different fallback author.
    pub fn with_default_author(&self, default_author: Author) -> Self {
        Self {
            default_author,
            ..self.clone()
        }
    }

    /// Whether the given author id (an email) keeps its origin identity.
    pub fn use_author(&self, email: &str) -> bool {
        match self.mode {
            AuthoringMode::UseDefault => false,
            AuthoringMode::PassThru => true,
            AuthoringMode::Whitelisted => self.whitelist.contains(email),
        }
    }

    /// Map an origin author. Never fails.
    pub fn resolve(&self, origin_author: &Author) -> Author {
        if self.use_author(&origin_author.email) {
            origin_author.clone()
        } else {
            self.default_author.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot() -> Author {
        Author::new("Bot", "bot@x.com")
    }

    #[test]
    fn parse_and_display() {
        let a = Author::parse("Foo Bar <foo@bar.com>").unwrap();
        assert_eq!(a, Author::new("Foo Bar", "foo@bar.com"));
        assert_eq!(a.to_string(), "Foo Bar <foo@bar.com>");
    }

    #[test]
    fn parse_rejects_missing_email() {
        assert!(Author::parse("Foo Bar").is_err());
        assert!(Author::parse("<foo@bar.com>").is_err());
    }

    #[test]
    fn equality_uses_name_and_email() {
        assert_ne!(
            Author::new("Foo B", "foo@bar.com"),
            Author::new("Foo Bar", "foo@bar.com")
        );
    }

    #[test]
    fn whitelist_scenario() {
        let authoring = Authoring::whitelisted(bot(), vec!["a@x.com".into()]).unwrap();
        let a = Author::new("A", "a@x.com");
        assert_eq!(authoring.resolve(&a), a);
        assert_eq!(authoring.resolve(&Author::new("B", "b@x.com")), bot());
    }

    #[test]
    fn overwrite_and_pass_thru() {
        let someone = Author::new("Someone", "someone@x.com");
        assert_eq!(Authoring::overwrite(bot()).resolve(&someone), bot());
        assert_eq!(Authoring::pass_thru(bot()).resolve(&someone), someone);
    }

    #[test]
    fn whitelist_requires_entries() {
        let err = Authoring::whitelisted(bot(), vec![]).unwrap_err();
        assert!(err.to_string().contains("non-empty 'whitelist'"));
    }

    #[test]
    fn whitelist_rejects_duplicates() {
        let err = Authoring::whitelisted(bot(), vec!["a@x.com".into(), "a@x.com".into()])
            .unwrap_err();
        assert_eq!(err.to_string(), "Duplicated whitelist entry 'a@x.com'");
    }

    #[test]
    fn resolve_is_total() {
        let inputs = [
            Author::new("", ""),
            Author::new("A", "a@x.com"),
            Author::new("Z", "weird email"),
        ];
        let policies = [
            Authoring::overwrite(bot()),
            Authoring::pass_thru(bot()),
            Authoring::whitelisted(bot(), vec!["a@x.com".into()]).unwrap(),
        ];
        for policy in &policies {
            for input in &inputs {
                let out = policy.resolve(input);
                assert!(out == *input || out == bot());
            }
        }
    }
}
