use crate::error::CoreError;
use ignore::overrides::{Override, OverrideBuilder};
use std::fmt;

/// Path matcher over paths relative to a checkout root, built from include
/// and exclude patterns. A path matches when some include matches and no
/// exclude does. Patterns are always anchored at the root, so `*.java` only
/// matches top level files while `**/*.java` matches at any depth.
#[derive(Clone, Debug)]
pub struct Glob {
    include: Vec<String>,
    exclude: Vec<String>,
    // `None` matches every path.
    matcher: Option<Override>,
}

impl Glob {
    pub fn new<I, E>(include: I, exclude: E) -> Result<Self, CoreError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        let include: Vec<String> = include.into_iter().map(Into::into).collect();
        let exclude: Vec<String> = exclude.into_iter().map(Into::into).collect();

        let mut builder = OverrideBuilder::new("/");
        // Later patterns win, so excludes go last.
        for pattern in &include {
            builder
                .add(&anchor(pattern, false))
                .map_err(|e| invalid(pattern, e))?;
        }
        for pattern in &exclude {
            builder
                .add(&anchor(pattern, true))
                .map_err(|e| invalid(pattern, e))?;
        }
        let matcher = builder.build().map_err(|e| invalid(&include.join(","), e))?;
        Ok(Self {
            include,
            exclude,
            matcher: Some(matcher),
        })
    }

    /// Matches every file.
    pub fn all_files() -> Self {
        Self {
            include: vec!["**".to_string()],
            exclude: Vec::new(),
            matcher: None,
        }
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.include.is_empty() {
            return false;
        }
        match &self.matcher {
            Some(m) => m.matched(path.trim_start_matches('/'), false).is_whitelist(),
            None => true,
        }
    }
}

fn anchor(pattern: &str, negate: bool) -> String {
    let bang = if negate { "!" } else { "" };
    format!("{}/{}", bang, pattern.trim_start_matches('/'))
}

fn invalid(pattern: &str, err: ignore::Error) -> CoreError {
    CoreError::InvalidGlob {
        pattern: pattern.to_string(),
        reason: err.to_string(),
    }
}

impl PartialEq for Glob {
    fn eq(&self, other: &Self) -> bool {
        self.include == other.include && self.exclude == other.exclude
    }
}

impl fmt::Display for Glob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quote = |v: &[String]| {
            v.iter()
                .map(|p| format!("\"{}\"", p))
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(f, "glob(include = [{}]", quote(&self.include))?;
        if !self.exclude.is_empty() {
            write!(f, ", exclude = [{}]", quote(&self.exclude))?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(include: &[&str], exclude: &[&str]) -> Glob {
        Glob::new(include.iter().copied(), exclude.iter().copied()).unwrap()
    }

    #[test]
    fn all_files_matches_everything() {
        let g = Glob::all_files();
        assert!(g.matches("a.txt"));
        assert!(g.matches("deep/nested/b.rs"));
    }

    #[test]
    fn include_is_anchored() {
        let g = glob(&["src/**"], &[]);
        assert!(g.matches("src/main.rs"));
        assert!(g.matches("src/a/b/c.rs"));
        assert!(!g.matches("unrelated/file.txt"));
        assert!(!g.matches("other/src/main.rs"));

        let top = glob(&["*.md"], &[]);
        assert!(top.matches("README.md"));
        assert!(!top.matches("docs/guide.md"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let g = glob(&["**"], &["**/BUILD", "secret/**"]);
        assert!(g.matches("src/lib.rs"));
        assert!(!g.matches("BUILD"));
        assert!(!g.matches("src/BUILD"));
        assert!(!g.matches("secret/key.pem"));
    }

    #[test]
    fn empty_include_matches_nothing() {
        let g = glob(&[], &[]);
        assert!(!g.matches("a.txt"));
    }

    #[test]
    fn display() {
        assert_eq!(glob(&["src/**"], &[]).to_string(), "glob(include = [\"src/**\"])");
        assert_eq!(
            glob(&["**"], &["a"]).to_string(),
            "glob(include = [\"**\"], exclude = [\"a\"])"
        );
    }
}
