use super::{Transformation, TransformationStatus, TransformWork};
use crate::error::{Result, WorkflowError};
use std::fs;

/// Rename a file or directory inside the checkout.
#[derive(Debug, Clone)]
pub struct Move {
    before: String,
    after: String,
}

impl Move {
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Result<Self> {
        let before = before.into();
        let after = after.into();
        for path in [&before, &after] {
            if path.starts_with('/') || path.split('/').any(|c| c == "..") {
                return Err(WorkflowError::Validation(format!(
                    "'{}' is not a valid path inside the checkout",
                    path
                )));
            }
        }
        if before == after {
            return Err(WorkflowError::Validation(format!(
                "Moving from the same folder to the same folder is a noop: '{}'",
                before
            )));
        }
        Ok(Self { before, after })
    }
}

impl Transformation for Move {
    fn transform(&self, work: &mut TransformWork) -> Result<TransformationStatus> {
        let src = work.checkout_dir().join(&self.before);
        let dst = work.checkout_dir().join(&self.after);
        if fs::symlink_metadata(&src).is_err() {
            return Ok(TransformationStatus::Noop(format!(
                "Error moving '{}'. It doesn't exist in the workdir",
                self.before
            )));
        }
        if fs::symlink_metadata(&dst).is_ok() {
            return Err(WorkflowError::Validation(format!(
                "Cannot move file to '{}' because it already exists",
                self.after
            )));
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&src, &dst)?;
        Ok(TransformationStatus::Success)
    }

    fn reverse(&self) -> Result<Box<dyn Transformation>> {
        Ok(Box::new(Move {
            before: self.after.clone(),
            after: self.before.clone(),
        }))
    }

    fn describe(&self) -> String {
        format!("Moving {}", self.before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copybara_core::{Author, Changes, Revision};
    use tempfile::tempdir;

    #[test]
    fn moves_directory_and_back() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("java/com")).unwrap();
        fs::write(dir.path().join("java/com/A.java"), "class A {}").unwrap();
        let mut work = TransformWork::new(
            dir.path(),
            "m",
            Author::new("A", "a@x.com"),
            Changes::empty(),
            Revision::new("1"),
            false,
        );
        let mv = Move::new("java", "src/main/java").unwrap();
        mv.transform(&mut work).unwrap();
        assert!(dir.path().join("src/main/java/com/A.java").exists());
        assert!(!dir.path().join("java").exists());

        mv.reverse().unwrap().transform(&mut work).unwrap();
        assert!(dir.path().join("java/com/A.java").exists());
    }

    #[test]
    fn missing_source_is_noop() {
        let dir = tempdir().unwrap();
        let mut work = TransformWork::new(
            dir.path(),
            "m",
            Author::new("A", "a@x.com"),
            Changes::empty(),
            Revision::new("1"),
            false,
        );
        let status = Move::new("nope", "other").unwrap().transform(&mut work).unwrap();
        assert!(status.is_noop());
    }

    #[test]
    fn rejects_escaping_paths() {
        assert!(Move::new("../x", "y").is_err());
        assert!(Move::new("a", "a").is_err());
    }
}
