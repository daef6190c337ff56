use super::{Transformation, TransformationStatus, TransformWork};
use crate::error::{Result, WorkflowError};
use crate::fs_util::list_files;
use copybara_core::Glob;
use std::fs;
use tracing::debug;

/// Literal text replacement in every file matched by `paths`.
#[derive(Debug, Clone)]
pub struct Replace {
    before: String,
    after: String,
    paths: Glob,
}

impl Replace {
    pub fn new(before: impl Into<String>, after: impl Into<String>, paths: Glob) -> Result<Self> {
        let before = before.into();
        if before.is_empty() {
            return Err(WorkflowError::Validation(
                "'before' cannot be empty in a replace transformation".to_string(),
            ));
        }
        Ok(Self {
            before,
            after: after.into(),
            paths,
        })
    }
}

impl Transformation for Replace {
    fn transform(&self, work: &mut TransformWork) -> Result<TransformationStatus> {
        let root = work.checkout_dir().to_path_buf();
        let mut touched = 0;
        for file in list_files(&root)? {
            if !self.paths.matches(&file) {
                continue;
            }
            let path = root.join(&file);
            if fs::symlink_metadata(&path)?.file_type().is_symlink() {
                continue;
            }
            let Ok(content) = fs::read_to_string(&path) else {
                debug!(file = %file, "skipping non UTF-8 file");
                continue;
            };
            if content.contains(&self.before) {
                fs::write(&path, content.replace(&self.before, &self.after))?;
                touched += 1;
            }
        }
        if touched == 0 {
            return Ok(TransformationStatus::Noop(format!(
                "Transformation '{}' was a no-op because it didn't change any of the matching files",
                self.describe()
            )));
        }
        Ok(TransformationStatus::Success)
    }

    fn reverse(&self) -> Result<Box<dyn Transformation>> {
        if self.after.is_empty() {
            return Err(super::non_reversible(&self.describe()));
        }
        Ok(Box::new(Replace {
            before: self.after.clone(),
            after: self.before.clone(),
            paths: self.paths.clone(),
        }))
    }

    fn describe(&self) -> String {
        format!("Replace {}", self.before)
    }
}
