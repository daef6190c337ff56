//! Local directories as origin and destination.
//!
//! A folder has no history: resolving a path yields a single synthetic change
//! and the destination keeps no record of previous migrations.

use crate::destination::{
    Destination, DestinationEffect, DestinationRef, DestinationStatus, EffectType, Writer,
    WriterContext,
};
use crate::error::{Result, WorkflowError};
use crate::fs_util::{self, OutsideSymlinks};
use crate::origin::{ChangesResponse, Origin, Reader, VisitResult};
use crate::transform_result::TransformResult;
use chrono::{DateTime, Utc};
use copybara_core::{Author, Authoring, Change, Glob, Revision};
use std::path::{Path, PathBuf};
use tracing::info;

pub const FOLDER_LABEL: &str = "FolderOrigin-RevId";
const DEFAULT_AUTHOR_NAME: &str = "Copybara";
const DEFAULT_AUTHOR_EMAIL: &str = "noreply@copybara.io";
const DEFAULT_MESSAGE: &str = "Copybara code migration";

#[derive(Debug, Clone)]
pub struct FolderOrigin {
    default_path: Option<PathBuf>,
    author: Author,
    message: String,
}

impl FolderOrigin {
    pub fn new(default_path: Option<PathBuf>) -> Self {
        Self {
            default_path,
            author: Author::new(DEFAULT_AUTHOR_NAME, DEFAULT_AUTHOR_EMAIL),
            message: DEFAULT_MESSAGE.to_string(),
        }
    }

    pub fn with_author(mut self, author: Author) -> Self {
        self.author = author;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl Origin for FolderOrigin {
    fn resolve(&self, reference: Option<&str>) -> Result<Revision> {
        let path = match (reference, &self.default_path) {
            (Some(r), _) => PathBuf::from(r),
            (None, Some(p)) => p.clone(),
            (None, None) => {
                return Err(WorkflowError::cannot_resolve(
                    "A path is expected as reference in the command line",
                ))
            }
        };
        if !path.is_dir() {
            return Err(WorkflowError::cannot_resolve(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        let path = path.canonicalize()?;
        Ok(Revision::new(path.to_string_lossy()).with_timestamp(Utc::now()))
    }

    fn new_reader(&self, _origin_files: &Glob, _authoring: &Authoring) -> Result<Box<dyn Reader>> {
        Ok(Box::new(FolderReader {
            author: self.author.clone(),
            message: self.message.clone(),
        }))
    }

    fn label_name(&self) -> String {
        FOLDER_LABEL.to_string()
    }

    fn describe(&self) -> String {
        match &self.default_path {
            Some(p) => format!("folder.origin({})", p.display()),
            None => "folder.origin".to_string(),
        }
    }
}

struct FolderReader {
    author: Author,
    message: String,
}

impl Reader for FolderReader {
    fn checkout(&self, revision: &Revision, dest: &Path) -> Result<()> {
        fs_util::copy_tree(Path::new(&revision.id), dest, OutsideSymlinks::Materialize)
    }

    fn changes(&self, _from: Option<&Revision>, to: &Revision) -> Result<ChangesResponse> {
        Ok(ChangesResponse::for_changes(vec![self.change(to)?]))
    }

    fn change(&self, revision: &Revision) -> Result<Change> {
        let date: DateTime<Utc> = revision.timestamp.unwrap_or_else(Utc::now);
        Ok(Change::new(
            revision.clone(),
            self.author.clone(),
            self.message.clone(),
            date,
        ))
    }

    fn visit_changes(
        &self,
        start: &Revision,
        visitor: &mut dyn FnMut(&Change) -> VisitResult,
    ) -> Result<()> {
        visitor(&self.change(start)?);
        Ok(())
    }
}

/// Writes the result into a local directory. Files matching
/// destination_files are replaced; everything else is left alone.
#[derive(Debug, Clone)]
pub struct FolderDestination {
    path: PathBuf,
}

impl FolderDestination {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Destination for FolderDestination {
    fn new_writer(&self, ctx: &WriterContext) -> Result<Box<dyn Writer>> {
        Ok(Box::new(FolderWriter {
            path: self.path.clone(),
            dry_run: ctx.dry_run,
        }))
    }

    fn label_name_when_origin(&self) -> String {
        FOLDER_LABEL.to_string()
    }

    fn describe(&self) -> String {
        format!("folder.destination({})", self.path.display())
    }
}

struct FolderWriter {
    path: PathBuf,
    dry_run: bool,
}

impl Writer for FolderWriter {
    fn destination_status(&self, _: &Glob, _: &str) -> Result<Option<DestinationStatus>> {
        Ok(None)
    }

    fn supports_history(&self) -> bool {
        false
    }

    fn write(&mut self, result: &TransformResult, destination_files: &Glob) -> Result<Vec<DestinationEffect>> {
        let destination_ref = DestinationRef {
            id: self.path.to_string_lossy().into_owned(),
            ref_type: "local_folder".to_string(),
            url: None,
        };
        if self.dry_run || result.dry_run {
            info!("Dry run: not writing to {}", self.path.display());
            return Ok(vec![DestinationEffect::new(
                EffectType::Noop,
                format!("Dry run: result not copied to {}", self.path.display()),
                &result.changes.current,
            )
            .with_destination_ref(destination_ref)]);
        }

        std::fs::create_dir_all(&self.path)?;
        let removed = fs_util::delete_files_matching(&self.path, destination_files)?;
        info!("Removed {} files from {}", removed, self.path.display());
        fs_util::copy_tree(&result.path, &self.path, OutsideSymlinks::Materialize)?;
        info!("Copied result to {}", self.path.display());
        Ok(vec![DestinationEffect::new(
            EffectType::Created,
            format!("Copied result to {}", self.path.display()),
            &result.changes.current,
        )
        .with_destination_ref(destination_ref)])
    }
}
