use anyhow::{Context, Result};
use copybara_core::{Author, Authoring, Glob};
use copybara_workflow::folder::{FolderDestination, FolderOrigin};
use copybara_workflow::transform::{
    AddLabel, ExplicitReversal, ExposeLabel, Move, RemoveLabel, Replace, Transformation,
};
use copybara_workflow::{Destination, Origin, WorkflowBuilder, WorkflowError, WorkflowMode};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

fn default_label_separator() -> String {
    ": ".to_string()
}

/// A `copy.bara.toml` file: one or more `[[workflow]]` tables.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(rename = "workflow", default)]
    pub workflows: Vec<WorkflowConfig>,
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub origin: OriginConfig,
    pub destination: DestinationConfig,
    pub authoring: AuthoringConfig,
    #[serde(default)]
    pub transformations: Vec<TransformConfig>,
    #[serde(default)]
    pub origin_files: Option<GlobConfig>,
    #[serde(default)]
    pub destination_files: Option<GlobConfig>,
    #[serde(default = "default_mode")]
    pub mode: WorkflowMode,
    #[serde(default)]
    pub reversible_check: Option<bool>,
    #[serde(default)]
    pub check_last_rev_state: bool,
    #[serde(default)]
    pub ask_for_confirmation: bool,
    #[serde(default = "default_true")]
    pub checkout: bool,
    #[serde(default)]
    pub migrate_noop_changes: bool,
    #[serde(default)]
    pub experimental_custom_rev_id: Option<String>,
    #[serde(default = "default_true")]
    pub set_rev_id: bool,
    #[serde(default)]
    pub smart_prune: bool,
    #[serde(default)]
    pub change_identity: Option<String>,
}

fn default_mode() -> WorkflowMode {
    WorkflowMode::Squash
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OriginConfig {
    Folder {
        #[serde(default)]
        path: Option<PathBuf>,
        #[serde(default)]
        author: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DestinationConfig {
    Folder { path: PathBuf },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthoringConfig {
    Overwrite {
        default: String,
    },
    PassThru {
        default: String,
    },
    Whitelisted {
        default: String,
        whitelist: Vec<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobConfig {
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformConfig {
    Replace {
        before: String,
        after: String,
        #[serde(default)]
        paths: Option<GlobConfig>,
    },
    Move {
        before: String,
        after: String,
    },
    AddLabel {
        name: String,
        value: String,
        #[serde(default = "default_label_separator")]
        separator: String,
        #[serde(default)]
        ignore_if_exists: bool,
    },
    RemoveLabel {
        name: String,
    },
    ExposeLabel {
        name: String,
        #[serde(default)]
        new_name: Option<String>,
        #[serde(default = "default_label_separator")]
        separator: String,
        #[serde(default)]
        ignore_label_not_found: bool,
    },
    ExplicitReversal {
        forward: Box<TransformConfig>,
        reverse: Box<TransformConfig>,
    },
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(WorkflowError::CommandLine(format!(
                "Configuration file not found: {}",
                path.display()
            ))
            .into());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        // Identities hash the config path, so one file must map to one path.
        config.path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve {}", path.display()))?;

        let mut seen = BTreeSet::new();
        for workflow in &config.workflows {
            if !seen.insert(workflow.name.as_str()) {
                return Err(WorkflowError::Validation(format!(
                    "Duplicate workflow name '{}' in {}",
                    workflow.name,
                    path.display()
                ))
                .into());
            }
        }
        Ok(config)
    }

    pub fn workflow(&self, name: &str) -> Result<&WorkflowConfig> {
        self.workflows
            .iter()
            .find(|w| w.name == name)
            .ok_or_else(|| {
                let names: Vec<&str> = self.workflows.iter().map(|w| w.name.as_str()).collect();
                WorkflowError::CommandLine(format!(
                    "No workflow named '{}' in {}. Available workflows: [{}]",
                    name,
                    self.path.display(),
                    names.join(", ")
                ))
                .into()
            })
    }

    /// Directory relative paths in the config are resolved against.
    fn base_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }
}

impl WorkflowConfig {
    pub fn to_builder(&self, config: &ConfigFile) -> Result<WorkflowBuilder> {
        let mut builder = WorkflowBuilder::new(
            self.name.clone(),
            self.origin.build(config)?,
            self.destination.build(config),
            self.authoring.build()?,
        );
        builder.description = self.description.clone();
        builder.transformations = self
            .transformations
            .iter()
            .map(TransformConfig::build)
            .collect::<Result<_>>()?;
        if let Some(glob) = &self.origin_files {
            builder.origin_files = glob.build()?;
        }
        if let Some(glob) = &self.destination_files {
            builder.destination_files = glob.build()?;
        }
        builder.mode = self.mode;
        builder.reversible_check = self.reversible_check;
        builder.check_last_rev_state = self.check_last_rev_state;
        builder.ask_for_confirmation = self.ask_for_confirmation;
        builder.checkout = self.checkout;
        builder.migrate_noop_changes = self.migrate_noop_changes;
        builder.custom_rev_id = self.experimental_custom_rev_id.clone();
        builder.set_rev_id = self.set_rev_id;
        builder.smart_prune = self.smart_prune;
        builder.change_identity = self.change_identity.clone();
        builder.config_path = config.path.to_string_lossy().into_owned();
        if let Some(file_name) = config.path.file_name() {
            builder
                .config_paths
                .insert(file_name.to_string_lossy().into_owned());
        }
        Ok(builder)
    }
}

impl OriginConfig {
    fn build(&self, config: &ConfigFile) -> Result<Box<dyn Origin>> {
        match self {
            OriginConfig::Folder {
                path,
                author,
                message,
            } => {
                let mut origin = FolderOrigin::new(path.as_deref().map(|p| config.resolve_path(p)));
                if let Some(author) = author {
                    origin = origin.with_author(Author::parse(author)?);
                }
                if let Some(message) = message {
                    origin = origin.with_message(message.clone());
                }
                Ok(Box::new(origin))
            }
        }
    }
}

impl DestinationConfig {
    fn build(&self, config: &ConfigFile) -> Box<dyn Destination> {
        match self {
            DestinationConfig::Folder { path } => {
                Box::new(FolderDestination::new(config.resolve_path(path)))
            }
        }
    }
}

impl AuthoringConfig {
    fn build(&self) -> Result<Authoring> {
        let authoring = match self {
            AuthoringConfig::Overwrite { default } => Authoring::overwrite(Author::parse(default)?),
            AuthoringConfig::PassThru { default } => Authoring::pass_thru(Author::parse(default)?),
            AuthoringConfig::Whitelisted { default, whitelist } => {
                Authoring::whitelisted(Author::parse(default)?, whitelist.clone())?
            }
        };
        Ok(authoring)
    }
}

impl GlobConfig {
    fn build(&self) -> Result<Glob> {
        Ok(Glob::new(self.include.iter().cloned(), self.exclude.iter().cloned())?)
    }
}

impl TransformConfig {
    fn build(&self) -> Result<Box<dyn Transformation>> {
        let transformation: Box<dyn Transformation> = match self {
            TransformConfig::Replace {
                before,
                after,
                paths,
            } => {
                let paths = match paths {
                    Some(glob) => glob.build()?,
                    None => Glob::all_files(),
                };
                Box::new(Replace::new(before.clone(), after.clone(), paths)?)
            }
            TransformConfig::Move { before, after } => {
                Box::new(Move::new(before.clone(), after.clone())?)
            }
            TransformConfig::AddLabel {
                name,
                value,
                separator,
                ignore_if_exists,
            } => Box::new(AddLabel::new(
                name.clone(),
                value.clone(),
                separator.clone(),
                *ignore_if_exists,
            )?),
            TransformConfig::RemoveLabel { name } => Box::new(RemoveLabel::new(name.clone())?),
            TransformConfig::ExposeLabel {
                name,
                new_name,
                separator,
                ignore_label_not_found,
            } => Box::new(ExposeLabel::new(
                name.clone(),
                new_name.clone(),
                separator.clone(),
                *ignore_label_not_found,
            )?),
            TransformConfig::ExplicitReversal { forward, reverse } => {
                Box::new(ExplicitReversal::new(forward.build()?, reverse.build()?))
            }
        };
        Ok(transformation)
    }
}
