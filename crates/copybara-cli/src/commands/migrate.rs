use crate::config::ConfigFile;
use anyhow::{Context, Result};
use clap::Args;
use copybara_core::Author;
use copybara_workflow::{DestinationEffect, GeneralOptions, WorkflowError, WorkflowOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Flags that tune a migration run.
#[derive(Args, Debug, Clone, Default)]
pub struct MigrateFlags {
    /// Last revision migrated to the destination
    #[arg(long = "last-rev")]
    pub last_rev: Option<String>,

    /// Import all the changes from the beginning of history
    #[arg(long)]
    pub init_history: bool,

    /// Run the migration without writing to the destination
    #[arg(long)]
    pub dry_run: bool,

    /// Proceed even when the migration looks unsafe
    #[arg(long)]
    pub force: bool,

    /// Only warn about transformations that do nothing
    #[arg(long)]
    pub ignore_noop: bool,

    /// Check that the destination matches the last migrated revision first
    #[arg(long)]
    pub check_last_rev_state: bool,

    /// Destination reference to use as the change request parent
    #[arg(long, alias = "change_request_parent")]
    pub change_request_parent: Option<String>,

    /// Import at most this many changes in ITERATIVE mode
    #[arg(long)]
    pub iterative_limit_changes: Option<usize>,

    /// Migrate changes that do not touch origin_files
    #[arg(long)]
    pub import_noop_changes: bool,

    /// User used in migration identities (defaults to $USER)
    #[arg(long)]
    pub workflow_identity_user: Option<String>,

    /// Do not list the squashed changes in the result
    #[arg(long)]
    pub squash_skip_history: bool,

    /// Run in SQUASH mode regardless of the configured mode
    #[arg(long)]
    pub squash: bool,

    /// Replace the configured default author ("Name <email>")
    #[arg(long)]
    pub default_author: Option<String>,

    /// Use this author for every change ("Name <email>")
    #[arg(long)]
    pub force_author: Option<String>,

    /// Use this message for every change
    #[arg(long)]
    pub force_message: Option<String>,

    /// Number of origin ancestors to search for a source-of-truth baseline
    #[arg(long)]
    pub change_request_from_sot_limit: Option<usize>,

    /// Seconds to wait between lookups of the source-of-truth baseline
    #[arg(long, value_delimiter = ',')]
    pub change_request_from_sot_retry: Vec<u64>,

    /// Directory to create the scratch checkout directory in (the system temp dir by default)
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
}

impl MigrateFlags {
    pub fn options(&self, verbose: bool) -> Result<(GeneralOptions, WorkflowOptions)> {
        let general = GeneralOptions {
            dry_run: self.dry_run,
            force: self.force,
            verbose,
        };
        let defaults = WorkflowOptions::default();
        let options = WorkflowOptions {
            change_request_parent: self.change_request_parent.clone(),
            last_revision: self.last_rev.clone(),
            init_history: self.init_history,
            iterative_limit_changes: self
                .iterative_limit_changes
                .unwrap_or(defaults.iterative_limit_changes),
            ignore_noop: self.ignore_noop,
            squash_skip_history: self.squash_skip_history,
            import_noop_changes: self.import_noop_changes,
            workflow_identity_user: self.workflow_identity_user.clone(),
            check_last_rev_state: self.check_last_rev_state,
            change_request_from_sot_limit: self
                .change_request_from_sot_limit
                .unwrap_or(defaults.change_request_from_sot_limit),
            change_request_from_sot_retry: self
                .change_request_from_sot_retry
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            default_author: parse_author("--default-author", &self.default_author)?,
            forced_message: self.force_message.clone(),
            forced_author: parse_author("--force-author", &self.force_author)?,
            squash: self.squash,
        };
        Ok((general, options))
    }
}

fn parse_author(flag: &str, value: &Option<String>) -> Result<Option<Author>> {
    value
        .as_deref()
        .map(|v| {
            Author::parse(v).map_err(|e| {
                anyhow::Error::from(WorkflowError::CommandLine(format!(
                    "Invalid {} value: {}",
                    flag, e
                )))
            })
        })
        .transpose()
}

pub fn run(
    config_path: &Path,
    workflow_name: &str,
    source_refs: Vec<String>,
    flags: MigrateFlags,
    verbose: bool,
    json: bool,
) -> Result<()> {
    let config = ConfigFile::load(config_path)?;
    let (general, options) = flags.options(verbose)?;
    let workflow = config
        .workflow(workflow_name)?
        .to_builder(&config)?
        .build(general, options)?;

    // The engine wipes the workdir before every migration.
    let scratch = match &flags.work_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            tempfile::Builder::new()
                .prefix("copybara-")
                .tempdir_in(dir)
                .with_context(|| format!("failed to create a work directory in {}", dir.display()))?
        }
        None => tempfile::tempdir().context("failed to create a work directory")?,
    };
    let workdir = scratch.path().join("workdir");

    let effects = workflow.run(&workdir, &source_refs)?;
    info!("Workflow '{}' finished", workflow.name());
    print_effects(&effects, json)
}

fn print_effects(effects: &[DestinationEffect], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(effects)?);
        return Ok(());
    }
    for effect in effects {
        println!("{:?}: {}", effect.kind, effect.summary);
        if let Some(dest) = &effect.destination_ref {
            println!("    destination: {} ({})", dest.id, dest.ref_type);
        }
        for error in &effect.errors {
            println!("    error: {}", error);
        }
    }
    Ok(())
}
