mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::migrate::MigrateFlags;
use copybara_core::CoreError;
use copybara_workflow::{ErrorKind, WorkflowError};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const COMMAND_LINE_ERROR: i32 = 1;
    pub const CONFIGURATION_ERROR: i32 = 2;
    pub const REPOSITORY_ERROR: i32 = 3;
    pub const NO_OP: i32 = 4;
    pub const ENVIRONMENT_ERROR: i32 = 30;
    pub const INTERNAL_ERROR: i32 = 31;
}

#[derive(Parser)]
#[command(name = "copybara", about = "Move code between repositories", version)]
struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow from a config file
    Migrate {
        /// Path to the config file
        config: PathBuf,

        /// Workflow to run
        #[arg(default_value = "default")]
        workflow: String,

        /// Origin reference to migrate (at most one)
        source_refs: Vec<String>,

        #[command(flatten)]
        flags: MigrateFlags,
    },

    /// Check that every workflow in a config file builds
    Validate {
        /// Path to the config file
        config: PathBuf,
    },

    /// Describe the workflows of a config file, or the pending changes of one
    Info {
        /// Path to the config file
        config: PathBuf,

        /// Workflow to inspect
        workflow: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<WorkflowError>() {
            return match e.kind() {
                ErrorKind::CommandLine => exit_code::COMMAND_LINE_ERROR,
                ErrorKind::Configuration => exit_code::CONFIGURATION_ERROR,
                ErrorKind::Repository => exit_code::REPOSITORY_ERROR,
                ErrorKind::NoOp => exit_code::NO_OP,
                ErrorKind::Environment => exit_code::ENVIRONMENT_ERROR,
                ErrorKind::Internal => exit_code::INTERNAL_ERROR,
            };
        }
        if cause.is::<CoreError>() || cause.is::<toml::de::Error>() {
            return exit_code::CONFIGURATION_ERROR;
        }
        if cause.is::<std::io::Error>() {
            return exit_code::ENVIRONMENT_ERROR;
        }
    }
    exit_code::INTERNAL_ERROR
}

fn report(err: &anyhow::Error) -> i32 {
    let code = exit_code_for(err);
    if code == exit_code::INTERNAL_ERROR {
        error!("{:?}", err);
        eprintln!("error: internal error, see the log for details");
        return code;
    }
    eprintln!("error: {}", err);
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {}", cause);
    }
    code
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Migrate {
            config,
            workflow,
            source_refs,
            flags,
        } => commands::migrate::run(&config, &workflow, source_refs, flags, cli.verbose, cli.json),
        Commands::Validate { config } => commands::validate::run(&config, cli.json),
        Commands::Info { config, workflow } => {
            commands::info::run(&config, workflow.as_deref(), cli.json)
        }
    };

    let code = match result {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => report(&e),
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_first_known_cause() {
        let err = anyhow::Error::from(WorkflowError::EmptyChange("nothing".into()));
        assert_eq!(exit_code_for(&err), exit_code::NO_OP);

        let err = anyhow::Error::from(WorkflowError::Validation("bad".into()))
            .context("while building workflow");
        assert_eq!(exit_code_for(&err), exit_code::CONFIGURATION_ERROR);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(
            exit_code_for(&anyhow::Error::from(io)),
            exit_code::ENVIRONMENT_ERROR
        );
        assert_eq!(
            exit_code_for(&anyhow::anyhow!("boom")),
            exit_code::INTERNAL_ERROR
        );
    }

    #[test]
    fn migrate_flags_parse() {
        let cli = Cli::try_parse_from([
            "copybara",
            "migrate",
            "copy.bara.toml",
            "default",
            "/tmp/src",
            "--force",
            "--change_request_parent",
            "abc",
            "--change-request-from-sot-retry",
            "1,2",
        ])
        .unwrap();
        let Commands::Migrate {
            workflow,
            source_refs,
            flags,
            ..
        } = cli.command
        else {
            panic!("expected migrate");
        };
        assert_eq!(workflow, "default");
        assert_eq!(source_refs, vec!["/tmp/src".to_string()]);
        assert!(flags.force);
        assert_eq!(flags.change_request_parent.as_deref(), Some("abc"));
        assert_eq!(flags.change_request_from_sot_retry, vec![1, 2]);
    }
}
