use crate::config::ConfigFile;
use anyhow::Result;
use copybara_workflow::{GeneralOptions, WorkflowOptions};
use std::path::Path;

pub fn run(config_path: &Path, json: bool) -> Result<()> {
    let config = ConfigFile::load(config_path)?;
    let mut names = Vec::new();
    for workflow in &config.workflows {
        workflow
            .to_builder(&config)?
            .build(GeneralOptions::default(), WorkflowOptions::default())?;
        names.push(workflow.name.as_str());
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "config": config_path.display().to_string(),
                "valid": true,
                "workflows": names,
            }))?
        );
    } else {
        println!("Configuration '{}' is valid.", config_path.display());
        for name in names {
            println!("  workflow {}", name);
        }
    }
    Ok(())
}
