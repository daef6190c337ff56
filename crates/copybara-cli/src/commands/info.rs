use crate::config::ConfigFile;
use anyhow::Result;
use copybara_workflow::{GeneralOptions, Info, Workflow, WorkflowOptions};
use std::path::Path;

pub fn run(config_path: &Path, workflow_name: Option<&str>, json: bool) -> Result<()> {
    let config = ConfigFile::load(config_path)?;
    match workflow_name {
        Some(name) => {
            let workflow = config
                .workflow(name)?
                .to_builder(&config)?
                .build(GeneralOptions::default(), WorkflowOptions::default())?;
            let info = workflow.get_info()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_info(&workflow, &info);
            }
        }
        None => list(&config, json)?,
    }
    Ok(())
}

fn list(config: &ConfigFile, json: bool) -> Result<()> {
    let mut entries = Vec::new();
    for wc in &config.workflows {
        let workflow = wc
            .to_builder(config)?
            .build(GeneralOptions::default(), WorkflowOptions::default())?;
        entries.push(serde_json::json!({
            "name": workflow.name(),
            "origin": workflow.origin().describe(),
            "destination": workflow.destination().describe(),
            "mode": workflow.mode(),
            "description": workflow.description(),
        }));
        if !json {
            println!(
                "{}  {}  {} -> {}",
                workflow.name(),
                workflow.mode(),
                workflow.origin().describe(),
                workflow.destination().describe()
            );
            if let Some(description) = workflow.description() {
                println!("    {}", description);
            }
        }
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    }
    Ok(())
}

fn print_info(workflow: &Workflow, info: &Info) {
    println!("Workflow '{}' ({})", workflow.name(), workflow.mode());
    println!("  origin:      {}", info.origin_description);
    println!("  destination: {}", info.destination_description);
    for reference in &info.migration_references {
        println!("  {}", reference.label);
        match &reference.last_migrated {
            Some(rev) => println!("    last migrated: {}", rev),
            None => println!("    last migrated: none"),
        }
        match &reference.last_available_to_migrate {
            Some(rev) => println!("    last available: {}", rev),
            None => println!("    last available: none"),
        }
        println!(
            "    {} change(s) available to migrate",
            reference.available_to_migrate.len()
        );
        for change in &reference.available_to_migrate {
            println!(
                "      {}  {}  {}",
                change.revision,
                change.author,
                change.first_line_message()
            );
        }
    }
}
