use copybara_core::{Change, Revision};
use serde::Serialize;

/// Migration status of a workflow, as reported by `copybara info`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Info {
    pub origin_description: String,
    pub destination_description: String,
    pub migration_references: Vec<MigrationReference>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MigrationReference {
    /// `workflow_<name>`
    pub label: String,
    pub last_migrated: Option<Revision>,
    pub last_available_to_migrate: Option<Revision>,
    /// Oldest first.
    pub available_to_migrate: Vec<Change>,
}

impl MigrationReference {
    pub fn new(
        workflow_name: &str,
        last_migrated: Option<Revision>,
        available_to_migrate: Vec<Change>,
    ) -> Self {
        Self {
            label: format!("workflow_{}", workflow_name),
            last_migrated,
            last_available_to_migrate: available_to_migrate.last().map(|c| c.revision.clone()),
            available_to_migrate,
        }
    }
}
