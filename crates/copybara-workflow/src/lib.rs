pub mod destination;
pub mod error;
pub mod folder;
pub mod fs_util;
pub mod hooks;
pub mod info;
pub mod mode;
pub mod options;
pub mod origin;
pub mod run_helper;
pub mod transform;
pub mod transform_result;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use destination::{Destination, DestinationEffect, EffectType, Writer, WriterContext};
pub use error::{ErrorKind, Result, WorkflowError};
pub use info::{Info, MigrationReference};
pub use mode::WorkflowMode;
pub use options::{GeneralOptions, WorkflowOptions};
pub use origin::{Origin, Reader};
pub use transform::{Transformation, TransformWork};
pub use transform_result::TransformResult;
pub use workflow::{Workflow, WorkflowBuilder};
