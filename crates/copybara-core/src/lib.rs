pub mod authoring;
pub mod change;
pub mod error;
pub mod glob;
pub mod hash;
pub mod identity;
pub mod label;
pub mod labels;
pub mod message;
pub mod revision;
pub mod serialize;

pub use authoring::{Author, Authoring, AuthoringMode};
pub use change::{Change, Changes};
pub use error::CoreError;
pub use glob::Glob;
pub use hash::Fingerprint;
pub use labels::Labels;
pub use message::ChangeMessage;
pub use revision::Revision;
