pub mod info;
pub mod migrate;
pub mod validate;
