//! Data model shared by the commit pipeline and scheduler

pub mod artifact;
pub mod error;
pub mod types;
