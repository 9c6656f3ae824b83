//! Data models shared across the pipeline.

pub mod classification;
pub mod config;
pub mod invoice;
pub mod issue;
