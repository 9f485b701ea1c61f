//! Configuration and source documents

pub mod config;
pub mod document;
