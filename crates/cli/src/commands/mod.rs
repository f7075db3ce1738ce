//! CLI command handlers

pub mod customer;
pub mod ingest;
pub mod log;
