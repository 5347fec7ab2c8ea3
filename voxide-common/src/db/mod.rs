//! Database access layer shared across Voxide services

pub mod init;

pub use init::{create_analysis_job_sets_table, init_database};
