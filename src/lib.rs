// ABOUTME: Library root for lakeship - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod error;
pub mod exec;
pub mod infra_outputs;
pub mod interrupt;
pub mod output;
pub mod report;
pub mod rollback;
pub mod tools;
pub mod types;
