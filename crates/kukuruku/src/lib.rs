pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod exec;
pub mod query;
pub mod select;
pub mod status;
pub mod stream;
pub mod terminal;
pub mod tracing;
