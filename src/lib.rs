// Library module for sshsync
// Re-exports modules for use in integration tests and external crates

pub mod changes;
pub mod cli;
pub mod config;
pub mod exclude;
pub mod plan;
pub mod session;
pub mod supervisor;
pub mod transfer;
pub mod watcher;
