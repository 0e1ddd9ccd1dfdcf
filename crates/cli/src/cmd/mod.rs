//! Command implementations

pub mod branch;
pub mod config;
pub mod diff;
pub mod goto;
pub mod init;
pub mod log;
pub mod restore;
pub mod start;
pub mod stop;
pub mod timeline;
