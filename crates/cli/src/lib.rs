//! Rewind CLI library - exports modules for testing

pub mod cmd;
pub mod daemon;
pub mod locks;
pub mod system_config;
pub mod util;
