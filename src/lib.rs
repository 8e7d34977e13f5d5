pub mod config;
pub mod error;
pub mod exec;
pub mod http;
pub mod install;
pub mod package;
pub mod registry;
pub mod runtime;
