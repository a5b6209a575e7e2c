pub mod commands;
pub mod config;
pub mod error;
pub mod install;
pub mod package;
pub mod refresh;
pub mod resolver;
pub mod runtime;
pub mod source;
pub mod store;
