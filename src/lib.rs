pub mod commands;
pub mod config;
pub mod http;
pub mod output;
pub mod runtime;
