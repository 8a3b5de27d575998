pub mod analytics;
pub mod api;
pub mod commands;
pub mod config;
pub mod redirect;
pub mod resolver;
