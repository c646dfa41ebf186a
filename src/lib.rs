pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod controller;
pub mod diag;
pub mod export;
pub mod record;
pub mod schema;
pub mod session;
pub mod settings;
pub mod validate;

#[cfg(test)]
mod tests;
