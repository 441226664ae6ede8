pub mod analysis;
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod errors;
pub mod history;
pub mod nutrition;
pub mod remote;
pub mod session;
pub mod state;
pub mod tasks;
