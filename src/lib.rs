// src/lib.rs
pub mod app;
pub mod cert;
pub mod config;
pub mod discovery;
pub mod error;
pub mod types;
pub mod utils;
