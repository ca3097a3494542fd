//! Drover Engine Library
//!
//! Core modules for the drover fleet command engine.

pub mod app;
pub mod channels;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod export;
pub mod http;
pub mod logs;
pub mod models;
pub mod orchestrate;
pub mod server;
pub mod targets;
pub mod track;
pub mod utils;
