//! askdb - Ask a relational database questions in plain language.
//!
//! A local Ollama model turns each question into SQL, which is confirmed,
//! executed, and fed back to the model with the database error when it fails.
//! This library exposes the core modules for use in integration tests.

pub mod cli;
pub mod config;
pub mod console;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod render;
pub mod safety;
pub mod session;
