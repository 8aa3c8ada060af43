//! Satchel Gateway - Voice assistant gateway for student assignment tracking
//!
//! This library provides the core functionality for the Satchel gateway:
//! - Voice processing (audio capture, STT)
//! - Natural-language command pipeline (intent routing, extraction, execution)
//! - Reminder, exam, completion, and group persistence
//! - HTTP API for clients
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │     Microphone  │  HTTP API  │  CLI (ask/listen)    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Satchel Gateway                       │
//! │  Capture │ STT │ Intent │ Extract │ Guard │ Execute │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │      SQLite (reminders, exams, users, groups)        │
//! │      Chat completion API (OpenAI-compatible)         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod assistant;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod voice;

pub use config::Config;
pub use db::DbPool;
pub use error::{Error, Result};
