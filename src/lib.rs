//! winstash - stash browser windows as bookmark folders and bring them back
//!
//! This library provides:
//! - A title codec that folds window and tab properties into node titles
//! - A directory of stash folders kept in a fenced-off bookmark region
//! - An orchestrator that stashes windows and tabs and unstashes them,
//!   restoring containers, opener links, pinned state and privacy

pub mod browser;
pub mod codec;
pub mod config;
pub mod containers;
pub mod directory;
pub mod guard;
pub mod memory;
pub mod orchestrator;
pub mod relations;
pub mod schema;
pub mod types;

pub use browser::Browser;
pub use config::Config;
pub use orchestrator::{Orchestrator, Request, Response};
