//! Mindweave core library: graph model, undo history, synthesis and layout.
//!
//! The main entry point is [`session::GraphSession`], which gates synthesis
//! requests, commits completed responses into a [`model::GraphModel`],
//! checkpoints undo history, and drives the layout orchestrator.

pub mod config;
pub mod error;
pub mod history;
pub mod layout;
pub mod llm;
pub mod model;
pub mod progress;
pub mod session;
pub mod surface;
pub mod synth;
pub mod types;
