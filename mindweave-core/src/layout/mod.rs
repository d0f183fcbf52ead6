//! Layout Orchestrator: decides when to recompute positions, prepares the
//! request for an external [`engine::LayoutEngine`], and writes results back.

pub mod engine;
pub mod layered;
pub mod options;
pub mod orchestrator;

pub use engine::{LayoutEngine, LayoutRequest, LayoutResult};
pub use layered::LayeredEngine;
pub use orchestrator::{
    LayoutOrchestrator, LayoutOutcome, LayoutScheduler, LayoutState, PendingLayout, RunTicket,
};
