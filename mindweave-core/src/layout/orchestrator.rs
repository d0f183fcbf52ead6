//! Debounced, single-flight layout scheduling.
//!
//! A structural change (node or edge count delta) arms a debounce timer.
//! When it fires, one engine run starts against the graph as it is at that
//! moment. Changes seen while a run is in flight queue exactly one follow-up
//! run; a timer firing during a run is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, instrument, warn};

use super::engine::{LayoutEngine, LayoutRequest, LayoutResult, apply_result, prepare_request};
use crate::config::LayoutSection;
use crate::error::LayoutError;
use crate::model::GraphModel;
use crate::types::{DiagramStyle, GraphCounts};

/// Where the layout state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    Idle,
    /// Debounce timer pending.
    Scheduled { deadline: Instant },
    /// An engine call is in flight. `follow_up` records a structural change
    /// seen while running.
    Running { run: u64, follow_up: bool },
}

/// Proof that a run was started. Finishing with a stale ticket is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket(u64);

/// Pure Idle/Scheduled/Running state machine. Time is passed in, so the
/// scheduler can be driven without a runtime.
#[derive(Debug)]
pub struct LayoutScheduler {
    state: LayoutState,
    debounce: Duration,
    observed: GraphCounts,
    runs: u64,
}

impl LayoutScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: LayoutState::Idle,
            debounce,
            observed: GraphCounts::default(),
            runs: 0,
        }
    }

    pub fn state(&self) -> LayoutState {
        self.state
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Number of runs started so far.
    pub fn runs_started(&self) -> u64 {
        self.runs
    }

    /// Record the current counts. Returns true when they differ from the last
    /// observation, in which case a run is (re)scheduled.
    pub fn observe(&mut self, counts: GraphCounts, now: Instant) -> bool {
        if counts == self.observed {
            return false;
        }
        self.observed = counts;
        self.trigger(now);
        true
    }

    /// Schedule a run as if the structure had changed.
    pub fn trigger(&mut self, now: Instant) {
        self.state = match self.state {
            LayoutState::Idle | LayoutState::Scheduled { .. } => LayoutState::Scheduled {
                deadline: now + self.debounce,
            },
            LayoutState::Running { run, .. } => LayoutState::Running {
                run,
                follow_up: true,
            },
        };
    }

    /// Pending timer deadline, if a run is scheduled.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            LayoutState::Scheduled { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Enter Running if the timer has fired. A fire while another run is in
    /// flight is dropped.
    pub fn start(&mut self, now: Instant) -> Option<RunTicket> {
        match self.state {
            LayoutState::Scheduled { deadline } if deadline <= now => {
                self.runs += 1;
                self.state = LayoutState::Running {
                    run: self.runs,
                    follow_up: false,
                };
                Some(RunTicket(self.runs))
            }
            LayoutState::Running { run, .. } => {
                debug!(run, "layout already running, dropping timer fire");
                None
            }
            _ => None,
        }
    }

    /// Leave Running: back to Idle, or Scheduled once more if the structure
    /// changed during the run.
    pub fn finish(&mut self, ticket: RunTicket, now: Instant) {
        match self.state {
            LayoutState::Running { run, follow_up } if run == ticket.0 => {
                self.state = if follow_up {
                    LayoutState::Scheduled {
                        deadline: now + self.debounce,
                    }
                } else {
                    LayoutState::Idle
                };
            }
            _ => debug!(run = ticket.0, "ignoring finish for a stale layout run"),
        }
    }
}

/// What a completed run did to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutOutcome {
    Applied { moved: usize },
    /// Positions were left untouched.
    Failed(LayoutError),
}

/// A started run: the ticket plus the request built from the graph at start.
#[derive(Debug)]
pub struct PendingLayout {
    ticket: RunTicket,
    style: DiagramStyle,
    pub request: LayoutRequest,
}

/// Couples the scheduler to an engine and the graph it lays out.
#[derive(Debug)]
pub struct LayoutOrchestrator {
    scheduler: LayoutScheduler,
    engine: Arc<dyn LayoutEngine>,
    section: LayoutSection,
}

impl LayoutOrchestrator {
    pub fn new(engine: Arc<dyn LayoutEngine>, section: LayoutSection) -> Self {
        Self {
            scheduler: LayoutScheduler::new(Duration::from_millis(section.debounce_ms)),
            engine,
            section,
        }
    }

    pub fn scheduler(&self) -> &LayoutScheduler {
        &self.scheduler
    }

    pub fn state(&self) -> LayoutState {
        self.scheduler.state()
    }

    pub fn engine(&self) -> &dyn LayoutEngine {
        self.engine.as_ref()
    }

    pub fn section(&self) -> &LayoutSection {
        &self.section
    }

    /// Watch the model for structural change.
    pub fn observe(&mut self, model: &GraphModel, now: Instant) -> bool {
        let changed = self.scheduler.observe(model.counts(), now);
        if changed {
            debug!(nodes = model.counts().nodes, edges = model.counts().edges, "layout scheduled");
        }
        changed
    }

    /// Manual relayout request, e.g. after a style change.
    pub fn relayout(&mut self, now: Instant) {
        self.scheduler.trigger(now);
    }

    /// Start a due run and capture the request. An empty graph finishes the
    /// run on the spot.
    pub fn begin(
        &mut self,
        model: &GraphModel,
        style: DiagramStyle,
        now: Instant,
    ) -> Option<PendingLayout> {
        let ticket = self.scheduler.start(now)?;
        match prepare_request(model, style, &self.section) {
            Ok(request) => Some(PendingLayout {
                ticket,
                style,
                request,
            }),
            Err(e) => {
                debug!(error = %e, "skipping layout");
                self.scheduler.finish(ticket, now);
                None
            }
        }
    }

    /// Finish a run with the engine's answer. Errors are logged and leave
    /// positions as they were.
    pub fn complete(
        &mut self,
        pending: PendingLayout,
        result: Result<LayoutResult, LayoutError>,
        model: &mut GraphModel,
        now: Instant,
    ) -> LayoutOutcome {
        let outcome = match result.and_then(|r| apply_result(model, &pending.request, &r)) {
            Ok(moved) => {
                info!(moved, style = %pending.style, engine = self.engine.name(), "layout applied");
                LayoutOutcome::Applied { moved }
            }
            Err(e) => {
                warn!(error = %e, "layout failed, keeping previous positions");
                LayoutOutcome::Failed(e)
            }
        };
        self.scheduler.finish(pending.ticket, now);
        outcome
    }

    /// Run the engine if the debounce timer has fired.
    #[instrument(skip_all, fields(style = %style))]
    pub async fn run_due(
        &mut self,
        model: &mut GraphModel,
        style: DiagramStyle,
        now: Instant,
    ) -> Option<LayoutOutcome> {
        let pending = self.begin(model, style, now)?;
        let engine = Arc::clone(&self.engine);
        let result = engine.layout(&pending.request).await;
        Some(self.complete(pending, result, model, Instant::now()))
    }

    /// Wait out pending timers and run until the state machine is idle.
    pub async fn settle(&mut self, model: &mut GraphModel, style: DiagramStyle) -> Vec<LayoutOutcome> {
        let mut outcomes = Vec::new();
        while let Some(deadline) = self.scheduler.deadline() {
            sleep_until(deadline).await;
            if let Some(outcome) = self.run_due(model, style, Instant::now()).await {
                outcomes.push(outcome);
            }
            self.observe(model, Instant::now());
        }
        outcomes
    }
}

// ── Tests ──────────────────────────────────────────────────────────
