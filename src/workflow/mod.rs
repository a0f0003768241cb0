//! Workflow orchestration engine.
//!
//! A single inbound email runs through a directed state machine:
//! identity verification, context loading, intent classification, one
//! intent-keyed executor, drafting, and persistence. Stages read the
//! shared [`state::WorkflowState`] and return [`state::StatePatch`]es;
//! the [`router`] picks the next stage from fully-merged state; the
//! [`orchestrator`] drives the loop.

pub mod orchestrator;
pub mod router;
pub mod stages;
pub mod state;

pub use orchestrator::{Orchestrator, WorkflowConfig, WorkflowDeps};
pub use router::StageId;
pub use state::{Intent, StageFailure, StatePatch, WorkflowState};
