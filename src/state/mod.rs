//! State management module
//!
//! This module holds per-chat sessions, the step schema types, the criteria
//! wizard engine and session persistence.

pub mod engine;
pub mod schema;
pub mod session;
pub mod storage;

// Re-export commonly used state components
pub use engine::{StepEngine, StepInput, StepOutcome, WizardState};
pub use schema::{StepDefinition, StepSchema, StepType, StepValue, Validation};
pub use session::{Expecting, Menu, Session};
pub use storage::{MemorySessionStore, SessionStore, StateStorage};
