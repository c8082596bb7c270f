//! The tool-calling control loop.
//!
//! The agent alternates two steps over a shared conversation:
//!
//! 1. **Decide**: send the conversation (system prompt prepended) and the
//!    operation definitions to the model
//! 2. **Execute**: if the reply carries invocations, run each one in order
//!    and append its result
//!
//! The loop stops when a reply carries no invocations, when the iteration
//! cap is reached, or when the caller cancels.

pub mod continuation;
pub mod decision;
pub mod execution;
pub mod loop_runner;

pub use continuation::{Continuation, next_step};
pub use decision::{Decision, DecisionStep, ModelSettings};
pub use execution::{ExecutionReport, execute_batch};
pub use loop_runner::{AgentLoop, DEFAULT_MAX_ITERATIONS, LoopOutcome, LoopResult};
