//! Action orchestration.
//!
//! This module owns the action lifecycle (precondition, process invocation, failure
//! reporting) and post-run processing for save-results (transcript extraction and
//! the results file). The CLI layer calls into this module to keep responsibilities
//! separated.

mod controller;
mod post_process;

pub(crate) use controller::Workflow;
