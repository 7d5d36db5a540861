//! Job flow test suite.
//!
//! Drives whole jobs through the pipeline with in-process fake collaborators,
//! over the REST API and through the polling coordinator.
//!
//! Run with: cargo test --test job_flow

mod fakes;
mod test_helpers;

mod test_api;
mod test_pipeline;
mod test_remote_watch;
