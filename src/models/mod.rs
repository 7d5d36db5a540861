//! Domain models for the QA documentation generator.

pub mod element;
pub mod job;
pub mod test_case;
pub mod ws_event;

// Re-export commonly used types
pub use element::{CrawlOutput, Position, UiElement};
pub use job::{
    AuthConfig, AuthType, CreateJobRequest, CreateJobResponse, Job, JobCounters, JobListResponse,
    JobLogEntry, JobPhase, JobResult, JobSnapshot, JobSummary, QueryJobsParams, TransitionError,
    WebsiteContext,
};
pub use test_case::{
    Priority, PrimaryElement, TestCase, TestCaseFilter, TestCaseListResponse, TestCaseSummary,
    TestStep,
};
pub use ws_event::{WsEvent, WsEventMessage};
