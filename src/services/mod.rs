//! Business logic services.

pub mod cleanup;
pub mod collaborators;
pub mod document;
pub mod event_broadcaster;
pub mod job_source;
pub mod pipeline;
pub mod poller;
pub mod progress;
pub mod remote;
pub mod test_cases;

pub use cleanup::{CleanupConfig, start_cleanup_task};
pub use collaborators::{CollaboratorError, PdfRenderer, SiteCrawler, TestCaseWriter};
pub use event_broadcaster::EventBroadcaster;
pub use job_source::HttpJobSource;
pub use pipeline::{Pipeline, PipelineSettings};
pub use poller::{JobPoller, JobSource, PollError, PollOutcome};
pub use remote::{ChatCompletionsWriter, RemoteCrawler, RemotePdfRenderer};
