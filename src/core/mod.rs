pub mod backend;
pub mod models;
pub mod orchestrator;
pub mod poller;
pub mod submission;

pub use backend::JobBackend;
pub use models::{Job, JobKind, JobRecord, JobStatus, Platform};
pub use orchestrator::Orchestrator;
pub use poller::{JobPoller, PollHandle, PollSession, PollState};
pub use submission::{ImageJobRequest, Submission, VideoJobRequest, VideoMode, VideoPost};
