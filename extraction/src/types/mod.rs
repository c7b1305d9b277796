//! Data types produced and consumed by the extraction pipeline.

pub mod platform;
pub mod progress;
pub mod record;

pub use platform::SocialPlatform;
pub use progress::{JobPhase, PhaseStatus, ProgressEvent};
pub use record::{
    Classification, CompanyInput, LlmCallRecord, Record, ScrapeError, ScrapeStatus,
    SelectionMethod,
};
