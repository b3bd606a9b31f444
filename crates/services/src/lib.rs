#![forbid(unsafe_code)]

pub mod assessment;
pub mod attempt_store;
pub mod countdown;
pub mod error;
pub mod result_handoff;
pub mod submission;

pub use assessment::{AssessmentApi, AssessmentClient, AssessmentConfig, SaveAnswerRequest};
pub use attempt_store::AttemptStore;
pub use countdown::{CountdownTimer, TIME_IS_UP};
pub use error::{AssessmentError, SubmitError};
pub use result_handoff::ResultStore;
pub use submission::{SubmissionService, SubmitOutcome};
