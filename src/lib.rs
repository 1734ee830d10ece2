pub mod behavior;
pub mod browser;
pub mod config;
pub mod controller;
pub mod element;
pub mod error;
pub mod fill;
pub mod locator;
pub mod model;
pub mod page;
pub mod stealth;

pub use browser::FormPilot;
pub use config::{BehaviorProfile, EngineConfig, SubmitMode};
pub use controller::{operator_channel, OperatorHandle, SubmissionController};
pub use error::{Error, Result};
pub use model::{
    AnswerMap, AnswerValue, AttemptOutput, FieldDescriptor, FieldKind, FillReport, FillResult,
    FillStatus, SubmissionOutcome, SubmissionStatus,
};
pub use page::Page;
