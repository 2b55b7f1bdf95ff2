//! Core pipeline for the BIMBAS bot/human/organization contributor
//! classifier: paginated event fetching, activity mapping, feature
//! extraction, and scoring.

pub mod error;
pub mod features;
pub mod mapping;
pub mod orchestrator;
pub mod predictor;
pub mod retry;
pub mod source;

pub use error::BimbasError;
pub use features::{ActivityFeatureExtractor, FeatureRow, FEATURE_NAMES};
pub use mapping::{Action, Activity, ActivityPipeline};
pub use orchestrator::{ContributorResult, ContributorType, Orchestrator, OrchestratorConfig};
pub use predictor::{Label, Predictor};
#[cfg(feature = "onnx")]
pub use predictor::OnnxPredictor;
pub use retry::RetryPolicy;
pub use source::{EventSource, RawEvent, UserType};
