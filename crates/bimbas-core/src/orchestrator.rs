//! Component F: the per-login classification loop that weaves the Event
//! Source, Activity Mapper, Feature Extractor and Classifier together with
//! early-stopping on confidence.

use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};

use crate::error::BimbasError;
use crate::features::{ActivityFeatureExtractor, FeatureRow};
use crate::mapping::ActivityPipeline;
use crate::predictor::{Label, Predictor};
use crate::source::{EventSource, UserType};

/// Tunable thresholds for a classification run. Bounds are enforced by
/// [`OrchestratorConfig::validate`] rather than deferred to a CLI
/// collaborator, since the library must be safe to embed directly.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub min_events: u32,
    pub min_confidence: f64,
    pub max_queries: u32,
    pub no_wait: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_events: 5,
            min_confidence: 1.0,
            max_queries: 3,
            no_wait: false,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), BimbasError> {
        if !(1..=300).contains(&self.min_events) {
            return Err(BimbasError::Config(format!(
                "min_events must be in 1..=300, got {}",
                self.min_events
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(BimbasError::Config(format!(
                "min_confidence must be in 0.0..=1.0, got {}",
                self.min_confidence
            )));
        }
        if !(1..=3).contains(&self.max_queries) {
            return Err(BimbasError::Config(format!(
                "max_queries must be in 1..=3, got {}",
                self.max_queries
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributorType {
    Bot,
    Human,
    Organization,
    Unknown,
    Invalid,
}

/// `confidence: None` stands in for the `"-"` sentinel (produced when no
/// classification was ever attempted or possible).
#[derive(Debug, Clone)]
pub struct ContributorResult {
    pub contributor: String,
    pub user_type: ContributorType,
    pub confidence: Option<f64>,
    pub features: Option<FeatureRow>,
}

impl ContributorResult {
    fn settled(login: &str, user_type: ContributorType) -> Self {
        Self {
            contributor: login.to_string(),
            user_type,
            confidence: Some(1.0),
            features: None,
        }
    }

    fn unresolved(login: &str, user_type: ContributorType) -> Self {
        Self {
            contributor: login.to_string(),
            user_type,
            confidence: None,
            features: None,
        }
    }
}

/// Owns the Event Source, loaded mapping tables, and a shared Classifier —
/// no interior mutability beyond the Event Source's own `reqwest::Client`
/// (cheap to clone, safe for sequential reuse). A caller wanting concurrent
/// contributors constructs one `Orchestrator` per task sharing a cloned
/// client and the same `Arc<dyn Predictor>`.
pub struct Orchestrator {
    source: EventSource,
    mapping: ActivityPipeline,
    predictor: Arc<dyn Predictor>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        source: EventSource,
        mapping: ActivityPipeline,
        predictor: Arc<dyn Predictor>,
        config: OrchestratorConfig,
    ) -> Result<Self, BimbasError> {
        config.validate()?;
        Ok(Self {
            source,
            mapping,
            predictor,
            config,
        })
    }

    /// Classifies each login in order, yielding one result at a time. A
    /// non-`NotFound` error terminates the stream after being yielded as an
    /// `Err`; results already yielded remain valid.
    pub fn classify<'a>(
        &'a self,
        logins: &'a [String],
    ) -> impl Stream<Item = Result<ContributorResult, BimbasError>> + 'a {
        stream! {
            for login in logins {
                match self.classify_one(login).await {
                    Ok(result) => yield Ok(result),
                    Err(BimbasError::NotFound(_)) => {
                        yield Ok(ContributorResult::unresolved(login, ContributorType::Invalid));
                    }
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
        }
    }

    async fn classify_one(&self, login: &str) -> Result<ContributorResult, BimbasError> {
        match self.source.query_user_type(login).await? {
            UserType::Organization => return Ok(ContributorResult::settled(login, ContributorType::Organization)),
            UserType::Bot => return Ok(ContributorResult::settled(login, ContributorType::Bot)),
            UserType::User | UserType::Unknown => {}
        }

        let mut events = self.source.query_events(login);
        futures::pin_mut!(events);

        let mut cumulative = Vec::new();
        let mut last_tentative: Option<ContributorResult> = None;

        while let Some(batch) = events.next().await {
            cumulative.extend(batch?);

            if (cumulative.len() as u32) < self.config.min_events {
                continue;
            }

            let mut ordered = cumulative.clone();
            ordered.sort_by_key(|event| event.created_at);
            let activities = self.mapping.map(&ordered);
            if activities.is_empty() {
                continue;
            }

            let Some(features) = ActivityFeatureExtractor::extract(login, &activities)? else {
                continue;
            };
            let (label, confidence) = self.predictor.predict(&features)?;
            let user_type = match label {
                Label::Bot => ContributorType::Bot,
                Label::Human => ContributorType::Human,
            };
            let tentative = ContributorResult {
                contributor: login.to_string(),
                user_type,
                confidence: Some(confidence),
                features: Some(features),
            };

            if confidence >= self.config.min_confidence {
                return Ok(tentative);
            }
            last_tentative = Some(tentative);
        }

        if (cumulative.len() as u32) < self.config.min_events {
            return Ok(ContributorResult::unresolved(login, ContributorType::Unknown));
        }

        Ok(last_tentative.unwrap_or_else(|| ContributorResult::unresolved(login, ContributorType::Unknown)))
    }
}
