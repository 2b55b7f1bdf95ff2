//! The pre-trained BIMBAS model, and the abstract interface the Orchestrator
//! scores feature rows through.
//!
//! The teacher workspace has no ML-inference crate to imitate, so this is
//! enrichment from the rest of the retrieved pack: `ort` (ONNX Runtime
//! bindings), grounded on its use for bundled-model CPU inference in
//! `other_examples/manifests/emesal-ratatoskr` and
//! `other_examples/manifests/WeaveITMeta-SpatialVortex`.

use crate::error::BimbasError;
use crate::features::FeatureRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Bot,
    Human,
}

/// Two operations, `load` and `predict`, per design note 9: one production
/// implementation backed by an ONNX session, one mock for tests that don't
/// want to depend on a model file being present.
pub trait Predictor: Send + Sync {
    fn predict(&self, features: &FeatureRow) -> Result<(Label, f64), BimbasError>;
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxPredictor;

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::Path;

    use ndarray::Array2;
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Tensor;

    use super::{Label, Predictor};
    use crate::error::BimbasError;
    use crate::features::FeatureRow;

    /// Loaded once from `resources/models/bimbas.onnx` (or an override path
    /// for tests) and reused for every contributor — §3's "constructed once
    /// per run" invariant.
    pub struct OnnxPredictor {
        session: Session,
    }

    impl OnnxPredictor {
        pub fn load(path: &Path) -> Result<Self, BimbasError> {
            let session = Session::builder()
                .map_err(model_err)?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(model_err)?
                .commit_from_file(path)
                .map_err(model_err)?;

            if session.inputs.is_empty() || session.outputs.len() < 2 {
                return Err(BimbasError::Model(format!(
                    "{path:?} does not expose at least one input and two outputs"
                )));
            }

            Ok(Self { session })
        }
    }

    impl Predictor for OnnxPredictor {
        fn predict(&self, features: &FeatureRow) -> Result<(Label, f64), BimbasError> {
            let values: Vec<f32> = features.iter_ordered().iter().map(|(_, v)| *v as f32).collect();
            let input = Array2::from_shape_vec((1, values.len()), values).map_err(model_err)?;
            let tensor = Tensor::from_array(input).map_err(model_err)?;

            let input_name = self.session.inputs[0].name.clone();
            let outputs = self
                .session
                .run(ort::inputs![input_name => tensor])
                .map_err(model_err)?;

            let probability_name = self.session.outputs[1].name.clone();
            let (_, probabilities) = outputs[probability_name.as_str()]
                .try_extract_raw_tensor::<f32>()
                .map_err(model_err)?;

            let p_bot = *probabilities
                .get(1)
                .ok_or_else(|| BimbasError::Model("probability tensor missing P(bot)".into()))?
                as f64;

            let label = if p_bot >= 0.5 { Label::Bot } else { Label::Human };
            Ok((label, round3(2.0 * (p_bot - 0.5).abs())))
        }
    }

    fn model_err(err: impl std::fmt::Display) -> BimbasError {
        BimbasError::Model(err.to_string())
    }

    fn round3(x: f64) -> f64 {
        (x * 1000.0).round() / 1000.0
    }
}

#[cfg(test)]
pub struct FixedPredictor {
    pub label: Label,
    pub confidence: f64,
}

#[cfg(test)]
impl Predictor for FixedPredictor {
    fn predict(&self, _features: &FeatureRow) -> Result<(Label, f64), BimbasError> {
        Ok((self.label, self.confidence))
    }
}
