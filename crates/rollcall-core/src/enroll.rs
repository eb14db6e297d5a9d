//! Enrollment aggregation: many per-image embeddings in, one template vector out.

use thiserror::Error;

use crate::extractor::ExtractError;
use crate::types::Embedding;

/// Default minimum number of usable embeddings for an enrollment.
pub const DEFAULT_MIN_SAMPLES: usize = 5;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("only {got} usable face samples, need at least {required}")]
    InsufficientSamples { got: usize, required: usize },
    #[error("sample {index} is {got}-dimensional, expected {expected}")]
    DimensionMismatch {
        index: usize,
        got: usize,
        expected: usize,
    },
}

/// Averages per-image embeddings into one canonical template vector.
pub struct EnrollmentAggregator {
    min_samples: usize,
}

impl EnrollmentAggregator {
    pub fn new(min_samples: usize) -> Self {
        Self {
            min_samples: min_samples.max(1),
        }
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Element-wise arithmetic mean of the samples.
    ///
    /// Treats embedding space as locally linear around a person's mean
    /// appearance; every input already passed face detection upstream.
    pub fn aggregate(&self, samples: &[Embedding]) -> Result<Embedding, EnrollError> {
        if samples.len() < self.min_samples {
            return Err(EnrollError::InsufficientSamples {
                got: samples.len(),
                required: self.min_samples,
            });
        }

        let expected = samples[0].dim();
        for (index, sample) in samples.iter().enumerate().skip(1) {
            if sample.dim() != expected {
                return Err(EnrollError::DimensionMismatch {
                    index,
                    got: sample.dim(),
                    expected,
                });
            }
        }

        let mut mean = vec![0.0f32; expected];
        for sample in samples {
            for (acc, v) in mean.iter_mut().zip(sample.values.iter()) {
                *acc += v;
            }
        }
        let n = samples.len() as f32;
        for acc in mean.iter_mut() {
            *acc /= n;
        }

        Ok(Embedding {
            values: mean,
            model_version: samples[0].model_version.clone(),
        })
    }
}

impl Default for EnrollmentAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SAMPLES)
    }
}

/// Filter per-image extraction outcomes down to the usable embeddings.
///
/// Failed images are logged and counted, never escalated on their own; the
/// caller decides whether enough usable samples remain.
pub fn usable_samples(
    outcomes: Vec<Result<Embedding, ExtractError>>,
) -> (Vec<Embedding>, usize) {
    let mut usable = Vec::with_capacity(outcomes.len());
    let mut skipped = 0usize;
    for (image, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(embedding) => usable.push(embedding),
            Err(err) => {
                skipped += 1;
                tracing::warn!(image, error = %err, "skipping unusable enrollment image");
            }
        }
    }
    (usable, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(vectors: &[Vec<f32>]) -> Vec<Embedding> {
        vectors.iter().cloned().map(Embedding::new).collect()
    }

    #[test]
    fn test_insufficient_samples_reports_count() {
        let aggregator = EnrollmentAggregator::default();
        let err = aggregator
            .aggregate(&samples(&[vec![1.0], vec![2.0], vec![3.0], vec![4.0]]))
            .unwrap_err();
        match err {
            EnrollError::InsufficientSamples { got, required } => {
                assert_eq!(got, 4);
                assert_eq!(required, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_exact_minimum_yields_mean() {
        let aggregator = EnrollmentAggregator::default();
        let inputs = samples(&[
            vec![1.0, 10.0],
            vec![2.0, 20.0],
            vec![3.0, 30.0],
            vec![4.0, 40.0],
            vec![5.0, 50.0],
        ]);
        let mean = aggregator.aggregate(&inputs).unwrap();
        assert!((mean.values[0] - 3.0).abs() < 1e-6);
        assert!((mean.values[1] - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let aggregator = EnrollmentAggregator::new(2);
        let err = aggregator
            .aggregate(&samples(&[vec![1.0, 2.0], vec![1.0]]))
            .unwrap_err();
        assert!(matches!(
            err,
            EnrollError::DimensionMismatch {
                index: 1,
                got: 1,
                expected: 2
            }
        ));
    }

    #[test]
    fn test_minimum_is_at_least_one() {
        let aggregator = EnrollmentAggregator::new(0);
        assert_eq!(aggregator.min_samples(), 1);
        assert!(aggregator.aggregate(&[]).is_err());
    }

    #[test]
    fn test_usable_samples_skips_failures() {
        let outcomes = vec![
            Ok(Embedding::new(vec![1.0])),
            Err(ExtractError::NoFaceDetected),
            Ok(Embedding::new(vec![2.0])),
            Err(ExtractError::DecodeError("truncated jpeg".into())),
        ];
        let (usable, skipped) = usable_samples(outcomes);
        assert_eq!(usable.len(), 2);
        assert_eq!(skipped, 2);
        assert_eq!(usable[0].values, vec![1.0]);
    }

    #[test]
    fn test_model_version_carried_from_samples() {
        let aggregator = EnrollmentAggregator::new(1);
        let mut sample = Embedding::new(vec![1.0]);
        sample.model_version = Some("dlib-128".into());
        let mean = aggregator.aggregate(&[sample]).unwrap();
        assert_eq!(mean.model_version.as_deref(), Some("dlib-128"));
    }
}
