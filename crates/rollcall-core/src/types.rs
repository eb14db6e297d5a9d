use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Face embedding vector (128-dimensional for the reference extractor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Extractor model version that produced this embedding.
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Extractor effort switch.
///
/// Both modes produce embeddings in the same space and are transparent to
/// the matcher; high accuracy only spends more sampling passes upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccuracyMode {
    #[default]
    Fast,
    HighAccuracy,
}

impl AccuracyMode {
    /// Number of re-sampling passes the extractor should spend per face.
    pub fn sampling_passes(self) -> u32 {
        match self {
            AccuracyMode::Fast => 1,
            AccuracyMode::HighAccuracy => 2,
        }
    }
}

impl std::str::FromStr for AccuracyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(AccuracyMode::Fast),
            "high" | "high-accuracy" => Ok(AccuracyMode::HighAccuracy),
            other => Err(format!("unknown accuracy mode: {other}")),
        }
    }
}

/// The enrolled reference embedding for one identity, with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub identity_id: String,
    pub vector: Embedding,
    /// Number of usable samples averaged into `vector`.
    pub sample_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Result of matching a probe embedding against the gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchVerdict {
    pub matched: bool,
    /// Identity of the nearest template, when matched.
    pub identity_id: Option<String>,
    /// Euclidean distance to the nearest template; +inf on an empty gallery.
    pub distance: f32,
    /// Display heuristic `(1 - distance) * 100`, clamped to `[0, 100]`.
    /// Not a calibrated probability.
    pub confidence: f32,
}
