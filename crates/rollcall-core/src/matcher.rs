//! Nearest-template matching over the gallery.

use crate::gallery::Gallery;
use crate::types::{Embedding, MatchVerdict};

/// Default maximum distance for a positive match. Smaller is stricter.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Strategy for comparing a probe embedding against the enrolled gallery.
pub trait Matcher {
    fn match_probe(&self, probe: &Embedding, gallery: &Gallery) -> MatchVerdict;
}

/// Euclidean nearest-template matcher.
///
/// Full scan over every template in ascending identity order; a tie on
/// exactly equal minimum distance keeps the first template encountered.
/// Never mutates the gallery.
pub struct NearestMatcher {
    tolerance: f32,
}

impl NearestMatcher {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }
}

impl Default for NearestMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl Matcher for NearestMatcher {
    fn match_probe(&self, probe: &Embedding, gallery: &Gallery) -> MatchVerdict {
        let mut best_distance = f32::INFINITY;
        let mut best_id: Option<&str> = None;

        for template in gallery.scan() {
            let distance = probe.euclidean_distance(&template.vector);
            if distance < best_distance {
                best_distance = distance;
                best_id = Some(&template.identity_id);
            }
        }

        match best_id {
            Some(id) if best_distance <= self.tolerance => MatchVerdict {
                matched: true,
                identity_id: Some(id.to_string()),
                distance: best_distance,
                confidence: confidence(best_distance),
            },
            _ => MatchVerdict {
                matched: false,
                identity_id: None,
                distance: best_distance,
                confidence: confidence(best_distance),
            },
        }
    }
}

/// Display confidence for a match distance: `(1 - distance) * 100` clamped
/// to `[0, 100]`. A heuristic for operators, not a probability.
pub fn confidence(distance: f32) -> f32 {
    if !distance.is_finite() {
        return 0.0;
    }
    ((1.0 - distance) * 100.0).clamp(0.0, 100.0)
}
