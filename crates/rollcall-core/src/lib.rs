//! rollcall-core — embedding gallery and recognition logic.
//!
//! Everything that happens after a face embedding exists: aggregating
//! enrollment samples into a template, scanning the gallery for the
//! nearest template, and classifying the result against a tolerance.
//! The embedding extractor itself is an external collaborator reached
//! through the [`FaceExtractor`] trait.

pub mod enroll;
pub mod extractor;
pub mod gallery;
pub mod matcher;
pub mod types;

pub use enroll::{EnrollError, EnrollmentAggregator, DEFAULT_MIN_SAMPLES};
pub use extractor::{ExtractError, FaceExtractor};
pub use gallery::Gallery;
pub use matcher::{Matcher, NearestMatcher, DEFAULT_TOLERANCE};
pub use types::{AccuracyMode, Embedding, MatchVerdict, Template};
