//! External embedding-extractor collaborator.
//!
//! Face detection and encoding are an opaque upstream concern; this module
//! only defines the contract the core consumes.

use thiserror::Error;

use crate::types::{AccuracyMode, Embedding};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("no face detected in image")]
    NoFaceDetected,
    #[error("could not decode image: {0}")]
    DecodeError(String),
}

/// Detects faces in raw image bytes and encodes each into an embedding.
pub trait FaceExtractor {
    /// Returns one embedding per detected face, in detection order.
    fn detect_and_encode(
        &self,
        image: &[u8],
        mode: AccuracyMode,
    ) -> Result<Vec<Embedding>, ExtractError>;
}

/// Encode a single face from an image.
///
/// Upstream contract: multiple detected faces log a warning and the first
/// one is used; an empty detection result is `NoFaceDetected`.
pub fn encode_first<E: FaceExtractor + ?Sized>(
    extractor: &E,
    image: &[u8],
    mode: AccuracyMode,
) -> Result<Embedding, ExtractError> {
    let mut embeddings = extractor.detect_and_encode(image, mode)?;
    if embeddings.is_empty() {
        return Err(ExtractError::NoFaceDetected);
    }
    if embeddings.len() > 1 {
        tracing::warn!(faces = embeddings.len(), "multiple faces detected, using the first");
    }
    Ok(embeddings.swap_remove(0))
}
