//! Document encoder
//!
//! Turns raw document bytes into transport-ready artifacts: base64 payload,
//! declared media type, fresh opaque id. Media types outside the allowlist
//! are rejected here, before any network call is attempted.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use futures_util::future::try_join_all;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::error::UnderwritingError;
use crate::models::UploadedArtifact;
use crate::Result;

/// Media types the generation service accepts as inline document parts.
pub const SUPPORTED_MEDIA_TYPES: [&str; 4] = [
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/webp",
];

/// Check a declared media type against the allowlist.
pub fn validate_media_type(media_type: &str) -> Result<()> {
    if SUPPORTED_MEDIA_TYPES.contains(&media_type) {
        Ok(())
    } else {
        Err(UnderwritingError::UnsupportedMediaType(
            media_type.to_string(),
        ))
    }
}

/// Encode one in-memory document.
pub fn encode_bytes(name: &str, media_type: &str, bytes: &[u8]) -> Result<UploadedArtifact> {
    validate_media_type(media_type)?;

    let digest = hex::encode(Sha256::digest(bytes));
    let artifact = UploadedArtifact {
        id: Uuid::new_v4(),
        name: name.to_string(),
        media_type: media_type.to_string(),
        payload: base64::engine::general_purpose::STANDARD.encode(bytes),
    };

    info!(
        artifact_id = %artifact.id,
        name = %artifact.name,
        media_type = %artifact.media_type,
        size_bytes = bytes.len(),
        digest = &digest[..12],
        "Encoded document"
    );

    Ok(artifact)
}

/// Re-wrap an already-encoded payload supplied by a stateless caller,
/// keeping its original id so turn grounding stays stable across requests.
pub fn from_encoded(
    id: Uuid,
    name: &str,
    media_type: &str,
    payload: String,
) -> Result<UploadedArtifact> {
    validate_media_type(media_type)?;
    Ok(UploadedArtifact {
        id,
        name: name.to_string(),
        media_type: media_type.to_string(),
        payload,
    })
}

/// Encode a document from disk, inferring its media type from the file
/// extension.
pub async fn encode_file(path: impl AsRef<Path>) -> Result<UploadedArtifact> {
    let path = path.as_ref();
    let media_type = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream");
    validate_media_type(media_type)?;

    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");

    encode_bytes(name, media_type, &bytes)
}

/// Encode many documents concurrently. The result preserves input order;
/// the first failure fails the whole batch.
pub async fn encode_files(paths: &[PathBuf]) -> Result<Vec<UploadedArtifact>> {
    try_join_all(paths.iter().map(encode_file)).await
}
