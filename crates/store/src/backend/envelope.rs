//! Versioned encoding of stored documents.
//!
//! Document bodies are written as a JSON envelope tagged with a format
//! version (`{"v":"1","content":...,"metadata":...}`); embeddings are written
//! separately as little-endian `f32` bytes. Readers reject versions they do
//! not know instead of guessing.

use crate::types::{Document, Metadata};
use recall_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Version written by [`encode_body`].
pub const CURRENT_VERSION: &str = "1";

#[derive(Serialize)]
#[serde(tag = "v")]
enum EnvelopeRef<'a> {
    #[serde(rename = "1")]
    V1 {
        content: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<&'a Metadata>,
    },
}

#[derive(Deserialize)]
#[serde(tag = "v")]
enum Envelope {
    #[serde(rename = "1")]
    V1 {
        content: String,
        #[serde(default)]
        metadata: Option<Metadata>,
    },
}

/// Encode content and metadata of a document.
pub fn encode_body(document: &Document) -> AppResult<String> {
    let envelope = EnvelopeRef::V1 {
        content: &document.content,
        metadata: document.metadata.as_ref(),
    };

    serde_json::to_string(&envelope)
        .map_err(|e| AppError::Serialization(format!("Failed to encode document body: {}", e)))
}

/// Rebuild a document from its stored parts.
pub fn decode_body(id: String, body: &str, embedding: Option<Vec<f32>>) -> AppResult<Document> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| {
        AppError::Serialization(format!("Failed to decode document '{}': {}", id, e))
    })?;

    match envelope {
        Envelope::V1 { content, metadata } => Ok(Document {
            id,
            content,
            metadata,
            embedding,
        }),
    }
}

/// Convert embedding vector to bytes for storage.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
pub fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Serialization(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_carries_version_tag() {
        let doc = Document::new("1", "doc1");
        let body = encode_body(&doc).unwrap();

        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["v"], CURRENT_VERSION);
        assert_eq!(value["content"], "doc1");
        assert!(value.get("metadata").is_none());
    }

    #[test]
    fn test_decode_with_metadata() {
        let body = r#"{"v":"1","content":"remember the milk","metadata":{"kind":"todo","priority":2}}"#;
        let doc = decode_body("7".to_string(), body, Some(vec![0.5, 0.5])).unwrap();

        assert_eq!(doc.id, "7");
        assert_eq!(doc.content, "remember the milk");
        let metadata = doc.metadata.unwrap();
        assert_eq!(metadata["kind"], "todo");
        assert_eq!(metadata["priority"], 2);
        assert_eq!(doc.embedding, Some(vec![0.5, 0.5]));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let body = r#"{"v":"2","content":"from the future"}"#;
        let err = decode_body("1".to_string(), body, None).unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn test_missing_version_rejected() {
        let err = decode_body("1".to_string(), r#"{"content":"untagged"}"#, None).unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn test_embedding_bytes_layout() {
        let bytes = embedding_to_bytes(&[1.0, -2.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(bytes_to_embedding(&bytes).unwrap(), vec![1.0, -2.5]);
        assert!(bytes_to_embedding(&bytes[..5]).is_err());
    }
}
