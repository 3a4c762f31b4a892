use std::{fmt, path::Path};

use anyhow::{Context, Result};

use crate::error::ValidationError;

/// A file attached to an activity before the session is closed. Uploaded as a
/// multipart part; the store answers with an [`EvidenceFile`](super::EvidenceFile)
/// reference.
#[derive(Clone, PartialEq, Eq)]
pub struct EvidenceUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl EvidenceUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_content_type(&file_name).map(str::to_string);
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read evidence file {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "evidence".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

impl fmt::Debug for EvidenceUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvidenceUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "txt" => Some("text/plain"),
        "doc" => Some("application/msword"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        _ => None,
    }
}

/// One unit of work registered during an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub title: String,
    pub description: String,
    pub observations: Option<String>,
    pub evidence: Vec<EvidenceUpload>,
}

impl Activity {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            observations: None,
            evidence: Vec::new(),
        }
    }

    pub fn with_observations(mut self, observations: impl Into<String>) -> Self {
        self.observations = Some(observations.into());
        self
    }

    pub fn with_evidence(mut self, upload: EvidenceUpload) -> Self {
        self.evidence.push(upload);
        self
    }

    /// `index` is the 1-based position reported back to the user.
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle { index });
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::MissingDescription { index });
        }
        if self.evidence.is_empty() {
            return Err(ValidationError::MissingEvidence { index });
        }
        Ok(())
    }
}
