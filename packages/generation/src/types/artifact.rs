//! Finished output artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which of the two output files an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    LlmTxt,
    LlmsFullTxt,
}

impl ArtifactKind {
    /// File name used in download URLs and store keys.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::LlmTxt => "llm.txt",
            Self::LlmsFullTxt => "llms-full.txt",
        }
    }

    /// Parse a file name as used in the download route.
    pub fn from_file_name(name: &str) -> Option<Self> {
        match name {
            "llm.txt" => Some(Self::LlmTxt),
            "llms-full.txt" => Some(Self::LlmsFullTxt),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// A finished output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Which output this is
    pub kind: ArtifactKind,

    /// UTF-8 text content
    pub content: String,

    /// When the artifact was produced
    pub produced_at: DateTime<Utc>,

    /// Job that produced it
    pub job_id: String,
}

impl Artifact {
    /// Create a new artifact.
    pub fn new(kind: ArtifactKind, content: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            produced_at: Utc::now(),
            job_id: job_id.into(),
        }
    }

    /// Final size in bytes.
    pub fn byte_size(&self) -> usize {
        self.content.len()
    }

    /// Final size in kilobytes.
    pub fn size_kb(&self) -> f64 {
        self.content.len() as f64 / 1024.0
    }
}
