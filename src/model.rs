use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, MissingInput};

/// MIME type used for a recorded clip when the encoder never reported one
pub const DEFAULT_CLIP_MIME: &str = "audio/webm";

const DEFAULT_FILE_MIME: &str = "application/octet-stream";

/// The three backend calls a user action can turn into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Save,
    Find,
    DownloadFromSource,
}

impl Operation {
    pub fn endpoint(self) -> &'static str {
        match self {
            Operation::Save => "/api/save",
            Operation::Find => "/api/find",
            Operation::DownloadFromSource => "/api/download",
        }
    }

    pub fn fallback_message(self) -> &'static str {
        match self {
            Operation::Save | Operation::Find => "Request failed",
            Operation::DownloadFromSource => "Spotify download failed",
        }
    }

    pub fn progress_message(self) -> &'static str {
        match self {
            Operation::Save | Operation::Find => "Uploading...",
            Operation::DownloadFromSource => "Downloading from Spotify...",
        }
    }

    pub fn success_message(self) -> &'static str {
        match self {
            Operation::Save | Operation::Find => "Success",
            Operation::DownloadFromSource => "Downloaded & fingerprinted",
        }
    }
}

/// A binary audio payload, sent as the multipart `file` field
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFile {
    bytes: Vec<u8>,
    filename: String,
    mime_type: String,
}

impl AudioFile {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Read a user-selected file. A missing or blank path is `InputMissing`.
    pub async fn from_path(path: Option<&Path>) -> Result<Self, ClientError> {
        let path = path
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ClientError::InputMissing(MissingInput::File))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::InputUnreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self::new(bytes, filename, mime_for_path(path)))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// The unit of data submitted for one operation
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Audio(AudioFile),
    SourceUrl(String),
}

impl Payload {
    /// Trimmed source URL; an empty field is `InputMissing`.
    pub fn source_url(raw: &str) -> Result<Self, ClientError> {
        let url = raw.trim();
        if url.is_empty() {
            return Err(ClientError::InputMissing(MissingInput::SourceUrl));
        }
        Ok(Payload::SourceUrl(url.to_string()))
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("webm") => "audio/webm",
        _ => DEFAULT_FILE_MIME,
    }
}

/// Filename for a microphone clip of the given MIME type
pub fn clip_filename(mime_type: &str) -> String {
    let ext = match mime_type.split(';').next().unwrap_or_default().trim() {
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        _ => "webm",
    };
    format!("mic_clip.{ext}")
}

/// Song identifiers come back as strings or integers depending on the store
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SongId {
    Text(String),
    Number(u64),
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SongId::Text(id) => f.write_str(id),
            SongId::Number(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SaveResult {
    pub song_id: SongId,
    #[serde(rename = "hashes")]
    pub hash_count: u64,
    pub filename: String,
    #[serde(default)]
    pub spotify_url: Option<String>,
    #[serde(default)]
    pub youtube_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Prediction {
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    pub score: f64,
    #[serde(default)]
    pub song_id: Option<SongId>,
    #[serde(default)]
    pub spotify_url: Option<String>,
    #[serde(default)]
    pub youtube_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DownloadResult {
    pub title: String,
    pub artist: String,
    #[serde(rename = "hashes")]
    pub hash_count: u64,
    pub song_id: SongId,
    #[serde(default)]
    pub spotify_url: Option<String>,
    #[serde(default)]
    pub youtube_url: Option<String>,
}

/// Operation-specific data of a successful call
#[derive(Debug, Clone, PartialEq)]
pub enum ResultData {
    Saved(SaveResult),
    Prediction(Prediction),
    Downloaded(DownloadResult),
}

/// Normalized result of one backend call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(ResultData),
    Failure(ClientError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// JSON body of `/api/download`
#[derive(Debug, Serialize)]
pub struct DownloadRequest<'a> {
    pub spotify_url: &'a str,
}
