//! Maps an operation outcome to what gets displayed.

use crate::model::{DownloadResult, Operation, Outcome, Prediction, ResultData, SaveResult};

const UNKNOWN_ARTIST: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Strong,
    Code,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub label: &'static str,
    pub value: String,
    pub emphasis: Emphasis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub label: &'static str,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultPanel {
    pub heading: Option<&'static str>,
    pub fields: Vec<Field>,
    pub links: Vec<Link>,
}

impl ResultPanel {
    pub fn field(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderSpec {
    Error { message: String },
    Panel(ResultPanel),
}

fn strong(label: &'static str, value: impl ToString) -> Field {
    Field {
        label,
        value: value.to_string(),
        emphasis: Emphasis::Strong,
    }
}

fn code(label: &'static str, value: impl ToString) -> Field {
    Field {
        label,
        value: value.to_string(),
        emphasis: Emphasis::Code,
    }
}

fn links(spotify_url: &Option<String>, youtube_url: &Option<String>) -> Vec<Link> {
    let spotify = spotify_url.iter().map(|url| Link {
        label: "Open on Spotify",
        url: url.clone(),
    });
    let youtube = youtube_url.iter().map(|url| Link {
        label: "Watch on YouTube",
        url: url.clone(),
    });
    spotify.chain(youtube).collect()
}

fn saved(result: &SaveResult) -> ResultPanel {
    ResultPanel {
        heading: Some("Song saved"),
        fields: vec![
            code("song_id", &result.song_id),
            code("hashes", result.hash_count),
            code("filename", &result.filename),
        ],
        links: links(&result.spotify_url, &result.youtube_url),
    }
}

fn prediction(result: &Prediction) -> ResultPanel {
    ResultPanel {
        heading: Some("Prediction"),
        fields: vec![
            strong("Title", &result.title),
            strong(
                "Artist",
                result
                    .artist
                    .as_deref()
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or(UNKNOWN_ARTIST),
            ),
            code("Score", result.score),
        ],
        links: links(&result.spotify_url, &result.youtube_url),
    }
}

fn downloaded(result: &DownloadResult) -> ResultPanel {
    ResultPanel {
        heading: None,
        fields: vec![
            strong("Title", &result.title),
            strong("Artist", &result.artist),
            code("Hashes", result.hash_count),
            code("Song ID", &result.song_id),
        ],
        links: links(&result.spotify_url, &result.youtube_url),
    }
}

pub fn present(operation: Operation, outcome: &Outcome) -> RenderSpec {
    match (operation, outcome) {
        (_, Outcome::Failure(err)) => RenderSpec::Error {
            message: err.to_string(),
        },
        (Operation::Save, Outcome::Success(ResultData::Saved(r))) => RenderSpec::Panel(saved(r)),
        (Operation::Find, Outcome::Success(ResultData::Prediction(r))) => {
            RenderSpec::Panel(prediction(r))
        }
        (Operation::DownloadFromSource, Outcome::Success(ResultData::Downloaded(r))) => {
            RenderSpec::Panel(downloaded(r))
        }
        (operation, Outcome::Success(data)) => {
            tracing::error!("{:?} produced mismatched result {:?}", operation, data);
            RenderSpec::Error {
                message: operation.fallback_message().to_string(),
            }
        }
    }
}
