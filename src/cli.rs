use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::messages::Action;

#[derive(Parser, Debug)]
#[command(name = "seektune")]
#[command(about = "Save, find and download songs with a fingerprinting backend", long_about = None)]
pub struct Cli {
    /// Backend origin, overrides the configured one
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Fingerprint a local audio file and store it
    Save { file: PathBuf },
    /// Identify a local audio file
    Find { file: PathBuf },
    /// Have the backend download and fingerprint a Spotify track
    Download { url: String },
    /// Record up to 10 seconds from the microphone and identify it
    Listen,
    /// Read commands from stdin (the default)
    Interactive,
}

/// One line typed in the interactive session
#[derive(Debug, PartialEq)]
pub enum Input {
    Action(Action),
    Help,
    Quit,
}

pub const INTERACTIVE_HELP: &str = "\
Commands:
  save <path>        fingerprint and store a file
  find <path>        identify a file
  download <url>     download and fingerprint a Spotify track (alias: spotify)
  mic                start recording, or stop early (alias: record)
  help               show this message
  quit               leave (alias: exit)";

/// Parse an interactive command line. Blank lines yield `Ok(None)`.
///
/// A missing argument is not an error here: the action goes through with no
/// input and is rejected with the same message as an empty field.
pub fn parse_line(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    let path = (!rest.is_empty()).then(|| PathBuf::from(rest));

    let input = match command.to_ascii_lowercase().as_str() {
        "save" => Input::Action(Action::SaveFile(path)),
        "find" => Input::Action(Action::FindFile(path)),
        "download" | "spotify" => Input::Action(Action::DownloadFromSource(rest.to_string())),
        "mic" | "record" => Input::Action(Action::ToggleMic),
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(format!("Unknown command '{other}', type 'help'")),
    };
    Ok(Some(input))
}
