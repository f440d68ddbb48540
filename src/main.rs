mod app;
mod audio;
mod cli;
mod clock;
mod config;
mod controls;
mod coordinator;
mod error;
mod messages;
mod model;
mod presenter;
mod services;
mod surface;

#[cfg(test)]
mod testing;

use app::App;
use audio::CpalPlatform;
use clap::Parser;
use cli::{Cli, Command, Input};
use config::Config;
use coordinator::RequestCoordinator;
use messages::Action;
use surface::TerminalSurface;

use anyhow::Result;
use std::rc::Rc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, results to stdout
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let mut config = Config::load()?;
    if let Some(url) = cli.backend_url.clone() {
        config.backend_url = url;
    }
    config.validate()?;
    tracing::info!("Using backend at {}", config.backend_url);

    // Create LocalSet for !Send futures (the recorder holds a cpal::Stream)
    let local = tokio::task::LocalSet::new();
    let succeeded = local.run_until(run_app(cli, config)).await?;

    // Exit explicitly: a pending stdin read would otherwise hold the runtime open
    std::process::exit(if succeeded { 0 } else { 1 });
}

async fn run_app(cli: Cli, config: Config) -> Result<bool> {
    let backend = Rc::new(RequestCoordinator::new(
        &config.backend_url,
        Duration::from_secs(config.timeout),
    ));
    let platform = Box::new(CpalPlatform::new(config.audio_format()));
    let app = App::new(backend, platform, Rc::new(TerminalSurface));

    match cli.command.unwrap_or(Command::Interactive) {
        Command::Save { file } => app.execute(Action::SaveFile(Some(file))).await,
        Command::Find { file } => app.execute(Action::FindFile(Some(file))).await,
        Command::Download { url } => app.execute(Action::DownloadFromSource(url)).await,
        Command::Listen => {
            println!("Listening for up to 10 seconds, press Enter to stop early");
            app.listen(stop_on_enter()).await
        }
        Command::Interactive => {
            println!("{}", cli::INTERACTIVE_HELP);
            app.run(read_commands()).await?;
            Ok(true)
        }
    }
}

/// Sends one stop signal per line typed on stdin
fn stop_on_enter() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            if tx.send(()).await.is_err() {
                break;
            }
        }
    });
    rx
}

/// Turns stdin lines into actions until `quit` or end of input
fn read_commands() -> mpsc::Receiver<Action> {
    let (tx, rx) = mpsc::channel(10);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    break;
                }
            };

            match cli::parse_line(&line) {
                Ok(Some(Input::Action(action))) => {
                    if tx.send(action).await.is_err() {
                        break;
                    }
                }
                Ok(Some(Input::Help)) => println!("{}", cli::INTERACTIVE_HELP),
                Ok(Some(Input::Quit)) => break,
                Ok(None) => {}
                Err(message) => println!("{message}"),
            }
        }
        tracing::debug!("Command reader finished");
    });
    rx
}
