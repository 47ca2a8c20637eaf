use std::path::PathBuf;

use clap::{Parser, Subcommand};
use companion_sdk::{ClientError, CompanionClient};
use futures_util::StreamExt;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[command(name = "companion-cli")]
#[command(about = "Inspect and control a running companion host", long_about = None)]
struct Cli {
    /// Run file published by the host (defaults to the platform data dir)
    #[arg(short, long)]
    run_file: Option<PathBuf>,

    /// Host the companion listens on
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check liveness and list module versions
    Status,
    /// List module versions
    Version,
    /// Read or change the UI language
    Language {
        #[command(subcommand)]
        action: Option<LanguageAction>,
    },
    /// Stream realtime events until interrupted
    Events,
}

#[derive(Subcommand)]
enum LanguageAction {
    /// Print the current language
    Get,
    /// Set the language
    Set { language: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let run_file = cli.run_file.unwrap_or_else(|| {
        companion_host::ServiceConfig::default().run_file_path()
    });
    let client = CompanionClient::discover_on(&run_file, &cli.host)?;

    match cli.command {
        Commands::Status => {
            match client.up().await {
                Ok(()) => println!("up: {}", client.base_url()),
                Err(error) => {
                    eprintln!("Error: companion host is not responding: {error}");
                    std::process::exit(1);
                }
            }
            print_json(&client.version().await?)?;
        }
        Commands::Version => print_json(&client.version().await?)?,
        Commands::Language { action } => match action.unwrap_or(LanguageAction::Get) {
            LanguageAction::Get => println!("{}", client.language().await?),
            LanguageAction::Set { language } => {
                client.set_language(&language).await?;
                println!("language set to {language}");
            }
        },
        Commands::Events => stream_events(&client).await?,
    }

    Ok(())
}

async fn stream_events(client: &CompanionClient) -> Result<(), Box<dyn std::error::Error>> {
    let url = client.websocket_url()?;
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    eprintln!("Connected to {}", client.base_url());

    while let Some(frame) = socket.next().await {
        match frame? {
            Message::Text(text) => match serde_json::from_str::<Value>(text.as_str()) {
                Ok(event) => println!("{}", serde_json::to_string_pretty(&event)?),
                Err(_) => println!("{}", text.as_str()),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), ClientError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
