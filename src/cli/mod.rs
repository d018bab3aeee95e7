use anyhow::Context;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config;
use crate::domain::track::{Track, TrackKey};
use crate::gateway::{Gateway, GatewayError};
use crate::http::server::HttpServer;
use crate::identify::audd::AuddClient;
use crate::storage::catalogue::CatalogueStore;

#[derive(Parser)]
#[command(name = "shamzam")]
#[command(version = "0.1")]
#[command(about = "Identify music fragments against a local catalogue of tracks")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Token for the fingerprinting provider, overrides the config file
    #[arg(long, env = "AUDD_API_KEY", hide_env_values = true)]
    pub api_token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run http server exposing the catalogue and identification
    Serve,
    /// List tracks in the catalogue
    List,
    /// Add an audio file to the catalogue
    Add {
        #[arg(long)]
        artist: String,
        #[arg(long)]
        title: String,
        file: PathBuf,
    },
    /// Remove a track from the catalogue
    Delete {
        #[arg(long)]
        artist: String,
        #[arg(long)]
        title: String,
    },
    /// Look up a track, optionally saving its audio
    Search {
        #[arg(long)]
        artist: String,
        #[arg(long)]
        title: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Remove every track from the catalogue
    Clear,
    /// Identify a fragment file and fetch the matching track
    Identify {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a file as base64, ready to paste into a JSON body
    Encode { file: PathBuf },
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Commands::Encode { file } = &cli.command {
        println!("{}", STANDARD.encode(read_file(file)?));
        return Ok(());
    }

    let config_path = cli.config.to_string_lossy();
    let mut cfg = config::Config::load(&config_path)?;
    if cli.api_token.is_some() {
        cfg.provider.api_token = cli.api_token.clone();
    }

    let store = CatalogueStore::open(&cfg.database).context("Failed to open catalogue")?;
    let identifier = AuddClient::new(&cfg.provider)?;
    let gateway = Gateway::new(store, Box::new(identifier));

    match cli.command {
        Commands::Serve => {
            let http_server = HttpServer::new(gateway, cfg.http);

            println!(
                "HTTP server running at http://{}:{}",
                http_server.config.bind_addr, http_server.config.port
            );
            http_server.run();
            return Ok(());
        }

        Commands::List => {
            let keys = gateway.list()?;
            if keys.is_empty() {
                println!("No tracks found");
            }
            for key in keys {
                println!("  - {} - {}", key.artist, key.title);
            }
        }

        Commands::Add {
            artist,
            title,
            file,
        } => {
            let track = Track::new(artist, title, read_file(&file)?);
            match gateway.add(track) {
                Ok(key) => println!("Track added successfully: {key}"),
                Err(GatewayError::Conflict(key)) => println!("Track already exists: {key}"),
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Delete { artist, title } => {
            let key = gateway.delete(TrackKey::new(artist, title))?;
            println!("Track deleted successfully: {key}");
        }

        Commands::Search {
            artist,
            title,
            output,
        } => {
            let track = gateway.search(&TrackKey::new(artist, title))?;
            report_track(&track, output.as_deref())?;
        }

        Commands::Clear => {
            let removed = gateway.clear()?;
            println!("Catalogue cleared, {removed} tracks removed");
        }

        Commands::Identify { file, output } => {
            let track = gateway.identify_fragment(read_file(&file)?)?;
            report_track(&track, output.as_deref())?;
        }

        // printed before the catalogue was opened
        Commands::Encode { .. } => {}
    }

    gateway.shutdown()?;
    Ok(())
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.to_string_lossy()))
}

fn report_track(track: &Track, output: Option<&Path>) -> anyhow::Result<()> {
    println!(
        "Track found: {} ({} bytes)",
        track.key,
        track.payload.len()
    );
    if let Some(output) = output {
        std::fs::write(output, &track.payload)
            .with_context(|| format!("Failed to write {}", output.to_string_lossy()))?;
        println!("  saved to {}", output.to_string_lossy());
    }
    Ok(())
}
