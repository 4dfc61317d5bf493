use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::GenericImageView;
use log::info;
use serde_json::json;

use prepmind::avatar::{AvatarPipeline, ImageAsset};
use prepmind::config::{init_logging, AppConfig};
use prepmind::memory::MemoryProfileStore;
use prepmind::settings::{FileSettings, Theme, ThemeController};

const LOCAL_UID: &str = "local";

#[derive(Parser, Debug)]
#[clap(name = "prepmind")]
#[clap(about = "PrepMind avatar and settings tools", long_about = None)]
struct Cli {
    /// Config file to use instead of the default location
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Run a picture through the avatar pipeline")]
    Avatar {
        #[clap(value_parser, help = "The image to ingest")]
        path: PathBuf,
        #[clap(short, long, help = "Write the resulting JPEG here")]
        out: Option<PathBuf>,
    },
    #[command(about = "Show or change the colour theme")]
    Theme {
        #[clap(subcommand)]
        action: Option<ThemeAction>,
    },
}

#[derive(Subcommand, Debug)]
enum ThemeAction {
    Get,
    Toggle,
    Set {
        #[clap(value_parser = parse_theme)]
        theme: Theme,
    },
}

fn parse_theme(s: &str) -> std::result::Result<Theme, String> {
    s.parse().map_err(|e: prepmind::PrepmindError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("Couldn't load config")?;
    init_logging(&config);

    match args.command {
        Command::Avatar { path, out } => avatar(&config, path, out).await,
        Command::Theme { action } => {
            theme(&config, action.unwrap_or(ThemeAction::Get))
        }
    }
}

async fn avatar(
    config: &AppConfig,
    path: PathBuf,
    out: Option<PathBuf>,
) -> Result<()> {
    let store = Arc::new(MemoryProfileStore::new());
    store.insert(
        &config.users_collection,
        LOCAL_UID,
        json!({ "fullName": "Local Student" })
            .as_object()
            .cloned()
            .unwrap_or_default(),
    );
    let pipeline =
        AvatarPipeline::new(store.clone(), config.users_collection.clone());

    let asset = ImageAsset::open(&path)
        .with_context(|| format!("Couldn't open {}", path.display()))?;
    let avatar = match pipeline.ingest(LOCAL_UID, asset).await {
        Ok(avatar) => avatar,
        Err(e) => {
            eprintln!("{}", e.user_message());
            let stage = e.stage();
            return Err(e).context(format!("{stage} stage failed"));
        }
    };

    let bitmap = avatar.decode_bitmap()?;
    let (width, height) = bitmap.dimensions();
    println!("{width}x{height}, {} bytes encoded", avatar.len());

    if let Some(out) = out {
        fs::write(&out, avatar.jpeg_bytes()?)
            .with_context(|| format!("Couldn't write {}", out.display()))?;
        info!("wrote {}", out.display());
    }
    Ok(())
}

fn theme(config: &AppConfig, action: ThemeAction) -> Result<()> {
    let path = config.settings_path()?;
    let settings = FileSettings::new(&path);
    let mut controller =
        ThemeController::load(settings, config.theme_key.as_str())
            .with_context(|| format!("Couldn't load {}", path.display()))?;

    let theme = match action {
        ThemeAction::Get => controller.theme(),
        ThemeAction::Toggle => controller.toggle()?,
        ThemeAction::Set { theme } => {
            controller.apply(theme)?;
            theme
        }
    };
    println!("{theme}");
    Ok(())
}
