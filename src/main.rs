mod cli;

use mediagate::{config, server};
use mediagate_av::{InputLocator, MediaProber, ToolRegistry};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};

async fn start_server(host: Option<String>, port: Option<u16>, config_path: Option<PathBuf>) -> Result<()> {
    // Load config
    let config_path = config_path.or_else(config::find_default_config);
    let mut config = config::load_config_or_default(config_path.as_deref())?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting Mediagate");
    match config_path {
        Some(ref path) => tracing::info!("Using config file {:?}", path),
        None => tracing::info!("No config file found, using defaults; added sources will not be persisted"),
    }
    tracing::info!(
        "Gateway will listen on {}:{} with {} remote source(s)",
        config.server.host,
        config.server.port,
        config.remote_sources.len()
    );

    server::start_server(config, config_path).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediagate=trace,mediagate_av=trace,mediagate_remote=trace,mediagate_subtitle=debug,tower_http=debug".to_string()
        } else {
            "mediagate=debug,mediagate_av=debug,mediagate_remote=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config))
        }
        Commands::Probe { file, json } => probe_file(&file, cli.config.as_deref(), json),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate { file } => {
            let path = file.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mediagate {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn probe_file(file: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools);
    let prober = MediaProber::new(tools.ffprobe()?.to_path_buf());

    let rt = tokio::runtime::Runtime::new()?;
    let media_info = rt
        .block_on(prober.probe(InputLocator::Local(file.to_path_buf())))
        .with_context(|| format!("Failed to probe {:?}", file))?;

    if json {
        let json_str = serde_json::to_string_pretty(&media_info)?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("File: {}", file.display());
    if let Some(ref format) = media_info.format {
        println!("Format: {}", format);
    }
    if let Some(size) = media_info.size {
        println!("Size: {} bytes", size);
    }
    if let Some(duration) = media_info.duration {
        let secs = duration as u64;
        let mins = secs / 60;
        let hours = mins / 60;
        println!("Duration: {:02}:{:02}:{:02}", hours, mins % 60, secs % 60);
    }
    if let Some(bitrate) = media_info.bitrate {
        println!("Bitrate: {} kb/s", bitrate / 1000);
    }

    println!("\nVideo Tracks: {}", media_info.video_tracks.len());
    for track in &media_info.video_tracks {
        print!(
            "  [{}] {}",
            track.track_index,
            track.codec.as_deref().unwrap_or("unknown")
        );
        if let (Some(w), Some(h)) = (track.width, track.height) {
            print!(" {}x{}", w, h);
        }
        if let Some(fps) = track.frame_rate {
            print!(", {:.3} fps", fps);
        }
        println!();
    }

    println!("\nAudio Tracks: {}", media_info.audio_tracks.len());
    for track in &media_info.audio_tracks {
        print!(
            "  [{}] {}",
            track.track_index,
            track.codec.as_deref().unwrap_or("unknown")
        );
        if let Some(channels) = track.channels {
            print!(" {}ch", channels);
        }
        if let Some(ref lang) = track.language {
            print!(" ({})", lang);
        }
        if track.default {
            print!(" [default]");
        }
        println!();
    }

    println!("\nSubtitle Tracks: {}", media_info.subtitle_tracks.len());
    for track in &media_info.subtitle_tracks {
        print!(
            "  [{}] {}",
            track.track_index,
            track.codec.as_deref().unwrap_or("unknown")
        );
        if let Some(ref lang) = track.language {
            print!(" ({})", lang);
        }
        if !track.text_based {
            print!(" [bitmap]");
        }
        if track.forced {
            print!(" [forced]");
        }
        if track.default {
            print!(" [default]");
        }
        println!();
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Transcoding, probing and caption extraction need ffmpeg and ffprobe.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Hardware acceleration: {:?}", config.transcode.hw_accel);
            println!(
                "  Subtitle provider: {}",
                if config.subtitles.provider.api_key.is_some() { "configured" } else { "disabled" }
            );
            println!("  Remote sources: {}", config.remote_sources.len());
            for source in &config.remote_sources {
                println!(
                    "    {} -> {}{}",
                    source.id,
                    source.address(),
                    if source.secure { " (FTPS)" } else { "" }
                );
            }
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
