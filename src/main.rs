//! # Gridedit - A Grid Layout Editor Model
//!
//! Command line front end for the grid editor: loads a stored value,
//! optionally pastes HTML into it and prints the normalized result.
//!
//! ## Quick Start
//!
//! ```bash
//! # Normalize a stored value
//! cargo run -- layout.json
//!
//! # Convert a legacy HTML value
//! cargo run -- old-page.html
//!
//! # Paste HTML into an existing layout
//! cargo run -- layout.json --ingest snippet.html
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gridedit_core::{Config, Editor};

/// Gridedit - grid layout editor model
#[derive(Parser, Debug)]
#[command(name = "gridedit")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Stored value to load (JSON sections or legacy HTML)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// HTML file to paste into the layout
    #[arg(short, long, value_name = "HTML_FILE")]
    ingest: Option<PathBuf>,

    /// Force full-width sections
    #[arg(short, long)]
    narrow: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Counts printed after the value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
struct Summary {
    sections: usize,
    areas: usize,
    filled: usize,
    media: usize,
}

impl Summary {
    fn of(editor: &Editor) -> Self {
        let areas = editor.value().iter().flat_map(|s| s.areas.iter());
        Self {
            sections: editor.value().len(),
            areas: areas.clone().count(),
            filled: areas.filter(|a| !a.is_empty()).count(),
            media: editor.collect_media().len(),
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} section(s), {} area(s), {} filled, {} media reference(s)",
            self.sections, self.areas, self.filled, self.media
        )
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load(),
    };
    if args.narrow {
        config.editor.narrow_view = true;
    }
    Ok(config)
}

async fn run(args: Args) -> anyhow::Result<Summary> {
    let config = load_config(&args)?;
    let mut editor = Editor::new(config)?;

    if let Some(file) = &args.file {
        let value = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        editor.load_unknown(&value).await?;
    }

    if let Some(html_file) = &args.ingest {
        let html = std::fs::read_to_string(html_file)
            .with_context(|| format!("Failed to read {}", html_file.display()))?;
        let affected = editor.on_something_received(&[html]).await?;
        tracing::info!("Pasted into {} section(s)", affected.len());
    }

    println!("{}", serde_json::to_string_pretty(editor.value())?);
    Ok(Summary::of(&editor))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    tracing::info!("Starting Gridedit v{}", env!("CARGO_PKG_VERSION"));

    let summary = run(args).await?;
    println!("{}", summary);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["gridedit"]);
        assert!(args.file.is_none());
        assert!(!args.narrow);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_args_with_file() {
        let args = Args::parse_from(["gridedit", "layout.json", "--ingest", "paste.html", "-vv"]);
        assert_eq!(args.file, Some(PathBuf::from("layout.json")));
        assert_eq!(args.ingest, Some(PathBuf::from("paste.html")));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_narrow_flag_overrides_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[editor]\nmargin = 2.0").unwrap();
        let path = file.path().display().to_string();

        let args = Args::parse_from(["gridedit", "--config", path.as_str(), "--narrow"]);
        let config = load_config(&args).unwrap();
        assert!(config.editor.narrow_view);
        assert_eq!(config.editor.margin, 2.0);
    }

    #[tokio::test]
    async fn test_run_converts_legacy_html() {
        let mut value = tempfile::NamedTempFile::new().unwrap();
        write!(value, "<p>One</p><iframe src=\"https://player.test/v\"></iframe>").unwrap();
        let mut config = tempfile::NamedTempFile::new().unwrap();
        writeln!(config, "[editor]\nrequired = true").unwrap();

        let args = Args::parse_from([
            "gridedit",
            value.path().to_str().unwrap(),
            "--config",
            config.path().to_str().unwrap(),
        ]);
        let summary = run(args).await.unwrap();
        assert_eq!(
            summary,
            Summary {
                sections: 2,
                areas: 2,
                filled: 2,
                media: 1
            }
        );
        assert_eq!(summary.to_string(), "2 section(s), 2 area(s), 2 filled, 1 media reference(s)");
    }

    #[tokio::test]
    async fn test_run_reads_its_own_output() {
        let mut editor = Editor::new(Config::default()).unwrap();
        editor
            .load_unknown("<p>One</p><iframe src=\"https://player.test/v\"></iframe>")
            .await
            .unwrap();
        let mut printed = tempfile::NamedTempFile::new().unwrap();
        write!(printed, "{}", serde_json::to_string_pretty(editor.value()).unwrap()).unwrap();
        let mut config = tempfile::NamedTempFile::new().unwrap();
        writeln!(config, "[editor]\nmargin = 1.0").unwrap();

        let args = Args::parse_from([
            "gridedit",
            printed.path().to_str().unwrap(),
            "--config",
            config.path().to_str().unwrap(),
        ]);
        let summary = run(args).await.unwrap();
        assert_eq!(summary, Summary::of(&editor));
        assert_eq!(summary.sections, 2);
    }
}
