//! Ah-Ha! capture client - login, session status and snippet capture from the terminal.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use capture_auth::{CaptureAuthRuntime, LoopbackRedirect};
use capture_config::{init_logging, Config, Paths};
use clap::{Parser, Subcommand};

/// Ah-Ha! capture command-line interface.
#[derive(Parser)]
#[command(name = "ahha-capture")]
#[command(about = "Log in to Ah-Ha! and save captured snippets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true, env = "AHHA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Base directory for config and session files. Defaults to ~/.ahha
    #[arg(long, global = true, env = "AHHA_BASE_DIR")]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in through the browser
    Login,
    /// Clear the stored session
    Logout,
    /// Show the session status
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a snippet
    Save {
        /// Plain text of the selection
        #[arg(long, default_value = "")]
        text: String,
        /// HTML of the selection
        #[arg(long, default_value = "")]
        html: String,
        /// Snippet title. Defaults to the start of the text
        #[arg(long, default_value = "")]
        title: String,
        /// Notes attached to the snippet
        #[arg(long, default_value = "")]
        notes: String,
        /// Page the selection came from
        #[arg(long)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths).context("failed to load config")?;

    // Initialize logging
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    let redirect = LoopbackRedirect::new(&config.oauth.redirect_uri)?;
    let runtime = CaptureAuthRuntime::open(&config, &paths, Arc::new(redirect))
        .context("failed to open session store")?;

    let code = match cli.command {
        Commands::Login => commands::login(&runtime).await,
        Commands::Logout => commands::logout(&runtime),
        Commands::Status { json } => commands::status(&runtime, json)?,
        Commands::Save {
            text,
            html,
            title,
            notes,
            url,
        } => {
            let selection = capture_auth::CapturedSelection {
                title,
                html_content: html,
                text_content: text,
                notes,
                source_url: url,
            };
            commands::save(&runtime, selection).await?
        }
    };

    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_parses_capture_fields() {
        let cli = Cli::try_parse_from([
            "ahha-capture",
            "--base-dir",
            "/tmp/ahha",
            "save",
            "--text",
            "hello",
            "--url",
            "https://example.com",
        ])
        .unwrap();

        assert_eq!(cli.base_dir, Some(PathBuf::from("/tmp/ahha")));
        match cli.command {
            Commands::Save { text, html, url, .. } => {
                assert_eq!(text, "hello");
                assert_eq!(html, "");
                assert_eq!(url, "https://example.com");
            }
            _ => panic!("expected save"),
        }
    }

    #[test]
    fn test_save_requires_url() {
        assert!(Cli::try_parse_from(["ahha-capture", "save", "--text", "x"]).is_err());
    }

    #[test]
    fn test_status_json_flag() {
        let cli = Cli::try_parse_from(["ahha-capture", "status", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Status { json: true }));
    }
}
