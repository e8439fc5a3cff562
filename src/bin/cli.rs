//! instascan CLI
//!
//! Local execution entry point. Results are printed to stdout as JSON,
//! logs go to stderr.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use instascan::{
    Scanner,
    error::{AppError, Result},
    models::{Config, PageRequest, Session},
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// instascan - Public Instagram data extraction
#[derive(Parser, Debug)]
#[command(
    name = "instascan",
    version,
    about = "Resilient multi-source extraction of public Instagram data"
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the session cookie file (JSON)
    #[arg(short, long, default_value = "session.json")]
    session: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a user profile
    Profile {
        /// Login handle, with or without a leading @
        handle: String,
    },

    /// Fetch posts under one or more tags
    Tag {
        /// Tags, with or without a leading #
        #[arg(required = true)]
        tags: Vec<String>,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Fetch posts of a user by numeric id
    User {
        user_id: String,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Fetch comments of a post by short code
    Comments {
        shortcode: String,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Check whether the session is still accepted
    Session,

    /// Validate configuration and session files
    Validate,
}

#[derive(Args, Debug)]
struct PageArgs {
    /// Items per page where the endpoint accepts a count
    #[arg(long)]
    page_size: Option<usize>,

    /// Maximum number of pages to fetch
    #[arg(long)]
    pages: Option<usize>,

    /// Continue from the cursor an earlier budget-limited run logged
    #[arg(long)]
    cursor: Option<String>,
}

impl PageArgs {
    fn request(&self) -> PageRequest {
        PageRequest {
            cursor: self.cursor.clone(),
            page_size: self.page_size,
            page_budget: self.pages,
        }
    }
}

#[derive(Serialize)]
struct TagResult<T> {
    tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    posts: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn load_session(path: &Path) -> Result<Session> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::config(format!("cannot read session file {}: {e}", path.display()))
    })?;
    let session = Session::from_json(&content)?;
    log::info!("Loaded {} cookies from {}", session.len(), path.display());
    Ok(session)
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling in-flight requests");
            token.cancel();
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    init_logging(cli.verbose, &config.logging.level);

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("✓ Config OK");

        let session = load_session(&cli.session).await?;
        session.ensure_usable()?;
        log::info!("✓ Session file OK");
        return Ok(());
    }

    let session = load_session(&cli.session).await?;
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());
    let scanner = Scanner::new(config)?.with_cancellation(cancel);

    match cli.command {
        Command::Profile { handle } => {
            let profile = scanner.get_profile(&handle, &session).await?;
            print_json(&profile)?;
        }

        Command::Tag { tags, page } => {
            let results = scanner.scan_tags(&tags, &session, &page.request()).await;
            let failures = results.iter().filter(|(_, r)| r.is_err()).count();
            let output: Vec<_> = results
                .into_iter()
                .map(|(tag, result)| match result {
                    Ok(posts) => TagResult {
                        tag,
                        posts: Some(posts),
                        error: None,
                    },
                    Err(e) => TagResult {
                        tag,
                        posts: None,
                        error: Some(e.to_string()),
                    },
                })
                .collect();
            print_json(&output)?;
            if failures > 0 {
                log::warn!("{failures} of {} tags failed", output.len());
            }
        }

        Command::User { user_id, page } => {
            let posts = scanner
                .get_posts_by_user(&user_id, &session, &page.request())
                .await?;
            print_json(&posts)?;
        }

        Command::Comments { shortcode, page } => {
            let comments = scanner
                .get_comments(&shortcode, &session, &page.request())
                .await?;
            print_json(&comments)?;
        }

        Command::Session => {
            let state = scanner.check_session(&session).await?;
            print_json(&state)?;
        }

        Command::Validate => {}
    }

    log::info!("Done!");

    Ok(())
}
