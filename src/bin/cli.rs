//! social-info CLI
//!
//! Harvests the followers of one account per invocation:
//!
//! ```text
//! social-info instagram followers <user_id> [--inspect | --load-cursor] [<output>]
//! social-info twitter followers <user_id> [--inspect | --load-cursor] [<output>]
//! social-info tiktok followers <user_id> [--inspect | --load-cursor] [<output>]
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use social_info::{
    config::{self, Credentials, ENV_FILE},
    error::Result,
    models::{Config, Platform},
    pipeline::{self, FollowersRequest, OutputMode},
    storage::{CheckpointStore, LocalCheckpointStore},
};

/// social-info - Follower list harvester
#[derive(Parser, Debug)]
#[command(
    name = "social-info",
    version,
    about = "Harvest follower lists from Instagram, Twitter and TikTok into CSV files"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "social_info.toml", global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Instagram (private API, session id in INSTAGRAM_SESSIONID)
    Instagram {
        #[command(subcommand)]
        action: Action,
    },

    /// Twitter (API v2, bearer token in TWITTER_BEARER)
    Twitter {
        #[command(subcommand)]
        action: Action,
    },

    /// TikTok (ScrapTik on RapidAPI, key in RAPIDAPI_KEY)
    Tiktok {
        #[command(subcommand)]
        action: Action,
    },

    /// Validate the configuration file and report available credentials
    Validate,

    /// Show saved cursors
    Info,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Page through a user's followers
    Followers(FollowersArgs),
}

#[derive(Args, Debug)]
struct FollowersArgs {
    /// Platform user id whose followers are listed
    user_id: String,

    /// Show the available fields of the first batch (won't save output)
    #[arg(short, long, conflicts_with = "load_cursor")]
    inspect: bool,

    /// Resume from the saved cursor (recommended when picking up a previous session)
    #[arg(long)]
    load_cursor: bool,

    /// CSV file to append followers to
    #[arg(required_unless_present = "inspect")]
    output: Option<PathBuf>,
}

impl FollowersArgs {
    fn into_request(self, platform: Platform) -> FollowersRequest {
        let output = match (self.inspect, self.output) {
            (false, Some(path)) => OutputMode::File(path),
            _ => OutputMode::Inspect,
        };
        FollowersRequest {
            platform,
            user_id: self.user_id,
            output,
            load_cursor: self.load_cursor,
        }
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .target(env_logger::Target::Stdout)
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::load_config(&cli.config)?;

    let (platform, Action::Followers(args)) = match cli.command {
        Command::Instagram { action } => (Platform::Instagram, action),
        Command::Twitter { action } => (Platform::Twitter, action),
        Command::Tiktok { action } => (Platform::Tiktok, action),
        Command::Validate => return validate(&config),
        Command::Info => return info(&config).await,
    };

    let request = args.into_request(platform);
    let credentials = Credentials::load(Path::new(ENV_FILE))?;
    pipeline::run_followers(&config, &credentials, &request).await?;

    log::info!("Done!");
    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    log::info!("✓ Config OK (save data: {})", config.session.file.display());

    let credentials = Credentials::load(Path::new(ENV_FILE))?;
    for platform in Platform::ALL {
        match credentials.require(platform) {
            Ok(_) => log::info!("✓ {} credentials present", platform),
            Err(e) => log::warn!("✗ {}: {}", platform, e),
        }
    }
    Ok(())
}

async fn info(config: &Config) -> Result<()> {
    let store = LocalCheckpointStore::new(&config.session.file);
    log::info!("Save data: {}", store.path().display());

    let state = store.load().await;
    log::info!(
        "Instagram session: {}",
        if state.insta_api.is_empty() {
            "not saved"
        } else {
            "saved"
        }
    );
    for platform in Platform::ALL {
        match state.cursor(platform) {
            Some(cursor) => log::info!("{} cursor: {}", platform, cursor),
            None => log::info!("{} cursor: none", platform),
        }
    }
    match state.updated_at {
        Some(updated) => log::info!("Last updated: {}", updated.to_rfc3339()),
        None => log::info!("Never saved"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_followers_with_output() {
        let cli = Cli::try_parse_from([
            "social-info",
            "instagram",
            "followers",
            "1234",
            "--load-cursor",
            "out.csv",
        ])
        .unwrap();
        let Command::Instagram {
            action: Action::Followers(args),
        } = cli.command
        else {
            panic!("expected instagram followers");
        };
        let request = args.into_request(Platform::Instagram);
        assert!(request.load_cursor);
        assert_eq!(request.output, OutputMode::File(PathBuf::from("out.csv")));
    }

    #[test]
    fn test_inspect_needs_no_output() {
        let cli = Cli::try_parse_from(["social-info", "tiktok", "followers", "42", "-i"]).unwrap();
        let Command::Tiktok {
            action: Action::Followers(args),
        } = cli.command
        else {
            panic!("expected tiktok followers");
        };
        assert_eq!(args.into_request(Platform::Tiktok).output, OutputMode::Inspect);
    }

    #[test]
    fn test_validate_accepts_default_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_output_required_without_inspect() {
        assert!(Cli::try_parse_from(["social-info", "twitter", "followers", "42"]).is_err());
    }

    #[test]
    fn test_inspect_conflicts_with_load_cursor() {
        assert!(
            Cli::try_parse_from([
                "social-info",
                "twitter",
                "followers",
                "42",
                "--inspect",
                "--load-cursor"
            ])
            .is_err()
        );
    }
}
