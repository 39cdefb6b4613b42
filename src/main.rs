// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use vidrun::config::Config;
use vidrun::delivery::{context_for, ConversationTarget, DeliveryError, Requester};
use vidrun::service::VideoService;
use vidrun::VidrunError;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// vidrun - Remote video generation relay.
#[derive(Parser)]
#[command(name = "vidrun")]
#[command(version = VERSION)]
#[command(about = "Generate a video from a prompt, download it and send it on.")]
#[command(long_about = "vidrun - Remote video generation relay\n\n\
    Generate a video:    vidrun generate a kitten chasing a ball\n\
    List videos:         vidrun list\n\
    List models:         vidrun models\n\
    Pick a model:        vidrun use-model 2\n\
    Send a video again:  vidrun play 1 --group 123456\n\n\
    Configuration lives in ~/.vidrun/config.json.")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Deliver to this group through the messaging gateway (wins over --user)
    #[arg(long, global = true)]
    group: Option<String>,

    /// Deliver to this user through the messaging gateway
    #[arg(long, global = true)]
    user: Option<String>,

    /// Quiet mode: errors only
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Verbose mode: detailed output for debugging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a video from a prompt
    ///
    /// Examples:
    ///   vidrun generate a kitten chasing a ball
    ///   vidrun generate --model doubao-seedance-1-5-pro-251215 sunset over the sea
    #[command(alias = "g")]
    Generate {
        /// Model to use instead of the configured default
        #[arg(short, long)]
        model: Option<String>,
        /// Video description
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },

    /// List downloaded videos, newest first
    #[command(alias = "ls")]
    List,

    /// List supported models
    Models,

    /// Make a model the default by its number in `vidrun models`
    UseModel {
        /// 1-based model number
        index: String,
    },

    /// Send a stored video by number or by part of its prompt
    Play {
        #[arg(trailing_var_arg = true)]
        identifier: Vec<String>,
    },
}

/// Prints replies to the terminal.
struct ConsoleRequester {
    context: Value,
}

#[async_trait]
impl Requester for ConsoleRequester {
    async fn send_text(&self, text: &str) -> Result<(), DeliveryError> {
        println!("{} {}", "[vidrun]".cyan(), text);
        Ok(())
    }

    fn conversation(&self) -> &Value {
        &self.context
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Group takes priority when both `--group` and `--user` are given.
fn cli_target(cli: &Cli) -> Option<ConversationTarget> {
    match (&cli.group, &cli.user) {
        (Some(group), _) => Some(ConversationTarget::Group(group.clone())),
        (None, Some(user)) => Some(ConversationTarget::Private(user.clone())),
        (None, None) => None,
    }
}

async fn run(cli: Cli) -> Result<(), VidrunError> {
    let config = Config::load().map_err(|e| VidrunError::Config(vec![format!("{:#}", e)]))?;

    let requester = ConsoleRequester {
        context: cli_target(&cli).as_ref().map(context_for).unwrap_or(Value::Null),
    };

    let mut service = VideoService::new(config)?;

    match cli.command {
        Commands::Generate { model, prompt } => {
            let outcome = service
                .generate(&prompt.join(" "), model.as_deref(), &requester)
                .await?;
            if let Some(entry) = &outcome.video {
                println!("  {} Saved as {}", "[✓]".green(), entry.filename);
            }
        }
        Commands::List => {
            service.list_videos(&requester).await?;
        }
        Commands::Models => {
            service.list_models(&requester).await;
        }
        Commands::UseModel { index } => {
            service.select_model(&index, &requester).await?;
        }
        Commands::Play { identifier } => {
            service.play(&identifier.join(" "), &requester).await?;
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let runtime = tokio::runtime::Runtime::new()?;
    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("{}", e.explain().as_str().red());
        std::process::exit(1);
    }
    Ok(())
}
