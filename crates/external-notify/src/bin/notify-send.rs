//! notify-send - format and deliver a single notification.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use external_notify::{ActorContext, Dispatcher, FormatArg, MessageTemplate, NotifyConfig, User};

/// Send one notification to every configured platform.
#[derive(Parser)]
#[command(name = "notify-send")]
#[command(about = "Format and deliver a notification to configured platforms")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $NOTIFY_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Event name used for channel routing
    #[arg(short, long)]
    event: String,

    /// Template with {user}, {type}, {title} and {string} placeholders
    #[arg(short, long)]
    template: String,

    /// Acting username (omit for an anonymous notification)
    #[arg(short, long)]
    user: Option<String>,

    /// Display title of the acting user
    #[arg(long, requires = "user")]
    title: Option<String>,

    /// Positional template argument; comma-separated values become a list
    #[arg(short, long = "arg")]
    args: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_arg(raw: &str) -> FormatArg {
    if raw.contains(',') {
        FormatArg::List(raw.split(',').map(|s| s.trim().to_string()).collect())
    } else {
        FormatArg::Text(raw.to_string())
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("external_notify=debug,notify_send=debug,info")
    } else {
        EnvFilter::new("external_notify=info,warn")
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => NotifyConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => NotifyConfig::from_env().context("loading config from NOTIFY_CONFIG")?,
    };
    let dispatcher = Dispatcher::new(config);

    let actor = cli.user.map(|username| {
        let user = User {
            username,
            title: cli.title,
        };
        ActorContext::new(user)
    });

    let template = cli
        .args
        .iter()
        .fold(MessageTemplate::new(cli.template), |t, raw| t.arg(parse_arg(raw)));

    info!(
        event = %cli.event,
        text = %dispatcher.format(actor.as_ref(), &template),
        "Sending notification"
    );

    let results = dispatcher
        .send_and_wait(&cli.event, actor.as_ref(), &template)
        .await;
    if results.is_empty() {
        info!("No configured platforms, nothing sent");
    }

    let mut failed = false;
    for (platform, result) in results {
        match result {
            Ok(()) => println!("{platform}: delivered"),
            Err(e) => {
                error!(platform = %platform, error = %e, "Delivery failed");
                println!("{platform}: failed ({e})");
                failed = true;
            }
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
