use anyhow::Result;
use clap::ArgMatches;
use colored::Colorize;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wikigraph::command_argument_builder;
use wikigraph::handlers::{
    handle_crawl, handle_stop, handle_suggest, handle_view, print_banner, settings_from_args,
};
use wikigraph_core::config::config_dir;

const LOG_FILE_NAME: &str = "wikigraph.log";

/// Initialize tracing.
///
/// The interactive view owns the terminal, so it logs to a file (or not at
/// all if the file cannot be opened). Everything else logs to stderr.
fn init_tracing(log_file: Option<&Path>) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wikigraph=info".into());

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
        else {
            return;
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn dispatch(name: &str, args: &ArgMatches, quiet: bool) -> Result<()> {
    let settings = settings_from_args(args)?;
    match name {
        "view" => handle_view(args, &settings).await,
        "crawl" => handle_crawl(args, &settings, quiet).await,
        "suggest" => handle_suggest(args, &settings).await.map(|_| ()),
        "stop" => handle_stop(&settings, quiet).await,
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();

    let Some((name, sub_matches)) = chosen_command.subcommand() else {
        // No subcommand provided, just show the banner
        if !chosen_command.get_flag("quiet") {
            print_banner();
        }
        return;
    };
    let quiet = sub_matches.get_flag("quiet");

    if name == "view" {
        init_tracing(Some(&config_dir().join(LOG_FILE_NAME)));
    } else {
        init_tracing(None);
        if !quiet && name != "suggest" {
            print_banner();
        }
    }

    if let Err(e) = dispatch(name, sub_matches, quiet).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
