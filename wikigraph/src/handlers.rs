use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use wikigraph_core::config::{API_URL_ENV, DEFAULT_CONFIG_PATH, expand_path};
use wikigraph_core::crawl::NoticeCallback;
use wikigraph_core::report::{
    gather_report_data, generate_json_report, generate_text_report, save_report,
};
use wikigraph_core::{
    ControllerCommand, CrawlController, DepthFilter, FilterParams, FollowOptions, FollowOutcome,
    Notice, NoticeLevel, ReportFormat, SessionState, Settings, TokioClock, follow_crawl,
};
use wikigraph_stream::{CrawlRequest, StreamClient};
use wikigraph_tui::{MonitorOptions, SystemNavigator, run_graph_view};

pub fn print_banner() {
    println!(
        "{} {}",
        "wikigraph".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    println!("{}", "watch a link crawl grow into a graph".bright_black());
    println!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

/// Settings file, then `WIKIGRAPH_API_URL`, then `--api-url`.
pub fn load_settings(config: Option<&Path>, api_url: Option<&str>) -> Result<Settings> {
    let path = match config {
        Some(path) => path.to_path_buf(),
        None => expand_path(DEFAULT_CONFIG_PATH),
    };
    let settings = Settings::load_or_default(&path)?
        .resolve_api_url(std::env::var(API_URL_ENV).ok(), api_url)?;
    debug!("Using crawler at {}", settings.api_url);
    Ok(settings)
}

/// Settings for the global `--config` and `--api-url` flags of `args`.
pub fn settings_from_args(args: &ArgMatches) -> Result<Settings> {
    load_settings(
        args.get_one::<PathBuf>("config").map(PathBuf::as_path),
        args.get_one::<String>("api-url").map(String::as_str),
    )
}

pub fn build_client(settings: &Settings) -> Result<StreamClient> {
    StreamClient::with_timeout(&settings.api_url, settings.request_timeout_secs)
        .with_context(|| format!("Invalid crawler URL {}", settings.api_url))
}

/// Crawl request from the `PAGE`, `--depth` and `--max-pages` arguments.
pub fn crawl_request(args: &ArgMatches) -> Result<CrawlRequest> {
    let page = args
        .get_one::<String>("PAGE")
        .ok_or_else(|| anyhow!("A page is required"))?;
    let depth = args.get_one::<u8>("depth").copied().unwrap_or(2);
    let max_pages = args.get_one::<u32>("max-pages").copied().unwrap_or(50);
    Ok(CrawlRequest::new(page.as_str(), depth, max_pages)?)
}

/// Filter parameters from `--node-cap` and `--depth-filter`, falling back to
/// the configured cap.
pub fn filter_params(args: &ArgMatches, settings: &Settings) -> Result<FilterParams> {
    let node_cap = args
        .get_one::<usize>("node-cap")
        .copied()
        .unwrap_or(settings.node_cap);
    let probe = Settings {
        node_cap,
        ..settings.clone()
    };
    probe.validate()?;

    let depth = args
        .get_one::<u32>("depth-filter")
        .map(|d| DepthFilter::Max(*d))
        .unwrap_or_default();
    Ok(FilterParams::default()
        .with_node_cap(node_cap)
        .with_depth(depth))
}

pub async fn handle_suggest(args: &ArgMatches, settings: &Settings) -> Result<Vec<String>> {
    let query = args
        .get_one::<String>("QUERY")
        .ok_or_else(|| anyhow!("A query is required"))?;
    let client = build_client(settings)?;
    let titles = client
        .suggest(query)
        .await
        .context("Suggestion lookup failed")?;

    if titles.is_empty() {
        println!("{} No pages match '{}'", "→".blue(), query);
    }
    for title in &titles {
        println!("{}", title.replace('_', " "));
    }
    Ok(titles)
}

pub async fn handle_stop(settings: &Settings, quiet: bool) -> Result<()> {
    let client = build_client(settings)?;
    client.stop().await.context("Stop request failed")?;
    if !quiet {
        println!("{} Stop signal sent to {}", "✓".green().bold(), settings.api_url);
    }
    Ok(())
}

/// How `run_crawl` should present its result.
pub struct CrawlOutput {
    pub format: ReportFormat,
    pub path: Option<PathBuf>,
    pub quiet: bool,
}

/// Follow one crawl to the end and emit the report.
///
/// A failed crawl still emits the report for whatever arrived, then returns
/// the failure as an error.
pub async fn run_crawl(
    client: Arc<StreamClient>,
    request: CrawlRequest,
    settings: &Settings,
    output: CrawlOutput,
    interrupt: CancellationToken,
) -> Result<FollowOutcome> {
    if !output.quiet {
        print_divider();
        println!("{}", "  WIKIGRAPH CRAWL".bright_white().bold());
        print_divider();
        println!("{} Page: {}", "→".blue(), request.page().bright_white());
        println!(
            "{} Depth: {}, max pages: {}",
            "→".blue(),
            request.depth(),
            request.max_pages()
        );
        println!("{} Crawler: {}", "→".blue(), settings.api_url);
        println!();
    }

    let quiet = output.quiet;
    let notice_callback: NoticeCallback = Arc::new(move |notice: &Notice| {
        if quiet && notice.level != NoticeLevel::Error {
            return;
        }
        match notice.level {
            NoticeLevel::Error => eprintln!("{} {}", "✗".red().bold(), notice.message),
            NoticeLevel::Warn => eprintln!("{} {}", "⚠".yellow().bold(), notice.message),
            NoticeLevel::Info => eprintln!("{} {}", "ℹ".blue(), notice.message),
        }
    });

    let options = FollowOptions {
        config: settings.controller_config(),
        show_progress_bars: !output.quiet,
    };
    let outcome = follow_crawl(client, request, options, interrupt, Some(notice_callback)).await;
    info!(
        "Crawl finished as {} after {:?}",
        outcome.state, outcome.elapsed
    );

    if !output.quiet {
        match outcome.state {
            SessionState::Completed => println!("\n{} Crawl complete!\n", "✓".green().bold()),
            SessionState::Cancelled => println!("\n{} Crawl cancelled\n", "→".yellow().bold()),
            _ => println!(),
        }
    }

    let data = gather_report_data(&outcome);
    let report = match output.format {
        ReportFormat::Text => generate_text_report(&data),
        ReportFormat::Json => generate_json_report(&data).context("Failed to encode report")?,
    };

    match output.path {
        Some(ref path) => {
            save_report(&report, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !output.quiet {
                println!(
                    "{} Report saved to: {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }
        None => print!("{}", report),
    }

    if let SessionState::Failed(ref failure) = outcome.state {
        return Err(anyhow!("Crawl failed: {}", failure));
    }
    Ok(outcome)
}

pub async fn handle_crawl(args: &ArgMatches, settings: &Settings, quiet: bool) -> Result<()> {
    let request = crawl_request(args)?;
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);
    let output = CrawlOutput {
        format,
        path: args.get_one::<PathBuf>("output").cloned(),
        quiet,
    };
    let client = Arc::new(build_client(settings)?);

    let interrupt = CancellationToken::new();
    let trigger = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    run_crawl(client, request, settings, output, interrupt).await?;
    Ok(())
}

/// Run the interactive view. The controller lives on the runtime; the
/// terminal loop gets its own blocking thread.
pub async fn handle_view(args: &ArgMatches, settings: &Settings) -> Result<()> {
    let request = crawl_request(args)?;
    let filter = filter_params(args, settings)?;
    let client = Arc::new(build_client(settings)?);

    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let (commands, commands_rx) = mpsc::unbounded_channel();
    let controller = CrawlController::new(
        client,
        Arc::new(TokioClock),
        settings.controller_config(),
        updates_tx,
    );
    let runner = tokio::spawn(controller.run(commands_rx));

    info!("Opening view for {}", request);
    commands
        .send(ControllerCommand::Start(request))
        .map_err(|_| anyhow!("Session controller exited early"))?;

    let options = MonitorOptions {
        wiki_base_url: settings.wiki_base_url.clone(),
        filter,
        layout: settings.layout_config(),
    };
    let view_commands = commands.clone();
    let view = tokio::task::spawn_blocking(move || {
        run_graph_view(updates_rx, view_commands, Box::new(SystemNavigator), options)
    })
    .await
    .context("Graph view thread panicked")?;

    let _ = commands.send(ControllerCommand::Shutdown);
    runner.await.context("Session controller panicked")?;
    view
}
