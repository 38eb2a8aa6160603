use clap::{arg, command};
use wikigraph_core::config::{API_URL_ENV, DEFAULT_CONFIG_PATH};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

fn page_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(<PAGE>)
            .required(true)
            .help("Wikipedia page to start from, e.g. Fergana_(moth)"),
    )
    .arg(
        arg!(-d --"depth" <DEPTH>)
            .required(false)
            .help("How many link levels to follow (1-3)")
            .value_parser(clap::value_parser!(u8).range(1..=3))
            .default_value("2"),
    )
    .arg(
        arg!(-m --"max-pages" <MAX_PAGES>)
            .required(false)
            .help("Maximum number of pages to crawl")
            .value_parser(clap::value_parser!(u32).range(1..))
            .default_value("50"),
    )
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("wikigraph")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("wikigraph")
        .about("Watch a Wikipedia link crawl grow into a graph")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(--"api-url" <URL>)
                .required(false)
                .global(true)
                .help("Base URL of the crawler API (default: http://localhost:5000)")
                .env(API_URL_ENV),
        )
        .arg(
            arg!(--"config" <PATH>)
                .required(false)
                .global(true)
                .help(format!("Settings file (default: {})", DEFAULT_CONFIG_PATH))
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .subcommand_required(false)
        .subcommand(
            page_args(command!("view").about("Crawl a page and explore the graph as it grows"))
                .arg(
                    arg!(--"node-cap" <N>)
                        .required(false)
                        .help("Maximum number of nodes drawn at once (25-1000)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"depth-filter" <N>)
                        .required(false)
                        .help("Only draw nodes up to this depth (0-3)")
                        .value_parser(clap::value_parser!(u32).range(0..=3)),
                ),
        )
        .subcommand(
            page_args(
                command!("crawl").about("Crawl a page without the UI and print a report when done"),
            )
            .arg(
                arg!(-f --"format" <FORMAT>)
                    .required(false)
                    .help("Report format: text, json")
                    .value_parser(["text", "json"])
                    .default_value("text"),
            )
            .arg(
                arg!(-o --"output" <PATH>)
                    .required(false)
                    .help("Save report to file (default: display to screen)")
                    .value_parser(clap::value_parser!(std::path::PathBuf)),
            ),
        )
        .subcommand(
            command!("suggest")
                .about("Look up page titles matching a partial query")
                .arg(arg!(<QUERY>).required(true).help("Partial page title")),
        )
        .subcommand(command!("stop").about("Ask the crawler to stop whatever it is running"))
}
