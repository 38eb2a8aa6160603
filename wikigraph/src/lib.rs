pub mod commands;
pub mod handlers;

pub use commands::{CLAP_STYLING, command_argument_builder};
pub use handlers::{
    CrawlOutput, build_client, crawl_request, filter_params, load_settings, run_crawl,
    settings_from_args,
};
