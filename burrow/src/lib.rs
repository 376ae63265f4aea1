pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use commands::command_argument_builder;
pub use handlers::{
    CrawlSettings, build_crawl_settings, expand_path, handle_crawl, load_urls_from_file,
    load_urls_from_source, parse_url_line, print_banner,
};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
