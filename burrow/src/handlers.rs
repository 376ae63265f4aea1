use anyhow::Context;
use burrow_core::crawl::{CrawlOptions, CrawlOutcome, execute_crawl};
use burrow_core::report::ReportFormat;
use burrow_core::text::{default_stopwords, load_stopwords};
use burrow_scanner::TrapConfig;
use clap::ArgMatches;
use colored::Colorize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

// Helper functions for crawl handler

/// Load seeds from either a file or the `--url` arguments
pub fn load_urls_from_source(
    urls: &[Url],
    seeds_file: Option<&Path>,
) -> Result<Vec<String>, String> {
    if let Some(seeds_file_path) = seeds_file {
        load_urls_from_file(seeds_file_path)
    } else if !urls.is_empty() {
        Ok(urls.iter().map(|url| url.as_str().to_string()).collect())
    } else {
        Err("Either --url or --seeds-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file. Blank lines and `#` comments are skipped.
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read seeds file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if Url::parse(line).is_ok() {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    eprintln!("{} Skipping invalid URL '{}'", "⚠".yellow().bold(), line);
    None
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Everything `crawl` needs, resolved from the command line before any
/// network traffic happens.
pub struct CrawlSettings {
    pub options: CrawlOptions,
    pub output: PathBuf,
    pub format: ReportFormat,
    pub stopwords: HashSet<String>,
}

pub fn build_crawl_settings(sub_matches: &ArgMatches, quiet: bool) -> Result<CrawlSettings, String> {
    let urls: Vec<Url> = sub_matches
        .get_many::<Url>("url")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let seeds_file = sub_matches
        .get_one::<String>("seeds-file")
        .map(|raw| expand_path(raw));
    let seeds = load_urls_from_source(&urls, seeds_file.as_deref())?;

    let scope: Vec<String> = sub_matches
        .get_many::<String>("scope")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    if scope.iter().all(|domain| domain.trim().is_empty()) {
        return Err("At least one --scope domain must be provided".to_string());
    }

    let mut trap = TrapConfig::with_scope(scope);
    if let Some(&max) = sub_matches.get_one::<usize>("max-path-length") {
        trap.max_path_length = max;
    }
    if let Some(&repeats) = sub_matches.get_one::<usize>("segment-repeats") {
        trap.max_segment_repeats = repeats;
    }
    if let Some(&repeats) = sub_matches.get_one::<usize>("query-repeats") {
        trap.max_query_repeats = repeats;
    }
    if let Some(&threshold) = sub_matches.get_one::<u32>("revisit-threshold") {
        trap.revisit_threshold = threshold;
    }
    trap.calendar_depth = sub_matches.get_one::<usize>("calendar-depth").copied();

    let stopwords = match sub_matches.get_one::<String>("stopwords") {
        Some(raw) => load_stopwords(&expand_path(raw)).map_err(|e| e.to_string())?,
        None => default_stopwords(),
    };

    let format = sub_matches
        .get_one::<String>("format")
        .and_then(|raw| ReportFormat::from_str(raw))
        .unwrap_or(ReportFormat::Text);
    let output = sub_matches
        .get_one::<String>("output")
        .map(|raw| expand_path(raw))
        .unwrap_or_else(|| PathBuf::from("analytics.txt"));

    let mut options = CrawlOptions::new(seeds, trap);
    options.workers = *sub_matches.get_one::<usize>("workers").unwrap_or(&4);
    options.politeness =
        Duration::from_millis(*sub_matches.get_one::<u64>("politeness-ms").unwrap_or(&500));
    options.max_pages = sub_matches.get_one::<usize>("max-pages").copied();
    options.max_duration = sub_matches
        .get_one::<u64>("max-seconds")
        .map(|secs| Duration::from_secs(*secs));
    options.timeout_secs = *sub_matches.get_one::<u64>("timeout").unwrap_or(&10);
    options.cache_dir = sub_matches
        .get_one::<String>("cache-dir")
        .map(|raw| expand_path(raw));
    options.show_progress_bars = !quiet;

    Ok(CrawlSettings {
        options,
        output,
        format,
        stopwords,
    })
}

pub fn print_banner() {
    println!(
        "{} {}",
        "burrow".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    println!("{}", "a trap-aware, restricted-domain crawler".bright_black());
    println!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_summary(outcome: &CrawlOutcome, output: &Path) {
    let summary = outcome.summary();
    println!();
    print_divider();
    println!("{}", "  CRAWL SUMMARY".bright_white().bold());
    print_divider();
    println!(
        "{} Pages fetched:  {}",
        "✓".green().bold(),
        summary.fetched.to_string().cyan()
    );
    println!(
        "{} Fetch failures: {}",
        "✗".red().bold(),
        summary.failed.to_string().cyan()
    );
    println!(
        "{} Links rejected: {}",
        "⚠".yellow().bold(),
        summary.rejected.to_string().cyan()
    );
    println!(
        "{} Still pending:  {}",
        "→".blue(),
        summary.pending.to_string().cyan()
    );
    println!(
        "{} Elapsed:        {:.1}s ({:?})",
        "→".blue(),
        summary.elapsed.as_secs_f64(),
        summary.stop_reason
    );
    println!(
        "{} Report:         {}",
        "✓".green().bold(),
        output.display().to_string().bright_white()
    );
    println!();
}

async fn crawl_and_report(
    options: CrawlOptions,
    cancel: CancellationToken,
    stopwords: &HashSet<String>,
    format: ReportFormat,
    output: &Path,
) -> anyhow::Result<CrawlOutcome> {
    let outcome = execute_crawl(options, cancel)
        .await
        .context("Crawl failed")?;
    outcome
        .write_report(stopwords, format, output)
        .with_context(|| format!("Cannot write report to {}", output.display()))?;
    Ok(outcome)
}

pub async fn handle_crawl(
    sub_matches: &ArgMatches,
    quiet: bool,
    cancel: CancellationToken,
) -> ExitCode {
    let CrawlSettings {
        options,
        output,
        format,
        stopwords,
    } = match build_crawl_settings(sub_matches, quiet) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    if !quiet {
        println!(
            "{} Crawling {} seed(s) within {}",
            "→".blue(),
            options.seeds.len().to_string().cyan(),
            options.trap.scope.join(", ").bright_white()
        );
        println!("{} Workers: {}", "→".blue(), options.workers);
        println!(
            "{} Politeness: {}ms per host\n",
            "→".blue(),
            options.politeness.as_millis()
        );
    }

    let outcome = match crawl_and_report(options, cancel, &stopwords, format, &output).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    if !quiet {
        print_summary(&outcome, &output);
    }
    ExitCode::SUCCESS
}
