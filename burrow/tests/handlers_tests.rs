use burrow::handlers::*;
use burrow::command_argument_builder;
use burrow_core::report::ReportFormat;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use url::Url;

fn crawl_matches(args: &[&str]) -> clap::ArgMatches {
    let mut argv = vec!["burrow", "crawl"];
    argv.extend_from_slice(args);
    let matches = command_argument_builder()
        .try_get_matches_from(argv)
        .unwrap();
    let (_, crawl) = matches.subcommand().unwrap();
    crawl.clone()
}

#[test]
fn test_parse_url_line_with_scheme() {
    let result = parse_url_line("https://www.ics.uci.edu");
    assert_eq!(result, Some("https://www.ics.uci.edu".to_string()));
}

#[test]
fn test_parse_url_line_without_scheme() {
    let result = parse_url_line("www.cs.uci.edu");
    assert_eq!(result, Some("http://www.cs.uci.edu".to_string()));
}

#[test]
fn test_parse_url_line_invalid() {
    let result = parse_url_line("not a valid url!!!");
    assert_eq!(result, None);
}

#[test]
fn test_load_urls_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "https://www.ics.uci.edu")?;
    writeln!(temp_file, "# departments")?;
    writeln!(temp_file, "www.stat.uci.edu")?;
    writeln!(temp_file)?; // Empty line
    writeln!(temp_file, "https://www.informatics.uci.edu")?;

    let urls = load_urls_from_file(temp_file.path())?;

    assert_eq!(urls.len(), 3);
    assert_eq!(urls[0], "https://www.ics.uci.edu");
    assert_eq!(urls[1], "http://www.stat.uci.edu");
    assert_eq!(urls[2], "https://www.informatics.uci.edu");

    Ok(())
}

#[test]
fn test_load_urls_from_file_empty() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file).unwrap();
    writeln!(temp_file, "   ").unwrap();

    let result = load_urls_from_file(temp_file.path());

    assert!(result.is_err());
    assert!(result.unwrap_err().contains("No valid URLs"));
}

#[test]
fn test_load_urls_from_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_urls_from_file(&dir.path().join("seeds.txt"));
    assert!(result.unwrap_err().contains("Failed to read seeds file"));
}

#[test]
fn test_load_urls_from_source_urls() {
    let urls = vec![
        Url::parse("https://www.ics.uci.edu").unwrap(),
        Url::parse("https://www.cs.uci.edu/about").unwrap(),
    ];
    let result = load_urls_from_source(&urls, None).unwrap();

    assert_eq!(
        result,
        vec!["https://www.ics.uci.edu/", "https://www.cs.uci.edu/about"]
    );
}

#[test]
fn test_load_urls_from_source_no_input() {
    let result = load_urls_from_source(&[], None);
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .contains("Either --url or --seeds-file must be provided")
    );
}

#[test]
fn test_build_crawl_settings_defaults() {
    let matches = crawl_matches(&["--url", "https://www.ics.uci.edu/", "--scope", "ics.uci.edu"]);
    let settings = build_crawl_settings(&matches, true).unwrap();

    assert_eq!(settings.options.seeds, vec!["https://www.ics.uci.edu/"]);
    assert_eq!(settings.options.trap.scope, vec!["ics.uci.edu"]);
    assert_eq!(settings.options.trap.revisit_threshold, 50);
    assert_eq!(settings.options.trap.max_path_length, 100);
    assert_eq!(settings.options.workers, 4);
    assert_eq!(settings.options.politeness, Duration::from_millis(500));
    assert!(settings.options.max_pages.is_none());
    assert!(!settings.options.show_progress_bars);
    assert_eq!(settings.format, ReportFormat::Text);
    assert_eq!(settings.output, std::path::PathBuf::from("analytics.txt"));
    assert!(settings.stopwords.contains("the"));
}

#[test]
fn test_build_crawl_settings_overrides() {
    let matches = crawl_matches(&[
        "--url",
        "https://www.ics.uci.edu/",
        "--url",
        "https://www.stat.uci.edu/",
        "--scope",
        "ics.uci.edu",
        "--scope",
        "stat.uci.edu",
        "--workers",
        "8",
        "--politeness-ms",
        "250",
        "--max-pages",
        "1000",
        "--max-seconds",
        "60",
        "--segment-repeats",
        "4",
        "--query-repeats",
        "3",
        "--revisit-threshold",
        "20",
        "--calendar-depth",
        "3",
        "--format",
        "json",
        "--output",
        "out/report.json",
    ]);
    let settings = build_crawl_settings(&matches, false).unwrap();

    assert_eq!(settings.options.seeds.len(), 2);
    assert_eq!(settings.options.trap.scope, vec!["ics.uci.edu", "stat.uci.edu"]);
    assert_eq!(settings.options.workers, 8);
    assert_eq!(settings.options.politeness, Duration::from_millis(250));
    assert_eq!(settings.options.max_pages, Some(1000));
    assert_eq!(settings.options.max_duration, Some(Duration::from_secs(60)));
    assert_eq!(settings.options.trap.max_segment_repeats, 4);
    assert_eq!(settings.options.trap.max_query_repeats, 3);
    assert_eq!(settings.options.trap.revisit_threshold, 20);
    assert_eq!(settings.options.trap.calendar_depth, Some(3));
    assert!(settings.options.show_progress_bars);
    assert_eq!(settings.format, ReportFormat::Json);
    assert_eq!(settings.output, std::path::PathBuf::from("out/report.json"));
}

#[test]
fn test_build_crawl_settings_custom_stopwords() -> Result<(), Box<dyn std::error::Error>> {
    let mut stopwords = NamedTempFile::new()?;
    writeln!(stopwords, "uci")?;
    writeln!(stopwords, "ics")?;

    let path = stopwords.path().to_string_lossy().to_string();
    let matches = crawl_matches(&[
        "--url",
        "https://www.ics.uci.edu/",
        "--scope",
        "ics.uci.edu",
        "--stopwords",
        &path,
    ]);
    let settings = build_crawl_settings(&matches, true)?;

    assert_eq!(settings.stopwords.len(), 2);
    assert!(settings.stopwords.contains("uci"));
    assert!(!settings.stopwords.contains("the"));
    Ok(())
}

#[test]
fn test_build_crawl_settings_unreadable_stopwords() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.txt").to_string_lossy().to_string();
    let matches = crawl_matches(&[
        "--url",
        "https://www.ics.uci.edu/",
        "--scope",
        "ics.uci.edu",
        "--stopwords",
        &missing,
    ]);

    assert!(build_crawl_settings(&matches, true).is_err());
}

#[test]
fn test_build_crawl_settings_from_seeds_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut seeds = NamedTempFile::new()?;
    writeln!(seeds, "https://www.ics.uci.edu")?;
    writeln!(seeds, "https://www.cs.uci.edu")?;

    let path = seeds.path().to_string_lossy().to_string();
    let matches = crawl_matches(&["--seeds-file", &path, "--scope", "uci.edu"]);
    let settings = build_crawl_settings(&matches, true)?;

    assert_eq!(settings.options.seeds.len(), 2);
    Ok(())
}

#[test]
fn test_expand_path_plain() {
    assert_eq!(expand_path("out/analytics.txt"), std::path::PathBuf::from("out/analytics.txt"));
}

#[test]
fn test_expand_path_tilde() {
    let expanded = expand_path("~/reports/analytics.txt");
    assert!(expanded.ends_with("reports/analytics.txt"));
}
