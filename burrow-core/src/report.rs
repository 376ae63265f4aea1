// Report rendering for crawl analytics

use crate::analytics::{LedgerEntry, PageRecord, Report};
use crate::error::{CrawlError, Result};
use burrow_scanner::CrawlSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

pub const SUBDOMAINS_HEADER: &str = "List of Subdomains with Number of URLs";
pub const MOST_OUTLINKS_HEADER: &str = "Page with Most Valid Outlinks";
pub const LEDGER_HEADER: &str = "Downloaded URLs and Traps (1 if trap, 0 if not)";
pub const TOP_WORDS_HEADER: &str = "Top 50 Words Excluding Stop Words";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Facts about the crawl session that produced a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub seeds: Vec<String>,
    pub summary: CrawlSummary,
}

/// Render the plain-text report: four fixed sections, each a header line
/// and tab-separated rows. The top-words table runs to the end of the
/// document; the longest page is only in the JSON rendering.
pub fn generate_text_report(report: &Report) -> String {
    let mut out = String::new();

    out.push_str(SUBDOMAINS_HEADER);
    out.push('\n');
    for (subdomain, count) in &report.subdomains {
        out.push_str(&format!("{}\t{}\n", subdomain, count));
    }
    out.push('\n');

    out.push_str(MOST_OUTLINKS_HEADER);
    out.push('\n');
    push_record(&mut out, report.most_outlinks.as_ref());
    out.push('\n');

    out.push_str(LEDGER_HEADER);
    out.push('\n');
    for (url, entry) in &report.ledger {
        match entry {
            LedgerEntry::Downloaded => out.push_str(&format!("{}\t0\n", url)),
            LedgerEntry::Trap { reason } => out.push_str(&format!("{}\t1\t{}\n", url, reason)),
            // Failures are neither downloads nor traps.
            LedgerEntry::Failed { .. } => {}
        }
    }
    out.push('\n');

    out.push_str(TOP_WORDS_HEADER);
    out.push('\n');
    for (token, count) in &report.top_words {
        out.push_str(&format!("{}\t{}\n", token, count));
    }

    out
}

fn push_record(out: &mut String, record: Option<&PageRecord>) {
    if let Some(record) = record {
        out.push_str(&format!("{}\t{}\n", record.url, record.count));
    }
}

pub fn generate_json_report(
    report: &Report,
    metadata: &ReportMetadata,
) -> std::result::Result<String, serde_json::Error> {
    let mut ledger = Vec::with_capacity(report.ledger.len());
    for (url, entry) in &report.ledger {
        let mut value = serde_json::to_value(entry)?;
        if let Some(object) = value.as_object_mut() {
            object.insert("url".to_string(), serde_json::json!(url));
        }
        ledger.push(value);
    }

    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "burrow",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": Utc::now().to_rfc3339(),
                "format": "json"
            },
            "session": {
                "id": metadata.session_id,
                "started_at": metadata.started_at.to_rfc3339(),
                "finished_at": metadata.finished_at.to_rfc3339(),
                "duration_seconds": metadata.summary.elapsed.as_secs_f64(),
                "seeds": metadata.seeds,
                "stop_reason": metadata.summary.stop_reason
            },
            "summary": {
                "fetched": metadata.summary.fetched,
                "failed": metadata.summary.failed,
                "rejected": metadata.summary.rejected,
                "seen": metadata.summary.seen,
                "pending": metadata.summary.pending,
                "in_flight": metadata.summary.in_flight
            },
            "subdomains": report.subdomains.iter()
                .map(|(subdomain, count)| serde_json::json!({ "subdomain": subdomain, "count": count }))
                .collect::<Vec<_>>(),
            "most_outlinks": report.most_outlinks,
            "longest_page": report.longest_page,
            "ledger": ledger,
            "top_words": report.top_words.iter()
                .map(|(token, count)| serde_json::json!({ "token": token, "count": count }))
                .collect::<Vec<_>>()
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn render_report(
    report: &Report,
    metadata: &ReportMetadata,
    format: ReportFormat,
) -> Result<String> {
    Ok(match format {
        ReportFormat::Text => generate_text_report(report),
        ReportFormat::Json => generate_json_report(report, metadata)?,
    })
}

pub fn save_report(content: &str, path: &Path) -> Result<()> {
    let io_error = |source| CrawlError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let mut file = File::create(path).map_err(io_error)?;
    file.write_all(content.as_bytes()).map_err(io_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_format_from_str() {
        assert_eq!(ReportFormat::from_str("TEXT"), Some(ReportFormat::Text));
        assert_eq!(ReportFormat::from_str("txt"), Some(ReportFormat::Text));
        assert_eq!(ReportFormat::from_str("json"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::from_str("html"), None);
    }

    #[test]
    fn test_empty_report_keeps_every_header() {
        let report = Report {
            subdomains: Vec::new(),
            most_outlinks: None,
            longest_page: None,
            ledger: Vec::new(),
            top_words: Vec::new(),
        };
        let text = generate_text_report(&report);
        let headers: Vec<&str> = text.lines().filter(|line| !line.is_empty()).collect();
        assert!(text.ends_with(&format!("{}\n", TOP_WORDS_HEADER)));
        assert_eq!(
            headers,
            vec![
                SUBDOMAINS_HEADER,
                MOST_OUTLINKS_HEADER,
                LEDGER_HEADER,
                TOP_WORDS_HEADER
            ]
        );
    }
}
