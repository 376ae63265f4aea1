use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("burrow")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("burrow")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Log every link decision")
                .required(false)
                .conflicts_with("quiet"),
        )
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl a restricted set of domains, avoiding crawler traps, and write an \
                analytics report.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("A seed URL to start from (repeatable)")
                        .value_parser(clap::value_parser!(Url))
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(-S --"seeds-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of seed URLs")
                        .value_parser(clap::value_parser!(String))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-d --"scope" <DOMAIN>)
                        .required(true)
                        .help(
                            "Allowed domain; the domain and all of its subdomains are in scope \
                        (repeatable)",
                        )
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(-t --"workers" <NUM_WORKERS>)
                        .required(false)
                        .help("The number of async workers in the worker pool.")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("4"),
                )
                .arg(
                    arg!(--"politeness-ms" <MILLIS>)
                        .required(false)
                        .help("Minimum delay between two fetches to the same host")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("500"),
                )
                .arg(
                    arg!(--"max-pages" <NUM>)
                        .required(false)
                        .help("Stop after this many pages have been fetched")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"max-seconds" <SECONDS>)
                        .required(false)
                        .help("Stop after this much wall-clock time")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"max-path-length" <CHARS>)
                        .required(false)
                        .help("Reject URLs whose path is longer than this")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("100"),
                )
                .arg(
                    arg!(--"segment-repeats" <NUM>)
                        .required(false)
                        .help("Reject paths where one segment occurs this many times")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("3"),
                )
                .arg(
                    arg!(--"query-repeats" <NUM>)
                        .required(false)
                        .help("Reject queries where one parameter occurs this many times")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("2"),
                )
                .arg(
                    arg!(--"revisit-threshold" <NUM>)
                        .required(false)
                        .help("Reject URLs discovered this many times")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("50"),
                )
                .arg(
                    arg!(--"calendar-depth" <NUM>)
                        .required(false)
                        .help("Reject paths with this many consecutive numeric segments")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"stopwords" <PATH>)
                        .required(false)
                        .help("Newline-delimited stop-word list (default: bundled English list)")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--"cache-dir" <PATH>)
                        .required(false)
                        .help("Directory to store fetched pages in")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Where to write the analytics report")
                        .value_parser(clap::value_parser!(String))
                        .default_value("analytics.txt"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_crawl_defaults() {
        let matches = command_argument_builder()
            .try_get_matches_from(["burrow", "crawl", "--scope", "ics.uci.edu"])
            .unwrap();
        let (_, crawl) = matches.subcommand().unwrap();
        assert_eq!(crawl.get_one::<usize>("workers"), Some(&4));
        assert_eq!(crawl.get_one::<String>("output").map(String::as_str), Some("analytics.txt"));
        assert_eq!(crawl.get_one::<u32>("revisit-threshold"), Some(&50));
        assert!(crawl.get_one::<usize>("calendar-depth").is_none());
    }

    #[test]
    fn test_crawl_requires_scope() {
        let result = command_argument_builder().try_get_matches_from([
            "burrow",
            "crawl",
            "--url",
            "https://www.ics.uci.edu/",
        ]);
        assert!(result.is_err());
    }
}
