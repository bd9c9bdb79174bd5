pub mod errors;
pub mod filter_config;
pub mod parser_config;
pub mod path_filter;
pub mod rewriter;
pub mod stream;
pub mod traits;
pub mod utils;

pub use errors::*;
pub use filter_config::*;
pub use parser_config::*;
pub use path_filter::*;
pub use rewriter::*;
pub use stream::*;
pub use traits::*;

use std::io::{BufRead, Write};

/// Result of a filter run as reported to the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Success(RewriteSummary),
    Failed {
        /// Offending input line, for parse failures
        line: Option<usize>,
        message: String,
    },
}

impl FilterOutcome {
    /// 0 on success, 1 on failure
    pub fn status(&self) -> i32 {
        match self {
            FilterOutcome::Success(_) => 0,
            FilterOutcome::Failed { .. } => 1,
        }
    }
}

/// Parse `input`, filter it according to `config` and write the result to
/// `output` as it is produced
pub fn filter_stream<R: BufRead, W: Write>(
    input: R,
    config: &FilterConfig,
    output: &mut W,
) -> FastImportResult<RewriteSummary> {
    filter_stream_with_config(input, config, ParserConfig::default(), output)
}

/// Like `filter_stream`, with explicit parser limits
///
/// Commands written before a failure stay in `output`; the sink is flushed
/// either way.
pub fn filter_stream_with_config<R: BufRead, W: Write>(
    input: R,
    config: &FilterConfig,
    parser_config: ParserConfig,
    output: &mut W,
) -> FastImportResult<RewriteSummary> {
    config.validate()?;

    let parser = StreamParser::with_config(input, parser_config);
    let mut rewritten = HistoryRewriter::from_config(config).rewrite_all(parser);

    let mut result = Ok(());
    for command in rewritten.by_ref() {
        if let Err(err) = command.and_then(|command| write_command(output, &command)) {
            result = Err(err);
            break;
        }
    }
    output
        .flush()
        .map_err(|e| FastImportError::io("flushing output", &e))?;
    result?;

    let summary = rewritten.into_summary();
    tracing::info!("{}", summary);
    Ok(summary)
}

/// Run a filter and fold any error into a `FilterOutcome`
pub fn run_filter<R: BufRead, W: Write>(input: R, config: &FilterConfig, output: &mut W) -> FilterOutcome {
    match filter_stream(input, config, output) {
        Ok(summary) => FilterOutcome::Success(summary),
        Err(FastImportError::Parse(err)) => FilterOutcome::Failed {
            line: Some(err.line),
            message: err.reason(),
        },
        Err(err) => FilterOutcome::Failed {
            line: None,
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &[u8] = b"blob
mark :1
data 4
foo

commit refs/heads/master
mark :2
committer Dev <dev@example.com> 1700000000 +0000
data 6
first
M 100644 :1 lib/foo.txt
M 100644 :1 README

";

    #[test]
    fn test_filter_stream_writes_rewritten_commands() {
        let config = FilterConfig {
            include: vec![PathSpec::parse("lib/")],
            ..Default::default()
        };
        let mut out = Vec::new();
        let summary = filter_stream(STREAM, &config, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("M 100644 :1 foo.txt\n"));
        assert!(!text.contains("README"));
        assert_eq!(summary.commits_emitted, 1);
        assert_eq!(summary.file_changes_dropped, 1);
    }

    #[test]
    fn test_run_filter_reports_parse_failure() {
        let mut input = STREAM.to_vec();
        input.extend_from_slice(b"bogus\n");
        let mut out = Vec::new();

        let outcome = run_filter(&input[..], &FilterConfig::default(), &mut out);
        assert_eq!(outcome.status(), 1);
        match outcome {
            FilterOutcome::Failed { line, message } => {
                assert_eq!(line, Some(14));
                assert!(message.contains("bogus"));
            },
            other => panic!("Expected failure, got {:?}", other),
        }
        // both commands before the bad line were written
        assert!(String::from_utf8(out).unwrap().contains("commit refs/heads/master"));
    }

    #[test]
    fn test_run_filter_rejects_bad_config() {
        let config = FilterConfig {
            include: vec![PathSpec::parse("/abs/")],
            ..Default::default()
        };
        let mut out = Vec::new();
        let outcome = run_filter(STREAM, &config, &mut out);
        assert_eq!(outcome.status(), 1);
        assert!(matches!(outcome, FilterOutcome::Failed { line: None, .. }));
        assert!(out.is_empty());
    }

    #[test]
    fn test_identity_filter_round_trips() {
        let mut out = Vec::new();
        let outcome = run_filter(STREAM, &FilterConfig::default(), &mut out);
        assert_eq!(outcome.status(), 0);
        assert_eq!(parse_commands(&out).unwrap(), parse_commands(STREAM).unwrap());
    }
}
