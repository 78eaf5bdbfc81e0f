use anyhow::{Context, Result};
use std::path::PathBuf;
use testlog_ports::ResultReader;
use testlog_schema::result::ParsedTestResult;

/// Reads one [`ParsedTestResult`] JSON object per line.
///
/// This is the format the CLI ingests, and what upstream parsers (JUnit XML,
/// pytest reports, ...) are expected to emit.
pub struct JsonlResultReader {
    pub path: PathBuf,
}

impl JsonlResultReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResultReader for JsonlResultReader {
    fn read(&self) -> Result<Vec<ParsedTestResult>> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read {:?}", self.path))?;
        parse_results(&text).with_context(|| format!("parse {:?}", self.path))
    }
}

/// Parse JSONL text. Blank lines are skipped; errors name the 1-based line.
pub fn parse_results(text: &str) -> Result<Vec<ParsedTestResult>> {
    let mut out = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let result: ParsedTestResult = serde_json::from_str(line)
            .with_context(|| format!("parse test result json line {}", i + 1))?;
        out.push(result);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use testlog_schema::outcome::Outcome;

    #[test]
    fn minimal_line_uses_defaults() {
        let results = parse_results(r#"{"name":"test_foo","outcome":"passed"}"#).unwrap();
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.package, None);
        assert_eq!(r.duration_ms, 0);
        assert!(r.artifacts.is_empty());
    }

    #[test]
    fn full_line() {
        let line = r#"{"name":"test_foo","package":"project.tests","outcome":"failed","message":"boom","duration_ms":-3,"reruns":2,"artifacts":[{"name":"log","type":"text","base64":"aGk="}],"message_offsets":[{"label":"system-out","start_offset":123,"length":10}]}"#;
        let r = parse_results(line).unwrap().remove(0);
        assert_eq!(r.outcome, Outcome::Failed);
        assert_eq!(r.duration_ms, -3);
        assert_eq!(r.artifacts[0].media_type, "text");
        assert_eq!(r.message_offsets[0].start_offset, 123);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let text = "\n{\"name\":\"a\",\"outcome\":\"passed\"}\n   \n{\"name\":\"b\",\"outcome\":\"skipped\"}\n";
        let names: Vec<String> = parse_results(text)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn error_names_line() {
        let text = "{\"name\":\"a\",\"outcome\":\"passed\"}\n{\"name\":\"b\",\"outcome\":\"exploded\"}\n";
        let err = parse_results(text).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }
}
