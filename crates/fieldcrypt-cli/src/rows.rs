//! Line-oriented row sealing and opening.
//!
//! Reads one [`RowRequest`] per input line, writes one [`RowResponse`] per
//! successful line and one [`ErrorResponse`] per failed line. A failed line
//! never stops the stream.

use std::io::{BufRead, Write};

use common::protocol::{ErrorResponse, RowRequest, RowResponse};
use common::{Disposition, FieldError};
use fieldcrypt::ColumnRegistry;
use tracing::{debug, warn};

/// Which way rows are transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Seal,
    Open,
}

/// Outcome of one run over an input stream.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub processed: usize,
    pub failed: usize,
    /// Most severe disposition among failed lines.
    pub worst: Option<Disposition>,
}

impl Summary {
    fn record(&mut self, disposition: Disposition) {
        self.failed += 1;
        self.worst = Some(match self.worst {
            Some(prev) if severity(prev) >= severity(disposition) => prev,
            _ => disposition,
        });
    }
}

fn severity(disposition: Disposition) -> u8 {
    match disposition {
        Disposition::Validation => 1,
        Disposition::Integrity => 2,
        Disposition::Fatal => 3,
    }
}

/// Transform every line of `input`, writing results to `out` and failures to `errors`.
///
/// # Errors
///
/// Only I/O failures on the streams themselves are returned.
pub fn process<R, W, E>(
    registry: &ColumnRegistry,
    direction: Direction,
    input: R,
    out: &mut W,
    errors: &mut E,
) -> std::io::Result<Summary>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let mut summary = Summary::default();

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        summary.processed += 1;
        let line_no = index + 1;

        match transform_line(registry, direction, &line) {
            Ok(response) => {
                serde_json::to_writer(&mut *out, &response)?;
                out.write_all(b"\n")?;
                debug!(line = line_no, entity = %response.entity, "row transformed");
            }
            Err(err) => {
                warn!(line = line_no, code = err.code(), error = %err, "row rejected");
                summary.record(err.disposition());
                serde_json::to_writer(&mut *errors, &ErrorResponse::from(&err))?;
                errors.write_all(b"\n")?;
            }
        }
    }

    out.flush()?;
    Ok(summary)
}

fn transform_line(
    registry: &ColumnRegistry,
    direction: Direction,
    line: &str,
) -> Result<RowResponse, FieldError> {
    // serde messages can echo the input line.
    let request: RowRequest = serde_json::from_str(line)
        .map_err(|_| FieldError::InvalidValue("malformed request line".into()))?;
    let mut row = request.row;
    match direction {
        Direction::Seal => registry.seal_row(&request.entity, &mut row)?,
        Direction::Open => registry.open_row(&request.entity, &mut row)?,
    }
    Ok(RowResponse {
        entity: request.entity,
        row,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldcrypt::{ColumnCodec, SymmetricCipher};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn registry(key: u8) -> ColumnRegistry {
        let cipher = SymmetricCipher::new(&[key; 32], &[3u8; 12]).unwrap();
        let mut registry = ColumnRegistry::new(Arc::new(cipher));
        registry
            .register("User", "username", ColumnCodec::Symmetric)
            .unwrap();
        registry
    }

    fn run(registry: &ColumnRegistry, direction: Direction, input: &str) -> (Summary, Vec<Value>, Vec<Value>) {
        let mut out = Vec::new();
        let mut errors = Vec::new();
        let summary = process(registry, direction, input.as_bytes(), &mut out, &mut errors).unwrap();
        let parse = |buf: Vec<u8>| {
            String::from_utf8(buf)
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect::<Vec<Value>>()
        };
        (summary, parse(out), parse(errors))
    }

    #[test]
    fn seal_then_open_restores_rows() {
        let registry = registry(1);
        let input = "{\"entity\":\"User\",\"row\":{\"id\":1,\"username\":\"alice\"}}\n\n";
        let (summary, sealed, errors) = run(&registry, Direction::Seal, input);
        assert_eq!(summary.processed, 1);
        assert!(errors.is_empty());
        assert_eq!(sealed[0]["row"]["id"], 1);
        assert_ne!(sealed[0]["row"]["username"], "alice");

        let line = format!("{}\n", sealed[0]);
        let (_, opened, _) = run(&registry, Direction::Open, &line);
        assert_eq!(opened[0]["row"], json!({"id": 1, "username": "alice"}));
    }

    #[test]
    fn bad_lines_are_reported_and_skipped() {
        let registry = registry(1);
        let input = concat!(
            "not json\n",
            "{\"entity\":\"Ghost\",\"row\":{}}\n",
            "{\"entity\":\"User\",\"row\":{\"username\":\"bob\"}}\n",
        );
        let (summary, out, errors) = run(&registry, Direction::Seal, input);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.worst, Some(Disposition::Validation));
        assert_eq!(out.len(), 1);
        assert_eq!(errors[0]["code"], "invalid_value");
        assert!(!errors[0]["message"].as_str().unwrap().contains("not json"));
    }

    #[test]
    fn wrong_key_is_integrity_failure() {
        let (_, sealed, _) = run(
            &registry(1),
            Direction::Seal,
            "{\"entity\":\"User\",\"row\":{\"username\":\"carol\"}}",
        );
        let line = sealed[0].to_string();
        let (summary, out, errors) = run(&registry(2), Direction::Open, &line);
        assert!(out.is_empty());
        assert_eq!(summary.worst, Some(Disposition::Integrity));
        assert_eq!(errors[0]["code"], "decryption_failed");
    }

    #[test]
    fn worst_disposition_wins() {
        let mut summary = Summary::default();
        summary.record(Disposition::Integrity);
        summary.record(Disposition::Validation);
        assert_eq!(summary.worst, Some(Disposition::Integrity));
        assert_eq!(summary.failed, 2);
    }
}
