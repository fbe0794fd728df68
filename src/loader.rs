use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

use crate::config::ParsePolicy;
use crate::error::{Error, Result};
use crate::Review;

// Only `overall` and `reviewText` are read; records missing either are excluded.
#[derive(Deserialize)]
struct RawRecord {
    overall: Option<f64>,
    #[serde(rename = "reviewText")]
    review_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub lines: usize,
    pub malformed: usize,
    pub incomplete: usize,
    pub kept: usize,
}

pub fn load_reviews<P: AsRef<Path>>(
    path: P,
    limit: usize,
    policy: ParsePolicy,
) -> Result<(Vec<Review>, LoadReport)> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    read_reviews(BufReader::new(file), limit, policy).map_err(|e| match e {
        Error::Io { source, .. } => Error::io(path, source),
        other => other,
    })
}

/// Reads up to `limit` complete records; `document_id` is the index among
/// the records kept.
pub fn read_reviews<R: BufRead>(
    mut reader: R,
    limit: usize,
    policy: ParsePolicy,
) -> Result<(Vec<Review>, LoadReport)> {
    let mut reviews = Vec::new();
    let mut report = LoadReport::default();

    let mut buf = Vec::new();
    let mut line_no = 0;

    while reviews.len() < limit {
        buf.clear();
        if reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| Error::io("<input>", e))?
            == 0
        {
            break;
        }
        line_no += 1;

        let parsed = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => serde_json::from_str::<RawRecord>(line).map_err(|source| Error::Parse {
                line: line_no,
                source,
            }),
            Err(e) => Err(Error::InvalidRecord {
                line: line_no,
                reason: format!("not valid UTF-8: {}", e),
            }),
        };
        report.lines += 1;

        let record = match parsed {
            Ok(record) => record,
            Err(err) => match policy {
                ParsePolicy::FailFast => return Err(err),
                ParsePolicy::Skip => {
                    warn!("skipping: {}", err);
                    report.malformed += 1;
                    continue;
                }
            },
        };

        match complete(record, line_no) {
            Ok((rating, raw_text)) => {
                reviews.push(Review {
                    document_id: reviews.len(),
                    rating,
                    raw_text,
                });
            }
            Err(err) => {
                warn!("excluding: {}", err);
                report.incomplete += 1;
            }
        }
    }

    report.kept = reviews.len();
    info!(
        "loaded {} reviews ({} malformed, {} incomplete)",
        report.kept, report.malformed, report.incomplete
    );

    Ok((reviews, report))
}

fn complete(record: RawRecord, line: usize) -> Result<(u8, String)> {
    let invalid = |reason: &str| Error::InvalidRecord {
        line,
        reason: reason.to_string(),
    };

    let overall = record.overall.ok_or_else(|| invalid("missing overall"))?;
    let text = record.review_text.ok_or_else(|| invalid("missing reviewText"))?;

    if overall.fract() != 0.0 || !(1.0..=5.0).contains(&overall) {
        return Err(invalid(&format!("rating {} is not an integer in 1..=5", overall)));
    }

    Ok((overall as u8, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINES: &str = r#"{"overall": 5.0, "reviewText": "Great game", "asin": "B01"}
{"overall": 2, "reviewText": "Meh"}
not json at all
{"overall": 3.0}
{"reviewText": "no rating"}

{"overall": 4.5, "reviewText": "half star"}
{"overall": 1.0, "reviewText": "Broken", "vote": "3", "style": {"Format:": " Disc"}}
"#;

    #[test]
    fn skips_bad_lines() {
        let (reviews, report) = read_reviews(LINES.as_bytes(), 100, ParsePolicy::Skip).unwrap();

        assert_eq!(reviews.len(), 3);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.incomplete, 3);
        assert_eq!(report.kept, 3);
        assert_eq!(report.lines, 7);

        let ids: Vec<usize> = reviews.iter().map(|r| r.document_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(reviews[0].rating, 5);
        assert_eq!(reviews[2].raw_text, "Broken");
    }

    #[test]
    fn truncates_after_valid_records() {
        let (reviews, _) = read_reviews(LINES.as_bytes(), 2, ParsePolicy::Skip).unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[1].rating, 2);
    }

    #[test]
    fn invalid_utf8_line_follows_policy() {
        let mut input = b"{\"overall\": 5, \"reviewText\": \"fine\"}\n".to_vec();
        input.extend_from_slice(b"{\"overall\": 4, \"reviewText\": \"caf\xff\"}\n");
        input.extend_from_slice(b"{\"overall\": 1, \"reviewText\": \"bad\"}");

        let (reviews, report) = read_reviews(&input[..], 100, ParsePolicy::Skip).unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.lines, 3);
        assert_eq!(reviews[1].raw_text, "bad");
        assert_eq!(reviews[1].document_id, 1);

        match read_reviews(&input[..], 100, ParsePolicy::FailFast) {
            Err(Error::InvalidRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected invalid record, got {:?}", other.map(|r| r.1)),
        }
    }

    #[test]
    fn fail_fast_reports_line() {
        match read_reviews(LINES.as_bytes(), 100, ParsePolicy::FailFast) {
            Err(Error::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {:?}", other.map(|r| r.1)),
        }
    }
}
