use std::fs;
use std::io::Write;

use review_lda::{load_reviews, write_token_table, Error, ParsePolicy, Pipeline, PipelineConfig};
use tempfile::{tempdir, NamedTempFile};

const REVIEWS: &str = r#"{"overall": 5.0, "reviewText": "Great game, lots of fun", "asin": "B0001"}
{"overall": 4.0, "reviewText": "Good value, fun with friends"}
{"overall": 1.0, "reviewText": "Terrible, broken on arrival"}
{"overall": 2.0, "reviewText": "Boring and a waste of money"}
{"reviewerID": "A1", "reviewText": "rating missing"}
{"overall": 5.0, "reviewText": "Love it :)"}
"#;

fn write_reviews(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn loads_from_file() {
    let file = write_reviews(REVIEWS);
    let (reviews, report) = load_reviews(file.path(), 5000, ParsePolicy::Skip).unwrap();

    assert_eq!(reviews.len(), 5);
    assert_eq!(report.incomplete, 1);
    assert_eq!(reviews[4].raw_text, "Love it :)");
    assert_eq!(reviews[4].document_id, 4);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.json");
    match load_reviews(&path, 10, ParsePolicy::Skip) {
        Err(Error::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected io error, got {:?}", other.map(|r| r.1)),
    }
}

#[test]
fn malformed_line_policy() {
    let file = write_reviews("{\"overall\": 5, \"reviewText\": \"fine\"}\n{oops\n");
    assert!(load_reviews(file.path(), 10, ParsePolicy::Skip).is_ok());
    assert!(matches!(
        load_reviews(file.path(), 10, ParsePolicy::FailFast),
        Err(Error::Parse { line: 2, .. })
    ));
}

#[test]
fn token_table_is_ndjson() {
    let file = write_reviews(REVIEWS);
    let mut config = PipelineConfig::default();
    config.forest.n_trees = 5;
    config.topics.iterations = 10;
    let report = Pipeline::new(config).unwrap().run(file.path()).unwrap();
    assert_eq!(report.load.as_ref().map(|l| l.kept), Some(5));

    let dir = tempdir().unwrap();
    let out = dir.path().join("tokens.ndjson");
    write_token_table(&out, &report.tokens).unwrap();

    let text = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), report.tokens.len());
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["document_id"], 0);
    assert_eq!(first["token"], "great");
    assert_eq!(first["lemma"], "great");
}
