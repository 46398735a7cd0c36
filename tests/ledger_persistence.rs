// tests/ledger_persistence.rs
use arxiv_digest::error::LedgerError;
use arxiv_digest::{parse_ordinal, DedupLedger};

const A: &str = "http://arxiv.org/abs/2403.10001v1";
const B: &str = "http://arxiv.org/abs/2403.10007v2";

#[test]
fn inserts_survive_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("paper_history.json");

    let ledger = DedupLedger::load(&path).unwrap();
    assert!(ledger.insert("nlp", A).unwrap());
    assert!(ledger.insert("vision", B).unwrap());
    drop(ledger);

    let reloaded = DedupLedger::load(&path).unwrap();
    assert!(reloaded.contains("nlp", A));
    assert!(reloaded.contains("vision", B));
    assert!(!reloaded.contains("nlp", B));
    assert!(!path.with_extension("json.tmp").exists());
}

#[test]
fn file_is_a_topic_keyed_json_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paper_history.json");
    let ledger = DedupLedger::load(&path).unwrap();
    ledger.insert("nlp", B).unwrap();
    ledger.insert("nlp", A).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(v["nlp"], serde_json::json!([A, B]));
}

#[test]
fn duplicate_insert_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = DedupLedger::load(dir.path().join("h.json")).unwrap();
    assert!(ledger.insert("nlp", A).unwrap());
    assert!(!ledger.insert("nlp", A).unwrap());
    assert_eq!(ledger.len("nlp"), 1);
}

#[test]
fn missing_file_is_an_empty_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = DedupLedger::load(dir.path().join("absent.json")).unwrap();
    assert!(ledger.is_empty("nlp"));
    assert!(ledger.boundary("nlp").is_open());
}

#[test]
fn corrupt_file_is_reported_not_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paper_history.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = DedupLedger::load(&path).err().expect("corrupt ledger must not load");
    assert!(matches!(err, LedgerError::Corrupt { .. }));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

#[test]
fn boundary_spans_stored_ordinals() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = DedupLedger::load(dir.path().join("h.json")).unwrap();
    ledger.insert("nlp", B).unwrap();
    ledger.insert("nlp", A).unwrap();

    let b = ledger.boundary("nlp");
    assert_eq!(b.latest, parse_ordinal(B).unwrap());
    assert_eq!(b.oldest, parse_ordinal(A).unwrap());
    assert!(b.covers(2403.10004));
    assert!(!b.covers(2403.10008));
}

#[test]
fn boundary_only_widens_as_ids_are_added() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = DedupLedger::load(dir.path().join("h.json")).unwrap();
    ledger.insert("nlp", "http://arxiv.org/abs/2403.10005v1").unwrap();
    let before = ledger.boundary("nlp");

    ledger.insert("nlp", "http://arxiv.org/abs/2403.10009v1").unwrap();
    ledger.insert("nlp", "http://arxiv.org/abs/2403.10002v1").unwrap();
    let after = ledger.boundary("nlp");

    assert!(after.latest >= before.latest);
    assert!(after.oldest <= before.oldest);
}

#[test]
fn unparsable_id_opens_the_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = DedupLedger::load(dir.path().join("h.json")).unwrap();
    ledger.insert("nlp", A).unwrap();
    ledger.insert("nlp", "https://example.org/papers/draft").unwrap();

    assert!(ledger.boundary("nlp").is_open());
    // membership still works
    assert!(ledger.contains("nlp", A));
}
