//! Integration tests for the `hukum` binary.

mod common;

use common::{hukum_cmd, write_documents, write_offline_config};
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Help and diagnostics
// ============================================================================

#[test]
fn test_help_lists_commands() {
    hukum_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("index"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("tokenize"));
}

#[test]
fn test_tokenize_collapses_legal_references() {
    hukum_cmd()
        .args(["tokenize", "Pasal 1365 KUHPerdata jo. UU No. 40", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"pasal_1365\""))
        .stdout(predicate::str::contains("\"uu_40\""));
}

#[test]
fn test_tokenize_human_output_counts_tokens() {
    hukum_cmd()
        .args(["tokenize", "ayat (2) huruf b"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ayat_2 huruf"))
        .stdout(predicate::str::contains("2 tokens"));
}

// ============================================================================
// Index lifecycle
// ============================================================================

#[test]
fn test_index_then_search() {
    let temp = TempDir::new().unwrap();
    let config = write_offline_config(temp.path());
    let docs = write_documents(temp.path());

    hukum_cmd()
        .arg("--config")
        .arg(&config)
        .arg("index")
        .arg(&docs)
        .assert()
        .success()
        .stdout(predicate::str::contains("[ok] Indexed"))
        .stdout(predicate::str::contains("skipped (lexical-only)"));

    hukum_cmd()
        .arg("--config")
        .arg(&config)
        .args(["search", "perbuatan melanggar hukum", "--method", "bm25"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kuhperdata.txt"));

    hukum_cmd()
        .arg("--config")
        .arg(&config)
        .args(["search", "perseroan terbatas", "--method", "bm25", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Perseroan Terbatas"))
        .stdout(predicate::str::contains("\"bm25\""));
}

#[test]
fn test_stats_reports_indexed_documents() {
    let temp = TempDir::new().unwrap();
    let config = write_offline_config(temp.path());
    let docs = write_documents(temp.path());

    hukum_cmd()
        .arg("--config")
        .arg(&config)
        .arg("index")
        .arg(&docs)
        .assert()
        .success();

    hukum_cmd()
        .arg("--config")
        .arg(&config)
        .args(["stats", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"document_count\": 2"))
        .stdout(predicate::str::contains("\"chunkCount\": 2"));
}

#[test]
fn test_clear_empties_index() {
    let temp = TempDir::new().unwrap();
    let config = write_offline_config(temp.path());
    let docs = write_documents(temp.path());

    hukum_cmd()
        .arg("--config")
        .arg(&config)
        .arg("index")
        .arg(&docs)
        .assert()
        .success();

    hukum_cmd()
        .arg("--config")
        .arg(&config)
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("[ok] Cleared lexical index"));

    hukum_cmd()
        .arg("--config")
        .arg(&config)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Documents: 0"))
        .stdout(predicate::str::contains("not saved"));
}

#[test]
fn test_index_jsonl_records() {
    let temp = TempDir::new().unwrap();
    let config = write_offline_config(temp.path());
    let records = temp.path().join("chunks.jsonl");
    std::fs::write(
        &records,
        concat!(
            r#"{"id": "putusan_1", "content": "Menyatakan debitor dalam keadaan pailit.", "metadata": {"source": "putusan.pdf", "page": 3}}"#,
            "\n",
            r#"{"content": "Menolak permohonan kasasi pemohon.", "metadata": {"source": "putusan.pdf", "page": 9}}"#,
            "\n"
        ),
    )
    .unwrap();

    hukum_cmd()
        .arg("--config")
        .arg(&config)
        .arg("index")
        .arg(&records)
        .arg("--jsonl")
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexed 2 chunks"));

    hukum_cmd()
        .arg("--config")
        .arg(&config)
        .args(["search", "debitor pailit", "--method", "bm25", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("putusan_1"));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_unknown_search_method_fails() {
    let temp = TempDir::new().unwrap();
    let config = write_offline_config(temp.path());

    hukum_cmd()
        .arg("--config")
        .arg(&config)
        .args(["search", "pasal 1365", "--method", "fuzzy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown search method 'fuzzy'"));
}

#[test]
fn test_index_missing_path_fails() {
    let temp = TempDir::new().unwrap();
    let config = write_offline_config(temp.path());

    hukum_cmd()
        .arg("--config")
        .arg(&config)
        .arg("index")
        .arg(temp.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("[err]"));
}

#[test]
fn test_ask_without_generation_server_fails_with_hint() {
    let temp = TempDir::new().unwrap();
    let config = write_offline_config(temp.path());

    hukum_cmd()
        .arg("--config")
        .arg(&config)
        .args(["ask", "pasal 1365"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("generation server is not reachable"))
        .stderr(predicate::str::contains("Hint:"));
}

#[test]
fn test_invalid_config_fails() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.yaml");
    std::fs::write(&config, "context:\n  maxChars: 50\n").unwrap();

    hukum_cmd()
        .arg("--config")
        .arg(&config)
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"))
        .stderr(predicate::str::contains("maxChars"));
}
