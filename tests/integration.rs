use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docqa");
    path
}

/// Config pointing both services at a closed port so nothing leaves the machine.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = r#"[paths]
root = ".."
documents_dir = "documents"
persist_dir = "vector_db"

[chunking]
chunk_size = 800
chunk_overlap = 100

[retrieval]
k = 3
fetch_k = 10
lambda_mult = 0.6

[embedding]
provider = "ollama"
model = "nomic-embed-text"
url = "http://127.0.0.1:9"
max_retries = 0
timeout_secs = 5

[llm]
model = "llama3.1"
url = "http://127.0.0.1:9"
timeout_secs = 5
"#;

    let config_path = config_dir.join("docqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_folders_and_index() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docqa(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Initialized"));
    assert!(tmp.path().join("documents").is_dir());
    assert!(tmp.path().join("vector_db/index.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_docqa(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_docqa(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_index_with_no_documents() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docqa(&config_path, &["index"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("0 documents added"));
    assert!(stderr.contains("No new documents"));
}

#[test]
fn test_index_skips_unsupported_files() {
    let (tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);
    fs::write(tmp.path().join("documents/diagram.png"), b"\x89PNG").unwrap();

    let (stdout, stderr, success) = run_docqa(&config_path, &["index"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("1 unsupported"));
    assert!(stderr.contains("'png' files not supported"));
}

#[test]
fn test_index_reports_unreachable_embedding_service() {
    let (tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);
    fs::write(tmp.path().join("documents/notes.txt"), "Some notes.").unwrap();

    let (_, stderr, success) = run_docqa(&config_path, &["index"]);
    assert!(!success, "index should fail without an embedding service");
    assert!(stderr.contains("is Ollama running"), "stderr: {}", stderr);
}

#[test]
fn test_docs_lists_files() {
    let (tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);
    fs::write(tmp.path().join("documents/notes.txt"), "Some notes.").unwrap();
    fs::write(tmp.path().join("documents/diagram.png"), b"\x89PNG").unwrap();

    let (stdout, stderr, success) = run_docqa(&config_path, &["docs"]);
    assert!(success, "docs failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("notes.txt"));
    assert!(stdout.contains("pending"));
    assert!(stdout.contains("unsupported"));
}

#[test]
fn test_docs_empty() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_docqa(&config_path, &["docs"]);
    assert!(success);
    assert!(stdout.contains("No documents uploaded yet."));
}

#[test]
fn test_stats_on_empty_index() {
    let (_tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);

    let (stdout, stderr, success) = run_docqa(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Chunks:      0"));
    assert!(stdout.contains("MMR k=3 fetch_k=10 lambda=0.6"));
    assert!(stdout.contains("nomic-embed-text"));
}

#[test]
fn test_ask_without_services_fails_with_hint() {
    let (_tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);

    let (stdout, stderr, success) = run_docqa(&config_path, &["ask", "What is in my documents?"]);
    assert!(!success, "ask should fail: stdout={}", stdout);
    assert!(stderr.contains("ollama serve"), "stderr: {}", stderr);
}

#[test]
fn test_upload_rejects_missing_file() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("nowhere/report.pdf");

    let (_, _, success) = run_docqa(&config_path, &["upload", missing.to_str().unwrap()]);
    assert!(!success, "upload of a missing file should fail");
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(&bad, "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();

    let (_, stderr, success) = run_docqa(&bad, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let (tmp, _) = setup_test_env();
    let missing = tmp.path().join("config/absent.toml");

    let (_, stderr, success) = run_docqa(&missing, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
