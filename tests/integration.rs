use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn crag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("crag");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let repo = root.join("repo");
    fs::create_dir_all(repo.join("src")).unwrap();
    fs::write(
        repo.join("src/auth.js"),
        "const bcrypt = require('bcrypt');\n\
         \n\
         // Authenticate a user against the stored hash.\n\
         \n\
         function login(user, password) {\n\
         \x20 if (!user) {\n\
         \x20   return false;\n\
         \x20 }\n\
         \x20 const ok = bcrypt.compareSync(password, user.hash);\n\
         \x20 if (!ok) {\n\
         \x20   return false;\n\
         \x20 }\n\
         \x20 return true;\n\
         }\n",
    )
    .unwrap();
    fs::write(
        repo.join("README.md"),
        "# Shop\nA tiny shop backend.\n\n# Setup\nRun npm install, then npm start.\n",
    )
    .unwrap();
    fs::write(repo.join("package.json"), r#"{"name": "shop", "version": "1.0.0"}"#).unwrap();
    fs::create_dir_all(repo.join("node_modules/left-pad")).unwrap();
    fs::write(repo.join("node_modules/left-pad/index.js"), "module.exports = 1;\n").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/crag.sqlite"

[ingest]
batch_size = 5
cache_dir = "{}/data/.git-cache"

[server]
bind = "127.0.0.1:7349"
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("crag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn repo_dir(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("repo")
        .to_string_lossy()
        .to_string()
}

fn run_crag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = crag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run crag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_crag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/crag.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_crag(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_crag(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_dry_run_counts_chunks() {
    let (_tmp, config_path) = setup_test_env();
    let repo = repo_dir(&config_path);

    let (stdout, stderr, success) = run_crag(
        &config_path,
        &["ingest", &repo, "--repo", "shop", "--dry-run"],
    );
    assert!(success, "dry run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("3 files processed"), "stdout: {}", stdout);
    assert!(stdout.contains("file_overview"));
    assert!(stdout.contains("function"));
    assert!(stdout.contains("documentation"));
    assert!(stdout.contains("configuration"));
}

#[test]
fn test_ingest_dry_run_missing_source_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_crag(
        &config_path,
        &["ingest", "does/not/exist", "--repo", "shop", "--dry-run"],
    );
    assert!(!success);
    assert!(stderr.contains("neither a directory nor a git remote"));
}

#[test]
fn test_ingest_with_disabled_embeddings_completes_with_zero_indexed() {
    let (_tmp, config_path) = setup_test_env();
    let repo = repo_dir(&config_path);

    let (stdout, stderr, success) = run_crag(
        &config_path,
        &["ingest", &repo, "--repo", "shop", "--progress", "off"],
    );
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("indexed 0 of"), "stdout: {}", stdout);
    assert!(stdout.contains("from 3 files (0 skipped)"));

    let job_id = stdout.lines().next().unwrap().trim().to_string();
    let (job_out, _, success) = run_crag(&config_path, &["job", &job_id]);
    assert!(success);
    assert!(job_out.contains("\"status\": \"completed\""));
}

#[test]
fn test_job_unknown_id_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_crag(&config_path, &["job", "no-such-job"]);
    assert!(!success);
    assert!(stderr.contains("unknown job"));
}

#[test]
fn test_stats_on_empty_index() {
    let (_tmp, config_path) = setup_test_env();

    run_crag(&config_path, &["init"]);
    let (stdout, _, success) = run_crag(&config_path, &["stats", "--repo", "shop"]);
    assert!(success);
    assert!(stdout.contains("Documents:   0"));
}

#[test]
fn test_delete_empty_repository() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_crag(&config_path, &["delete", "shop"]);
    assert!(success);
    assert!(stdout.contains("Deleted 0 documents"));
}

#[test]
fn test_search_empty_query_rejected() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_crag(&config_path, &["search", "   "]);
    assert!(!success);
    assert!(stderr.contains("query must not be empty"));
}

#[test]
fn test_ask_fails_when_embeddings_disabled() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_crag(&config_path, &["ask", "How do I log in?"]);
    assert!(!success);
    assert!(stderr.contains("disabled"));
}

#[test]
fn test_invalid_batch_size_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(
        &bad,
        format!(
            "[db]\npath = \"{}/data/crag.sqlite\"\n\n[ingest]\nbatch_size = 50\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_crag(&bad, &["init"]);
    assert!(!success);
    assert!(stderr.contains("batch size must be between 5 and 10"));
}

#[test]
fn test_completions_without_config() {
    let output = Command::new(crag_binary())
        .args(["--config", "/nonexistent/crag.toml", "completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("crag"));
}
