// End-to-end tests for the lionel binary
use assert_cmd::Command;
use lionel::exit_codes;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn lionel() -> Command {
    Command::cargo_bin("lionel").unwrap()
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Config that runs shell procedures through `sh`
fn sh_config(dir: &Path) -> PathBuf {
    write(dir, "lionel.yaml", "interpreters:\n  bash:\n    executable: sh\n")
}

#[test]
fn test_languages_lists_builtins() {
    lionel()
        .arg("languages")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bash\t.sh"))
        .stdout(predicate::str::contains("Python\t.py"))
        .stdout(predicate::str::contains("oracle\t.sql"))
        .stdout(predicate::str::contains("postgres\t.sql"));
}

#[test]
fn test_sniff_prints_dialect() {
    let dir = TempDir::new().unwrap();
    let data = write(dir.path(), "sales.csv", "region\tamount\nnorth\t10\nsouth\t20\n");

    lionel()
        .arg("sniff")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("delimiter: '\\t'"))
        .stdout(predicate::str::contains("terminator: \\n"))
        .stdout(predicate::str::contains("header: true"));
}

#[test]
fn test_json_log_format() {
    let dir = TempDir::new().unwrap();
    let data = write(dir.path(), "sales.csv", "region,amount\nnorth,10\nsouth,20\n");

    lionel()
        .env_remove("RUST_LOG")
        .args(["--verbose", "--log-format", "json", "sniff"])
        .arg(&data)
        .assert()
        .success()
        .stderr(predicate::str::contains("\"fields\""))
        .stderr(predicate::str::contains("Sniffed dialect"));
}

#[test]
fn test_sniff_missing_file_names_path() {
    lionel()
        .args(["sniff", "/no/such/feed.csv"])
        .assert()
        .code(exit_codes::DATASET_ERROR)
        .stderr(predicate::str::contains("/no/such/feed.csv"));
}

#[test]
fn test_sniff_ambiguous_file_fails() {
    let dir = TempDir::new().unwrap();
    let data = write(dir.path(), "odd.csv", "a,b;c\nd;e,f\n");

    lionel()
        .arg("sniff")
        .arg(&data)
        .assert()
        .code(exit_codes::DIALECT_ERROR);
}

#[test]
fn test_preview_shows_rows_and_types() {
    let dir = TempDir::new().unwrap();
    let data = write(
        dir.path(),
        "people.csv",
        "id,name,joined\n1,ann,2024-01-01\n2,roberta,2024-02-11\n3,bob,2024-03-05\n",
    );

    lionel()
        .args(["preview", "--rows", "2"])
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("id,name,joined"))
        .stdout(predicate::str::contains("2,roberta,2024-02-11"))
        .stdout(predicate::str::contains("3,bob").not())
        .stdout(predicate::str::contains("id\tnumber"))
        .stdout(predicate::str::contains("name\tvarchar2(7)"))
        .stdout(predicate::str::contains("joined\tdate"));
}

#[test]
fn test_run_streams_procedure_output() {
    let dir = TempDir::new().unwrap();
    let config = sh_config(dir.path());
    let data = write(dir.path(), "orders.csv", "id,total\n1,10\n2,20\n");
    let script = write(
        dir.path(),
        "report.sh",
        "echo \"payload=$1\"\necho \"extra=$2\"\n",
    );

    lionel()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&script)
        .args(["--language", "Bash", "--dataset"])
        .arg(&data)
        .args(["--user", "dave", "--email", "dave@example.com", "--", "--verbose-report"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""table":"orders""#))
        .stdout(predicate::str::contains(r#""columns":["id","total"]"#))
        .stdout(predicate::str::contains(r#""user":"dave""#))
        .stdout(predicate::str::contains("extra=--verbose-report"));
}

#[test]
fn test_run_extension_mismatch_is_validation_error() {
    let dir = TempDir::new().unwrap();
    let data = write(dir.path(), "orders.csv", "id,total\n1,10\n");
    let script = write(dir.path(), "report.sh", "echo never\n");

    lionel()
        .arg("run")
        .arg(&script)
        .args(["--language", "Python", "--dataset"])
        .arg(&data)
        .assert()
        .code(exit_codes::VALIDATION_ERROR)
        .stdout(predicate::str::contains("never").not())
        .stderr(predicate::str::contains(".py"));
}

#[test]
fn test_run_unknown_language_lists_available() {
    let dir = TempDir::new().unwrap();
    let data = write(dir.path(), "orders.csv", "id,total\n1,10\n");

    lionel()
        .args(["run", "job.cbl", "--language", "cobol", "--dataset"])
        .arg(&data)
        .assert()
        .code(exit_codes::VALIDATION_ERROR)
        .stderr(predicate::str::contains("cobol"))
        .stderr(predicate::str::contains("Available languages"));
}

#[test]
fn test_run_failure_reports_exit_and_stderr() {
    let dir = TempDir::new().unwrap();
    let config = sh_config(dir.path());
    let data = write(dir.path(), "orders.csv", "id,total\n1,10\n");
    let script = write(dir.path(), "broken.sh", "echo working\necho 'no such table' >&2\nexit 2\n");

    lionel()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&script)
        .args(["--language", "Bash", "--dataset"])
        .arg(&data)
        .assert()
        .code(exit_codes::PROCEDURE_FAILURE)
        .stdout(predicate::str::contains("working"))
        .stderr(predicate::str::contains("no such table"));
}

#[test]
fn test_missing_config_file() {
    lionel()
        .args(["--config", "/no/such/lionel.yaml", "languages"])
        .assert()
        .code(exit_codes::CONFIG_ERROR)
        .stderr(predicate::str::contains("Help:"));
}

#[test]
fn test_invalid_config_value() {
    let dir = TempDir::new().unwrap();
    let config = write(dir.path(), "lionel.yaml", "execution:\n  max_concurrent: 0\n");

    lionel()
        .arg("--config")
        .arg(&config)
        .arg("languages")
        .assert()
        .code(exit_codes::CONFIG_ERROR)
        .stderr(predicate::str::contains("max_concurrent"));
}
