//! Integration tests for the ula-admin CLI

use assert_cmd::Command;
use mock_server::{AppState, Backend};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Serve a fresh backend requiring `token`; returns the API base URL.
fn start_server(token: &str) -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();
    let state = AppState::new(Backend::default()).with_token(token);

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::serve(listener, state).await
        })
        .unwrap();
    });

    format!("http://{addr}/api/")
}

fn ula(api_url: &str, token_file: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ula-admin").unwrap();
    cmd.env_remove("ULA_API_URL")
        .env_remove("ULA_TOKEN_FILE")
        .args(["--api-url", api_url])
        .arg("--token-file")
        .arg(token_file);
    cmd
}

#[test]
fn test_help() {
    let mut cmd = Command::cargo_bin("ula-admin").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("collections"))
        .stdout(predicate::str::contains("add-unit"))
        .stdout(predicate::str::contains("--api-url"));
}

#[test]
fn test_version() {
    let mut cmd = Command::cargo_bin("ula-admin").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ula-admin"));
}

#[test]
fn test_add_unit_help() {
    let mut cmd = Command::cargo_bin("ula-admin").unwrap();
    cmd.args(["add-unit", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Add a unit"))
        .stdout(predicate::str::contains("--title"))
        .stdout(predicate::str::contains("--audio"));
}

#[test]
fn test_invalid_level() {
    let temp = TempDir::new().unwrap();
    ula("http://127.0.0.1:9/api/", &temp.path().join("token"))
        .args(["add-level", "Grammar101", "Essentials", "D1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown level"));
}

#[test]
fn test_signed_out_commands_are_gated() {
    let temp = TempDir::new().unwrap();
    // No token on disk, so no request is made.
    ula("http://127.0.0.1:9/api/", &temp.path().join("token"))
        .arg("collections")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not signed in"))
        .stderr(predicate::str::contains("ula-admin login"));
}

#[test]
fn test_logout_removes_token_file() {
    let temp = TempDir::new().unwrap();
    let token_file = temp.path().join("token");
    fs::write(&token_file, "secret").unwrap();

    ula("http://127.0.0.1:9/api/", &token_file)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed out."));
    assert!(!token_file.exists());
}

#[test]
fn test_rejected_login_is_not_stored() {
    let api = start_server("secret");
    let temp = TempDir::new().unwrap();
    let token_file = temp.path().join("ula").join("token");

    ula(&api, &token_file)
        .args(["login", "--token", "guess"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("token rejected"));
    assert!(!token_file.exists());
}

#[test]
fn test_content_workflow() {
    let api = start_server("secret");
    let temp = TempDir::new().unwrap();
    let token_file = temp.path().join("ula").join("token");
    let photo = temp.path().join("cover.png");
    fs::write(&photo, b"\x89PNG").unwrap();
    let track = temp.path().join("intro.mp3");
    fs::write(&track, b"ID3").unwrap();

    ula(&api, &token_file)
        .args(["login", "--token", "secret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as Super Admin"));
    assert_eq!(fs::read_to_string(&token_file).unwrap(), "secret");

    ula(&api, &token_file)
        .args(["create-collection", "--name", "Grammar101", "--photo"])
        .arg(&photo)
        .assert()
        .success()
        .stdout(predicate::str::contains("Collections (1)"))
        .stdout(predicate::str::contains("Grammar101  (0 books)"));

    ula(&api, &token_file)
        .args(["create-book", "Grammar101", "--name", "Essentials"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Collection Grammar101"))
        .stdout(predicate::str::contains("Essentials"));

    ula(&api, &token_file)
        .args(["add-level", "Grammar101", "Essentials", "A1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Book Essentials"))
        .stdout(predicate::str::contains("A1 ["));

    ula(&api, &token_file)
        .args(["add-unit", "Grammar101", "Essentials", "A1", "--title", "Unit 1", "--audio"])
        .arg(format!("Intro={}", track.display()))
        .assert()
        .success()
        .stdout(predicate::str::contains("- Unit 1 ["))
        .stdout(predicate::str::contains("(1 audio)"));

    ula(&api, &token_file)
        .args(["open", "/collections/Grammar101"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Essentials  [A1]"));

    ula(&api, &token_file)
        .args(["create-book", "Grammar101", "--name", "Essentials"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("create book failed"));

    ula(&api, &token_file)
        .args(["delete-book", "Grammar101", "Essentials"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No books yet."));

    ula(&api, &token_file)
        .args(["collection", "Nope"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Request rejected: resource not found"));
}
