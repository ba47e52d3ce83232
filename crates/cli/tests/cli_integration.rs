//! CLI integration tests for the `rgpl` binary.
//!
//! Every test runs in its own temporary directory with the `RGPL_*`
//! environment cleared. Offline tests point at a closed local port; online
//! tests start an axum server on a background thread.

use std::fs;
use std::sync::{Arc, Mutex};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Nothing listens here; connections are refused at once.
const UNREACHABLE: &str = "http://127.0.0.1:1";

/// Helper: an `rgpl` command isolated in `dir`, talking to `server`.
fn rgpl_at(dir: &TempDir, server: &str) -> Command {
    let mut cmd = cargo_bin_cmd!("rgpl");
    cmd.current_dir(dir.path())
        .env_remove("RGPL_SERVER_URL")
        .env_remove("RGPL_DATA_DIR")
        .env_remove("RGPL_AUTH_TOKEN")
        .env_remove("RGPL_LOG")
        .arg("--server")
        .arg(server)
        .arg("--data-dir")
        .arg(dir.path().join("data"));
    cmd
}

fn rgpl(dir: &TempDir) -> Command {
    rgpl_at(dir, UNREACHABLE)
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_lists_commands() {
    cargo_bin_cmd!("rgpl")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("capture"))
        .stdout(predicate::str::contains("force-sync"))
        .stdout(predicate::str::contains("import-zones"))
        .stdout(predicate::str::contains("worker"));
}

#[test]
fn version_flag() {
    cargo_bin_cmd!("rgpl")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rgpl"));
}

// ──────────────────────────────────────────────
// 2. Offline capture and queue
// ──────────────────────────────────────────────

#[test]
fn offline_capture_is_queued() {
    let dir = TempDir::new().unwrap();
    rgpl(&dir)
        .args(["capture", "--field", "nom=Dupont", "--field", "quartier=Akwa"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queued locally as #1"))
        .stdout(predicate::str::contains("not sent"));

    assert!(dir.path().join("data").join("rgpl-db.sqlite3").exists());

    rgpl(&dir)
        .args(["queue", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#1  nom=Dupont  quartier=Akwa"))
        .stdout(predicate::str::contains("1 record(s) pending"));
}

#[test]
fn capture_json_output() {
    let dir = TempDir::new().unwrap();
    let output = rgpl(&dir)
        .args(["--output", "json", "capture", "--field", "nom=Mba"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let body = stdout_json(&output);
    assert_eq!(body["queued"], 1);
    assert_eq!(body["sent"], false);
    assert_eq!(body["fields"], 1);
    assert!(body["send_error"].is_string());
}

#[test]
fn capture_embeds_file_as_data_url() {
    let dir = TempDir::new().unwrap();
    let photo = dir.path().join("site.png");
    fs::write(&photo, [9u8, 8, 7]).unwrap();

    rgpl(&dir)
        .args(["capture", "--field", "nom=Dupont", "--file"])
        .arg(format!("photo={}", photo.display()))
        .args(["--file", "plan="])
        .assert()
        .success();

    let output = rgpl(&dir)
        .args(["--output", "json", "queue", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let body = stdout_json(&output);
    assert_eq!(body["count"], 1);
    let record = &body["records"][0]["record"];
    assert_eq!(record["photo"]["name"], "site.png");
    assert_eq!(record["photo"]["type"], "image/png");
    assert_eq!(record["photo"]["data"], "data:image/png;base64,CQgH");
    // An input with no file chosen is kept as an empty string.
    assert_eq!(record["plan"], "");
}

#[test]
fn unreadable_file_aborts_capture() {
    let dir = TempDir::new().unwrap();
    rgpl(&dir)
        .args(["capture", "--field", "nom=Dupont", "--file", "photo=/no/such/file.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("capture failed"));

    rgpl(&dir)
        .args(["queue", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queue is empty"));
}

#[test]
fn malformed_field_is_rejected() {
    let dir = TempDir::new().unwrap();
    rgpl(&dir)
        .args(["capture", "--field", "nom"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected KEY=VALUE"));
}

#[test]
fn ephemeral_queue_does_not_touch_disk() {
    let dir = TempDir::new().unwrap();
    rgpl(&dir)
        .args(["--ephemeral", "capture", "--field", "nom=Dupont"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queued locally as #1"));
    assert!(!dir.path().join("data").join("rgpl-db.sqlite3").exists());
}

// ──────────────────────────────────────────────
// 3. Offline drain, status, force sync, zones
// ──────────────────────────────────────────────

#[test]
fn offline_drain_clears_queue() {
    let dir = TempDir::new().unwrap();
    for nom in ["nom=Dupont", "nom=Mba"] {
        rgpl(&dir).args(["capture", "--field", nom]).assert().success();
    }

    rgpl(&dir)
        .arg("drain")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "attempted 2, delivered 0, failed 2, cleared 2",
        ));

    rgpl(&dir)
        .args(["queue", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queue is empty"));
}

#[test]
fn offline_status_lists_local_rows() {
    let dir = TempDir::new().unwrap();
    rgpl(&dir)
        .args(["capture", "--field", "nom=Dupont", "--field", "quartier=Akwa"])
        .assert()
        .success();

    rgpl(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Connexion : 🔴 Hors ligne"))
        .stdout(predicate::str::contains("ID\tNom\tQuartier\tDate"))
        .stdout(predicate::str::contains("L1\tDupont\tAkwa\t"))
        .stdout(predicate::str::contains("Aucune donnée serveur").not());
}

#[test]
fn offline_status_with_empty_queue() {
    let dir = TempDir::new().unwrap();
    let output = rgpl(&dir)
        .args(["--output", "json", "status"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let body = stdout_json(&output);
    assert_eq!(body["connection"], "🔴 Hors ligne");
    assert_eq!(body["local"], json!({"state": "rows", "detail": []}));
    assert_eq!(body["server"]["state"], "unavailable");
}

#[test]
fn offline_force_sync_alerts_and_fails() {
    let dir = TempDir::new().unwrap();
    rgpl(&dir)
        .arg("force-sync")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Échec de la synchronisation ❌"))
        .stderr(predicate::str::contains("force sync failed"));
}

#[test]
fn json_errors_go_to_stderr() {
    let dir = TempDir::new().unwrap();
    rgpl(&dir)
        .args(["--output", "json", "force-sync"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""))
        .stderr(predicate::str::contains("\"alert\""));
}

#[test]
fn import_zones_without_file() {
    let dir = TempDir::new().unwrap();
    rgpl(&dir)
        .arg("import-zones")
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "Veuillez sélectionner un fichier CSV ou Excel.",
        ));
}

#[test]
fn import_zones_offline() {
    let dir = TempDir::new().unwrap();
    let zones = dir.path().join("zones.csv");
    fs::write(&zones, "nom,geojson\n").unwrap();
    rgpl(&dir)
        .arg("import-zones")
        .arg(&zones)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Échec de l'import des zones ❌"));
}

// ──────────────────────────────────────────────
// 4. Configuration
// ──────────────────────────────────────────────

#[test]
fn config_file_in_working_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("rgpl.toml"), "server_url = \"ftp://nope\"\n").unwrap();
    // --server wins over the file, so validation passes.
    rgpl(&dir).args(["queue", "list"]).assert().success();

    cargo_bin_cmd!("rgpl")
        .current_dir(dir.path())
        .env_remove("RGPL_SERVER_URL")
        .args(["queue", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config error"))
        .stderr(predicate::str::contains("server_url"));
}

#[test]
fn unparsable_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(&path, "[queue\n").unwrap();
    rgpl(&dir)
        .arg("--config")
        .arg(&path)
        .args(["queue", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not parse"));
}

#[test]
fn data_dir_from_environment() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("from-env");
    cargo_bin_cmd!("rgpl")
        .current_dir(dir.path())
        .env("RGPL_DATA_DIR", &data)
        .env("RGPL_SERVER_URL", UNREACHABLE)
        .args(["capture", "--field", "nom=Dupont"])
        .assert()
        .success();
    assert!(data.join("rgpl-db.sqlite3").exists());
}

// ──────────────────────────────────────────────
// 5. Cache and worker
// ──────────────────────────────────────────────

#[test]
fn cache_list_when_empty() {
    let dir = TempDir::new().unwrap();
    rgpl(&dir)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no snapshot installed"));
}

#[test]
fn cache_activate_requires_install() {
    let dir = TempDir::new().unwrap();
    rgpl(&dir)
        .args(["cache", "activate", "--version", "rgpl-cache-v9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no installed cache named 'rgpl-cache-v9'"));
}

#[test]
fn worker_once_offline_installs_and_activates() {
    let dir = TempDir::new().unwrap();
    rgpl(&dir)
        .args(["worker", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("installed rgpl-cache-v2: 0 cached"))
        .stdout(predicate::str::contains("activated rgpl-cache-v2"));

    rgpl(&dir)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* rgpl-cache-v2"));

    // A second start finds the version already active.
    rgpl(&dir)
        .args(["worker", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already active"));
}

// ──────────────────────────────────────────────
// 6. Against a live server
// ──────────────────────────────────────────────

#[derive(Default)]
struct Seen {
    sync: Vec<Value>,
    force_sync: Vec<Value>,
}

type Shared = Arc<Mutex<Seen>>;

async fn sync(State(seen): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    seen.lock().unwrap().sync.push(body);
    Json(json!({"ok": true}))
}

async fn force_sync(State(seen): State<Shared>, body: Bytes) -> Json<Value> {
    if body.is_empty() {
        return Json(json!({"message": "Synchronisation terminée"}));
    }
    let record: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    seen.lock().unwrap().force_sync.push(record);
    Json(json!({"message": "ok"}))
}

async fn sync_status() -> Json<Value> {
    Json(json!({
        "status": "🟢 Serveur OK",
        "pending": [{"nom": "Mba", "quartier": "Bali", "date": "2024-05-01"}]
    }))
}

async fn page() -> &'static str {
    "<html>rgpl</html>"
}

/// Serve on a background thread for the rest of the test process.
fn spawn_server() -> (String, Shared) {
    let seen = Shared::default();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/", get(page))
        .route("/login", get(page))
        .route("/api/sync", post(sync))
        .route("/api/force-sync", post(force_sync))
        .route("/api/sync-status", get(sync_status))
        .with_state(seen.clone());
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    (format!("http://{addr}"), seen)
}

#[test]
fn online_capture_status_and_drain() {
    let (server, seen) = spawn_server();
    let dir = TempDir::new().unwrap();

    rgpl_at(&dir, &server)
        .args(["capture", "--field", "nom=Dupont", "--field", "quartier=Akwa"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queued locally as #1"))
        .stdout(predicate::str::contains("sent to server"));
    assert_eq!(
        seen.lock().unwrap().force_sync,
        vec![json!({"nom": "Dupont", "quartier": "Akwa"})]
    );

    rgpl_at(&dir, &server)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Connexion : 🟢 Serveur OK"))
        .stdout(predicate::str::contains("L1\tDupont\tAkwa"))
        .stdout(predicate::str::contains("S1\tMba\tBali\t2024-05-01"));

    // Delivered records stay queued and are sent again by the drain.
    rgpl_at(&dir, &server)
        .arg("drain")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "attempted 1, delivered 1, failed 0, cleared 1",
        ));
    assert_eq!(seen.lock().unwrap().sync.len(), 1);
}

#[test]
fn online_force_sync_shows_message_and_status() {
    let (server, _seen) = spawn_server();
    let dir = TempDir::new().unwrap();
    rgpl_at(&dir, &server)
        .arg("force-sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("Synchronisation terminée"))
        .stdout(predicate::str::contains("Aucune donnée locale en attente"))
        .stdout(predicate::str::contains("S1\tMba"));
}

#[test]
fn online_cache_install_activate_show() {
    let (server, _seen) = spawn_server();
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("rgpl.toml");
    fs::write(
        &config,
        "[cache]\nversion = \"site-v1\"\nmanifest = [\"/\", \"/login\", \"/missing\"]\n",
    )
    .unwrap();

    rgpl_at(&dir, &server)
        .args(["cache", "install"])
        .assert()
        .success()
        .stdout(predicate::str::contains("installed site-v1: 2 cached, 1 skipped"))
        .stdout(predicate::str::contains("skipped /missing"));

    rgpl_at(&dir, &server)
        .args(["cache", "activate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("activated site-v1"));

    rgpl_at(&dir, &server)
        .args(["cache", "show", "/login"])
        .assert()
        .success()
        .stdout(predicate::str::diff("<html>rgpl</html>"));

    rgpl_at(&dir, &server)
        .args(["cache", "show", "/missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no cached response for '/missing'"));
}

#[test]
fn worker_sync_now_drains_queue() {
    let (server, seen) = spawn_server();
    let dir = TempDir::new().unwrap();
    rgpl(&dir)
        .args(["capture", "--field", "nom=Dupont"])
        .assert()
        .success();

    rgpl_at(&dir, &server)
        .args(["worker", "--once", "--sync-now"])
        .assert()
        .success()
        .stdout(predicate::str::contains("synced: delivered 1, failed 0, cleared 1"));
    assert_eq!(seen.lock().unwrap().sync, vec![json!({"nom": "Dupont"})]);
}
