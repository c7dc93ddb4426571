//! Integration tests for the `argile serve` HTTP API.
//!
//! Each test starts the server as a child process on a unique port,
//! makes HTTP requests, and verifies the responses. No DS token is
//! configured, so every dossier reads as "not found" on DS.

use std::io::Read;
use std::net::TcpStream;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

/// Atomic port counter to avoid port conflicts between parallel tests.
/// Base port is derived from process ID so parallel `cargo test --workspace` runs
/// (which spawn separate test binaries) don't collide on the same port range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Helper: start `argile serve` on the given port with extra environment.
fn start_server(port: u16, env: &[(&str, &str)]) -> Child {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_argile"));
    cmd.arg("serve").arg("--port").arg(port.to_string());
    for var in [
        "DS_API_TOKEN",
        "ENCRYPTION_KEY",
        "ARGILE_API_KEY",
        "ARGILE_PORT",
    ] {
        cmd.env_remove(var);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }
    // Redirect stdout/stderr to avoid blocking
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    let child = cmd.spawn().expect("failed to start argile serve");
    // Wait for server to be ready by polling the port
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            return child;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    child
}

fn stop(mut child: Child) {
    child.kill().ok();
    child.wait().ok();
}

/// Helper: send a raw HTTP request and return (status, body).
fn http_request(
    port: u16,
    method: &str,
    path: &str,
    body: Option<&str>,
    extra_headers: &[(&str, &str)],
) -> (u16, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let mut header_lines = String::new();
    for (name, value) in extra_headers {
        header_lines.push_str(&format!("{}: {}\r\n", name, value));
    }
    let body = body.unwrap_or("");
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost:{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
        method,
        path,
        port,
        body.len(),
        header_lines,
        body
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    parse_http_response(&response)
}

fn http_get(port: u16, path: &str) -> (u16, String) {
    http_request(port, "GET", path, None, &[])
}

fn http_post(port: u16, path: &str, body: &str) -> (u16, String) {
    http_request(port, "POST", path, Some(body), &[])
}

/// Parse an HTTP response into (status_code, body).
fn parse_http_response(response: &str) -> (u16, String) {
    let parts: Vec<&str> = response.splitn(2, "\r\n\r\n").collect();
    let headers = parts.first().unwrap_or(&"").to_string();
    let body = parts.get(1).unwrap_or(&"").to_string();

    let status_line = headers.lines().next().unwrap_or("");
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    // Handle chunked transfer encoding
    let body = if headers.to_lowercase().contains("transfer-encoding: chunked") {
        decode_chunked(&body)
    } else {
        body
    };

    (status, body)
}

/// Decode chunked transfer encoding.
fn decode_chunked(data: &str) -> String {
    let mut result = String::new();
    let mut remaining = data;

    while let Some(line_end) = remaining.find("\r\n") {
        let size = match usize::from_str_radix(remaining[..line_end].trim(), 16) {
            Ok(s) => s,
            Err(_) => break,
        };
        if size == 0 {
            break;
        }
        let chunk_start = line_end + 2;
        let chunk_end = chunk_start + size;
        if chunk_end > remaining.len() {
            result.push_str(&remaining[chunk_start..]);
            break;
        }
        result.push_str(&remaining[chunk_start..chunk_end]);
        remaining = remaining.get(chunk_end + 2..).unwrap_or("");
    }

    result
}

fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("invalid JSON ({e}): {body}"))
}

// ──────────────────────────────────────────────
// Health and routing
// ──────────────────────────────────────────────

#[test]
fn health_returns_200_with_version() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (status, body) = http_get(port, "/health");
    stop(child);

    assert_eq!(status, 200);
    let json = json(&body);
    assert_eq!(json["status"], "ok");
    assert!(json.get("version").is_some());
}

#[test]
fn unknown_route_returns_404_action_result() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (status, body) = http_get(port, "/nowhere");
    stop(child);

    assert_eq!(status, 404);
    let json = json(&body);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Ressource introuvable");
}

// ──────────────────────────────────────────────
// Parcours
// ──────────────────────────────────────────────

#[test]
fn get_journey_creates_it_at_eligibility() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (status, body) = http_get(port, "/parcours/applicant-1");
    let (_, again) = http_get(port, "/parcours/applicant-1");
    stop(child);

    assert_eq!(status, 200);
    let first = json(&body);
    assert_eq!(first["success"], true);
    assert_eq!(first["data"]["journey"]["current_step"], "ELIGIBILITY");
    assert_eq!(first["data"]["journey"]["current_status"], "TODO");
    assert_eq!(first["data"]["cases"].as_array().map(Vec::len), Some(0));
    assert_eq!(
        json(&again)["data"]["journey"]["id"],
        first["data"]["journey"]["id"]
    );
}

#[test]
fn progress_unknown_applicant_is_404() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (status, body) = http_post(port, "/parcours/ghost/progress", "");
    stop(child);

    assert_eq!(status, 404);
    let json = json(&body);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Parcours non trouvé");
}

#[test]
fn progress_before_validation_does_not_advance() {
    let port = next_port();
    let child = start_server(port, &[]);

    http_get(port, "/parcours/applicant-2");
    let (status, body) = http_post(port, "/parcours/applicant-2/progress", "");
    stop(child);

    assert_eq!(status, 200);
    let json = json(&body);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["advanced"], false);
    assert_eq!(json["data"]["completed"], false);
}

#[test]
fn registered_dossier_unknown_to_ds_syncs_as_draft() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (reg_status, reg_body) = http_post(
        port,
        "/parcours/applicant-3/dossiers/eligibilite",
        r#"{"ds_number": 123456}"#,
    );
    let (status, body) = http_post(port, "/parcours/applicant-3/sync/eligibilite", "");
    let (_, overview) = http_get(port, "/parcours/applicant-3");
    stop(child);

    assert_eq!(reg_status, 200);
    assert_eq!(json(&reg_body)["data"]["ds_number"], 123456);

    assert_eq!(status, 200);
    let json_body = json(&body);
    assert_eq!(json_body["success"], true);
    assert_eq!(json_body["data"]["updated"], false);
    assert!(json_body["data"]["message"]
        .as_str()
        .unwrap()
        .contains("brouillon"));

    let overview = json(&overview);
    let cases = overview["data"]["cases"].as_array().unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0]["ds_status"], "DRAFT");
    assert!(cases[0]["last_sync_at"].is_string());
}

#[test]
fn dossier_number_of_another_applicant_is_409() {
    let port = next_port();
    let child = start_server(port, &[]);

    let body = r#"{"ds_number": 424242}"#;
    let (first, _) = http_post(port, "/parcours/applicant-7/dossiers/eligibilite", body);
    let (again, _) = http_post(port, "/parcours/applicant-7/dossiers/eligibilite", body);
    let (status, conflict) = http_post(port, "/parcours/applicant-8/dossiers/eligibilite", body);
    let (_, overview) = http_get(port, "/parcours/applicant-8");
    stop(child);

    assert_eq!(first, 200);
    assert_eq!(again, 200);
    assert_eq!(status, 409);
    let conflict = json(&conflict);
    assert_eq!(conflict["success"], false);
    assert_eq!(
        conflict["error"],
        "Ce dossier est déjà rattaché à un autre parcours"
    );
    let overview = json(&overview);
    assert_eq!(overview["data"]["cases"].as_array().map(Vec::len), Some(0));
}

#[test]
fn sync_unknown_step_is_400() {
    let port = next_port();
    let child = start_server(port, &[]);

    http_get(port, "/parcours/applicant-4");
    let (status, body) = http_post(port, "/parcours/applicant-4/sync/travaux", "");
    stop(child);

    assert_eq!(status, 400);
    assert_eq!(json(&body)["error"], "Étape inconnue");
}

#[test]
fn sync_all_reports_every_step() {
    let port = next_port();
    let child = start_server(port, &[]);

    http_get(port, "/parcours/applicant-5");
    let (status, body) = http_post(port, "/parcours/applicant-5/sync", "");
    stop(child);

    assert_eq!(status, 200);
    let json = json(&body);
    let steps = json["data"]["steps"].as_array().expect("steps array");
    let names: Vec<&str> = steps.iter().map(|s| s["step"].as_str().unwrap()).collect();
    assert_eq!(names, ["ELIGIBILITY", "DIAGNOSTIC", "QUOTE", "INVOICES"]);
}

// ──────────────────────────────────────────────
// Webhooks
// ──────────────────────────────────────────────

#[test]
fn ds_webhook_unknown_dossier_is_404() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (status, body) = http_post(port, "/webhooks/ds", r#"{"dossier_number": 999}"#);
    stop(child);

    assert_eq!(status, 404);
    assert_eq!(json(&body)["error"], "Dossier non trouvé");
}

#[test]
fn email_webhook_untracked_event_is_ignored() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (status, body) = http_post(
        port,
        "/webhooks/email",
        r#"{"event": "unsubscribed", "email": "a@example.fr", "message-id": "<m@relay>"}"#,
    );
    stop(child);

    assert_eq!(status, 200);
    let json = json(&body);
    assert_eq!(json["data"]["updated"], false);
    assert_eq!(json["data"]["error"], "Événement non suivi");
}

#[test]
fn email_webhook_unknown_message() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (status, body) = http_post(
        port,
        "/webhooks/email",
        r#"{"event": "delivered", "email": "a@example.fr", "message-id": "<unknown@relay>"}"#,
    );
    stop(child);

    assert_eq!(status, 200);
    let json = json(&body);
    assert_eq!(json["data"]["updated"], false);
    assert_eq!(json["data"]["error"], "Email non trouvé");
}

// ──────────────────────────────────────────────
// Envelope
// ──────────────────────────────────────────────

#[test]
fn decrypt_without_key_is_unavailable() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (status, body) = http_post(port, "/envelope/decrypt", r#"{"envelope": "a:b:c"}"#);
    stop(child);

    assert_eq!(status, 503);
    assert_eq!(json(&body)["error"], "Clé de chiffrement absente ou invalide");
}

#[test]
fn decrypt_fragment_returns_json_data() {
    let output = Command::new(env!("CARGO_BIN_EXE_argile"))
        .args([
            "envelope",
            "encrypt",
            "--fragment",
            r#"{"code_postal":"36000"}"#,
        ])
        .env("ENCRYPTION_KEY", TEST_KEY)
        .output()
        .expect("failed to run argile envelope encrypt");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let fragment = stdout.trim();
    assert!(fragment.starts_with("#d="));

    let port = next_port();
    let child = start_server(port, &[("ENCRYPTION_KEY", TEST_KEY)]);

    let request = serde_json::json!({
        "envelope": format!("https://fonds-argile.gouv.fr/simulateur{}", fragment)
    })
    .to_string();
    let (status, body) = http_post(port, "/envelope/decrypt", &request);
    let (bad_status, bad_body) = http_post(port, "/envelope/decrypt", r#"{"envelope": "a:b:c:d"}"#);
    stop(child);

    assert_eq!(status, 200);
    assert_eq!(json(&body)["data"]["code_postal"], "36000");
    assert_eq!(bad_status, 400);
    assert_eq!(
        json(&bad_body)["error"],
        "Format de données chiffrées invalide"
    );
}

// ──────────────────────────────────────────────
// Authentication
// ──────────────────────────────────────────────

#[test]
fn api_key_required_except_health() {
    let port = next_port();
    let child = start_server(port, &[("ARGILE_API_KEY", "s3cret")]);

    let (health, _) = http_get(port, "/health");
    let (missing, _) = http_get(port, "/parcours/applicant-6");
    let (wrong, _) = http_request(
        port,
        "GET",
        "/parcours/applicant-6",
        None,
        &[("Authorization", "Bearer nope")],
    );
    let (bearer, _) = http_request(
        port,
        "GET",
        "/parcours/applicant-6",
        None,
        &[("Authorization", "Bearer s3cret")],
    );
    let (header, _) = http_request(
        port,
        "GET",
        "/parcours/applicant-6",
        None,
        &[("X-API-Key", "s3cret")],
    );
    stop(child);

    assert_eq!(health, 200);
    assert_eq!(missing, 401);
    assert_eq!(wrong, 403);
    assert_eq!(bearer, 200);
    assert_eq!(header, 200);
}
