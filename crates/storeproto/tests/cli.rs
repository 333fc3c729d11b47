#![cfg(feature = "cli")]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use bytes::BytesMut;
use storeproto::protocol::{build_registry, families::main, local_context};
use storeproto::wire::encode_frame;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "storeproto-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn storeproto(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_storeproto"))
        .args(args)
        .output()
        .expect("binary should run")
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn fetch_app_frame() -> Vec<u8> {
    let registry = build_registry().expect("registry");
    let request = main::FetchAppRequest {
        app_id: "editor".into(),
        os_id: "linux".into(),
        ..main::FetchAppRequest::default()
    };
    let (key, body) = registry.encode(&request, &local_context()).expect("encode");
    let mut buf = BytesMut::new();
    encode_frame(key, 7, &body, &mut buf).expect("frame");
    buf.to_vec()
}

#[test]
fn version_prints_package_version() {
    let out = storeproto(&["version"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(stdout.trim(), format!("storeproto {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn extended_version_lists_local_families() {
    let out = storeproto(&["--format", "json", "version", "--extended"]);
    assert!(out.status.success());
    let doc = json(&out);
    let families: Vec<_> = doc["families"]
        .as_array()
        .expect("families array")
        .iter()
        .map(|f| f["family"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(families, ["core", "auth", "main"]);
}

#[test]
fn families_lists_every_registration() {
    let out = storeproto(&["--format", "json", "families"]);
    assert!(out.status.success());
    let rows = json(&out);
    let rows = rows.as_array().expect("array");
    assert_eq!(rows.len(), 36);
    assert_eq!(rows[0]["name"], "InitResponse");
    assert_eq!(rows[0]["family_name"], "core");

    let out = storeproto(&["--format", "json", "families", "--family", "auth"]);
    assert_eq!(json(&out).as_array().map(Vec::len), Some(10));
}

#[test]
fn errors_lists_taxonomy() {
    let out = storeproto(&["--format", "json", "errors"]);
    assert!(out.status.success());
    let doc = json(&out);
    assert_eq!(doc["category"], "storeproto");
    assert_eq!(doc["codes"][4]["code"], 5);
    assert_eq!(doc["codes"][4]["text"], "Version mismatch");
}

#[test]
fn schema_shows_negotiated_tags() {
    let out = storeproto(&["--format", "json", "schema", "core", "initresponse"]);
    assert!(out.status.success());
    let doc = json(&out);
    assert_eq!(doc["key"], "0:1");
    assert_eq!(doc["tags"].as_array().map(Vec::len), Some(2));

    let out = storeproto(&["--format", "json", "schema", "0", "InitResponse", "--bare"]);
    assert!(out.status.success());
    assert_eq!(json(&out)["tags"].as_array().map(Vec::len), Some(0));
}

#[test]
fn schema_unknown_message_is_usage_error() {
    let out = storeproto(&["schema", "main", "NoSuchMessage"]);
    assert_eq!(out.status.code(), Some(64));
    let out = storeproto(&["schema", "billing", "InitRequest"]);
    assert_eq!(out.status.code(), Some(64));
}

#[test]
fn decode_reads_frame_file() {
    let dir = unique_temp_dir("decode");
    let path = dir.join("frame.bin");
    std::fs::write(&path, fetch_app_frame()).expect("write frame");

    let out = storeproto(&["--format", "json", "decode", path.to_str().expect("utf8 path")]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let doc = json(&out);
    assert_eq!(doc["key"], "2:13");
    assert_eq!(doc["message"], "FetchAppRequest");
    assert_eq!(doc["request_id"], 7);
    assert!(doc["value"].as_str().unwrap_or_default().contains("editor"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_reads_hex_from_stdin() {
    let hex: String = fetch_app_frame()
        .iter()
        .map(|b| format!("{b:02x} "))
        .collect();
    let mut child = Command::new(env!("CARGO_BIN_EXE_storeproto"))
        .args(["--format", "json", "decode", "-", "--hex"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(hex.as_bytes())
        .expect("write stdin");
    let out = child.wait_with_output().expect("wait");
    assert!(out.status.success());
    assert_eq!(json(&out)["message"], "FetchAppRequest");
}

#[test]
fn decode_truncated_frame_is_data_error() {
    let dir = unique_temp_dir("truncated");
    let path = dir.join("frame.bin");
    let frame = fetch_app_frame();
    std::fs::write(&path, &frame[..frame.len() - 1]).expect("write frame");

    let out = storeproto(&["decode", path.to_str().expect("utf8 path")]);
    assert_eq!(out.status.code(), Some(60));
    let _ = std::fs::remove_dir_all(&dir);
}
