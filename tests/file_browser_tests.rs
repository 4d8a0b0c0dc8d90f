mod common;

use std::fs;
use std::net::SocketAddr;

use common::{roundtrip, start_http};
use edgeserve::browser::FileBrowser;
use edgeserve::codec::{build_multipart, MultipartPart};
use edgeserve::router::Router;
use edgeserve::server::{AppService, ServerHandle};
use serde_json::json;
use tempfile::TempDir;

fn start_browser() -> (TempDir, ServerHandle, SocketAddr) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), b"first line\n").unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs").join("readme.md"), b"# docs\n").unwrap();

    let browser = FileBrowser::new(dir.path(), "/files").unwrap();
    let service = AppService::new(Router::new()).with_browser(browser);
    let (handle, addr) = start_http(service);
    (dir, handle, addr)
}

fn upload_request(url: &str, filedir: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let body = build_multipart(
        "xXxBOUNDARYxXx",
        &[
            MultipartPart { name: "filedir", filename: None, data: filedir.as_bytes() },
            MultipartPart { name: "filecontent", filename: Some(filename), data: content },
        ],
    );
    let mut req = format!(
        "POST {url} HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=xXxBOUNDARYxXx\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    req.extend_from_slice(&body);
    req
}

#[test]
fn test_large_file_streams_exactly() {
    let (dir, handle, addr) = start_browser();
    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(dir.path().join("blob.bin"), &payload).unwrap();

    let resp = roundtrip(&addr, b"GET /files/blob.bin HTTP/1.1\r\n\r\n");
    handle.stop();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("Content-Length"), Some("10000"));
    assert_eq!(resp.body, payload);
}

#[test]
fn test_directory_listing_html() {
    let (_dir, handle, addr) = start_browser();
    let resp = roundtrip(&addr, b"GET /files HTTP/1.1\r\n\r\n");
    handle.stop();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("Content-Type"), Some("text/html; charset=UTF-8"));
    let html = resp.text();
    assert!(html.contains("Index of"));
    assert!(html.contains("notes.txt"));
    assert!(html.contains("docs/"));
    assert!(html.contains("11 B"));
}

#[test]
fn test_directory_listing_json() {
    let (_dir, handle, addr) = start_browser();
    let by_query = roundtrip(&addr, b"GET /files?format=json HTTP/1.1\r\n\r\n");
    let by_accept = roundtrip(
        &addr,
        b"GET /files/docs HTTP/1.1\r\nAccept: application/json\r\n\r\n",
    );
    handle.stop();

    assert_eq!(by_query.status, 200);
    let listing = by_query.json();
    assert_eq!(listing["path"], "/files");
    let names: Vec<&str> = listing["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["docs", "notes.txt"]);

    let docs = by_accept.json();
    assert_eq!(docs["path"], "/files/docs");
    assert_eq!(docs["entries"][0]["name"], "readme.md");
    assert_eq!(docs["entries"][0]["is_dir"], false);
}

#[test]
fn test_traversal_is_rejected() {
    let (_dir, handle, addr) = start_browser();
    let resp = roundtrip(&addr, b"GET /files/../Cargo.toml HTTP/1.1\r\n\r\n");
    let encoded = roundtrip(&addr, b"GET /files/%2e%2e/Cargo.toml HTTP/1.1\r\n\r\n");
    handle.stop();
    assert_eq!(resp.status, 400);
    assert_eq!(resp.json()["status"], 1);
    assert_eq!(encoded.status, 400);
}

#[test]
fn test_missing_file_is_404() {
    let (_dir, handle, addr) = start_browser();
    let resp = roundtrip(&addr, b"GET /files/nope.txt HTTP/1.1\r\n\r\n");
    handle.stop();
    assert_eq!(resp.status, 404);
    assert_eq!(resp.json()["status"], 1);
}

#[test]
fn test_upload_then_duplicate() {
    let (dir, handle, addr) = start_browser();
    let first = roundtrip(&addr, &upload_request("/files", "/files/docs", "new.txt", b"hello"));
    let second = roundtrip(&addr, &upload_request("/files", "/files/docs", "new.txt", b"again"));
    handle.stop();

    assert_eq!(first.status, 201);
    assert_eq!(
        first.json(),
        json!({"status": 0, "info": "wrote 5 bytes to /files/docs/new.txt"})
    );
    assert_eq!(second.status, 400);
    assert_eq!(second.json()["status"], 1);
    assert_eq!(fs::read(dir.path().join("docs").join("new.txt")).unwrap(), b"hello");
}

#[test]
fn test_mkdir() {
    let (dir, handle, addr) = start_browser();
    let created = roundtrip(&addr, b"PUT /files/photos HTTP/1.1\r\n\r\n");
    let again = roundtrip(&addr, b"PUT /files/photos HTTP/1.1\r\n\r\n");
    let root = roundtrip(&addr, b"PUT /files HTTP/1.1\r\n\r\n");
    handle.stop();

    assert_eq!(created.status, 201);
    assert!(dir.path().join("photos").is_dir());
    assert_eq!(again.status, 400);
    assert_eq!(root.status, 400);
}

#[test]
fn test_delete_non_empty_directory_is_refused() {
    let (dir, handle, addr) = start_browser();
    let resp = roundtrip(&addr, b"DELETE /files/docs HTTP/1.1\r\n\r\n");
    handle.stop();
    assert_eq!(resp.status, 400);
    assert!(dir.path().join("docs").join("readme.md").is_file());
}

#[test]
fn test_delete_file_and_empty_directory() {
    let (dir, handle, addr) = start_browser();
    fs::create_dir(dir.path().join("empty")).unwrap();
    let file = roundtrip(&addr, b"DELETE /files/notes.txt HTTP/1.1\r\n\r\n");
    let empty = roundtrip(&addr, b"DELETE /files/empty HTTP/1.1\r\n\r\n");
    let gone = roundtrip(&addr, b"DELETE /files/notes.txt HTTP/1.1\r\n\r\n");
    handle.stop();

    assert_eq!(file.status, 200);
    assert_eq!(file.json()["status"], 0);
    assert!(!dir.path().join("notes.txt").exists());
    assert_eq!(empty.status, 200);
    assert!(!dir.path().join("empty").exists());
    assert_eq!(gone.status, 404);
}

#[test]
fn test_routes_shadow_browser() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("status"), b"from disk").unwrap();
    let router = Router::new();
    router.get("/files/status", &[], |_| Ok("from handler".into()));
    let browser = FileBrowser::new(dir.path(), "/files").unwrap();
    let (handle, addr) = start_http(AppService::new(router).with_browser(browser));

    let resp = roundtrip(&addr, b"GET /files/status HTTP/1.1\r\n\r\n");
    handle.stop();
    assert_eq!(resp.text(), "from handler");
}
