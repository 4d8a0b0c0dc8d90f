use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use edgeserve::codec::{build_multipart, parse_multipart, parse_request_head, MultipartPart};
use edgeserve::router::Router;
use http::Method;
use serde_json::json;

fn bench_parse_request_head(c: &mut Criterion) {
    let raw = b"GET /files/docs/report.pdf?format=json&sort=name HTTP/1.1\r\n\
        Host: board.local\r\n\
        User-Agent: bench/1.0\r\n\
        Accept: application/json\r\n\
        Accept-Encoding: gzip\r\n\r\n";
    c.bench_function("parse_request_head", |b| {
        b.iter(|| {
            let req = parse_request_head(black_box(raw));
            black_box(&req);
        })
    });
}

fn bench_parse_multipart(c: &mut Criterion) {
    let content = vec![0x5Au8; 64 * 1024];
    let body = build_multipart(
        "bench-boundary",
        &[
            MultipartPart { name: "filedir", filename: None, data: b"/files/uploads" },
            MultipartPart { name: "filecontent", filename: Some("blob.bin"), data: &content },
        ],
    );
    c.bench_function("parse_multipart_64k", |b| {
        b.iter(|| {
            let form = parse_multipart(black_box(&body), "bench-boundary");
            black_box(&form);
        })
    });
}

fn bench_route_lookup(c: &mut Criterion) {
    let router = Router::new();
    for i in 0..64 {
        router.get(&format!("/api/v1/item{i}"), &["id"], |_| Ok(json!({}).into()));
    }
    c.bench_function("route_lookup", |b| {
        let paths = ["/api/v1/item0", "/api/v1/item31", "/api/v1/item63", "/missing"];
        b.iter(|| {
            for path in paths {
                let route = router.lookup(&Method::GET, black_box(path));
                black_box(&route);
            }
        })
    });
}

criterion_group!(
    benches,
    bench_parse_request_head,
    bench_parse_multipart,
    bench_route_lookup
);
criterion_main!(benches);
