use std::collections::HashMap;

use edgeserve::codec::{
    build_multipart, encode_query, parse_multipart, parse_query, parse_request_head, FormValue,
    MultipartPart,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn query_encoding_is_inverted_by_parsing(
        map in prop::collection::hash_map("[ -~]{0,12}", "[ -~]{0,16}", 0..8)
    ) {
        let encoded = encode_query(&map);
        prop_assert_eq!(parse_query(&encoded), map);
    }

    #[test]
    fn multipart_upload_fields_survive(
        filedir in "/[a-z0-9_/]{0,20}",
        filename in "[A-Za-z0-9_.-]{1,24}",
        content in prop::collection::vec(any::<u8>(), 0..4096),
    ) {
        let body = build_multipart(
            "edge-boundary-7f3a",
            &[
                MultipartPart { name: "filedir", filename: None, data: filedir.as_bytes() },
                MultipartPart { name: "filecontent", filename: Some(&filename), data: &content },
            ],
        );
        let form = parse_multipart(&body, "edge-boundary-7f3a").unwrap();
        prop_assert_eq!(form.len(), 3);
        prop_assert_eq!(form["filedir"].as_text(), Some(filedir.as_str()));
        prop_assert_eq!(form["filename"].as_text(), Some(filename.as_str()));
        prop_assert_eq!(&form["filecontent"], &FormValue::File(content));
    }

    #[test]
    fn multipart_payload_may_quote_the_boundary(
        head in prop::collection::vec(any::<u8>(), 1..512),
        tail in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let mut content = head;
        if content.ends_with(b"\r\n") {
            content.push(b'x');
        }
        content.extend_from_slice(b"--edge-boundary-7f3a");
        content.extend_from_slice(&tail);
        let body = build_multipart(
            "edge-boundary-7f3a",
            &[MultipartPart { name: "filecontent", filename: Some("q.bin"), data: &content }],
        );
        let form = parse_multipart(&body, "edge-boundary-7f3a").unwrap();
        prop_assert_eq!(&form["filecontent"], &FormValue::File(content));
    }

    #[test]
    fn query_string_reaches_request(
        map in prop::collection::hash_map("[a-z]{1,8}", "[ -~]{0,16}", 0..6)
    ) {
        let raw = format!("GET /search?{} HTTP/1.1\r\nHost: x\r\n\r\n", encode_query(&map));
        let req = parse_request_head(raw.as_bytes()).unwrap();
        prop_assert_eq!(req.path.as_str(), "/search");
        prop_assert_eq!(req.query, map);
    }
}

#[test]
fn test_request_with_form_body() {
    let mut fields = HashMap::new();
    fields.insert("city", "São Paulo");
    fields.insert("note", "a&b=c");
    let body = encode_query(&fields);
    let raw = format!(
        "POST /submit HTTP/1.0\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let req = parse_request_head(raw.as_bytes()).unwrap();
    let parsed = parse_query(std::str::from_utf8(req.body_bytes()).unwrap());
    assert_eq!(req.version, "HTTP/1.0");
    assert_eq!(parsed["city"], "São Paulo");
    assert_eq!(parsed["note"], "a&b=c");
}
