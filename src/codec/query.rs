use std::collections::HashMap;

use tracing::warn;

/// Decode one URL component: `+` becomes a space, `%XX` becomes the byte.
///
/// Invalid UTF-8 after decoding is replaced rather than rejected, so a bad
/// escape never fails a whole request.
pub fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    let bytes = urlencoding::decode_binary(spaced.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Parse a query or urlencoded form string into a map.
///
/// Pairs are split on `&`, then on the first `=`. A pair without `=` is
/// logged and skipped; the rest of the string is still parsed. Repeated keys
/// keep the last value.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((key, value)) => {
                params.insert(decode_component(key), decode_component(value));
            }
            None => {
                warn!(pair = %pair, "Query pair without '=' skipped");
            }
        }
    }
    params
}

/// Encode key/value pairs as an `application/x-www-form-urlencoded` string.
///
/// `parse_query(&encode_query(&m)) == m` holds for any map of strings.
pub fn encode_query<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key.as_ref(), value.as_ref());
    }
    serializer.finish()
}
