use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// Decode fetched bytes into UTF-8: BOM, then Content-Type charset, then a
/// chardetng guess. Always best effort; undecodable sequences are replaced
/// rather than surfaced, matching the permissive HTML pipeline downstream.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return lossy(bytes, encoding);
    }

    if let Some(label) = content_type.and_then(extract_charset) {
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            return lossy(bytes, encoding);
        }
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    lossy(bytes, detector.guess(None, true))
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let part = part.trim();
        if part.len() < 8 || !part[..8].eq_ignore_ascii_case("charset=") {
            return None;
        }
        Some(part[8..].trim_matches([' ', '"', '\''].as_ref()).to_string())
    })
}

fn lossy(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}
