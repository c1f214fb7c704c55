//! Uploaded-file normalization: encoding detection and decoding.
//!
//! Import files come from merchants' spreadsheets and arrive in
//! whatever encoding their tooling produced. Everything is normalized
//! to UTF-8 before the CSV layer sees it.

/// Detect the encoding of raw bytes.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _, _) = chardet::detect(bytes);

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes using a named encoding. Unknown encodings fall back to
/// lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).to_string(),
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.to_string()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        _ => String::from_utf8_lossy(bytes).to_string(),
    }
}

/// Detect and decode in one step. Valid UTF-8 passes through untouched;
/// detection only runs for bytes that are not UTF-8, so accented UTF-8
/// text cannot be misread as a Latin-1 variant.
pub fn normalize(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let encoding = detect_encoding(bytes);
            decode_content(bytes, &encoding)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passthrough() {
        let text = "sku,nom\nA,éclair\n";
        assert_eq!(normalize(text.as_bytes()), text);
    }

    #[test]
    fn test_latin1_decoded() {
        // "éclair" in ISO-8859-1
        let bytes = b"sku,nom\nA,\xe9clair\n";
        let decoded = decode_content(bytes, "iso-8859-1");
        assert!(decoded.contains("éclair"));
    }

    #[test]
    fn test_normalize_decodes_latin1_bytes() {
        // invalid as UTF-8, so detection kicks in
        let bytes = b"sku,nom\nA,\xe9clair\n";
        assert!(normalize(bytes).contains("éclair"));
    }

    #[test]
    fn test_unknown_encoding_falls_back_lossy() {
        let bytes = b"plain ascii";
        assert_eq!(decode_content(bytes, "klingon"), "plain ascii");
    }
}
