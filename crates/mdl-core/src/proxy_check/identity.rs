/// Public address from an IP lookup body: a JSON object with `ip`, `origin`,
/// or `query`, or else the first non-empty line of plain text.
pub fn parse_identity(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        return ["ip", "origin", "query"]
            .iter()
            .find_map(|k| value.get(*k).and_then(|v| v.as_str()))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
    }
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_and_plain_text_identities() {
        assert_eq!(parse_identity(br#"{"ip":"1.2.3.4"}"#).as_deref(), Some("1.2.3.4"));
        assert_eq!(parse_identity(br#"{"origin": "5.6.7.8"}"#).as_deref(), Some("5.6.7.8"));
        assert_eq!(
            parse_identity(br#"{"status":"success","query":"9.9.9.9"}"#).as_deref(),
            Some("9.9.9.9")
        );
        assert_eq!(parse_identity(b"\n 10.0.0.1 \n").as_deref(), Some("10.0.0.1"));
        assert_eq!(parse_identity(br#"{"country":"NL"}"#), None);
        assert_eq!(parse_identity(b"   "), None);
    }
}
