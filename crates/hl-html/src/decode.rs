//! Response body decoding for raw HTML bytes.

use encoding_rs::Encoding;
use hl_core::HintError;
use hl_core::HintResult;

const META_SCAN_BYTES: usize = 8192;

/// Decodes an HTML body.
///
/// Charset precedence: `<meta charset>` in the first 8 KiB, the `charset`
/// parameter of `media_type`, `declared_charset`, then lossy UTF-8. An
/// unknown label is skipped unless `strict` is set.
pub fn decode_html_bytes(
    body: &[u8],
    media_type: &str,
    declared_charset: Option<&str>,
    strict: bool,
) -> HintResult<String> {
    if let Some((encoding, _)) = Encoding::for_bom(body) {
        let (decoded, _, _) = encoding.decode(body);
        return Ok(decoded.into_owned());
    }

    let candidates = [
        parse_charset_from_html_prefix(body),
        parse_charset_from_content_type(media_type),
        declared_charset.map(str::to_owned),
    ];

    for label in candidates.into_iter().flatten() {
        match Encoding::for_label(label.trim().as_bytes()) {
            Some(encoding) => {
                let (decoded, _, had_errors) = encoding.decode(body);
                if had_errors {
                    log::debug!("body contained malformed {} sequences", encoding.name());
                }
                return Ok(decoded.into_owned());
            }
            None if strict => {
                return Err(HintError::new(
                    "parse.unknown_charset",
                    format!("unsupported charset label `{label}`"),
                ));
            }
            None => log::warn!("ignoring unsupported charset label `{label}`"),
        }
    }

    Ok(String::from_utf8_lossy(body).into_owned())
}

pub(crate) fn parse_charset_from_content_type(content_type: &str) -> Option<String> {
    for part in content_type.split(';').skip(1) {
        let Some((name, value)) = part.split_once('=') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("charset") {
            continue;
        }

        let label = value.trim().trim_matches('"').trim_matches('\'');
        if !label.is_empty() {
            return Some(label.to_owned());
        }
    }

    None
}

pub(crate) fn parse_charset_from_html_prefix(body: &[u8]) -> Option<String> {
    let prefix_len = body.len().min(META_SCAN_BYTES);
    let prefix = String::from_utf8_lossy(&body[..prefix_len]);
    let lower = prefix.to_ascii_lowercase();
    let mut search_start = 0_usize;

    while let Some(relative) = lower[search_start..].find("charset=") {
        let charset_start = search_start + relative + "charset=".len();
        if let Some(label) = parse_charset_label(&prefix[charset_start..]) {
            return Some(label);
        }
        search_start = charset_start;
    }

    None
}

fn parse_charset_label(input: &str) -> Option<String> {
    let trimmed = input.trim_start();
    let first = trimmed.chars().next()?;

    if first == '"' || first == '\'' {
        let rest = &trimmed[first.len_utf8()..];
        let end = rest.find(first)?;
        let label = rest[..end].trim();
        return (!label.is_empty()).then(|| label.to_owned());
    }

    let end = trimmed
        .find(|ch: char| ch.is_whitespace() || matches!(ch, '"' | '\'' | ';' | '>' | '/'))
        .unwrap_or(trimmed.len());
    let label = &trimmed[..end];
    (!label.is_empty()).then(|| label.to_owned())
}

#[cfg(test)]
mod tests {
    use super::decode_html_bytes;
    use super::parse_charset_from_content_type;
    use super::parse_charset_from_html_prefix;

    #[test]
    fn parses_charset_from_content_type_header() {
        assert_eq!(
            parse_charset_from_content_type("text/html; charset=\"ISO-8859-1\"").as_deref(),
            Some("ISO-8859-1")
        );
        assert_eq!(parse_charset_from_content_type("text/html"), None);
    }

    #[test]
    fn finds_meta_charset_in_prefix() {
        let html = b"<html><head><meta charset='windows-1252'></head></html>";
        assert_eq!(
            parse_charset_from_html_prefix(html).as_deref(),
            Some("windows-1252")
        );
        let http_equiv =
            b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\">";
        assert_eq!(
            parse_charset_from_html_prefix(http_equiv).as_deref(),
            Some("utf-8")
        );
    }

    #[test]
    fn meta_charset_wins_over_header() {
        let html = b"<meta charset=\"UTF-8\"><p>\xE2\x82\xAC</p>";
        let decoded = decode_html_bytes(html, "text/html; charset=ISO-8859-1", None, false);
        assert_eq!(decoded.as_deref().map(|text| text.contains('\u{20AC}')), Ok(true));
    }

    #[test]
    fn falls_back_to_declared_charset() {
        let decoded = decode_html_bytes(b"<p>caf\xE9</p>", "text/html", Some("latin1"), false);
        assert_eq!(decoded.as_deref(), Ok("<p>caf\u{e9}</p>"));
    }

    #[test]
    fn unknown_label_is_fatal_only_in_strict_mode() {
        let lenient = decode_html_bytes(b"<p>x</p>", "text/html; charset=klingon", None, false);
        assert_eq!(lenient.as_deref(), Ok("<p>x</p>"));

        let strict = decode_html_bytes(b"<p>x</p>", "text/html; charset=klingon", None, true);
        assert!(matches!(strict, Err(error) if error.code == "parse.unknown_charset"));
    }

    #[test]
    fn byte_order_mark_wins() {
        let decoded = decode_html_bytes(b"\xEF\xBB\xBF<p>x</p>", "text/html; charset=latin1", None, true);
        assert_eq!(decoded.as_deref(), Ok("<p>x</p>"));
    }
}
