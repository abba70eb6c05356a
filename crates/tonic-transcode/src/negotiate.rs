//! `Accept` header negotiation.

use std::cmp::Reverse;

/// One entry of an `Accept` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRange {
    kind: String,
    subtype: String,
    params: usize,
    /// Quality in thousandths.
    quality: u16,
}

impl MediaRange {
    /// Parse `type/subtype;param=value;q=0.5`. Returns `None` for malformed entries.
    #[must_use]
    pub fn parse(entry: &str) -> Option<Self> {
        let mut parts = entry.split(';');
        let (kind, subtype) = parts.next()?.trim().split_once('/')?;
        let (kind, subtype) = (kind.trim(), subtype.trim());
        if kind.is_empty() || subtype.is_empty() || (kind == "*" && subtype != "*") {
            return None;
        }

        let mut params = 0;
        let mut quality = 1000;
        for param in parts {
            let Some((name, value)) = param.split_once('=') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case("q") {
                quality = parse_quality(value.trim())?;
            } else {
                params += 1;
            }
        }

        Some(Self {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params,
            quality,
        })
    }

    /// 3 for `type/subtype;params`, 2 for `type/subtype`, 1 for `type/*`, 0 for `*/*`.
    #[must_use]
    pub fn specificity(&self) -> u8 {
        match (self.kind.as_str(), self.subtype.as_str()) {
            ("*", _) => 0,
            (_, "*") => 1,
            _ if self.params > 0 => 3,
            _ => 2,
        }
    }

    /// Whether `content_type` (parameters ignored) falls in this range.
    #[must_use]
    pub fn includes(&self, content_type: &str) -> bool {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        let Some((kind, subtype)) = essence.split_once('/') else {
            return false;
        };
        (self.kind == "*" || self.kind.eq_ignore_ascii_case(kind))
            && (self.subtype == "*" || self.subtype.eq_ignore_ascii_case(subtype))
    }

    /// Whether the range was given `q=0`.
    #[must_use]
    pub fn is_refused(&self) -> bool {
        self.quality == 0
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_quality(value: &str) -> Option<u16> {
    let q: f32 = value.parse().ok()?;
    (0.0..=1.0).contains(&q).then(|| (q * 1000.0).round() as u16)
}

/// Parse an `Accept` header, most specific entries first, then by quality.
#[must_use]
pub fn parse_accept(header: &str) -> Vec<MediaRange> {
    let mut ranges: Vec<MediaRange> = header.split(',').filter_map(MediaRange::parse).collect();
    ranges.sort_by_key(|r| (Reverse(r.specificity()), Reverse(r.quality)));
    ranges
}

/// Whether a response of `content_type` satisfies the `Accept` header.
///
/// The most specific range including the type decides; a missing, empty or
/// unparsable header accepts everything.
#[must_use]
pub fn is_acceptable(accept: Option<&str>, content_type: &str) -> bool {
    let Some(header) = accept else {
        return true;
    };
    let ranges = parse_accept(header);
    if ranges.is_empty() {
        return true;
    }
    ranges
        .iter()
        .find(|range| range.includes(content_type))
        .is_some_and(|range| !range.is_refused())
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = "application/json";
    const TEXT: &str = "text/plain; charset=utf-8";

    #[test]
    fn missing_or_empty_accepts_everything() {
        assert!(is_acceptable(None, JSON));
        assert!(is_acceptable(Some(""), TEXT));
        assert!(is_acceptable(Some("garbage"), JSON));
    }

    #[test]
    fn wildcards() {
        assert!(is_acceptable(Some("*/*"), JSON));
        assert!(is_acceptable(Some("text/*"), TEXT));
        assert!(!is_acceptable(Some("text/*"), JSON));
    }

    #[test]
    fn exact_and_lists() {
        assert!(is_acceptable(Some("application/json"), JSON));
        assert!(!is_acceptable(Some("application/json"), TEXT));
        assert!(is_acceptable(Some("text/html, application/json;q=0.8"), JSON));
        assert!(!is_acceptable(Some("text/html, application/xml"), JSON));
    }

    #[test]
    fn content_type_parameters_are_ignored() {
        assert!(is_acceptable(Some("text/plain"), TEXT));
        assert!(is_acceptable(Some("Text/Plain"), TEXT));
    }

    #[test]
    fn specific_refusal_beats_wildcard() {
        assert!(!is_acceptable(Some("*/*, application/json;q=0"), JSON));
        assert!(is_acceptable(Some("*/*, application/json;q=0"), TEXT));
    }

    #[test]
    fn sorted_by_specificity_then_quality() {
        let ranges = parse_accept("*/*;q=0.1, text/*, text/plain;format=flowed, text/html;q=0.5, text/plain");
        let order: Vec<(u8, u16)> = ranges.iter().map(|r| (r.specificity(), r.quality)).collect();
        assert_eq!(order, vec![(3, 1000), (2, 1000), (2, 500), (1, 1000), (0, 100)]);
    }

    #[test]
    fn malformed_entries_are_dropped() {
        assert_eq!(MediaRange::parse("json"), None);
        assert_eq!(MediaRange::parse("*/json"), None);
        assert_eq!(MediaRange::parse("text/plain;q=2"), None);
        assert_eq!(parse_accept("json, text/plain").len(), 1);
    }
}
