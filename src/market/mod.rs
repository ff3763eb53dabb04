//! Market data model and bracket-name parsing (C4).

pub mod client;
pub mod venue;

use crate::errors::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A daily bracket: a half-open interval of whole Fahrenheit degrees (§3).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bracket {
    pub market_id: String,
    pub lower_f: f64,
    pub upper_f: f64,
    pub is_under: bool,
    pub is_over: bool,
}

impl Bracket {
    #[inline]
    pub fn width(&self) -> f64 {
        self.upper_f - self.lower_f
    }

    #[inline]
    pub fn midpoint(&self) -> f64 {
        (self.lower_f + self.upper_f) / 2.0
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BracketPrice {
    pub mid_prob: f64,
    pub best_bid: f64,
    pub best_ask: f64,
    pub available_usd_at_top_of_book: f64,
    pub fetched_at_utc: DateTime<Utc>,
}

/// Parses bracket-name strings of the form `"58-59°F"`, `"< 40°F"`,
/// `"≥ 90°F"` into a `Bracket` (market_id left blank; caller fills it in).
///
/// Interior brackets are half-open `[lower, upper)`. An under-bracket
/// `< N°F` becomes `(-inf, N)`; an over-bracket `>= N°F` becomes `[N, +inf)`.
pub fn parse_bracket_name(name: &str) -> EngineResult<(f64, f64, bool, bool)> {
    let trimmed = name.trim().trim_end_matches("°F").trim_end_matches("F").trim();

    if let Some(rest) = trimmed.strip_prefix('<') {
        let upper: f64 = rest
            .trim()
            .parse()
            .map_err(|_| EngineError::InvalidResponse(format!("bad under bracket: {name}")))?;
        return Ok((f64::NEG_INFINITY, upper, true, false));
    }

    if let Some(rest) = trimmed.strip_prefix('\u{2265}').or_else(|| trimmed.strip_prefix(">=")) {
        let lower: f64 = rest
            .trim()
            .parse()
            .map_err(|_| EngineError::InvalidResponse(format!("bad over bracket: {name}")))?;
        return Ok((lower, f64::INFINITY, false, true));
    }

    let mut parts = trimmed.splitn(2, '-');
    let lower_str = parts.next().unwrap_or("").trim();
    let upper_str = parts
        .next()
        .ok_or_else(|| EngineError::InvalidResponse(format!("unrecognized bracket name: {name}")))?
        .trim();

    let lower: f64 = lower_str
        .parse()
        .map_err(|_| EngineError::InvalidResponse(format!("bad bracket lower bound: {name}")))?;
    let upper: f64 = upper_str
        .parse()
        .map_err(|_| EngineError::InvalidResponse(format!("bad bracket upper bound: {name}")))?;

    // "58-59" already names the half-open unit-width bracket [58, 59).
    Ok((lower, upper, false, false))
}

/// Validates that a bracket set partitions an interval with no overlap and
/// unit width for interior brackets, at most one under and one over (§3).
pub fn validate_partition(brackets: &[Bracket]) -> EngineResult<()> {
    if brackets.is_empty() {
        return Err(EngineError::InvalidBrackets("empty bracket set".into()));
    }

    let under_count = brackets.iter().filter(|b| b.is_under).count();
    let over_count = brackets.iter().filter(|b| b.is_over).count();
    if under_count > 1 || over_count > 1 {
        return Err(EngineError::InvalidBrackets(
            "at most one under and one over bracket allowed".into(),
        ));
    }

    let mut interior: Vec<&Bracket> = brackets.iter().filter(|b| !b.is_under && !b.is_over).collect();
    interior.sort_by(|a, b| a.lower_f.partial_cmp(&b.lower_f).unwrap());

    for b in &interior {
        if (b.width() - 1.0).abs() > 1e-9 {
            return Err(EngineError::InvalidBrackets(format!(
                "interior bracket {}-{} is not unit width",
                b.lower_f, b.upper_f
            )));
        }
    }

    for pair in interior.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if (a.upper_f - b.lower_f).abs() > 1e-9 {
            return Err(EngineError::InvalidBrackets(format!(
                "gap or overlap between brackets at {} and {}",
                a.upper_f, b.lower_f
            )));
        }
    }

    if let (Some(under), Some(first)) = (brackets.iter().find(|b| b.is_under), interior.first()) {
        if (under.upper_f - first.lower_f).abs() > 1e-9 {
            return Err(EngineError::InvalidBrackets(format!(
                "gap or overlap between under bracket and interior run at {} and {}",
                under.upper_f, first.lower_f
            )));
        }
    }

    if let (Some(over), Some(last)) = (brackets.iter().find(|b| b.is_over), interior.last()) {
        if (over.lower_f - last.upper_f).abs() > 1e-9 {
            return Err(EngineError::InvalidBrackets(format!(
                "gap or overlap between over bracket and interior run at {} and {}",
                over.lower_f, last.upper_f
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interior_bracket() {
        let (lower, upper, under, over) = parse_bracket_name("58-59\u{00b0}F").unwrap();
        assert_eq!(lower, 58.0);
        assert_eq!(upper, 59.0);
        assert!(!under && !over);
    }

    #[test]
    fn test_parse_under_bracket() {
        let (lower, upper, under, over) = parse_bracket_name("< 40\u{00b0}F").unwrap();
        assert!(lower.is_infinite() && lower.is_sign_negative());
        assert_eq!(upper, 40.0);
        assert!(under && !over);
    }

    #[test]
    fn test_parse_over_bracket() {
        let (lower, upper, under, over) = parse_bracket_name("\u{2265} 90\u{00b0}F").unwrap();
        assert_eq!(lower, 90.0);
        assert!(upper.is_infinite());
        assert!(!under && over);
    }

    fn interior(market_id: &str, lower: f64, upper: f64) -> Bracket {
        Bracket { market_id: market_id.into(), lower_f: lower, upper_f: upper, is_under: false, is_over: false }
    }

    #[test]
    fn test_valid_partition() {
        let brackets = vec![
            Bracket { market_id: "u".into(), lower_f: f64::NEG_INFINITY, upper_f: 40.0, is_under: true, is_over: false },
            interior("a", 40.0, 41.0),
            interior("b", 41.0, 42.0),
            Bracket { market_id: "o".into(), lower_f: 42.0, upper_f: f64::INFINITY, is_under: false, is_over: true },
        ];
        assert!(validate_partition(&brackets).is_ok());
    }

    #[test]
    fn test_overlap_rejected() {
        let brackets = vec![interior("a", 40.0, 41.0), interior("b", 40.5, 41.5)];
        assert!(validate_partition(&brackets).is_err());
    }

    #[test]
    fn test_gap_rejected() {
        let brackets = vec![interior("a", 40.0, 41.0), interior("b", 42.0, 43.0)];
        assert!(validate_partition(&brackets).is_err());
    }

    #[test]
    fn test_parsed_dash_brackets_pass_validation() {
        // SPEC_FULL.md's own worked bracket names ("58-59°F", "45-46°F") must
        // parse into a partition `validate_partition` actually accepts.
        let names = ["< 58\u{00b0}F", "58-59\u{00b0}F", "59-60\u{00b0}F", "\u{2265} 60\u{00b0}F"];
        let brackets: Vec<Bracket> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let (lower_f, upper_f, is_under, is_over) = parse_bracket_name(name).unwrap();
                Bracket { market_id: format!("m{i}"), lower_f, upper_f, is_under, is_over }
            })
            .collect();
        assert!(validate_partition(&brackets).is_ok());
    }

    #[test]
    fn test_missing_lowest_interior_bracket_rejected() {
        // Under bracket ends at 40, but the interior run starts at 41 --
        // a real gap that windows(2) alone would never catch.
        let brackets = vec![
            Bracket { market_id: "u".into(), lower_f: f64::NEG_INFINITY, upper_f: 40.0, is_under: true, is_over: false },
            interior("b", 41.0, 42.0),
            Bracket { market_id: "o".into(), lower_f: 42.0, upper_f: f64::INFINITY, is_under: false, is_over: true },
        ];
        assert!(validate_partition(&brackets).is_err());
    }

    #[test]
    fn test_missing_highest_interior_bracket_rejected() {
        let brackets = vec![
            Bracket { market_id: "u".into(), lower_f: f64::NEG_INFINITY, upper_f: 40.0, is_under: true, is_over: false },
            interior("a", 40.0, 41.0),
            Bracket { market_id: "o".into(), lower_f: 42.0, upper_f: f64::INFINITY, is_under: false, is_over: true },
        ];
        assert!(validate_partition(&brackets).is_err());
    }
}
