use std::collections::HashSet;
use thiserror::Error;

/// Errors produced while parsing a port specification. All of these are
/// user-correctable input problems, reported before any scanning starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortSpecError {
    #[error("invalid port value: {0:?}")]
    InvalidPort(String),
    #[error("invalid range: {0:?}")]
    InvalidRange(String),
    #[error("port out of range 1-65535: {0}")]
    PortOutOfBounds(u64),
    #[error("port specification selects no ports")]
    EmptyPortSet,
}

/// Parse a port specification into a deduplicated list of TCP ports (1..=65535).
///
/// The spec is comma-separated; each token is either a single port (`443`) or
/// an inclusive range (`8000-8010`). Whitespace around tokens is ignored.
/// Expansion preserves first-seen order and drops duplicates, so
/// `"8000-8002,80,8001"` yields `[8000, 8001, 8002, 80]`. Any invalid token
/// rejects the whole spec.
pub fn parse_port_spec(spec: &str) -> Result<Vec<u16>, PortSpecError> {
    if spec.trim().is_empty() {
        return Err(PortSpecError::EmptyPortSet);
    }

    let mut out: Vec<u16> = Vec::new();
    let mut seen = HashSet::new();

    for raw in spec.split(',') {
        let token = raw.trim();

        // Range `start-end`
        if let Some((a, b)) = token.split_once('-') {
            let start = parse_port_number(a.trim())
                .map_err(|e| e.into_spec_error(|| PortSpecError::InvalidRange(token.to_string())))?;
            let end = parse_port_number(b.trim())
                .map_err(|e| e.into_spec_error(|| PortSpecError::InvalidRange(token.to_string())))?;
            if start > end {
                return Err(PortSpecError::InvalidRange(token.to_string()));
            }
            for p in start..=end {
                if seen.insert(p) {
                    out.push(p);
                }
            }
            continue;
        }

        // Single port
        let p = parse_port_number(token)
            .map_err(|e| e.into_spec_error(|| PortSpecError::InvalidPort(token.to_string())))?;
        if seen.insert(p) {
            out.push(p);
        }
    }

    if out.is_empty() {
        return Err(PortSpecError::EmptyPortSet);
    }
    Ok(out)
}

enum PortNumError {
    NotNumeric,
    OutOfBounds(u64),
}

impl PortNumError {
    fn into_spec_error(self, not_numeric: impl FnOnce() -> PortSpecError) -> PortSpecError {
        match self {
            PortNumError::NotNumeric => not_numeric(),
            PortNumError::OutOfBounds(v) => PortSpecError::PortOutOfBounds(v),
        }
    }
}

fn parse_port_number(s: &str) -> Result<u16, PortNumError> {
    let val: u64 = s.parse().map_err(|_| PortNumError::NotNumeric)?;
    if val == 0 || val > 65535 {
        return Err(PortNumError::OutOfBounds(val));
    }
    Ok(val as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_ports() {
        let ports = parse_port_spec("80, 22 ,443").unwrap();
        assert_eq!(ports, vec![80, 22, 443]);
    }

    #[test]
    fn parse_range_expands_inclusively() {
        let ports = parse_port_spec("20-25").unwrap();
        assert_eq!(ports, vec![20, 21, 22, 23, 24, 25]);
    }

    #[test]
    fn duplicates_dropped_first_seen_wins() {
        assert_eq!(parse_port_spec("80,80,443").unwrap(), vec![80, 443]);
        assert_eq!(
            parse_port_spec("8000-8002,80,8001").unwrap(),
            vec![8000, 8001, 8002, 80]
        );
    }

    #[test]
    fn reversed_range_is_invalid() {
        assert_eq!(
            parse_port_spec("100-50"),
            Err(PortSpecError::InvalidRange("100-50".to_string()))
        );
    }

    #[test]
    fn out_of_bounds_reported_as_such() {
        assert_eq!(
            parse_port_spec("0-10"),
            Err(PortSpecError::PortOutOfBounds(0))
        );
        assert_eq!(
            parse_port_spec("70000"),
            Err(PortSpecError::PortOutOfBounds(70000))
        );
    }

    #[test]
    fn non_numeric_tokens_rejected() {
        assert_eq!(
            parse_port_spec("abc"),
            Err(PortSpecError::InvalidPort("abc".to_string()))
        );
        assert_eq!(
            parse_port_spec("80,x-90"),
            Err(PortSpecError::InvalidRange("x-90".to_string()))
        );
    }

    #[test]
    fn empty_spec_rejected() {
        assert_eq!(parse_port_spec(""), Err(PortSpecError::EmptyPortSet));
        assert_eq!(parse_port_spec("   "), Err(PortSpecError::EmptyPortSet));
    }

    #[test]
    fn one_invalid_token_rejects_the_whole_spec() {
        assert!(parse_port_spec("22,80,nope,443").is_err());
    }
}
