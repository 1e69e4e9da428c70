use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Stock exchange a six-digit code is listed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Shanghai,
    Shenzhen,
}

impl Exchange {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "SH" => Some(Exchange::Shanghai),
            "SZ" => Some(Exchange::Shenzhen),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Exchange::Shanghai => "SH",
            Exchange::Shenzhen => "SZ",
        }
    }
}

/// A validated stock identifier.
///
/// Accepts both external notations:
/// - exchange suffix: `000001.SZ`, `600000.SH`
/// - exchange prefix: `sz.000001`, `sh.600000`
///
/// Tags are case-insensitive; the code must be exactly six digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolCode {
    pub code: String,
    pub exchange: Exchange,
}

impl SymbolCode {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (left, right) = trimmed
            .split_once('.')
            .ok_or_else(|| Error::InvalidSymbol(raw.to_string()))?;
        if right.contains('.') {
            return Err(Error::InvalidSymbol(raw.to_string()));
        }

        if is_six_digits(left) {
            if let Some(exchange) = Exchange::from_tag(right) {
                return Ok(Self { code: left.to_string(), exchange });
            }
        }
        if is_six_digits(right) {
            if let Some(exchange) = Exchange::from_tag(left) {
                return Ok(Self { code: right.to_string(), exchange });
            }
        }

        Err(Error::InvalidSymbol(raw.to_string()))
    }

    pub fn is_valid(raw: &str) -> bool {
        Self::parse(raw).is_ok()
    }

    /// Suffix notation, e.g. `000001.SZ`.
    pub fn to_suffix_notation(&self) -> String {
        format!("{}.{}", self.code, self.exchange.tag())
    }

    /// Prefix notation, e.g. `sz.000001`.
    pub fn to_prefix_notation(&self) -> String {
        format!("{}.{}", self.exchange.tag().to_lowercase(), self.code)
    }
}

impl std::fmt::Display for SymbolCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_suffix_notation())
    }
}

impl std::str::FromStr for SymbolCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_six_digits(s: &str) -> bool {
    s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffix_notation() {
        let code = SymbolCode::parse("000001.SZ").unwrap();
        assert_eq!(code.exchange, Exchange::Shenzhen);
        assert_eq!(code.to_prefix_notation(), "sz.000001");
    }

    #[test]
    fn parses_prefix_notation() {
        let code = SymbolCode::parse("sh.600000").unwrap();
        assert_eq!(code.exchange, Exchange::Shanghai);
        assert_eq!(code.to_suffix_notation(), "600000.SH");
    }

    #[test]
    fn both_notations_are_equivalent() {
        assert_eq!(
            SymbolCode::parse("600000.sh").unwrap(),
            SymbolCode::parse("SH.600000").unwrap()
        );
    }

    #[test]
    fn rejects_malformed_codes() {
        for raw in ["", "000001", "00001.SZ", "000001.HK", "sz.00000a", "a.b.c", "sz.000001.x"] {
            assert!(!SymbolCode::is_valid(raw), "should reject '{raw}'");
        }
    }
}
