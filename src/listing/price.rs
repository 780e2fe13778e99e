//! Free-text price parsing.
//!
//! Handles the shapes marketplaces actually return:
//!
//! ```text
//! "$1,299.00"          -> 1299.00 USD
//! "€1.299,00"          -> 1299.00 EUR
//! "1299 USD"           -> 1299    USD
//! "US $3.49 - $12.00"  -> 3.49    USD  (first price of a range)
//! "Free"               -> 0       XXX
//! "Contact for price"  -> NoNumericToken
//! "12.99"              -> UnknownCurrency (unless a hint is given)
//! ```

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::Currency;
use crate::error::{ParseError, ParseErrorKind};

static ISO_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z])(usd|eur|gbp|cad|aud|jpy|cny|rmb|inr|chf|xxx)(?:$|[^a-z])")
        .expect("valid regex")
});

/// Dollar sign with an optional country prefix ("US $", "C$", "AU$", "HK$").
static DOLLAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^A-Za-z])(US|CA|AU|HK|NZ|SG|MX|NT|C|A|S|R)?\s?\$").expect("valid regex")
});

static YEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(CN|JP)?\s?[¥￥]").expect("valid regex"));

static EURO_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\beuros?\b").expect("valid regex"));

/// Text that means "no charge" rather than "no price".
static FREE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:free|gratis|no charge|n/a)\b|^\s*na\s*$").expect("valid regex")
});

/// Characters that only ever group digits.
const GROUPING_ONLY: [char; 5] = ['\'', ' ', '\u{a0}', '\u{202f}', '\u{2009}'];

/// A parsed amount and its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPrice {
    /// Non-negative amount.
    pub amount: Decimal,
    /// Detected currency.
    pub currency: Currency,
}

impl ParsedPrice {
    /// Zero-cost price with no currency.
    pub fn free() -> Self {
        Self {
            amount: Decimal::ZERO,
            currency: Currency::Xxx,
        }
    }

    /// Render as "<amount> <CODE>", which parses back to the same amount.
    pub fn canonical(&self) -> String {
        let mut amount = self.amount;
        // Exactly three fraction digits would re-parse as a grouping separator.
        if amount.scale() == 3 {
            amount.rescale(4);
        }
        format!("{} {}", amount, self.currency)
    }
}

impl fmt::Display for ParsedPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Currency evidence found in a price string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CurrencyMarker {
    Known(Currency),
    /// A marker for a currency this parser does not model (e.g. "R$", "HK$").
    Unsupported,
    Absent,
}

/// Parse a free-text price. Fails rather than guessing a currency.
pub fn parse_price(text: &str) -> Result<ParsedPrice, ParseError> {
    parse_price_with_hint(text, None)
}

/// Parse a free-text price, falling back to `hint` only when the text itself
/// carries no currency marker.
pub fn parse_price_with_hint(
    text: &str,
    hint: Option<Currency>,
) -> Result<ParsedPrice, ParseError> {
    let trimmed = text.trim();

    let Some(token) = numeric_token(trimmed) else {
        if FREE.is_match(trimmed) {
            let currency = match detect_currency(trimmed) {
                CurrencyMarker::Known(c) => c,
                _ => hint.unwrap_or(Currency::Xxx),
            };
            return Ok(ParsedPrice {
                amount: Decimal::ZERO,
                currency,
            });
        }
        return Err(ParseError::new(ParseErrorKind::NoNumericToken, text));
    };

    let amount = resolve_amount(token)
        .ok_or_else(|| ParseError::new(ParseErrorKind::MalformedAmount, text))?;

    let currency = match detect_currency(trimmed) {
        CurrencyMarker::Known(c) => c,
        CurrencyMarker::Unsupported => {
            return Err(ParseError::new(ParseErrorKind::UnknownCurrency, text))
        }
        CurrencyMarker::Absent => {
            hint.ok_or_else(|| ParseError::new(ParseErrorKind::UnknownCurrency, text))?
        }
    };

    Ok(ParsedPrice { amount, currency })
}

/// First run of digits and embedded separators, e.g. "1,299.00" in "US $1,299.00 each".
///
/// A separator is only consumed when a digit follows it, so trailing
/// punctuation and range dashes end the token.
fn numeric_token(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];

    let mut end = 0;
    let mut chars = rest.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c.is_ascii_digit() {
            end = i + c.len_utf8();
            continue;
        }
        let is_separator = c == '.' || c == ',' || GROUPING_ONLY.contains(&c);
        match chars.peek() {
            Some((_, next)) if is_separator && next.is_ascii_digit() => continue,
            _ => break,
        }
    }

    Some(&rest[..end])
}

/// Turn a numeric token into a decimal, deciding which separator is the
/// decimal marker.
///
/// - both '.' and ',' present: the rightmost one is decimal
/// - one kind, repeated: grouping ("1,299,000")
/// - one kind, once: grouping when exactly three digits follow ("1.299"),
///   decimal otherwise ("12.99", "12,5")
fn resolve_amount(token: &str) -> Option<Decimal> {
    let cleaned: String = token.chars().filter(|c| !GROUPING_ONLY.contains(c)).collect();

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');

    let decimal_at = match (last_dot, last_comma) {
        (None, None) => None,
        (Some(d), Some(c)) => Some(d.max(c)),
        (Some(pos), None) | (None, Some(pos)) => {
            let sep = cleaned[pos..].chars().next()?;
            let occurrences = cleaned.matches(sep).count();
            let digits_after = cleaned.len() - pos - 1;
            if occurrences > 1 || digits_after == 3 {
                None
            } else {
                Some(pos)
            }
        }
    };

    let mut normalized = String::with_capacity(cleaned.len());
    for (i, c) in cleaned.char_indices() {
        if c.is_ascii_digit() {
            normalized.push(c);
        } else if Some(i) == decimal_at {
            normalized.push('.');
        }
    }

    Decimal::from_str(&normalized).ok()
}

fn detect_currency(text: &str) -> CurrencyMarker {
    if let Some(code) = ISO_CODE.captures(text).and_then(|c| c.get(1)) {
        if let Ok(currency) = Currency::from_str(code.as_str()) {
            return CurrencyMarker::Known(currency);
        }
    }

    if let Some(captures) = DOLLAR.captures(text) {
        return match captures.get(1).map(|m| m.as_str()) {
            None | Some("US") => CurrencyMarker::Known(Currency::Usd),
            Some("CA") | Some("C") => CurrencyMarker::Known(Currency::Cad),
            Some("AU") | Some("A") => CurrencyMarker::Known(Currency::Aud),
            Some(_) => CurrencyMarker::Unsupported,
        };
    }

    if let Some(captures) = YEN.captures(text) {
        return match captures.get(1).map(|m| m.as_str()) {
            Some("CN") => CurrencyMarker::Known(Currency::Cny),
            _ => CurrencyMarker::Known(Currency::Jpy),
        };
    }

    if text.contains('€') || EURO_WORD.is_match(text) {
        return CurrencyMarker::Known(Currency::Eur);
    }
    if text.contains('£') {
        return CurrencyMarker::Known(Currency::Gbp);
    }
    if text.contains('₹') {
        return CurrencyMarker::Known(Currency::Inr);
    }
    if text.contains('元') {
        return CurrencyMarker::Known(Currency::Cny);
    }

    CurrencyMarker::Absent
}

/// Parse an order/sold count such as "1,234 sold", "5K+ sold" or "10k+ orders".
pub fn parse_count(text: &str) -> Option<u64> {
    static THOUSANDS: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*k\b").expect("valid regex"));
    static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

    let cleaned = text.replace([',', '+'], "");
    if let Some(value) = THOUSANDS.captures(&cleaned).and_then(|c| c.get(1)) {
        let thousands = Decimal::from_str(value.as_str()).ok()?;
        return thousands
            .checked_mul(Decimal::ONE_THOUSAND)?
            .trunc()
            .to_u64();
    }
    DIGITS.find(&cleaned)?.as_str().parse().ok()
}
