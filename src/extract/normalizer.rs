//! Price text normalization.
//!
//! Turns whatever a shop renders (`"$1,234.56"`, `"1.234,56 €"`, `"50 000 грн"`,
//! `"1 234,-"`) into a non-negative decimal with exactly two fractional digits.
//! Only the first run of digits/separators/whitespace is considered; everything
//! else is discarded, apart from an adjacent currency-looking token kept as a hint.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::NormalizationError;
use crate::types::NormalizedPrice;

/// Fractional digits kept. Extra digits are truncated, never rounded up.
const PRICE_SCALE: usize = 2;

/// Integer digits beyond this are not a price.
const MAX_INTEGER_DIGITS: usize = 20;

const CURRENCY_SYMBOLS: &[char] = &[
    '$', '€', '£', '¥', '₴', '₽', '₹', '₩', '₺', '₪', '₫', '₱', '₦', '₸', '₡', '฿', '¢', '₲', '₵',
    '₭', '₮', '₼', '₾', '₿',
];

/// Lowercased local abbreviations that are not ISO codes.
const LOCAL_CURRENCY_TOKENS: &[&str] = &[
    "грн", "руб", "р", "₽", "zł", "zl", "kr", "kč", "ft", "lei", "лв", "дин", "din", "tl", "rs",
    "kn", "сом", "тг",
];

pub fn normalize(raw: &str) -> Result<NormalizedPrice, NormalizationError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(NormalizationError::Empty);
    }

    let chars: Vec<char> = text.chars().collect();
    let Some(first_digit) = chars.iter().position(|c| c.is_ascii_digit()) else {
        return Err(NormalizationError::NoDigits);
    };

    // A separator glued to the first digit belongs to the run (".50", ",50").
    let start = if first_digit > 0 && is_separator(chars[first_digit - 1]) {
        first_digit - 1
    } else {
        first_digit
    };

    // The run ends at its last digit, so trailing "," / "." / ",-" are dropped.
    let mut end = first_digit + 1;
    let mut i = first_digit;
    while i < chars.len() && is_run_char(chars[i]) {
        if chars[i].is_ascii_digit() {
            end = i + 1;
        }
        i += 1;
    }

    let currency_hint = currency_hint(&chars[..start], &chars[end..]);

    // Whitespace inside the run is digit grouping.
    let compact: String = chars[start..end].iter().filter(|c| !c.is_whitespace()).collect();
    let (int_digits, frac_digits) = split_decimal(&compact)?;

    if int_digits.trim_start_matches('0').len() > MAX_INTEGER_DIGITS {
        return Err(NormalizationError::OutOfRange(compact));
    }

    let frac: String = frac_digits.chars().take(PRICE_SCALE).collect();
    let int = if int_digits.is_empty() { "0".to_string() } else { int_digits };
    let literal = if frac.is_empty() { int } else { format!("{int}.{frac}") };

    let value = Decimal::from_str(&literal)
        .map_err(|_| NormalizationError::OutOfRange(compact.clone()))?;

    let mut price = NormalizedPrice::new(value);
    price.currency_hint = currency_hint;
    Ok(price)
}

/// Resolve which separator (if any) is the decimal point.
/// Returns `(integer digits, fractional digits)` with all grouping removed.
fn split_decimal(compact: &str) -> Result<(String, String), NormalizationError> {
    let dots = compact.matches('.').count();
    let commas = compact.matches(',').count();

    match (dots, commas) {
        (0, 0) => Ok((compact.to_string(), String::new())),

        // Both kinds present: the rightmost separator is the decimal point,
        // every earlier one of either kind is grouping.
        (d, c) if d > 0 && c > 0 => {
            let Some(pos) = compact.rfind(is_separator) else {
                return Ok((compact.to_string(), String::new()));
            };
            let (head, tail) = (&compact[..pos], &compact[pos + 1..]);
            validate_grouping(head, compact)?;
            Ok((strip_separators(head), tail.to_string()))
        }

        // One separator kind, used exactly once: three digits after it with
        // digits before it is grouping ("1.234", "0.999"), anything else is decimal.
        (d, c) if d + c == 1 => {
            let Some(pos) = compact.find(is_separator) else {
                return Ok((compact.to_string(), String::new()));
            };
            let (head, tail) = (&compact[..pos], &compact[pos + 1..]);
            if tail.len() == 3 && !head.is_empty() {
                Ok((format!("{head}{tail}"), String::new()))
            } else {
                Ok((head.to_string(), tail.to_string()))
            }
        }

        // One separator kind, repeated. A final group of three keeps every
        // occurrence as grouping ("1,234,567"); otherwise the last one is the
        // decimal point after a grouped head ("1,234,50").
        _ => {
            let Some(pos) = compact.rfind(is_separator) else {
                return Ok((compact.to_string(), String::new()));
            };
            let (head, tail) = (&compact[..pos], &compact[pos + 1..]);
            if tail.len() == 3 {
                validate_grouping(compact, compact)?;
                Ok((strip_separators(compact), String::new()))
            } else {
                validate_grouping(head, compact)?;
                Ok((strip_separators(head), tail.to_string()))
            }
        }
    }
}

/// Grouped digits must look like `1,234,567` (or lakh-style `1,23,45,678`):
/// a 1-3 digit leading group without a leading zero, 2-3 digit interior groups,
/// and a final group of exactly 3.
fn validate_grouping(grouped: &str, original: &str) -> Result<(), NormalizationError> {
    let malformed = || NormalizationError::MalformedGrouping(original.to_string());
    let groups: Vec<&str> = grouped.split(is_separator).collect();
    let Some((first, rest)) = groups.split_first() else {
        return Err(malformed());
    };
    if first.is_empty() || first.len() > 3 || (first.starts_with('0') && !rest.is_empty()) {
        return Err(malformed());
    }
    for (idx, group) in rest.iter().enumerate() {
        let is_last = idx + 1 == rest.len();
        let ok = if is_last { group.len() == 3 } else { (2..=3).contains(&group.len()) };
        if !ok {
            return Err(malformed());
        }
    }
    Ok(())
}

/// The longest token touching the numeric run on either side. Known currency
/// marks win over plain words; labels such as `Total:` never count.
fn currency_hint(before: &[char], after: &[char]) -> Option<String> {
    let before: String = before.iter().collect();
    let after: String = after.iter().collect();

    let leading = before.split_whitespace().next_back();
    let trailing = after.split_whitespace().next();

    let candidates: Vec<String> = [leading, trailing]
        .into_iter()
        .flatten()
        .filter(|raw| !raw.ends_with(':'))
        .map(clean_token)
        .filter(|t| !t.is_empty() && !t.chars().any(|c| c.is_ascii_digit()))
        .collect();

    longest(candidates.iter().filter(|t| is_currency_token(t)))
        .or_else(|| longest(candidates.iter().filter(|t| t.chars().all(char::is_alphabetic))))
}

/// Longest token; the first one wins a tie.
fn longest<'a>(tokens: impl Iterator<Item = &'a String>) -> Option<String> {
    tokens
        .fold(None, |best: Option<&String>, t| match best {
            Some(b) if b.chars().count() >= t.chars().count() => Some(b),
            _ => Some(t),
        })
        .cloned()
}

fn clean_token(token: &str) -> String {
    token
        .trim_matches(|c: char| (c.is_ascii_punctuation() && c != '$') || c == '-')
        .to_string()
}

fn is_currency_token(token: &str) -> bool {
    if token.chars().any(|c| CURRENCY_SYMBOLS.contains(&c)) {
        return true;
    }
    if token.len() == 3 && token.chars().all(|c| c.is_ascii_uppercase()) {
        return true;
    }
    let lower = token.to_lowercase();
    LOCAL_CURRENCY_TOKENS.contains(&lower.as_str())
}

fn strip_separators(s: &str) -> String {
    s.chars().filter(|c| !is_separator(*c)).collect()
}

fn is_separator(c: char) -> bool {
    c == '.' || c == ','
}

fn is_run_char(c: char) -> bool {
    c.is_ascii_digit() || is_separator(c) || c.is_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn value(raw: &str) -> Decimal {
        normalize(raw).unwrap_or_else(|e| panic!("'{raw}' failed: {e}")).value
    }

    #[test]
    fn common_locale_formats() {
        assert_eq!(value("$1,234.56"), dec("1234.56"));
        assert_eq!(value("1.234,56"), dec("1234.56"));
        assert_eq!(value("50 000 грн"), dec("50000"));
        assert_eq!(value("€ 99"), dec("99"));
        assert_eq!(value("1 234,-"), dec("1234"));
        assert_eq!(value("1 234.56"), dec("1234.56"));
        assert_eq!(value("1,234,567.89"), dec("1234567.89"));
        assert_eq!(value("1.234.567,89"), dec("1234567.89"));
        assert_eq!(value("€1.234,50"), dec("1234.50"));
        assert_eq!(value("10.000,50"), dec("10000.50"));
        assert_eq!(value("10000,50"), dec("10000.50"));
        assert_eq!(value("50,000 грн"), dec("50000"));
    }

    #[test]
    fn no_break_and_thin_spaces_group_digits() {
        assert_eq!(value("12\u{a0}499,00\u{a0}₽"), dec("12499"));
        assert_eq!(value("3\u{202f}999 Kč"), dec("3999"));
    }

    #[test]
    fn value_always_has_cent_scale() {
        assert_eq!(value("€ 99").to_string(), "99.00");
        assert_eq!(value("45,5").to_string(), "45.50");
        assert_eq!(value("45.00").to_string(), "45.00");
    }

    #[test]
    fn surrounding_text_and_signs_are_discarded() {
        assert_eq!(value("Цена: 999 грн."), dec("999"));
        assert_eq!(value("Text 123 Text"), dec("123"));
        assert_eq!(value("Text 1,234.56 Text"), dec("1234.56"));
        assert_eq!(value("$ 1,234.56 USD"), dec("1234.56"));
        assert_eq!(value("-100"), dec("100"));
        assert_eq!(value("+250"), dec("250"));
    }

    #[test]
    fn dangling_and_leading_separators() {
        assert_eq!(value("1,"), dec("1"));
        assert_eq!(value("1."), dec("1"));
        assert_eq!(value(".50"), dec("0.50"));
        assert_eq!(value(",50"), dec("0.50"));
        assert_eq!(value(".999"), dec("0.99"));
    }

    #[test]
    fn single_separator_followed_by_three_digits_is_grouping() {
        assert_eq!(value("1.234"), dec("1234"));
        assert_eq!(value("19,999"), dec("19999"));
        assert_eq!(value("0.999"), dec("999"));
        assert_eq!(value("1234.567"), dec("1234567"));
    }

    #[test]
    fn repeated_separator_with_short_final_group_is_decimal() {
        assert_eq!(value("1,234,50"), dec("1234.50"));
        assert_eq!(value("1,234,56"), dec("1234.56"));
        assert_eq!(value("1.234.567,89"), dec("1234567.89"));
        assert_eq!(value("1,234,567"), dec("1234567"));
    }

    #[test]
    fn extra_fraction_digits_are_truncated_not_rounded() {
        assert_eq!(value("1,234.567"), dec("1234.56"));
        assert_eq!(value("1.2399"), dec("1.23"));
        assert_eq!(value("9.999,999"), dec("9999.99"));
    }

    #[test]
    fn rejects_text_without_a_price() {
        assert_eq!(normalize(""), Err(NormalizationError::Empty));
        assert_eq!(normalize("   "), Err(NormalizationError::Empty));
        assert_eq!(normalize("abc"), Err(NormalizationError::NoDigits));
        assert_eq!(normalize("."), Err(NormalizationError::NoDigits));
        assert_eq!(normalize(","), Err(NormalizationError::NoDigits));
        assert_eq!(normalize("$,."), Err(NormalizationError::NoDigits));
    }

    #[test]
    fn rejects_ambiguous_grouping() {
        assert!(matches!(normalize("1.2.3"), Err(NormalizationError::MalformedGrouping(_))));
        assert!(matches!(normalize("1,2,3"), Err(NormalizationError::MalformedGrouping(_))));
        assert!(matches!(normalize("12,34,5"), Err(NormalizationError::MalformedGrouping(_))));
        assert!(matches!(normalize("12,34.56"), Err(NormalizationError::MalformedGrouping(_))));
    }

    #[test]
    fn accepts_lakh_grouping() {
        assert_eq!(value("₹1,23,456.00"), dec("123456"));
    }

    #[test]
    fn rejects_absurd_magnitudes() {
        assert!(matches!(
            normalize("123456789012345678901234567890"),
            Err(NormalizationError::OutOfRange(_))
        ));
    }

    #[test]
    fn currency_hint_is_the_longest_adjacent_token() {
        assert_eq!(normalize("$ 1,234.56 USD").unwrap().currency_hint.as_deref(), Some("USD"));
        assert_eq!(normalize("€ 99").unwrap().currency_hint.as_deref(), Some("€"));
        assert_eq!(normalize("50 000 грн").unwrap().currency_hint.as_deref(), Some("грн"));
        assert_eq!(normalize("Цена: 999 грн.").unwrap().currency_hint.as_deref(), Some("грн"));
        assert_eq!(normalize("Total: 42").unwrap().currency_hint, None);
        assert_eq!(normalize("EUR 99").unwrap().currency_hint.as_deref(), Some("EUR"));
    }

    #[test]
    fn unlisted_currency_words_are_still_hinted() {
        assert_eq!(normalize("99 Euro").unwrap().currency_hint.as_deref(), Some("Euro"));
        assert_eq!(normalize("Price: 15 dollars").unwrap().currency_hint.as_deref(), Some("dollars"));
        assert_eq!(normalize("99 Euro").unwrap().value, dec("99"));
        assert_eq!(normalize("1 234,-").unwrap().currency_hint, None);
    }

    #[test]
    fn normalization_is_deterministic() {
        for raw in ["$1,234.56", "1.234,56", "50 000 грн", "€ 99", "1 234,-", "1.2.3", ""] {
            assert_eq!(normalize(raw), normalize(raw));
        }
    }
}
