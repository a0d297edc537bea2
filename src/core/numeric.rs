//! Locale-tolerant number parsing for manual and imported price/quantity text.
//!
//! Bid returns mix Italian ("1.234,56") and English ("1,234.56") notation.
//! The rightmost separator is the decimal point when the other separator
//! appears before it; a lone separator repeated several times is a
//! thousands grouping, and only in groups of three digits. Anything that does not survive this is `None`,
//! never a silently wrong number.

/// Parse `input`, tolerating currency markers, spaces and either decimal convention.
pub fn parse_locale_number(input: &str) -> Option<f64> {
    let stripped = strip_currency(input);
    parse_separators(&stripped)
}

/// True when `input` is a bare number with no currency marker around it.
pub fn is_plain_number(input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.is_empty() || has_currency_marker(trimmed) {
        return false;
    }
    parse_separators(trimmed).is_some()
}

/// Currency symbol or an "eur"/"euro" word anywhere in the text.
pub fn has_currency_marker(input: &str) -> bool {
    if input.chars().any(|c| matches!(c, '€' | '$' | '£')) {
        return true;
    }
    input
        .to_lowercase()
        .split(|c: char| !c.is_alphabetic())
        .any(|word| word == "eur" || word == "euro")
}

fn strip_currency(input: &str) -> String {
    let lowered = input.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut word = String::new();
    for c in lowered.chars() {
        if c.is_alphabetic() {
            word.push(c);
            continue;
        }
        flush_word(&mut out, &mut word);
        if !matches!(c, '€' | '$' | '£') {
            out.push(c);
        }
    }
    flush_word(&mut out, &mut word);
    out
}

fn flush_word(out: &mut String, word: &mut String) {
    if word != "eur" && word != "euro" {
        out.push_str(word);
    }
    word.clear();
}

fn parse_separators(input: &str) -> Option<f64> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '\u{a0}')
        .collect();
    if compact.is_empty() {
        return None;
    }

    let last_comma = compact.rfind(',');
    let last_dot = compact.rfind('.');

    let normalized = match (last_comma, last_dot) {
        (Some(comma), Some(dot)) => {
            let (decimal, thousands) = if comma > dot { (',', '.') } else { ('.', ',') };
            let (integer, fraction) = compact.rsplit_once(decimal)?;
            if integer.contains(decimal) || fraction.contains(thousands) {
                return None;
            }
            if !is_grouped(integer, thousands) {
                return None;
            }
            format!("{}.{}", integer.replace(thousands, ""), fraction)
        }
        (Some(_), None) => split_single(&compact, ',')?,
        (None, Some(_)) => split_single(&compact, '.')?,
        (None, None) => compact,
    };

    if !normalized
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }
    if !normalized.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Only one kind of separator present: once is a decimal point, more than
/// once is thousands grouping.
fn split_single(compact: &str, sep: char) -> Option<String> {
    if compact.matches(sep).count() > 1 {
        is_grouped(compact, sep).then(|| compact.replace(sep, ""))
    } else {
        Some(compact.replacen(sep, ".", 1))
    }
}

/// `1.234.567`: one to three leading digits, then groups of exactly three.
fn is_grouped(integer: &str, sep: char) -> bool {
    let unsigned = integer.strip_prefix(['+', '-']).unwrap_or(integer);
    let mut groups = unsigned.split(sep);
    let leading_ok = groups
        .next()
        .is_some_and(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()));
    leading_ok && groups.all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_italian_and_english_grouping() {
        assert_eq!(parse_locale_number("1.234,56"), Some(1234.56));
        assert_eq!(parse_locale_number("1,234.56"), Some(1234.56));
    }

    #[test]
    fn test_single_separator_is_decimal() {
        assert_eq!(parse_locale_number("12,50"), Some(12.5));
        assert_eq!(parse_locale_number("8.00"), Some(8.0));
    }

    #[test]
    fn test_repeated_separator_is_grouping() {
        assert_eq!(parse_locale_number("1.234.567"), Some(1234567.0));
        assert_eq!(parse_locale_number("1,234,567"), Some(1234567.0));
        assert_eq!(parse_locale_number("-1.234.567,5"), Some(-1234567.5));
        assert_eq!(parse_locale_number("1234,5"), Some(1234.5));
    }

    #[test]
    fn test_currency_and_spaces_are_ignored() {
        assert_eq!(parse_locale_number("€ 1.234,56"), Some(1234.56));
        assert_eq!(parse_locale_number("12,50 EUR"), Some(12.5));
        assert_eq!(parse_locale_number("euro 3"), Some(3.0));
        assert_eq!(parse_locale_number("-4,5"), Some(-4.5));
    }

    #[test]
    fn test_garbage_is_none() {
        assert_eq!(parse_locale_number("abc"), None);
        assert_eq!(parse_locale_number(""), None);
        assert_eq!(parse_locale_number("12 pz"), None);
        assert_eq!(parse_locale_number("inf"), None);
        assert_eq!(parse_locale_number("NaN"), None);
        assert_eq!(parse_locale_number("-"), None);
        assert_eq!(parse_locale_number("12.5.2024"), None);
        assert_eq!(parse_locale_number("1.234.56"), None);
        assert_eq!(parse_locale_number("1,23.4"), None);
        assert_eq!(parse_locale_number("1.2,5.0"), None);
    }

    #[test]
    fn test_plain_number_rejects_currency() {
        assert!(is_plain_number("12,50"));
        assert!(is_plain_number("100"));
        assert!(!is_plain_number("€ 12,50"));
        assert!(!is_plain_number("Tubo"));
        assert!(!is_plain_number(""));
        assert!(!is_plain_number("12.5.2024"));
    }

    #[test]
    fn test_currency_marker() {
        assert!(has_currency_marker("€ 10"));
        assert!(has_currency_marker("10 Euro"));
        assert!(has_currency_marker("EUR"));
        assert!(!has_currency_marker("Europa"));
        assert!(!has_currency_marker("10"));
    }
}
