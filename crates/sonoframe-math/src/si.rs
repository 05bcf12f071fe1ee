//! SI-prefixed number parsing (`50u`, `1.5k`, `.2`).

/// Metric prefixes and their multipliers. `u` is accepted for micro.
const PREFIXES: &[(char, f64)] = &[
    ('y', 1e-24),
    ('z', 1e-21),
    ('a', 1e-18),
    ('f', 1e-15),
    ('p', 1e-12),
    ('n', 1e-9),
    ('u', 1e-6),
    ('µ', 1e-6),
    ('μ', 1e-6),
    ('m', 1e-3),
    ('k', 1e3),
    ('M', 1e6),
    ('G', 1e9),
    ('T', 1e12),
    ('P', 1e15),
    ('E', 1e18),
    ('Z', 1e21),
    ('Y', 1e24),
];

/// Parse a decimal number with an optional trailing SI prefix.
///
/// Returns `None` for empty text, unknown suffixes and non-finite values.
pub fn parse_si(text: &str) -> Option<f64> {
    let text = text.trim();
    let last = text.chars().next_back()?;

    let (number, multiplier) = match PREFIXES.iter().find(|(c, _)| *c == last) {
        Some((c, m)) => (&text[..text.len() - c.len_utf8()], *m),
        None => (text, 1.0),
    };

    let number = number.trim_end();
    if number.is_empty() || !number.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: f64 = number.parse().ok()?;
    let value = value * multiplier;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_plain_numbers() {
        assert_eq!(parse_si("12"), Some(12.0));
        assert_eq!(parse_si(".2"), Some(0.2));
        assert_eq!(parse_si("-3.5"), Some(-3.5));
        assert_eq!(parse_si("1e-3"), Some(1e-3));
    }

    #[test]
    fn test_prefixes() {
        assert_relative_eq!(parse_si("50u").unwrap(), 50e-6);
        assert_relative_eq!(parse_si("50µ").unwrap(), 50e-6);
        assert_relative_eq!(parse_si("2m").unwrap(), 2e-3);
        assert_relative_eq!(parse_si("1.5k").unwrap(), 1500.0);
        assert_relative_eq!(parse_si("3M").unwrap(), 3e6);
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_si(""), None);
        assert_eq!(parse_si("m"), None);
        assert_eq!(parse_si("12q"), None);
        assert_eq!(parse_si("inf"), None);
        assert_eq!(parse_si("abc"), None);
    }
}
