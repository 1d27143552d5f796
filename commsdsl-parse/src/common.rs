//! Constants and literal parsing helpers.

/// Sentinel meaning "not deprecated yet".
pub const NOT_YET_DEPRECATED: u32 = u32::MAX;

/// Prefix selecting a schema in an external reference (`@Schema.ns.Name`).
pub const SCHEMA_REF_PREFIX: char = '@';

/// Prefix of a sibling field reference (`$name`).
pub const SIBLING_REF_PREFIX: char = '$';

/// Prefix of an interface field reference (`%name`).
pub const INTERFACE_REF_PREFIX: char = '%';

/// Returns true if the string is a valid identifier.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns true if the string is a valid dotted reference (optionally schema prefixed).
#[must_use]
pub fn is_valid_ref(reference: &str) -> bool {
    let rest = reference
        .strip_prefix(SCHEMA_REF_PREFIX)
        .unwrap_or(reference);
    !rest.is_empty() && rest.split('.').all(is_valid_name)
}

/// Parses a boolean property value.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Parses an unsigned integral property value.
#[must_use]
pub fn parse_u32(value: &str) -> Option<u32> {
    let v = parse_int_literal(value)?;
    u32::try_from(v).ok()
}

/// Parses an unsigned size property value.
#[must_use]
pub fn parse_usize(value: &str) -> Option<usize> {
    let v = parse_int_literal(value)?;
    usize::try_from(v).ok()
}

/// Parses a decimal or `0x` prefixed hexadecimal integral literal.
#[must_use]
pub fn parse_int_literal(value: &str) -> Option<i128> {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };

    if digits.is_empty() {
        return None;
    }

    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i128>().ok()?,
    };

    Some(if negative { -magnitude } else { magnitude })
}

/// Parses a floating point literal, including `nan`, `inf` and `-inf`.
#[must_use]
pub fn parse_float_literal(value: &str) -> Option<f64> {
    let value = value.trim();
    match value.to_lowercase().as_str() {
        "nan" => return Some(f64::NAN),
        "inf" | "+inf" => return Some(f64::INFINITY),
        "-inf" => return Some(f64::NEG_INFINITY),
        _ => {}
    }

    if let Some(v) = parse_int_literal(value) {
        return Some(v as f64);
    }

    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a `[min, max]` range literal.
pub fn parse_range_literal(value: &str) -> Option<(&str, &str)> {
    let inner = value.trim().strip_prefix('[')?.strip_suffix(']')?;
    let (min, max) = inner.split_once(',')?;
    let (min, max) = (min.trim(), max.trim());
    if min.is_empty() || max.is_empty() {
        return None;
    }
    Some((min, max))
}

/// Parses a hexadecimal byte string (spaces allowed).
#[must_use]
pub fn parse_hex_bytes(value: &str) -> Option<Vec<u8>> {
    let digits: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.is_ascii() || digits.len() % 2 != 0 {
        return None;
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect()
}

/// Splits a list property value separated by commas or whitespace.
#[must_use]
pub fn split_list(value: &str) -> Vec<&str> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Splits an optional `@Schema.` prefix off a reference.
///
/// Returns the schema name (if present) and the remaining dotted path.
#[must_use]
pub fn split_schema_ref(reference: &str) -> (Option<&str>, &str) {
    match reference.strip_prefix(SCHEMA_REF_PREFIX) {
        Some(rest) => match rest.split_once('.') {
            Some((schema, path)) => (Some(schema), path),
            None => (Some(rest), ""),
        },
        None => (None, reference),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert!(is_valid_name("Msg_1"));
        assert!(is_valid_name("_x"));
        assert!(!is_valid_name("1abc"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("a.b"));
        assert!(is_valid_ref("@Other.ns.Field"));
        assert!(!is_valid_ref("ns..Field"));
    }

    #[test]
    fn test_int_literals() {
        assert_eq!(parse_int_literal("10"), Some(10));
        assert_eq!(parse_int_literal("-0x10"), Some(-16));
        assert_eq!(parse_int_literal("0xff"), Some(255));
        assert_eq!(parse_int_literal("abc"), None);
        assert_eq!(parse_u32("-1"), None);
    }

    #[test]
    fn test_float_literals() {
        assert!(parse_float_literal("NaN").is_some_and(f64::is_nan));
        assert_eq!(parse_float_literal("-inf"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_float_literal("1.5"), Some(1.5));
        assert_eq!(parse_float_literal("3"), Some(3.0));
        assert_eq!(parse_float_literal("x"), None);
    }

    #[test]
    fn test_misc_literals() {
        assert_eq!(parse_range_literal("[0, 10]"), Some(("0", "10")));
        assert_eq!(parse_range_literal("0, 10"), None);
        assert_eq!(parse_hex_bytes("ab 01"), Some(vec![0xab, 0x01]));
        assert_eq!(split_list("a, b c"), vec!["a", "b", "c"]);
        assert_eq!(split_schema_ref("@S.ns.F"), (Some("S"), "ns.F"));
        assert_eq!(split_schema_ref("ns.F"), (None, "ns.F"));
    }
}
