use num_bigint::BigUint;

/// Parses a bare hexadecimal numeral.
///
/// Only ASCII hex digits are accepted (either case): no `0x` prefix, sign,
/// separators or whitespace. Leading zeros are allowed.
pub fn parse_hex_numeral(s: &str) -> Option<BigUint> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    BigUint::parse_bytes(s.as_bytes(), 16)
}

/// Lowercase hexadecimal numeral with no prefix and no zero padding.
pub fn to_hex_numeral(n: &BigUint) -> String {
    format!("{:x}", n)
}
