//! Integer literal parsing
//!
//! Literals may be written in binary (`0b101`), octal (`017`), decimal
//! (`42`) or hexadecimal (`0x2A`), with an optional leading minus sign.
//! The parser works on a string view and advances it past the characters
//! it consumed, so the lexer can tell whether a lexeme held trailing junk.

use std::fmt;

/// Why an integer literal failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberError {
    /// No literal at all
    Empty,
    /// A sign or base prefix with nothing after it
    MissingDigits,
    /// A digit that does not belong to the selected base
    InvalidDigit { digit: char, base: u32 },
    /// The value does not fit in a 32-bit signed integer
    Overflow,
}

impl fmt::Display for NumberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberError::Empty => write!(f, "empty number literal"),
            NumberError::MissingDigits => write!(f, "number literal has no digits"),
            NumberError::InvalidDigit { digit, base } => {
                write!(f, "invalid digit '{}' for base {}", digit, base)
            }
            NumberError::Overflow => write!(f, "number does not fit in a 32-bit integer"),
        }
    }
}

/// Parse one integer literal from the front of `input`.
///
/// On success the view is advanced past everything that was consumed:
/// sign, base prefix and the digit run. The digit run is the longest
/// prefix of hex-digit characters; each one must be valid for the
/// selected base, so `0b102` fails on the `2` rather than stopping early.
pub fn parse_int(input: &mut &str) -> Result<i32, NumberError> {
    let mut rest = *input;

    let negative = match rest.strip_prefix('-') {
        Some(stripped) => {
            rest = stripped;
            true
        }
        None => false,
    };
    if rest.is_empty() {
        return Err(if negative {
            NumberError::MissingDigits
        } else {
            NumberError::Empty
        });
    }

    let base = if let Some(stripped) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        rest = stripped;
        16
    } else if let Some(stripped) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        rest = stripped;
        2
    } else if rest.len() >= 2 && rest.starts_with('0') && rest.as_bytes()[1].is_ascii_hexdigit() {
        // the leading zero stays part of the digit run
        8
    } else {
        10
    };

    let digits_len = rest.bytes().take_while(|b| b.is_ascii_hexdigit()).count();
    let digits = &rest[..digits_len];
    if digits.is_empty() {
        return Err(if negative || base == 16 || base == 2 {
            NumberError::MissingDigits
        } else {
            NumberError::Empty
        });
    }

    let mut magnitude: i64 = 0;
    for digit in digits.chars() {
        let value = digit.to_digit(16).unwrap() as i64;
        if value >= base as i64 {
            return Err(NumberError::InvalidDigit { digit, base });
        }
        magnitude = magnitude * base as i64 + value;
        if magnitude > u32::MAX as i64 {
            return Err(NumberError::Overflow);
        }
    }
    let limit = if negative {
        i32::MAX as i64 + 1
    } else {
        i32::MAX as i64
    };
    if magnitude > limit {
        return Err(NumberError::Overflow);
    }

    let consumed = (input.len() - rest.len()) + digits_len;
    *input = &input[consumed..];
    let signed = if negative { -magnitude } else { magnitude };
    Ok(signed as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(text: &str) -> Result<i32, NumberError> {
        let mut view = text;
        let value = parse_int(&mut view)?;
        assert!(view.is_empty(), "leftover input {:?}", view);
        Ok(value)
    }

    /// Format `value` in `base` with the prefix `parse_int` expects.
    fn format_in_base(value: i32, base: u32) -> String {
        let magnitude = (value as i64).unsigned_abs();
        let sign = if value < 0 { "-" } else { "" };
        match base {
            2 => format!("{}0b{:b}", sign, magnitude),
            8 => format!("{}0{:o}", sign, magnitude),
            10 => format!("{}{}", sign, magnitude),
            16 => format!("{}0x{:x}", sign, magnitude),
            _ => unreachable!(),
        }
    }

    #[test]
    fn decimal() {
        assert_eq!(parse_all("0"), Ok(0));
        assert_eq!(parse_all("42"), Ok(42));
        assert_eq!(parse_all("-17"), Ok(-17));
        assert_eq!(parse_all("2147483647"), Ok(i32::MAX));
        assert_eq!(parse_all("-2147483648"), Ok(i32::MIN));
    }

    #[test]
    fn prefixed_bases() {
        assert_eq!(parse_all("0x2A"), Ok(42));
        assert_eq!(parse_all("0X2a"), Ok(42));
        assert_eq!(parse_all("-0x10"), Ok(-16));
        assert_eq!(parse_all("0b1010"), Ok(10));
        assert_eq!(parse_all("0B11"), Ok(3));
        assert_eq!(parse_all("017"), Ok(15));
        assert_eq!(parse_all("-010"), Ok(-8));
    }

    #[test]
    fn invalid_digits_name_the_base() {
        assert_eq!(
            parse_all("0b102"),
            Err(NumberError::InvalidDigit { digit: '2', base: 2 })
        );
        assert_eq!(
            parse_all("089"),
            Err(NumberError::InvalidDigit { digit: '8', base: 8 })
        );
        // hex digits are scanned even in decimal literals, then rejected
        assert_eq!(
            parse_all("12ab"),
            Err(NumberError::InvalidDigit { digit: 'a', base: 10 })
        );
    }

    #[test]
    fn missing_digits() {
        assert_eq!(parse_all(""), Err(NumberError::Empty));
        assert_eq!(parse_all("-"), Err(NumberError::MissingDigits));
        assert_eq!(parse_all("0x"), Err(NumberError::MissingDigits));
        assert_eq!(parse_all("-0b"), Err(NumberError::MissingDigits));
    }

    #[test]
    fn overflow() {
        assert_eq!(parse_all("2147483648"), Err(NumberError::Overflow));
        assert_eq!(parse_all("-2147483649"), Err(NumberError::Overflow));
        assert_eq!(parse_all("0x100000000"), Err(NumberError::Overflow));
        assert_eq!(parse_all("0x80000000"), Err(NumberError::Overflow));
        assert_eq!(parse_all("-0x80000000"), Ok(i32::MIN));
    }

    #[test]
    fn advances_past_the_literal_only() {
        let mut view = "123)";
        assert_eq!(parse_int(&mut view), Ok(123));
        assert_eq!(view, ")");

        let mut view = "-0x1f rest";
        assert_eq!(parse_int(&mut view), Ok(-31));
        assert_eq!(view, " rest");
    }

    #[test]
    fn roundtrip_in_every_base() {
        let samples = [
            0,
            1,
            -1,
            7,
            -8,
            42,
            255,
            -256,
            4096,
            65535,
            -65536,
            123_456_789,
            i32::MAX,
            i32::MIN,
        ];
        for value in samples {
            for base in [2, 8, 10, 16] {
                let text = format_in_base(value, base);
                let mut view = text.as_str();
                assert_eq!(parse_int(&mut view), Ok(value), "{}", text);
                assert!(view.is_empty(), "{} left {:?}", text, view);
            }
        }
    }
}
