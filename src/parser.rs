use std::str::FromStr;

use regex::Regex;

/// Matches an optionally signed number with an optional decimal part, e.g.
/// "12", "-0.5" or "+.25". Scales tend to pad weights with zeros and wrap
/// them in status fields ("ST,GS,+0012.50 g"), which this handles fine.
pub const DEFAULT_VALUE_PATTERN: &str = r"([-+]?\d*\.?\d+)";

/// A precompiled numeric-extraction pattern.
///
/// If the pattern contains a capture group, the first group is used as the
/// numeric token. Otherwise the whole match is used.
#[derive(Clone, Debug)]
pub struct ValuePattern {
    regex: Regex,
}

impl ValuePattern {
    pub fn new(pattern: &str) -> Result<ValuePattern, regex::Error> {
        Ok(ValuePattern {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl Default for ValuePattern {
    fn default() -> ValuePattern {
        ValuePattern::new(DEFAULT_VALUE_PATTERN).expect("default value pattern must compile")
    }
}

impl PartialEq for ValuePattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// Decodes a raw line as UTF-8, dropping (not replacing) malformed byte
/// sequences, and trims surrounding whitespace including the line terminator.
/// Returns None if nothing meaningful is left.
pub fn decode_line(raw: &[u8]) -> Option<String> {
    let mut line = String::with_capacity(raw.len());
    for chunk in raw.utf8_chunks() {
        line.push_str(chunk.valid());
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Extracts the first numeric token from `line`. Lines without a usable
/// number (device banners, status chatter, "====") yield None - that's an
/// ordinary outcome, not an error.
pub fn parse_value(line: &str, pattern: &ValuePattern) -> Option<f64> {
    let captures = pattern.regex.captures(line)?;
    let token = captures.get(1).or_else(|| captures.get(0))?;
    f64::from_str(token.as_str())
        .ok()
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        struct TestCase<'a> {
            name: &'a str,
            input: &'a str,
            expected: Option<f64>,
        }
        let tests = [
            TestCase {
                name: "NetWeightWithUnits",
                input: "Net 12.34 g",
                expected: Some(12.34),
            },
            TestCase {
                name: "PureNoise",
                input: "====",
                expected: None,
            },
            TestCase {
                name: "NegativeFraction",
                input: "-0.5",
                expected: Some(-0.5),
            },
            TestCase {
                name: "ExplicitPlusAndPadding",
                input: "ST,GS,+0012.50 g",
                expected: Some(12.5),
            },
            TestCase {
                name: "FirstTokenWins",
                input: "1.5 2.5 3.5",
                expected: Some(1.5),
            },
            TestCase {
                name: "LeadingDecimalPoint",
                input: "W: .25kg",
                expected: Some(0.25),
            },
            TestCase {
                name: "Integer",
                input: "   42   ",
                expected: Some(42.0),
            },
            TestCase {
                name: "Banner",
                input: "OHAUS SCALE READY",
                expected: None,
            },
            TestCase {
                name: "Empty",
                input: "",
                expected: None,
            },
        ];
        let pattern = ValuePattern::default();
        for case in tests {
            let got = parse_value(case.input, &pattern);
            assert_eq!(
                got, case.expected,
                "{}: got={got:?}, want={:?}",
                case.name, case.expected
            );
        }
    }

    #[test]
    fn test_parse_value_custom_pattern() {
        // No capture group: the whole match is the token.
        let pattern = ValuePattern::new(r"\d+\.\d{2}").unwrap();
        assert_eq!(parse_value("id 7 weight 3.17 g", &pattern), Some(3.17));

        // The first capture group is used even when the match is wider.
        let pattern = ValuePattern::new(r"N\s+([-+]?\d+\.\d+)").unwrap();
        assert_eq!(parse_value("G 1.00 N -2.50 T 0.00", &pattern), Some(-2.5));

        // Matches that don't convert are misses.
        let pattern = ValuePattern::new(r"([a-z]+)").unwrap();
        assert_eq!(parse_value("abc", &pattern), None);
        let pattern = ValuePattern::new(r"(nan|inf)").unwrap();
        assert_eq!(parse_value("inf", &pattern), None);
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(ValuePattern::new(r"([-+]?\d").is_err());
    }

    #[test]
    fn test_decode_line() {
        struct TestCase<'a> {
            name: &'a str,
            input: &'a [u8],
            expected: Option<&'a str>,
        }
        let tests = [
            TestCase {
                name: "CrLfTerminated",
                input: b"  12.50 g\r\n",
                expected: Some("12.50 g"),
            },
            TestCase {
                name: "MalformedBytesDropped",
                input: b"\xff1\xfe2.5\xc3\r\n",
                expected: Some("12.5"),
            },
            TestCase {
                name: "OnlyWhitespace",
                input: b" \t\r\n",
                expected: None,
            },
            TestCase {
                name: "OnlyGarbage",
                input: b"\xff\xfe\r\n",
                expected: None,
            },
            TestCase {
                name: "Empty",
                input: b"",
                expected: None,
            },
            TestCase {
                name: "ValidMultibyte",
                input: "12.5 µg\n".as_bytes(),
                expected: Some("12.5 µg"),
            },
        ];
        for case in tests {
            let got = decode_line(case.input);
            assert_eq!(
                got.as_deref(),
                case.expected,
                "{}: got={got:?}, want={:?}",
                case.name,
                case.expected
            );
        }
    }
}
