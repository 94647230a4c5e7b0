use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::parser::{ValuePattern, DEFAULT_VALUE_PATTERN};
use crate::transport::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};

/// What to do with the output artifact when a session captured nothing.
/// Either way, the session reports NoData.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmptySessionPolicy {
    /// Keep a file that contains just the header row.
    HeaderOnly,
    /// Delete the file.
    Discard,
}

impl FromStr for EmptySessionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "header-only" | "header_only" => Ok(EmptySessionPolicy::HeaderOnly),
            "discard" => Ok(EmptySessionPolicy::Discard),
            other => Err(format!(
                "unknown empty-session policy '{other}' (expected header-only or discard)"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// Serial port, e.g. "COM3" or "/dev/ttyUSB0". Required.
    pub address: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    /// Explicit output path. If None, a name is generated in `logs_dir`.
    pub output_path: Option<PathBuf>,
    /// None means log until stopped.
    pub duration: Option<Duration>,
    /// Display-only.
    pub units: String,
    pub value_pattern: String,
    pub flush_every: usize,
    pub clear_buffer_on_start: bool,
    pub empty_session: EmptySessionPolicy,
    pub completion_cue: bool,
    /// Defaults to a "logs" directory next to the executable.
    pub logs_dir: Option<PathBuf>,
    pub file_prefix: String,
    pub file_extension: String,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            address: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            output_path: None,
            duration: None,
            units: String::new(),
            value_pattern: DEFAULT_VALUE_PATTERN.to_string(),
            flush_every: 1,
            clear_buffer_on_start: true,
            empty_session: EmptySessionPolicy::HeaderOnly,
            completion_cue: true,
            logs_dir: None,
            file_prefix: "scalelog".to_string(),
            file_extension: "csv".to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("a serial port address is required")]
    MissingAddress,
    #[error("baud rate must be positive")]
    ZeroBaudRate,
    #[error("read timeout must be positive")]
    ZeroReadTimeout,
    #[error("duration must be positive (leave it out to log continuously)")]
    ZeroDuration,
    #[error("flush interval must be at least one row")]
    ZeroFlushInterval,
    #[error("invalid value pattern: {0}")]
    InvalidPattern(String),
    #[error("file prefix and extension must be non-empty and must not contain path separators")]
    InvalidFileName,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read options: {0}")]
    IoError(String),
    #[error("line {line}: {reason}")]
    InvalidLine { line: usize, reason: &'static str },
    #[error("line {line}: unsupported option '{option}'")]
    UnknownOption { line: usize, option: String },
    #[error("line {line}: invalid value for {option}: {reason}")]
    InvalidValue {
        line: usize,
        option: String,
        reason: String,
    },
}

const PARSE_ERROR_MESSAGE_BAD_LEADING_QUOTATION: &str = r#"quotation marks must occur immediately after the separator ('foo,"bar"' is OK, 'foo, "bar"' is not)"#;
const PARSE_ERROR_MESSAGE_BAD_TRAILING_QUOTATION: &str = r#"the separator (or end of line) must follow a closing quotation mark immediately"#;
const PARSE_ERROR_MESSAGE_UNCLOSED_QUOTATION: &str = "all quotations must be closed";
const PARSE_ERROR_MESSAGE_UNQUOTED_HASH: &str = r##"raw hash symbols (#) are not allowed inline, quote the value if necessary, e.g. "#ok""##;
const PARSE_ERROR_MESSAGE_MISSING_VALUE: &str = "expected 'option,value'";

// Options files are tiny - a full CSV parser isn't warranted. Values that
// contain commas (regexes, mostly) need quoting; a doubled quote inside a
// quoted value is a literal quote.
fn tokenise_line(line: &str) -> Result<Vec<String>, &'static str> {
    enum LineState {
        Normal,
        InQuote,
    }

    let mut iter = line.chars().peekable();
    let mut out = Vec::new();
    let mut current_token = String::new();
    let mut state = LineState::Normal;
    loop {
        match iter.next() {
            Some(',') => match state {
                LineState::Normal => out.push(std::mem::take(&mut current_token)),
                LineState::InQuote => current_token.push(','),
            },
            Some('"') => match state {
                LineState::Normal => {
                    if !current_token.is_empty() {
                        return Err(PARSE_ERROR_MESSAGE_BAD_LEADING_QUOTATION);
                    }
                    state = LineState::InQuote;
                }
                LineState::InQuote => match iter.peek() {
                    None | Some(',') => {
                        state = LineState::Normal;
                    }
                    Some('"') => {
                        current_token.push('"');
                        iter.next();
                    }
                    Some(_) => return Err(PARSE_ERROR_MESSAGE_BAD_TRAILING_QUOTATION),
                },
            },
            Some('#') => match state {
                LineState::Normal => return Err(PARSE_ERROR_MESSAGE_UNQUOTED_HASH),
                LineState::InQuote => current_token.push('#'),
            },
            Some(c) => current_token.push(c),
            None => break,
        }
    }
    if matches!(state, LineState::InQuote) {
        return Err(PARSE_ERROR_MESSAGE_UNCLOSED_QUOTATION);
    }
    out.push(current_token);
    Ok(out)
}

/// Parses a positive, finite number of seconds.
pub fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds = f64::from_str(value.trim()).map_err(|e| format!("'{value}': {e}"))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("'{value}' is not a positive number of seconds"));
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("'{value}': {e}"))
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(format!("'{other}' is not a boolean")),
    }
}

fn optional(value: &str) -> Option<&str> {
    match value.trim() {
        "" | "none" => None,
        value => Some(value),
    }
}

impl SessionConfig {
    pub fn new(address: impl Into<String>) -> SessionConfig {
        SessionConfig {
            address: address.into(),
            ..SessionConfig::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.address.trim().is_empty() {
            return Err(ValidationError::MissingAddress);
        }
        if self.baud_rate == 0 {
            return Err(ValidationError::ZeroBaudRate);
        }
        if self.read_timeout.is_zero() {
            return Err(ValidationError::ZeroReadTimeout);
        }
        if self.duration.is_some_and(|duration| duration.is_zero()) {
            return Err(ValidationError::ZeroDuration);
        }
        if self.flush_every == 0 {
            return Err(ValidationError::ZeroFlushInterval);
        }
        for part in [&self.file_prefix, &self.file_extension] {
            if part.is_empty() || part.contains(['/', '\\']) {
                return Err(ValidationError::InvalidFileName);
            }
        }
        self.compile_pattern()?;
        Ok(())
    }

    pub fn compile_pattern(&self) -> Result<ValuePattern, ValidationError> {
        ValuePattern::new(&self.value_pattern)
            .map_err(|e| ValidationError::InvalidPattern(e.to_string()))
    }

    /// Sets a single option by name. Names match the options file (and the
    /// CLI flags, with '-' in place of '_').
    pub fn set_option(&mut self, option: &str, value: &str) -> Result<(), SetOptionError> {
        let invalid = |reason: String| SetOptionError::InvalidValue(reason);
        match option {
            "address" => self.address = value.trim().to_string(),
            "baud_rate" => {
                self.baud_rate = u32::from_str(value.trim())
                    .map_err(|e| invalid(format!("'{value}': {e}")))?
            }
            "read_timeout_s" => self.read_timeout = parse_seconds(value).map_err(invalid)?,
            "output_path" => self.output_path = optional(value).map(PathBuf::from),
            "duration_s" => {
                self.duration = match optional(value) {
                    Some(value) => Some(parse_seconds(value).map_err(invalid)?),
                    None => None,
                }
            }
            // Whitespace may well be intentional in these.
            "units_label" => self.units = value.to_string(),
            "value_pattern" => self.value_pattern = value.to_string(),
            "flush_every_n_rows" => {
                self.flush_every = usize::from_str(value.trim())
                    .map_err(|e| invalid(format!("'{value}': {e}")))?
            }
            "clear_buffer_on_start" => {
                self.clear_buffer_on_start = parse_bool(value).map_err(invalid)?
            }
            "empty_session" => {
                self.empty_session = EmptySessionPolicy::from_str(value.trim()).map_err(invalid)?
            }
            "completion_cue" => self.completion_cue = parse_bool(value).map_err(invalid)?,
            "logs_dir" => self.logs_dir = optional(value).map(PathBuf::from),
            "file_prefix" => self.file_prefix = value.trim().to_string(),
            "file_extension" => self.file_extension = value.trim().to_string(),
            _ => return Err(SetOptionError::UnknownOption),
        }
        Ok(())
    }

    /// Reads `option,value` lines on top of the defaults. Blank lines and
    /// lines starting with '#' are skipped. Unknown options are rejected:
    /// silently ignoring a misspelt "duration_s" would log forever.
    pub fn parse_from_csv(csv: &mut dyn std::io::BufRead) -> Result<SessionConfig, ParseError> {
        let mut config = SessionConfig::default();
        config.apply_csv(csv)?;
        Ok(config)
    }

    pub fn apply_csv(&mut self, csv: &mut dyn std::io::BufRead) -> Result<(), ParseError> {
        let mut line = String::with_capacity(64);
        let mut line_number = 0;
        loop {
            line.clear();
            line_number += 1;
            match csv.read_line(&mut line) {
                // EOF
                Ok(0) => break,
                Ok(_) => (),
                Err(e) => return Err(ParseError::IoError(e.to_string())),
            }

            let data = line.trim();
            if data.is_empty() || data.starts_with('#') {
                continue;
            }

            let tokens = tokenise_line(data).map_err(|reason| ParseError::InvalidLine {
                line: line_number,
                reason,
            })?;
            let [option, value] = tokens.as_slice() else {
                return Err(ParseError::InvalidLine {
                    line: line_number,
                    reason: PARSE_ERROR_MESSAGE_MISSING_VALUE,
                });
            };
            let option = option.trim();
            self.set_option(option, value).map_err(|e| match e {
                SetOptionError::UnknownOption => ParseError::UnknownOption {
                    line: line_number,
                    option: option.to_string(),
                },
                SetOptionError::InvalidValue(reason) => ParseError::InvalidValue {
                    line: line_number,
                    option: option.to_string(),
                    reason,
                },
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SetOptionError {
    UnknownOption,
    InvalidValue(String),
}
