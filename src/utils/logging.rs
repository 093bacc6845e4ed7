//! Structured Logging with Sensitive Data Redaction
//!
//! Log entries are emitted through `tracing`. Fields are redacted before they
//! leave the entry:
//! - Mnemonics, passwords, seeds and secret keys are fully redacted
//! - Addresses keep a short prefix and suffix
//! - Hashes and BOCs keep a short prefix and suffix

use std::fmt;

use tracing_subscriber::EnvFilter;

use crate::error::{HawalaError, HawalaResult};

/// Install a formatting subscriber filtered by `filter` (e.g. `"hawala_ton_core=debug"`).
///
/// `RUST_LOG` overrides the argument when set. Calling this twice is an error.
pub fn init_logging(filter: &str) -> HawalaResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|e| HawalaError::invalid_input(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|e| HawalaError::internal(format!("Logger already installed: {}", e)))
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// How a field value is shown in the log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Redaction {
    None,
    Full,
    Address,
    Digest,
}

impl Redaction {
    /// Classify a field by its key
    fn for_key(key: &str) -> Self {
        const SECRET: &[&str] = &[
            "secret", "seed", "mnemonic", "password", "passphrase", "private",
            "signing_key", "ciphertext", "plaintext",
        ];
        const ACCOUNT: &[&str] = &["address", "recipient", "sender", "destination", "wallet"];
        const DIGEST: &[&str] = &["hash", "boc", "signature"];

        let key = key.to_ascii_lowercase();
        let hit = |needles: &[&str]| needles.iter().any(|n| key.contains(n));
        if hit(SECRET) {
            Redaction::Full
        } else if hit(ACCOUNT) {
            Redaction::Address
        } else if hit(DIGEST) {
            Redaction::Digest
        } else {
            Redaction::None
        }
    }

    fn apply(self, value: &str) -> String {
        match self {
            Redaction::None => value.to_string(),
            Redaction::Full => redact_value(value),
            Redaction::Address => redact_address(value),
            Redaction::Digest => redact_hash(value),
        }
    }
}

/// Structured log entry
#[derive(Debug)]
pub struct LogEntry {
    pub level: LogLevel,
    pub module: &'static str,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, module: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            module,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Append `key=value`, redacted according to the key name
    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        let shown = Redaction::for_key(key).apply(&value.to_string());
        self.fields.push((key, shown));
        self
    }

    /// Append an account address whatever the key is called
    pub fn address_field(mut self, key: &'static str, address: &str) -> Self {
        self.fields.push((key, Redaction::Address.apply(address)));
        self
    }

    fn render_fields(&self) -> String {
        let mut out = String::new();
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(k);
            out.push('=');
            out.push_str(v);
        }
        out
    }

    /// Emit the entry
    pub fn log(self) {
        let fields = self.render_fields();
        let module = self.module;
        let message = self.message.as_str();

        match self.level {
            LogLevel::Debug => tracing::debug!(module, fields = %fields, "{}", message),
            LogLevel::Info => tracing::info!(module, fields = %fields, "{}", message),
            LogLevel::Warn => tracing::warn!(module, fields = %fields, "{}", message),
            LogLevel::Error => tracing::error!(module, fields = %fields, "{}", message),
        }
    }
}

#[cfg(test)]
fn redact_if_sensitive(key: &str, value: &str) -> String {
    Redaction::for_key(key).apply(value)
}

fn redact_value(value: &str) -> String {
    match value.len() {
        0 => "[EMPTY]".to_string(),
        1..=4 => "[REDACTED]".to_string(),
        len => format!("[REDACTED:{}chars]", len),
    }
}

/// Keep the first 6 and last 4 characters; raw `wc:hex` keeps the workchain too
fn redact_address(address: &str) -> String {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }
    if !trimmed.is_ascii() {
        return redact_value(trimmed);
    }

    let head = match trimmed.find(':') {
        Some(idx) if idx < 4 => idx + 5,
        _ => 6,
    };
    const TAIL: usize = 4;
    if trimmed.len() <= head + TAIL + 3 {
        return redact_value(trimmed);
    }

    format!("{}...{}", &trimmed[..head], &trimmed[trimmed.len() - TAIL..])
}

/// Keep the first 10 and last 6 characters of long hashes and BOCs
fn redact_hash(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }
    if trimmed.len() <= 20 || !trimmed.is_ascii() {
        return trimmed.to_string();
    }
    format!("{}...{}", &trimmed[..10], &trimmed[trimmed.len() - 6..])
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:ident, $module:expr, $msg:expr $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::utils::logging::LogEntry::new($crate::utils::logging::LogLevel::$level, $module, $msg)
            $(.field(stringify!($key), &$value))*
            .log()
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($args:tt)*) => { $crate::__log_at!(Debug, $($args)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($args:tt)*) => { $crate::__log_at!(Info, $($args)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($args:tt)*) => { $crate::__log_at!(Warn, $($args)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($args:tt)*) => { $crate::__log_at!(Error, $($args)*) };
}
