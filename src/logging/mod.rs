//! Tracing setup and secret redaction for messages that leave the core.

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum message length before truncation
const MAX_LINE_LENGTH: usize = 2048;

/// Default directive when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "sftp_explorer=info,warn";

/// Sensitive patterns to redact
static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // PEM / OpenSSH private key blocks
        Regex::new(r"(?s)-----BEGIN[^-]*PRIVATE KEY-----.*?-----END[^-]*PRIVATE KEY-----").unwrap(),
        Regex::new(r"(?s)-----BEGIN[^-]*KEY-----.*?-----END[^-]*KEY-----").unwrap(),
        // Secrets by key name (key=value patterns)
        Regex::new(r#"(?i)(password|passwd|pwd|secret|token|private[_-]?key|passphrase)\s*[:=]\s*["']?[^\s"']+["']?"#).unwrap(),
        // Long base64 runs (key material pasted into an error). No `/`, so
        // POSIX paths in NotFound/Io messages survive.
        Regex::new(r"[A-Za-z0-9+]{64,}={0,2}").unwrap(),
    ]
});

/// Sanitize a string by removing sensitive information
pub fn sanitize(input: &str) -> String {
    let mut result = input.to_string();

    for pattern in SENSITIVE_PATTERNS.iter() {
        result = pattern.replace_all(&result, "[REDACTED]").to_string();
    }

    if result.len() > MAX_LINE_LENGTH {
        let mut cut = MAX_LINE_LENGTH;
        while !result.is_char_boundary(cut) {
            cut -= 1;
        }
        result = format!("{}... [truncated]", &result[..cut]);
    }

    result
}

/// Install the global fmt subscriber. Output goes to stderr; stdout carries
/// the command protocol.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
