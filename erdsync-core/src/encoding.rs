//! Comment encoding for the legacy diagram format.
//!
//! Diagram files store comment text as CP949 (Unified Hangul Code) bytes,
//! each written as a backslash followed by its decimal value: `가` becomes
//! `\176\161`. [`encode_comment`] produces that form from a Rust string.
//!
//! Two strategies exist, selected by [`EncodingPolicy`]:
//! - [`EncodingPolicy::Lossy`] transcodes the whole string and escapes every
//!   byte, dropping characters CP949 cannot represent.
//! - [`EncodingPolicy::HangulOnly`] escapes only runs of Hangul syllables and
//!   leaves everything else as written.

use crate::error::{ErdSyncError, Result};
use encoding_rs::EUC_KR;
use regex::Regex;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::LazyLock;

/// Runs of precomposed Hangul syllables (U+AC00..=U+D7A3).
static HANGUL_RUN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[\u{AC00}-\u{D7A3}]+").expect("Hangul run pattern is valid")
});

/// How characters outside the legacy codepage are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingPolicy {
    /// Transcode and escape the entire string; drop unencodable characters.
    #[default]
    Lossy,
    /// Escape only Hangul syllable runs; leave all other text unchanged.
    HangulOnly,
}

impl std::fmt::Display for EncodingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lossy => write!(f, "lossy"),
            Self::HangulOnly => write!(f, "hangul-only"),
        }
    }
}

impl std::str::FromStr for EncodingPolicy {
    type Err = ErdSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lossy" => Ok(Self::Lossy),
            "hangul-only" | "hangul" => Ok(Self::HangulOnly),
            other => Err(ErdSyncError::configuration(format!(
                "Unknown encoding policy '{}': expected 'lossy' or 'hangul-only'",
                other
            ))),
        }
    }
}

/// Result of encoding one comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedComment {
    /// Escaped text ready to be stored as an attribute value
    pub text: String,
    /// Characters that had no CP949 representation and were dropped
    pub dropped: Vec<char>,
}

/// Encodes a comment using the default [`EncodingPolicy::Lossy`] policy.
///
/// # Example
///
/// ```rust
/// use erdsync_core::encoding::encode_comment;
///
/// assert_eq!(encode_comment(Some("가")), "\\176\\161");
/// assert_eq!(encode_comment(None), "");
/// ```
pub fn encode_comment(text: Option<&str>) -> String {
    encode_comment_with(text, EncodingPolicy::Lossy).text
}

/// Encodes a comment with an explicit policy, reporting dropped characters.
pub fn encode_comment_with(text: Option<&str>, policy: EncodingPolicy) -> EncodedComment {
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return EncodedComment::default();
    };

    match policy {
        EncodingPolicy::Lossy => {
            let (bytes, dropped) = transcode_reporting(text);
            EncodedComment {
                text: escape_bytes(&bytes),
                dropped,
            }
        }
        EncodingPolicy::HangulOnly => EncodedComment {
            text: HANGUL_RUN
                .replace_all(text, |caps: &regex::Captures<'_>| {
                    let run = &caps[0];
                    let (bytes, _, had_unmappable) = EUC_KR.encode(run);
                    if had_unmappable {
                        run.to_string()
                    } else {
                        escape_bytes(&bytes)
                    }
                })
                .into_owned(),
            dropped: Vec::new(),
        },
    }
}

/// Transcodes text to CP949 bytes, silently dropping unencodable characters.
pub fn transcode(text: &str) -> Vec<u8> {
    transcode_reporting(text).0
}

fn transcode_reporting(text: &str) -> (Vec<u8>, Vec<char>) {
    let mut bytes = Vec::with_capacity(text.len());
    let mut dropped = Vec::new();
    let mut buf = [0u8; 4];

    // EUC-KR in encoding_rs is the windows-949 superset and is stateless,
    // so encoding one character at a time is equivalent to a single pass.
    for c in text.chars() {
        let (encoded, _, had_unmappable) = EUC_KR.encode(c.encode_utf8(&mut buf));
        if had_unmappable {
            dropped.push(c);
        } else {
            bytes.extend_from_slice(&encoded);
        }
    }

    (bytes, dropped)
}

/// Renders every byte as `\` followed by its decimal value.
pub fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().saturating_mul(4));
    for byte in bytes {
        let _ = write!(out, "\\{}", byte);
    }
    out
}

/// Decodes `\NNN` escape groups back into the bytes they stand for.
///
/// The input must consist solely of escape groups; anything else, or a
/// value above 255, is rejected with [`ErdSyncError::InvalidEscape`].
pub fn decode_escaped(escaped: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(escaped.len() / 3);
    let mut chars = escaped.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c != '\\' {
            return Err(ErdSyncError::InvalidEscape {
                offset,
                message: format!("expected '\\', found '{}'", c),
            });
        }

        let mut value: u32 = 0;
        let mut digits = 0usize;
        while let Some(&(_, d)) = chars.peek() {
            let Some(digit) = d.to_digit(10) else {
                break;
            };
            value = value.saturating_mul(10).saturating_add(digit);
            digits = digits.saturating_add(1);
            chars.next();
        }

        if digits == 0 {
            return Err(ErdSyncError::InvalidEscape {
                offset,
                message: "escape has no decimal digits".to_string(),
            });
        }

        let byte = u8::try_from(value).map_err(|_| ErdSyncError::InvalidEscape {
            offset,
            message: format!("value {} does not fit in a byte", value),
        })?;
        bytes.push(byte);
    }

    Ok(bytes)
}
