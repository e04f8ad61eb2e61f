//! Header split and rejoin.

use thiserror::Error;

use super::rule::WhitelistRule;
use crate::http::headers::{assemble, is_valid_header_line, split_lines, MessageParts, CRLF};

/// The split could not be performed.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("message has no start line")]
    Empty,

    #[error("invalid header line {0:?}")]
    InvalidHeaderLine(String),
}

/// Result of splitting a request head.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Split {
    /// Start line plus whitelisted header lines, terminated by a blank line.
    pub whitelisted: Vec<u8>,
    /// Withheld header lines, each CRLF-terminated.
    pub withheld: Vec<u8>,
}

/// Ordered, immutable rule list.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    rules: Vec<WhitelistRule>,
}

impl Whitelist {
    pub fn new(rules: Vec<WhitelistRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[WhitelistRule] {
        &self.rules
    }

    /// Splits the head of `message` into whitelisted and withheld lines.
    ///
    /// Each rule consumes at most one header line per message, so a second
    /// occurrence of a whitelisted name is withheld. Any malformed header
    /// line rejects the whole message.
    pub fn split(&self, message: &[u8]) -> Result<Split, SplitError> {
        let parts = MessageParts::split(message);
        let mut lines = parts.lines();
        let start_line = lines.next().ok_or(SplitError::Empty)?;

        let mut split = Split::default();
        split.whitelisted.extend_from_slice(start_line);
        split.whitelisted.extend_from_slice(CRLF);

        let mut consumed = vec![false; self.rules.len()];
        for line in lines {
            if !is_valid_header_line(line) {
                return Err(SplitError::InvalidHeaderLine(
                    String::from_utf8_lossy(line).into_owned(),
                ));
            }

            let matched = self
                .rules
                .iter()
                .enumerate()
                .find(|(i, rule)| !consumed[*i] && rule.matches(line))
                .map(|(i, _)| i);

            let target = match matched {
                Some(i) => {
                    consumed[i] = true;
                    &mut split.whitelisted
                }
                None => &mut split.withheld,
            };
            target.extend_from_slice(line);
            target.extend_from_slice(CRLF);
        }

        split.whitelisted.extend_from_slice(CRLF);
        Ok(split)
    }
}

/// Merges withheld header lines back into `message`.
///
/// Headers already present in `message` win: a withheld line whose field
/// name is present is dropped. The body, if any, is preserved.
pub fn join(message: &[u8], withheld: &[u8]) -> Vec<u8> {
    let parts = MessageParts::split(message);
    let present = parts.header_names();

    let restored = split_lines(withheld).filter(|line| {
        crate::http::headers::field_name(line)
            .map(|name| !present.contains(&name.to_ascii_lowercase()))
            .unwrap_or(true)
    });

    assemble(parts.lines().chain(restored), parts.body)
}
