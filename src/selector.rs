//! Task id selector parser.
//!
//! Accepts either a flat list of tokens or one bracketed list that the shell
//! may have split across several arguments:
//! - `2 3 5-7`
//! - `[1,2,4-5]`
//! - `[1, 2, 4-5]` (arrives as `["[1,", "2,", "4-5]"]`)
//!
//! Ranges are inclusive and may be written backwards. The result keeps
//! first-seen order with duplicates removed.

use std::collections::HashSet;

use thiserror::Error;

/// Widest range a single `A-B` token may span
pub const MAX_RANGE_SPAN: u32 = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("missing task IDs")]
    Missing,

    #[error("empty bracket selector")]
    EmptyBracket,

    #[error("unterminated bracket selector")]
    Unterminated,

    #[error("bracket selector must be the only argument")]
    NotAlone,

    #[error("invalid task ID: {0}")]
    InvalidId(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),
}

/// Parse selector arguments into a deduplicated id list
pub fn parse_ids<S: AsRef<str>>(args: &[S]) -> Result<Vec<u32>, SelectorError> {
    if args.is_empty() {
        return Err(SelectorError::Missing);
    }

    if let Some(selector) = extract_bracket_selector(args)? {
        return parse_bracket_selector(&selector);
    }

    let mut ids = Vec::with_capacity(args.len());
    for arg in args {
        let token = arg.as_ref().trim();
        if token.is_empty() {
            continue;
        }
        if token.starts_with('[') || token.ends_with(']') {
            return Err(SelectorError::NotAlone);
        }
        expand_token(token, &mut ids)?;
    }

    if ids.is_empty() {
        return Err(SelectorError::Missing);
    }
    Ok(dedupe(ids))
}

/// Rejoin a bracket selector split across arguments.
fn extract_bracket_selector<S: AsRef<str>>(args: &[S]) -> Result<Option<String>, SelectorError> {
    if !args[0].as_ref().trim_start().starts_with('[') {
        return Ok(None);
    }

    let mut joined = String::new();
    for (idx, arg) in args.iter().enumerate() {
        let arg = arg.as_ref();
        if idx > 0 {
            joined.push(' ');
        }
        joined.push_str(arg);
        if arg.contains(']') {
            if idx != args.len() - 1 {
                return Err(SelectorError::NotAlone);
            }
            return Ok(Some(joined));
        }
    }
    Err(SelectorError::Unterminated)
}

fn parse_bracket_selector(selector: &str) -> Result<Vec<u32>, SelectorError> {
    let trimmed = selector.trim();
    let content = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        // content after the closing bracket inside the same argument
        .ok_or(SelectorError::NotAlone)?;

    if content.contains(|c| c == '[' || c == ']') {
        return Err(SelectorError::InvalidId(content.trim().to_string()));
    }
    if content.trim().is_empty() {
        return Err(SelectorError::EmptyBracket);
    }

    let mut ids = Vec::new();
    for field in content.split(|c: char| matches!(c, ',' | ' ' | '\t' | '\n' | '\r')) {
        if field.is_empty() {
            continue;
        }
        expand_token(field, &mut ids)?;
    }
    if ids.is_empty() {
        return Err(SelectorError::EmptyBracket);
    }
    Ok(dedupe(ids))
}

/// Expand `N` or `A-B` into `out`
fn expand_token(token: &str, out: &mut Vec<u32>) -> Result<(), SelectorError> {
    if token.matches('-').count() == 1 {
        let (left, right) = token.split_once('-').unwrap_or((token, ""));
        if left.is_empty() || right.is_empty() {
            return Err(SelectorError::InvalidRange(token.to_string()));
        }
        let mut start = parse_id(left)?;
        let mut end = parse_id(right)?;
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        if end - start >= MAX_RANGE_SPAN {
            return Err(SelectorError::InvalidRange(token.to_string()));
        }
        out.extend(start..=end);
        return Ok(());
    }

    out.push(parse_id(token)?);
    Ok(())
}

fn parse_id(raw: &str) -> Result<u32, SelectorError> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SelectorError::InvalidId(raw.to_string()));
    }
    raw.parse()
        .map_err(|_| SelectorError::InvalidId(raw.to_string()))
}

fn dedupe(ids: Vec<u32>) -> Vec<u32> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
