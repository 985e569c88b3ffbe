//! Structured edits of `## `-delimited body sections.
//!
//! Bodies are markdown; a section runs from its heading line to the next
//! line starting with `## ` or the end of the body. Every edit reassembles
//! the body through [`join_blocks`], so blank-line spacing stays canonical
//! no matter how many times a section is appended to.

use crate::clock::{self, Timestamp};

pub const LOG_HEADING: &str = "## Log";
pub const NOTES_HEADING: &str = "## Notes";

const NEXT_HEADING: &str = "\n## ";

/// A body cut around one section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split<'a> {
    pub before: &'a str,
    pub section: &'a str,
    pub after: &'a str,
    pub found: bool,
}

impl<'a> Split<'a> {
    /// Everything except the section, in original order
    pub fn rest(&self) -> String {
        join_blocks([self.before, self.after])
    }
}

/// Locate the first line equal to `heading`.
pub fn split_section<'a>(body: &'a str, heading: &str) -> Split<'a> {
    let Some(start) = find_heading_line(body, heading) else {
        return Split {
            before: body,
            section: "",
            after: "",
            found: false,
        };
    };

    let rest = &body[start..];
    let end = rest[heading.len()..]
        .find(NEXT_HEADING)
        .map(|idx| idx + heading.len() + 1)
        .unwrap_or(rest.len());

    Split {
        before: &body[..start],
        section: &rest[..end],
        after: &rest[end..],
        found: true,
    }
}

fn find_heading_line(body: &str, heading: &str) -> Option<usize> {
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        if line.trim_end() == heading {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

/// Add a line item to a section, one blank line before and after it.
pub fn append_entry(section: &str, entry: &str) -> String {
    let section = section.trim_end_matches('\n');
    if section.is_empty() {
        format!("{entry}\n\n")
    } else {
        format!("{section}\n\n{entry}\n\n")
    }
}

/// Join non-empty blocks with exactly one blank line between them.
pub fn join_blocks<'a, I>(blocks: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    blocks
        .into_iter()
        .map(|block| block.trim_matches('\n'))
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `- <timestamp>: <message>`
pub fn timestamped_entry(message: &str, at: Timestamp) -> String {
    format!("- {}: {}", clock::format(&at), message)
}

/// Append a timestamped entry to `## Log`, which always ends up last.
pub fn append_log(body: &str, message: &str, at: Timestamp) -> String {
    let split = split_section(body, LOG_HEADING);
    let (rest, section) = if split.found {
        (split.rest(), split.section)
    } else {
        (body.to_string(), LOG_HEADING)
    };
    let section = append_entry(section, &timestamped_entry(message, at));
    join_blocks([rest.as_str(), section.as_str()])
}

/// Append a timestamped entry to `## Notes`, keeping it ahead of `## Log`.
pub fn append_note(body: &str, message: &str, at: Timestamp) -> String {
    let log = split_section(body, LOG_HEADING);
    let without_log = if log.found { log.rest() } else { body.to_string() };

    let notes = split_section(&without_log, NOTES_HEADING);
    let section = if notes.found { notes.section } else { NOTES_HEADING };
    let section = append_entry(section, &timestamped_entry(message, at));
    let edited = join_blocks([notes.before, section.as_str(), notes.after]);

    if log.found {
        join_blocks([edited.as_str(), log.section])
    } else {
        edited
    }
}
