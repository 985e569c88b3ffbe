//! Task records and their on-disk format.
//!
//! A record file is a YAML header between two `---` lines followed by a
//! free-form markdown body:
//!
//! ```text
//! ---
//! id: 12
//! title: draft messaging brief
//! state: TODO
//! tags:
//!   - launch
//! created_at: 2025-01-10T09:00:00+01:00
//! updated_at: 2025-01-10T09:00:00+01:00
//! ---
//!
//! # draft messaging brief
//! ```
//!
//! Files are named `<zero-padded id>-<slug>.md`. The numeric prefix is the
//! only part used for lookup.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clock::{self, Timestamp};
use crate::error::{Error, Result};

/// Header delimiter line
pub const SEPARATOR: &str = "---";

/// Extension of record files
pub const RECORD_EXT: &str = "md";

/// Prefix given to files staged by compaction
pub const STAGED_PREFIX: &str = ".compact-";

const FALLBACK_SLUG: &str = "task";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum State {
    #[default]
    Todo,
    Begun,
    Block,
    Confirm,
    Done,
    NotDo,
}

impl State {
    /// Canonical order, also the fallback listing order
    pub const ALL: [State; 6] = [
        State::Begun,
        State::Block,
        State::Todo,
        State::Confirm,
        State::Done,
        State::NotDo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            State::Todo => "TODO",
            State::Begun => "BEGUN",
            State::Block => "BLOCK",
            State::Confirm => "CONFIRM",
            State::Done => "DONE",
            State::NotDo => "NOTDO",
        }
    }

    /// Parse a canonical state token, case-insensitively
    pub fn parse(input: &str) -> Option<State> {
        match input.trim().to_ascii_uppercase().as_str() {
            "TODO" => Some(State::Todo),
            "BEGUN" => Some(State::Begun),
            "BLOCK" => Some(State::Block),
            "CONFIRM" => Some(State::Confirm),
            "DONE" => Some(State::Done),
            "NOTDO" => Some(State::NotDo),
            _ => None,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        State::parse(s).ok_or_else(|| format!("unknown state '{s}'"))
    }
}

impl TryFrom<String> for State {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<State> for String {
    fn from(state: State) -> Self {
        state.as_str().to_string()
    }
}

/// One task. Header fields serialize in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    pub id: u32,
    pub title: String,
    pub state: State,
    #[serde(skip_serializing_if = "is_zero")]
    pub priority: i64,
    #[serde(with = "clock::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub due: Option<Timestamp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(with = "clock::rfc3339")]
    pub created_at: Timestamp,
    #[serde(with = "clock::rfc3339")]
    pub updated_at: Timestamp,
    #[serde(with = "clock::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(with = "clock::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_refs: Vec<String>,
    #[serde(skip)]
    pub body: String,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl Default for Record {
    fn default() -> Self {
        Self {
            id: 0,
            title: String::new(),
            state: State::Todo,
            priority: 0,
            due: None,
            tags: Vec::new(),
            created_at: clock::epoch(),
            updated_at: clock::epoch(),
            started_at: None,
            completed_at: None,
            external_refs: Vec::new(),
            body: String::new(),
        }
    }
}

impl Record {
    /// Create a fresh record with `created_at == updated_at == now`
    pub fn new(id: u32, title: &str, state: State, now: Timestamp) -> Result<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidArgument("missing title".to_string()));
        }
        Ok(Self {
            id,
            title: title.to_string(),
            state,
            created_at: now,
            updated_at: now,
            body: format!("# {title}"),
            ..Self::default()
        })
    }

    /// Advance `updated_at` to `now`, never moving it backwards
    pub fn touch(&mut self, now: Timestamp) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Move to `state`, stamping `started_at`/`completed_at` where relevant
    pub fn transition(&mut self, state: State, now: Timestamp) {
        self.state = state;
        match state {
            State::Begun => self.started_at = Some(now),
            State::Done => self.completed_at = Some(now),
            _ => {}
        }
        self.touch(now);
    }
}

/// Read and decode a record file
pub fn parse(path: &Path) -> Result<Record> {
    let content = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
    parse_str(&content).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode record text. A document that does not open with a separator line
/// is all body.
pub fn parse_str(content: &str) -> std::result::Result<Record, serde_yaml::Error> {
    let (header, body) = split_document(content);
    let mut record = if header.trim().is_empty() {
        Record::default()
    } else {
        serde_yaml::from_str::<Record>(header)?
    };
    record.body = trim_blank_lines(body).to_string();
    Ok(record)
}

/// Encode a record in canonical layout
pub fn serialize(record: &Record) -> Result<String> {
    let yaml = serde_yaml::to_string(record)?;
    let body = trim_blank_lines(&record.body);

    let mut out = String::with_capacity(yaml.len() + body.len() + 16);
    out.push_str(SEPARATOR);
    out.push('\n');
    out.push_str(&indent_sequences(&yaml));
    out.push_str(SEPARATOR);
    out.push('\n');
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body);
        out.push('\n');
    }
    Ok(out)
}

/// Split text into (header, body). The header excludes both separators.
fn split_document(content: &str) -> (&str, &str) {
    let mut lines = content.split_inclusive('\n');
    let first = match lines.next() {
        Some(line) => line,
        None => return ("", ""),
    };
    if strip_eol(first) != SEPARATOR {
        return ("", content);
    }

    let header_start = first.len();
    let mut offset = header_start;
    for line in lines {
        if strip_eol(line) == SEPARATOR {
            return (&content[header_start..offset], &content[offset + line.len()..]);
        }
        offset += line.len();
    }
    // unterminated header: everything after the opening line is header
    (&content[header_start..], "")
}

fn strip_eol(line: &str) -> &str {
    line.trim_end_matches(|c| c == '\n' || c == '\r')
}

/// Drop leading blank lines and trailing whitespace
pub(crate) fn trim_blank_lines(text: &str) -> &str {
    let text = text.trim_end();
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    &text[start..]
}

/// Indent block sequences under top-level keys by two spaces.
///
/// serde_yaml writes `key:\n- item`; records use `key:\n  - item`. Every
/// line from a top-level `- ` up to the next top-level key is shifted, so
/// nested block scalars keep their relative indentation.
fn indent_sequences(yaml: &str) -> String {
    let mut out = String::with_capacity(yaml.len() + 32);
    let mut in_sequence = false;
    for line in yaml.split_inclusive('\n') {
        let content = strip_eol(line);
        if content == "-" || content.starts_with("- ") {
            in_sequence = true;
        } else if !content.is_empty() && !content.starts_with(char::is_whitespace) {
            in_sequence = false;
        }
        if in_sequence && !content.is_empty() {
            out.push_str("  ");
        }
        out.push_str(line);
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Lowercase a title into a filename slug
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// `<zero-padded id>-<slug>.md`
pub fn file_name(id: u32, width: usize, slug: &str) -> String {
    let slug = if slug.is_empty() { FALLBACK_SLUG } else { slug };
    format!("{id:0width$}-{slug}.{RECORD_EXT}")
}

/// Numeric id encoded in a record filename, if any
pub fn id_from_file_name(name: &str) -> Option<u32> {
    let stem = name.strip_suffix(".md").unwrap_or(name);
    let prefix = stem.split('-').next()?;
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

/// Slug part of a record filename, ignoring any compaction staging prefix
pub fn slug_from_file_name(name: &str) -> Option<&str> {
    let name = strip_staged_prefix(name);
    let stem = name.strip_suffix(".md").unwrap_or(name);
    match stem.split_once('-') {
        Some((_, slug)) if !slug.is_empty() => Some(slug),
        _ => None,
    }
}

/// `.compact-<nanos>-001-foo.md` → `001-foo.md`
pub fn strip_staged_prefix(name: &str) -> &str {
    let Some(rest) = name.strip_prefix(STAGED_PREFIX) else {
        return name;
    };
    match rest.split_once('-') {
        Some((stamp, original)) if !stamp.is_empty() && stamp.bytes().all(|b| b.is_ascii_digit()) => {
            original
        }
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> Timestamp {
        clock::parse(raw).expect("timestamp")
    }

    fn full_record() -> Record {
        Record {
            id: 1,
            title: "Full Task".to_string(),
            state: State::Todo,
            priority: 1,
            due: Some(ts("2025-02-01T09:00:00+00:00")),
            tags: vec!["hot".to_string(), "hugeco".to_string()],
            created_at: ts("2025-01-10T08:00:00+01:00"),
            updated_at: ts("2025-01-11T08:00:00+01:00"),
            started_at: None,
            completed_at: None,
            external_refs: vec!["JIRA-12".to_string()],
            body: "This is the body of the task.\n\n## Log\n\n- 2025-01-11T08:00:00+01:00: made".to_string(),
        }
    }

    #[test]
    fn serialize_uses_canonical_layout() {
        let text = serialize(&full_record()).unwrap();
        assert!(text.starts_with("---\nid: 1\ntitle: Full Task\nstate: TODO\npriority: 1\n"));
        assert!(text.contains("tags:\n  - hot\n  - hugeco\n"));
        assert!(text.contains("external_refs:\n  - JIRA-12\n---\n\nThis is the body"));
        assert!(text.ends_with("made\n"));
        assert!(!text.contains("started_at"));
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let record = full_record();
        let first = serialize(&record).unwrap();
        let parsed = parse_str(&first).unwrap();
        assert_eq!(parsed, record);
        let second = serialize(&parsed).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn minimal_header_omits_optional_fields() {
        let record = Record::new(2, "Minimal Task", State::Begun, ts("2025-01-10T08:00:00Z")).unwrap();
        let text = serialize(&record).unwrap();
        assert!(!text.contains("priority"));
        assert!(!text.contains("tags"));
        assert!(!text.contains("due"));
        assert!(text.contains("created_at: 2025-01-10T08:00:00+00:00\n"));
        let parsed = parse_str(&text).unwrap();
        assert_eq!(parsed.title, "Minimal Task");
        assert_eq!(parsed.state, State::Begun);
        assert_eq!(parsed.body, "# Minimal Task");
    }

    #[test]
    fn file_without_header_is_all_body() {
        let parsed = parse_str("just some notes\n\nmore notes\n").unwrap();
        assert_eq!(parsed.id, 0);
        assert_eq!(parsed.body, "just some notes\n\nmore notes");
    }

    #[test]
    fn unknown_keys_are_ignored_and_bad_types_fail() {
        let ok = "---\nid: 4\ntitle: x\nstate: done\nassignee: bob\n---\n";
        let parsed = parse_str(ok).unwrap();
        assert_eq!(parsed.id, 4);
        assert_eq!(parsed.state, State::Done);

        let bad = "---\nid: four\ntitle: x\n---\nbody\n";
        assert!(parse_str(bad).is_err());

        let bad_state = "---\nid: 4\nstate: LATER\n---\n";
        assert!(parse_str(bad_state).is_err());
    }

    #[test]
    fn accepts_fractional_and_zulu_timestamps() {
        let text = "---\nid: 3\ntitle: t\nstate: TODO\ncreated_at: 2025-01-10T08:00:00.123456789Z\nupdated_at: 2025-01-10T08:00:00Z\n---\n";
        let parsed = parse_str(text).unwrap();
        assert_eq!(clock::format(&parsed.created_at), "2025-01-10T08:00:00+00:00");
    }

    #[test]
    fn hand_written_dates_in_header_decode() {
        let text = "---\nid: 3\ntitle: x\nstate: TODO\ndue: 2025-02-01\ncreated_at: 2025-01-10 08:00:00\n---\nbody\n";
        let parsed = parse_str(text).unwrap();
        assert_eq!(parsed.due, Some(ts("2025-02-01T00:00:00+00:00")));
        assert_eq!(parsed.created_at, ts("2025-01-10T08:00:00+00:00"));
        assert_eq!(parsed.body, "body");

        let written = serialize(&parsed).unwrap();
        assert!(written.contains("due: 2025-02-01T00:00:00+00:00\n"));
    }

    #[test]
    fn body_blank_lines_are_trimmed() {
        let text = "---\nid: 5\ntitle: t\n---\n\n\n\n  indented first\nlast\n\n\n";
        let parsed = parse_str(text).unwrap();
        assert_eq!(parsed.body, "  indented first\nlast");
    }

    #[test]
    fn unterminated_header_consumes_rest() {
        let parsed = parse_str("---\nid: 6\ntitle: open\n").unwrap();
        assert_eq!(parsed.id, 6);
        assert!(parsed.body.is_empty());
    }

    #[test]
    fn multiline_tag_survives_indentation() {
        let mut record = full_record();
        record.tags = vec!["line one\nline two".to_string(), "plain".to_string()];
        let text = serialize(&record).unwrap();
        let parsed = parse_str(&text).unwrap();
        assert_eq!(parsed.tags, record.tags);
        assert_eq!(serialize(&parsed).unwrap(), text);
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut record = full_record();
        let before = record.updated_at;
        record.touch(ts("2020-01-01T00:00:00Z"));
        assert_eq!(record.updated_at, before);
        record.touch(ts("2030-01-01T00:00:00Z"));
        assert_eq!(record.updated_at, ts("2030-01-01T00:00:00Z"));
    }

    #[test]
    fn transition_stamps_lifecycle_fields() {
        let mut record = full_record();
        let now = ts("2025-03-01T10:00:00Z");
        record.transition(State::Begun, now);
        assert_eq!(record.started_at, Some(now));
        record.transition(State::Done, now);
        assert_eq!(record.completed_at, Some(now));
        assert_eq!(record.state, State::Done);
    }

    #[test]
    fn new_rejects_blank_title() {
        assert!(Record::new(1, "   ", State::Todo, clock::now()).is_err());
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Write the Outline!"), "write-the-outline");
        assert_eq!(slugify("  --Fix #42 -- now  "), "fix-42-now");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn file_names_encode_padded_ids() {
        assert_eq!(file_name(7, 3, "ship-it"), "007-ship-it.md");
        assert_eq!(file_name(1234, 3, "big"), "1234-big.md");
        assert_eq!(file_name(7, 3, ""), "007-task.md");
        assert_eq!(id_from_file_name("007-ship-it.md"), Some(7));
        assert_eq!(id_from_file_name("12.md"), Some(12));
        assert_eq!(id_from_file_name("notes.md"), None);
        assert_eq!(id_from_file_name(".compact-99-007-ship-it.md"), None);
    }

    #[test]
    fn slug_ignores_staging_prefix() {
        assert_eq!(slug_from_file_name("007-ship-it.md"), Some("ship-it"));
        assert_eq!(slug_from_file_name(".compact-1700000000-007-ship-it.md"), Some("ship-it"));
        assert_eq!(slug_from_file_name("007.md"), None);
        assert_eq!(strip_staged_prefix(".compact-abc-007-x.md"), ".compact-abc-007-x.md");
    }
}
