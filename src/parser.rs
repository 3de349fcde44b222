//! Parser for `l_<language>:` resource files.
//!
//! Tracks `# NO_TRANSLATE` regions in source files and `# LOCKED` annotations
//! in target files while splitting each line into a [`Line`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::entry::{Entry, EntryState, Line, LineKind, ResourceFile};

pub const NO_TRANSLATE: &str = "# NO_TRANSLATE";
pub const NO_TRANSLATE_BELOW: &str = "# NO_TRANSLATE BELOW";
pub const NO_TRANSLATE_END: &str = "# NO_TRANSLATE END";

static HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*l_([A-Za-z0-9_]+):\s*(#.*)?$").unwrap());

/// indent, key, separator (colon, optional version digits, spaces), value, trailer
static ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(\s*)([^:#\s][^:#]*)(:\d*\s*)"(.*)"(.*)$"#).unwrap());

static LOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)#\s*LOCKED\b").unwrap());

/// Which side of a translation a file is on. Lock comments only mean
/// something on target files; they are editor annotations added after
/// translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseRole {
    Source,
    Target,
}

/// A line-oriented parser for Paradox-style `.yml` localization files.
///
/// Lines that are not headers or `key: "value"` pairs are kept as
/// [`LineKind::Other`] so they survive a rewrite byte-for-byte. The
/// `# NO_TRANSLATE BELOW` / `# NO_TRANSLATE END` block state is carried from
/// line to line for the whole file.
pub struct Parser<'a> {
    input: &'a str,
    role: ParseRole,
    in_no_translate_block: bool,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, role: ParseRole) -> Self {
        Parser {
            input,
            role,
            in_no_translate_block: false,
        }
    }

    pub fn parse(&mut self) -> ResourceFile {
        let (bom, body) = match self.input.strip_prefix('\u{feff}') {
            Some(rest) => (true, rest),
            None => (false, self.input),
        };

        let mut lines = Vec::new();
        for chunk in body.split_inclusive('\n') {
            let (raw, ending) = split_ending(chunk);
            let kind = self.parse_line(raw);
            lines.push(Line {
                raw: raw.to_string(),
                ending: ending.to_string(),
                kind,
            });
        }

        ResourceFile { bom, lines }
    }

    fn parse_line(&mut self, raw: &str) -> LineKind {
        if let Some(caps) = HEADER.captures(raw) {
            return LineKind::Header(caps[1].to_string());
        }

        if raw.contains(NO_TRANSLATE_BELOW) {
            self.in_no_translate_block = true;
            return LineKind::Other;
        }
        if raw.contains(NO_TRANSLATE_END) {
            self.in_no_translate_block = false;
            return LineKind::Other;
        }

        let Some(caps) = ENTRY.captures(raw) else {
            return LineKind::Other;
        };

        let comment = caps[5].to_string();
        let no_translate = self.in_no_translate_block || raw.contains(NO_TRANSLATE);
        let state = match self.role {
            ParseRole::Target if LOCK.is_match(&comment) => EntryState::Locked,
            _ if no_translate => EntryState::NoTranslate,
            _ => EntryState::Normal,
        };

        LineKind::Entry(Entry {
            indent: caps[1].to_string(),
            key: caps[2].to_string(),
            separator: caps[3].to_string(),
            value: caps[4].to_string(),
            comment,
            state,
        })
    }
}

fn split_ending(chunk: &str) -> (&str, &str) {
    if let Some(raw) = chunk.strip_suffix("\r\n") {
        (raw, "\r\n")
    } else if let Some(raw) = chunk.strip_suffix('\n') {
        (raw, "\n")
    } else {
        (chunk, "")
    }
}

/// Parse a source-language file (lock comments ignored)
pub fn parse_source(input: &str) -> ResourceFile {
    Parser::new(input, ParseRole::Source).parse()
}

/// Parse an existing translated file (lock comments honored)
pub fn parse_target(input: &str) -> ResourceFile {
    Parser::new(input, ParseRole::Target).parse()
}
