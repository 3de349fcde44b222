//! Line model for Paradox localization files.
//!
//! A [`ResourceFile`] keeps every physical line with its exact bytes, so a file
//! that is parsed and rendered without edits comes back unchanged.

use std::collections::{HashMap, HashSet};

/// How the merge engine may treat an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Translated like any other value
    Normal,
    /// Inside a `# NO_TRANSLATE` region or marked inline; the source value passes through
    NoTranslate,
    /// Target line annotated with a lock comment; never overwritten
    Locked,
}

/// A `key: "value"  # comment` line split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub indent: String,
    pub key: String,
    /// Everything between the key and the opening quote, e.g. `: ` or `:0 `
    pub separator: String,
    pub value: String,
    /// Text after the closing quote, usually whitespace and a `#` comment
    pub comment: String,
    pub state: EntryState,
}

impl Entry {
    /// Render the entry back to a line (without terminator)
    pub fn render(&self) -> String {
        format!(
            "{}{}{}\"{}\"{}",
            self.indent, self.key, self.separator, self.value, self.comment
        )
    }

    pub fn with_value(&self, value: &str) -> Entry {
        Entry {
            value: value.to_string(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// `l_<language>:` header, holding the language tag
    Header(String),
    Entry(Entry),
    /// Comments, blank lines, markers and anything unparseable
    Other,
}

/// One physical line of a resource file. `raw` and `ending` together are the
/// exact bytes read from disk, so untouched lines are written back verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub raw: String,
    /// `"\n"`, `"\r\n"`, or empty for a final line without terminator
    pub ending: String,
    pub kind: LineKind,
}

impl Line {
    pub fn entry(&self) -> Option<&Entry> {
        match &self.kind {
            LineKind::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.entry().map(|e| e.key.as_str())
    }
}

/// A localization file for one language, held fully in memory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceFile {
    /// Whether the file started with a UTF-8 byte-order mark
    pub bom: bool,
    pub lines: Vec<Line>,
}

impl ResourceFile {
    /// Serialize back to file contents, BOM included when present
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.bom {
            out.push('\u{feff}');
        }
        for line in &self.lines {
            out.push_str(&line.raw);
            out.push_str(&line.ending);
        }
        out
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.lines.iter().filter_map(Line::entry)
    }

    /// Language tags of every header line, in file order
    pub fn headers(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| match &line.kind {
                LineKind::Header(lang) => Some(lang.as_str()),
                _ => None,
            })
            .collect()
    }

    /// True unless the file has exactly one header and it names `language`
    pub fn header_mismatch(&self, language: &str) -> bool {
        self.headers() != [language]
    }

    /// Leave exactly one header line, tagged `language`, where the first
    /// header was (or at the top when there was none).
    pub fn set_header(&mut self, language: &str) {
        let position = self
            .lines
            .iter()
            .position(|line| matches!(line.kind, LineKind::Header(_)))
            .unwrap_or(0);
        let ending = self
            .lines
            .get(position)
            .filter(|line| !line.ending.is_empty())
            .map(|line| line.ending.clone())
            .unwrap_or_else(|| self.newline().to_string());

        self.lines
            .retain(|line| !matches!(line.kind, LineKind::Header(_)));
        let position = position.min(self.lines.len());
        self.lines.insert(
            position,
            Line {
                raw: format!("l_{}:", language),
                ending,
                kind: LineKind::Header(language.to_string()),
            },
        );
    }

    /// Line index per key; on duplicates the last occurrence wins
    pub fn key_index(&self) -> HashMap<String, usize> {
        self.lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| line.key().map(|key| (key.to_string(), i)))
            .collect()
    }

    pub fn keys(&self) -> HashSet<&str> {
        self.entries().map(|e| e.key.as_str()).collect()
    }

    /// Drop every entry line whose key is not in `keep`; returns how many went
    pub fn retain_keys(&mut self, keep: &HashSet<&str>) -> usize {
        let before = self.lines.len();
        self.lines
            .retain(|line| line.key().is_none_or(|key| keep.contains(key)));
        before - self.lines.len()
    }

    /// Replace the entry at line `index` with `entry`, keeping the line ending
    pub fn replace_entry(&mut self, index: usize, entry: Entry) {
        if let Some(line) = self.lines.get_mut(index) {
            line.raw = entry.render();
            line.kind = LineKind::Entry(entry);
        }
    }

    /// Append a line at the end of the file, terminating the previous last line if needed
    pub fn push_line(&mut self, raw: String, kind: LineKind) {
        let newline = self.newline().to_string();
        if let Some(last) = self.lines.last_mut() {
            if last.ending.is_empty() {
                last.ending = newline.clone();
            }
        }
        self.lines.push(Line {
            raw,
            ending: newline,
            kind,
        });
    }

    /// The line terminator the file already uses, `\n` by default
    pub fn newline(&self) -> &str {
        self.lines
            .iter()
            .map(|line| line.ending.as_str())
            .find(|ending| !ending.is_empty())
            .unwrap_or("\n")
    }
}
