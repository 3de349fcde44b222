//! Placeholder protection for localization values
//!
//! Localization values embed structural tokens that a translation backend must
//! not touch: escaped newlines (`\n`), bracket scripts (`[Root.GetName]`),
//! dollar variables (`$TARGET$`), icon commands (`@gold!`) and formatting codes
//! (`#bold` ... `#!`). Before a value is sent to a provider every such token is
//! replaced by an indexed marker, and after translation the markers are swapped
//! back for the original text.
//!
//! Two marker representations exist:
//! - bracket markers, `[VAR_0]`, used for plain-text transport
//! - tag markers, `<x>VAR_0</x>`, used when the provider understands inert XML tags
//!
//! Both unmask to the same original token.
//!
//! # Example
//! ```ignore
//! let masked = mask("Deals [VAR_dmg] damage to $TARGET$");
//! assert_eq!(masked.text, "Deals [VAR_0] damage to [VAR_1]");
//! let restored = unmask("Inflige [VAR_0] dégâts à [VAR_1]", &masked.placeholders);
//! assert_eq!(restored, "Inflige [VAR_dmg] dégâts à $TARGET$");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// The category a protected token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    /// Literal backslash-n inside a value
    EscapedNewline,
    /// `[...]` scripted text
    Bracket,
    /// `$...$` variable reference
    Dollar,
    /// `@name` or `@name!` icon command
    Command,
    /// `#name` formatting opener or the `#!` terminator
    Format,
    /// Text that already reads like a marker (`VAR_3`)
    MarkerLike,
}

/// One protected token extracted from a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Position in the placeholder list, also the number inside the marker
    pub index: usize,
    pub kind: PlaceholderKind,
    /// The exact source text the marker stands for
    pub text: String,
}

impl Placeholder {
    /// Bracket marker, e.g. `[VAR_3]`
    pub fn marker(&self) -> String {
        format!("[VAR_{}]", self.index)
    }
}

/// A value with its structural tokens replaced by bracket markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedText {
    pub text: String,
    pub placeholders: Vec<Placeholder>,
}

impl MaskedText {
    /// True when there is nothing a provider could translate: the masked text
    /// is blank, or holds only markers, whitespace and punctuation.
    pub fn is_trivial(&self) -> bool {
        if self.text.trim().is_empty() {
            return true;
        }
        let without_markers = BRACKET_MARKER.replace_all(&self.text, "");
        without_markers
            .chars()
            .all(|c| matches!(c, ' ' | '\t' | '.' | ',' | '!' | '?' | ':' | ';'))
    }
}

/// Masking rules, applied in this order
static RULES: Lazy<Vec<(PlaceholderKind, Regex)>> = Lazy::new(|| {
    [
        (PlaceholderKind::EscapedNewline, r"\\n"),
        (PlaceholderKind::Bracket, r"\[.*?\]"),
        (PlaceholderKind::Dollar, r"\$.*?\$"),
        (PlaceholderKind::Command, r"@[A-Za-z0-9_]+!?"),
        (PlaceholderKind::Format, r"#[A-Za-z0-9_]+|#!"),
        (PlaceholderKind::MarkerLike, r"\bVAR_\d+\b"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).unwrap()))
    .collect()
});

/// Any marker form a provider may hand back: tag, bracket (with stray
/// whitespace), or a bare `VAR_n` whose brackets were dropped.
static ANY_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<x>\s*VAR_(\d+)\s*</x>|\[\s*VAR_(\d+)\s*\]|\bVAR_(\d+)\b").unwrap()
});

static BRACKET_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[VAR_(\d+)\]").unwrap());

static TAG_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<x>\s*VAR_(\d+)\s*</x>").unwrap());

static SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+([,.])").unwrap());

static REPEATED_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());

enum Segment {
    Text(String),
    Marker(usize),
}

/// Replace every structural token in `value` with an indexed bracket marker.
///
/// The rules run in a fixed order (escaped newline, bracket, dollar, command,
/// format, then any literal `VAR_n` so it cannot pass for a marker on the way
/// back). A span consumed by an earlier rule becomes a marker and is never
/// scanned again by a later rule, so indices follow rule order first and
/// left-to-right position second.
pub fn mask(value: &str) -> MaskedText {
    let mut segments = vec![Segment::Text(value.to_string())];
    let mut placeholders: Vec<Placeholder> = Vec::new();

    for (kind, re) in RULES.iter() {
        let mut next = Vec::with_capacity(segments.len());
        for segment in segments {
            let text = match segment {
                Segment::Text(text) => text,
                marker => {
                    next.push(marker);
                    continue;
                }
            };

            let mut last = 0;
            for m in re.find_iter(&text) {
                if m.start() > last {
                    next.push(Segment::Text(text[last..m.start()].to_string()));
                }
                let index = placeholders.len();
                placeholders.push(Placeholder {
                    index,
                    kind: *kind,
                    text: m.as_str().to_string(),
                });
                next.push(Segment::Marker(index));
                last = m.end();
            }
            if last < text.len() {
                next.push(Segment::Text(text[last..].to_string()));
            }
        }
        segments = next;
    }

    let text = segments
        .iter()
        .map(|segment| match segment {
            Segment::Text(text) => text.clone(),
            Segment::Marker(index) => placeholders[*index].marker(),
        })
        .collect();

    MaskedText { text, placeholders }
}

/// Restore original tokens for every marker found in `text`.
///
/// Accepts bracket markers, tag markers, and bare `VAR_n` tokens. Markers
/// whose index is out of range are left untouched.
pub fn unmask(text: &str, placeholders: &[Placeholder]) -> String {
    ANY_MARKER
        .replace_all(text, |caps: &regex::Captures| {
            let index = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .and_then(|m| m.as_str().parse::<usize>().ok());
            match index.and_then(|i| placeholders.get(i)) {
                Some(placeholder) => placeholder.text.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Indices of placeholders that did not survive translation.
///
/// A placeholder counts as present when its marker appears in any accepted
/// form, when its literal text appears unmodified, or, for an escaped newline,
/// when a raw line break appears.
pub fn find_missing(text: &str, placeholders: &[Placeholder]) -> Vec<usize> {
    let found: HashSet<usize> = ANY_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .and_then(|m| m.as_str().parse::<usize>().ok())
        })
        .collect();

    // Literal matches must not borrow the text of some other marker
    let unmarked = ANY_MARKER.replace_all(text, " ");

    placeholders
        .iter()
        .filter(|p| {
            let present = found.contains(&p.index)
                || (p.kind != PlaceholderKind::MarkerLike && unmarked.contains(p.text.as_str()))
                || (p.kind == PlaceholderKind::EscapedNewline && text.contains('\n'));
            !present
        })
        .map(|p| p.index)
        .collect()
}

/// Append the literal text of missing placeholders to an unmasked translation.
///
/// Tokens go at the end of the string but before any trailing sentence-final
/// punctuation, so `"Bonjour."` missing `$NAME$` becomes `"Bonjour $NAME$."`.
pub fn reinsert_missing(text: &str, placeholders: &[Placeholder], missing: &[usize]) -> String {
    let tokens: Vec<&str> = missing
        .iter()
        .filter_map(|i| placeholders.get(*i))
        .map(|p| p.text.as_str())
        .collect();
    if tokens.is_empty() {
        return text.to_string();
    }

    let body = text.trim_end();
    let trailing_ws = &text[body.len()..];
    let split = body
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_terminal_punctuation(*c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    let (head, punctuation) = body.split_at(split);
    let head = head.trim_end();

    let mut result = String::with_capacity(text.len() + 16);
    result.push_str(head);
    if !head.is_empty() {
        result.push(' ');
    }
    result.push_str(&tokens.join(" "));
    result.push_str(punctuation);
    result.push_str(trailing_ws);
    result
}

fn is_terminal_punctuation(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…' | '。' | '！' | '？')
}

/// Tidy common provider artifacts on still-masked text: whitespace before
/// `,`/`.`, runs of spaces, doubled brackets around markers.
pub fn cleanup(masked: &str) -> String {
    let text = SPACE_BEFORE_PUNCT.replace_all(masked, "$1");
    let text = REPEATED_SPACES.replace_all(&text, " ");
    text.replace("[[", "[").replace("]]", "]")
}

/// Give `translated` the same leading and trailing whitespace as `source`.
pub fn match_edges(source: &str, translated: &str) -> String {
    let lead = &source[..source.len() - source.trim_start().len()];
    let trail = &source[source.trim_end().len()..];
    format!("{}{}{}", lead, translated.trim(), trail)
}

/// Convert bracket-masked text into the tag transport form: XML special
/// characters are escaped and each `[VAR_n]` becomes `<x>VAR_n</x>`.
pub fn to_tag_transport(masked: &str) -> String {
    let escaped = masked
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    BRACKET_MARKER
        .replace_all(&escaped, "<x>VAR_$1</x>")
        .into_owned()
}

/// Reverse [`to_tag_transport`]: tags back to bracket markers, entities decoded.
pub fn from_tag_transport(text: &str) -> String {
    let bracketed = TAG_MARKER.replace_all(text, "[VAR_$1]");
    bracketed
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== Masking Tests ==========

    #[test]
    fn test_mask_bracket_and_dollar() {
        let masked = mask("Deals [VAR_dmg] damage to $TARGET$");
        assert_eq!(masked.text, "Deals [VAR_0] damage to [VAR_1]");
        assert_eq!(masked.placeholders.len(), 2);
        assert_eq!(masked.placeholders[0].text, "[VAR_dmg]");
        assert_eq!(masked.placeholders[0].kind, PlaceholderKind::Bracket);
        assert_eq!(masked.placeholders[1].text, "$TARGET$");
        assert_eq!(masked.placeholders[1].kind, PlaceholderKind::Dollar);
    }

    #[test]
    fn test_mask_all_kinds() {
        let masked = mask(r"#bold Gain@gold! $AMOUNT$#!\n[Root.GetName]");
        let kinds: Vec<PlaceholderKind> = masked.placeholders.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PlaceholderKind::EscapedNewline,
                PlaceholderKind::Bracket,
                PlaceholderKind::Dollar,
                PlaceholderKind::Command,
                PlaceholderKind::Format,
                PlaceholderKind::Format,
            ]
        );
        assert_eq!(masked.placeholders[3].text, "@gold!");
        assert_eq!(masked.placeholders[4].text, "#bold");
        assert_eq!(masked.placeholders[5].text, "#!");
    }

    #[test]
    fn test_mask_indices_follow_rule_order() {
        // The dollar span comes first in the text but the bracket rule runs first.
        let masked = mask("$A$ then [B]");
        assert_eq!(masked.text, "[VAR_1] then [VAR_0]");
        assert_eq!(masked.placeholders[0].text, "[B]");
        assert_eq!(masked.placeholders[1].text, "$A$");
    }

    #[test]
    fn test_consumed_span_not_rescanned() {
        // The escaped newline becomes a marker; the bracket rule must not
        // re-mask that marker, and the dollar rule must not span across it.
        let masked = mask(r"$a\nb$ [x]");
        assert_eq!(masked.placeholders[0].text, r"\n");
        assert_eq!(masked.placeholders[1].text, "[x]");
        assert_eq!(masked.placeholders.len(), 2);
        assert_eq!(masked.text, "$a[VAR_0]b$ [VAR_1]");
    }

    #[test]
    fn test_mask_no_placeholders() {
        let masked = mask("Plain text.");
        assert_eq!(masked.text, "Plain text.");
        assert!(masked.placeholders.is_empty());
    }

    #[test]
    fn test_mask_empty() {
        let masked = mask("");
        assert_eq!(masked.text, "");
        assert!(masked.is_trivial());
    }

    // ========== Unmasking Tests ==========

    #[test]
    fn test_roundtrip_values() {
        let values = [
            "Deals [VAR_dmg] damage to $TARGET$",
            r"Line one\nLine two\n",
            "#P @gold! +$VAL|0$#! gold per [GetMonth]",
            "No tokens at all",
            "Unclosed [bracket and $dollar",
            "[Root.GetName] uses VAR_0 mode",
            "VAR_1 VAR_0 [VAR_0] XVAR_2",
            "",
        ];
        for value in values {
            let masked = mask(value);
            assert_eq!(unmask(&masked.text, &masked.placeholders), value, "{}", value);
        }
    }

    #[test]
    fn test_unmask_reordered() {
        let masked = mask("Deals [VAR_dmg] damage to $TARGET$");
        let translated = "À [VAR_1], inflige [VAR_0] dégâts";
        assert_eq!(
            unmask(translated, &masked.placeholders),
            "À $TARGET$, inflige [VAR_dmg] dégâts"
        );
    }

    #[test]
    fn test_unmask_tag_and_loose_forms() {
        let masked = mask("[A] and $B$ and @c");
        let translated = "<x>VAR_0</x> et [ VAR_1 ] et VAR_2";
        assert_eq!(unmask(translated, &masked.placeholders), "[A] et $B$ et @c");
    }

    #[test]
    fn test_unmask_out_of_range_left_alone() {
        let masked = mask("[A]");
        assert_eq!(unmask("[VAR_0] [VAR_7]", &masked.placeholders), "[A] [VAR_7]");
    }

    // ========== Missing Detection Tests ==========

    #[test]
    fn test_find_missing_none() {
        let masked = mask("[A] $B$");
        assert!(find_missing("x [VAR_1] y [VAR_0]", &masked.placeholders).is_empty());
    }

    #[test]
    fn test_find_missing_dropped() {
        let masked = mask("[A] $B$ @c");
        assert_eq!(find_missing("x [VAR_0]", &masked.placeholders), vec![1, 2]);
    }

    #[test]
    fn test_find_missing_tolerates_equivalent_forms() {
        let masked = mask(r"[A]\n$B$");
        // index 0 is the escaped newline, 1 the bracket, 2 the dollar span
        let translated = "<x>VAR_1</x>\nliteral $B$";
        assert!(find_missing(translated, &masked.placeholders).is_empty());
    }

    #[test]
    fn test_find_missing_does_not_confuse_indices() {
        let masked = mask("[a][b][c][d][e][f][g][h][i][j][k]");
        let translated = "[VAR_10]";
        let missing = find_missing(translated, &masked.placeholders);
        assert_eq!(missing.len(), 10);
        assert!(!missing.contains(&10));
        assert!(missing.contains(&1));
    }

    #[test]
    fn test_literal_var_text_is_its_own_placeholder() {
        let masked = mask("[Root.GetName] uses VAR_0 mode");
        assert_eq!(masked.text, "[VAR_0] uses [VAR_1] mode");
        assert_eq!(masked.placeholders[1].kind, PlaceholderKind::MarkerLike);
        assert_eq!(masked.placeholders[1].text, "VAR_0");

        // The literal is lost even though marker 0 still carries its digits
        assert_eq!(find_missing("[VAR_0] utilise le mode", &masked.placeholders), vec![1]);
        assert_eq!(
            unmask("[VAR_0] utilise le mode [VAR_1]", &masked.placeholders),
            "[Root.GetName] utilise le mode VAR_0"
        );
    }

    // ========== Reinsertion Tests ==========

    #[test]
    fn test_reinsert_before_terminal_punctuation() {
        let masked = mask("Hello $NAME$.");
        assert_eq!(
            reinsert_missing("Bonjour.", &masked.placeholders, &[0]),
            "Bonjour $NAME$."
        );
    }

    #[test]
    fn test_reinsert_without_punctuation() {
        let masked = mask("[A] $B$");
        assert_eq!(
            reinsert_missing("Texte", &masked.placeholders, &[0, 1]),
            "Texte [A] $B$"
        );
    }

    #[test]
    fn test_reinsert_multiple_terminal_marks() {
        let masked = mask("What $X$?!");
        assert_eq!(reinsert_missing("Quoi ?!", &masked.placeholders, &[0]), "Quoi $X$?!");
    }

    #[test]
    fn test_reinsert_into_empty() {
        let masked = mask("$X$");
        assert_eq!(reinsert_missing("", &masked.placeholders, &[0]), "$X$");
    }

    #[test]
    fn test_reinsert_nothing_missing() {
        assert_eq!(reinsert_missing("Texte.", &[], &[]), "Texte.");
    }

    // ========== Auto-skip Tests ==========

    #[test]
    fn test_trivial_markers_only() {
        assert!(mask("$VALUE$").is_trivial());
        assert!(mask("[A]: $B$!").is_trivial());
        assert!(mask("   ").is_trivial());
    }

    #[test]
    fn test_not_trivial_with_words() {
        assert!(!mask("Gold: $VALUE$").is_trivial());
    }

    // ========== Cleanup Tests ==========

    #[test]
    fn test_cleanup() {
        assert_eq!(cleanup("Un  texte , ici ."), "Un texte, ici.");
        assert_eq!(cleanup("a [[VAR_0]] b"), "a [VAR_0] b");
    }

    #[test]
    fn test_match_edges() {
        assert_eq!(match_edges(" Hello ", "Bonjour"), " Bonjour ");
        assert_eq!(match_edges("Hello", "  Bonjour\t"), "Bonjour");
    }

    // ========== Tag Transport Tests ==========

    #[test]
    fn test_tag_transport_roundtrip() {
        let masked = mask("Fish & chips <b> [A]");
        let tagged = to_tag_transport(&masked.text);
        assert_eq!(
            tagged,
            "Fish &amp; chips &lt;b&gt; <x>VAR_0</x>"
        );
        assert_eq!(from_tag_transport(&tagged), masked.text);
    }

    #[test]
    fn test_tag_and_bracket_unmask_identically() {
        let masked = mask("Deals [VAR_dmg] damage to $TARGET$");
        let tagged = to_tag_transport(&masked.text);
        assert_eq!(
            unmask(&tagged, &masked.placeholders),
            unmask(&masked.text, &masked.placeholders)
        );
    }
}
