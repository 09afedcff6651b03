//! Leftmost tag-token scanning.
//!
//! The only structural fact the classifier and balancer need is "which tag
//! opened or closed, and where". This scanner finds the next span matching
//! `<`, optional `/`, an identifier, optional attribute text, optional `/`,
//! then `>` — attribute text is surfaced as an opaque trimmed slice and
//! never parsed further.

use std::sync::LazyLock;

use regex::Regex;

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?([a-zA-Z][a-zA-Z0-9]*)\s*([^>]*?)(/)?>").expect("tag pattern is valid")
});

/// Kind of a scanned tag token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Opening,
    Closing,
    SelfClosing,
}

/// A borrowed view of one tag-like token inside a scanned string.
///
/// Offsets are absolute byte positions into the scanned string. Tokens are
/// produced transiently during a scan and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagToken<'a> {
    pub name: &'a str,
    pub kind: TagKind,
    /// Raw text between the name and the closing `>`, trimmed.
    pub attributes: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Finds the next tag-like token at or after byte offset `from`.
///
/// Returns `None` when no tag pattern occurs in the remainder: plain text,
/// end of input, or a dangling `<` whose closing `>` has not arrived yet.
/// Callers must treat `None` as "no more structural tokens", not an error.
pub fn next_tag(text: &str, from: usize) -> Option<TagToken<'_>> {
    let rest = text.get(from..)?;
    let caps = TAG_PATTERN.captures(rest)?;
    let full = caps.get(0)?;

    let kind = if caps.get(3).is_some() {
        TagKind::SelfClosing
    } else if full.as_str().starts_with("</") {
        TagKind::Closing
    } else {
        TagKind::Opening
    };

    Some(TagToken {
        name: caps.get(1).map_or("", |m| m.as_str()),
        kind,
        attributes: caps.get(2).map_or("", |m| m.as_str()).trim(),
        start: from + full.start(),
        end: from + full.end(),
    })
}
