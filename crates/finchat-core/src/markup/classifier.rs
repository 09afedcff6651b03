//! Content classification for accumulated assistant output.
//!
//! The assistant answers either in plain prose or with an embedded chart
//! markup fragment, and nothing in the stream says which up front. This
//! module re-derives the answer from the full accumulated text on every
//! call: detect a fenced markup region first (an explicit fence is the
//! stronger signal of intent), fall back to unfenced embedded markup, and
//! default to plain text so ambiguous input degrades to prose rendering
//! instead of failing.

use crate::markup::scanner::{TagKind, next_tag};

/// Chart container tag names the assistant emits for visualizations.
///
/// Used purely as a classification signal; the renderer owns the full
/// allow-list of renderable elements.
pub const CHART_CONTAINER_TAGS: &[&str] = &[
    "ResponsiveContainer",
    "BarChart",
    "LineChart",
    "AreaChart",
    "PieChart",
    "ScatterChart",
];

/// Generic container tag; counts as markup only alongside the styling marker.
const GENERIC_CONTAINER_TAG: &str = "div";

/// Interactive element accepted as a structural signal inside fences.
const INTERACTIVE_TAG: &str = "button";

/// Styling attribute that distinguishes a rendered element from a literal
/// `<` in prose.
const STYLE_ATTRIBUTE_MARKER: &str = "className=";

/// Fence language hints that mark the body as markup outright.
const MARKUP_FENCE_HINTS: &[&str] = &["jsx", "tsx", "html", "xml"];

/// Generic-language hints; accepted only when the body carries a signal.
const GENERIC_FENCE_HINTS: &[&str] = &["js", "javascript", "ts", "typescript"];

/// Result of classifying one accumulated-text snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The entire accumulated text is prose.
    Text { content: String },
    /// The text embeds a markup fragment. `explanation` is the prose before
    /// the fragment; `payload` is the markup with fence delimiters and
    /// surrounding whitespace stripped.
    Markup { explanation: String, payload: String },
}

/// Classifies accumulated assistant text as prose or embedded markup.
///
/// Fence detection takes priority over unfenced detection. When several
/// fences are present, the first markup-hinted fence wins, then the first
/// generic-hinted fence with a structural signal in its body, then the
/// first unhinted fence with such a signal. A fence whose closing delimiter
/// has not arrived yet is accepted with its body running to end of input,
/// so fenced markup stays classifiable mid-stream.
pub fn classify(text: &str) -> Classification {
    let fences = collect_fences(text);

    let fenced = fences
        .iter()
        .find(|f| is_hint(f.hint, MARKUP_FENCE_HINTS))
        .or_else(|| {
            fences
                .iter()
                .find(|f| is_hint(f.hint, GENERIC_FENCE_HINTS) && has_structural_signal(f.body))
        })
        .or_else(|| {
            fences
                .iter()
                .find(|f| f.hint.is_empty() && has_structural_signal(f.body))
        });

    if let Some(fence) = fenced {
        return Classification::Markup {
            explanation: text[..fence.open_start].trim().to_string(),
            payload: fence.body.trim().to_string(),
        };
    }

    if let Some(start) = embedded_markup_start(text) {
        let end = balanced_span_end(text, start).unwrap_or(text.len());
        return Classification::Markup {
            explanation: text[..start].trim().to_string(),
            payload: text[start..end].to_string(),
        };
    }

    Classification::Text {
        content: text.to_string(),
    }
}

/// One fenced region: the hint from the opening delimiter line and the body
/// between the delimiters. An unclosed trailing fence has its body run to
/// end of input.
struct Fence<'a> {
    hint: &'a str,
    body: &'a str,
    /// Byte offset of the opening delimiter line.
    open_start: usize,
}

fn collect_fences(text: &str) -> Vec<Fence<'_>> {
    let mut fences = Vec::new();
    let mut open: Option<(usize, &str, usize)> = None;
    let mut pos = 0;

    for line in text.split_inclusive('\n') {
        let line_start = pos;
        pos += line.len();
        let stripped = line.trim();

        match open {
            None => {
                if let Some(rest) = stripped.strip_prefix("```") {
                    open = Some((line_start, rest.trim(), pos));
                }
            }
            Some((open_start, hint, body_start)) => {
                if stripped == "```" {
                    fences.push(Fence {
                        hint,
                        body: &text[body_start..line_start],
                        open_start,
                    });
                    open = None;
                }
            }
        }
    }

    // Closing delimiter not seen yet (stream still arriving).
    if let Some((open_start, hint, body_start)) = open {
        fences.push(Fence {
            hint,
            body: text.get(body_start..).unwrap_or(""),
            open_start,
        });
    }

    fences
}

fn is_hint(hint: &str, set: &[&str]) -> bool {
    set.iter().any(|h| hint.eq_ignore_ascii_case(h))
}

/// True when the body contains a chart container, a generic container, or
/// an interactive element tag.
fn has_structural_signal(body: &str) -> bool {
    CHART_CONTAINER_TAGS
        .iter()
        .any(|tag| find_tag_start(body, tag).is_some())
        || find_tag_start(body, GENERIC_CONTAINER_TAG).is_some()
        || find_tag_start(body, INTERACTIVE_TAG).is_some()
}

/// Finds `<name` at a tag boundary (the next byte is not part of a longer
/// identifier), so `<Bar` does not match inside `<BarChart`.
fn find_tag_start(text: &str, name: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(rel) = text[from..].find('<') {
        let at = from + rel;
        let rest = &text[at + 1..];
        if rest.starts_with(name)
            && !rest[name.len()..].starts_with(|c: char| c.is_ascii_alphanumeric())
        {
            return Some(at);
        }
        from = at + 1;
    }
    None
}

/// Start offset of unfenced embedded markup, if any: the earliest chart
/// container tag, or the first generic container when the styling marker is
/// present anywhere in the text.
fn embedded_markup_start(text: &str) -> Option<usize> {
    let chart = CHART_CONTAINER_TAGS
        .iter()
        .filter_map(|tag| find_tag_start(text, tag))
        .min();

    let generic = if text.contains(STYLE_ATTRIBUTE_MARKER) {
        find_tag_start(text, GENERIC_CONTAINER_TAG)
    } else {
        None
    };

    match (chart, generic) {
        (Some(c), Some(g)) => Some(c.min(g)),
        (c, g) => c.or(g),
    }
}

/// Scans forward from `start` for the end of the balanced outermost span:
/// depth rises on opening tags, falls on closing tags, and self-closing
/// tags leave it unchanged. Returns `None` while no balanced close exists
/// yet (stream still arriving).
fn balanced_span_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = start;

    while let Some(token) = next_tag(text, pos) {
        match token.kind {
            TagKind::Opening => depth += 1,
            TagKind::Closing => depth = depth.saturating_sub(1),
            TagKind::SelfClosing => {}
        }
        if depth == 0 {
            return Some(token.end);
        }
        pos = token.end;
    }

    None
}
