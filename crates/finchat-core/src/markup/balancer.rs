//! Tag balancing for truncated markup payloads.
//!
//! Structural renderers refuse unclosed trees, so a payload still arriving
//! from the stream must be repaired before every render. The balancer
//! rebuilds the open-tag stack from offset 0 on each call and appends the
//! closing tags still owed, in reverse order of opening. It is a total
//! function: mismatched closers, extra closers, and dangling half-tokens
//! all degrade gracefully instead of erroring, because it runs on every
//! chunk of a live stream.

use crate::markup::scanner::{TagKind, next_tag};

/// Returns the minimal well-formed extension of `payload`.
///
/// Scanned spans and the text between them are copied verbatim; an
/// incomplete trailing token (a `<Bar ` whose `>` has not arrived) is
/// excluded, since it is not yet a complete token. A closing tag is then
/// appended for every name still on the open-tag stack, deepest first.
///
/// Recovery policy: a closing tag pops the stack unconditionally even when
/// its name does not match the top; a closing tag on an empty stack is
/// dropped. Nothing before the end of the copied input is ever modified.
pub fn balance(payload: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    let mut out = String::with_capacity(payload.len());
    let mut pos = 0;

    while let Some(token) = next_tag(payload, pos) {
        match token.kind {
            TagKind::Opening => stack.push(token.name),
            TagKind::Closing => {
                stack.pop();
            }
            TagKind::SelfClosing => {}
        }
        out.push_str(&payload[pos..token.end]);
        pos = token.end;
    }

    for name in stack.iter().rev() {
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }

    out
}
