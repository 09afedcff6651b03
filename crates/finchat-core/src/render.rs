//! Renderer-facing frames derived from accumulated turn text.
//!
//! This is the seam between the core and whatever draws the conversation:
//! the host recomputes a frame from the full accumulated text on every
//! received chunk and hands it over. Frames are serializable so a UI can
//! also consume them as a JSON stream.

use serde::Serialize;

use crate::markup::{Classification, balance, classify};

/// One renderer-ready snapshot of an assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RenderFrame {
    /// Prose; render as plain text.
    Text { content: String },
    /// An embedded chart description. While `streaming` is true the markup
    /// has been balanced so it is well-nested mid-stream; a finished turn
    /// carries the payload untouched.
    Chart {
        explanation: String,
        markup: String,
        streaming: bool,
    },
}

/// Classifies the accumulated text and, while the stream is still in
/// progress, repairs a markup payload for rendering. Finished payloads are
/// passed through unmodified.
pub fn prepare_frame(text: &str, streaming: bool) -> RenderFrame {
    match classify(text) {
        Classification::Text { content } => RenderFrame::Text { content },
        Classification::Markup {
            explanation,
            payload,
        } => {
            let markup = if streaming {
                balance(&payload)
            } else {
                payload
            };
            RenderFrame::Chart {
                explanation,
                markup,
                streaming,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_passes_through() {
        let frame = prepare_frame("Total spend: $452.10", true);
        assert_eq!(
            frame,
            RenderFrame::Text {
                content: "Total spend: $452.10".to_string()
            }
        );
    }

    #[test]
    fn test_streaming_chart_is_balanced() {
        let text = "Trend:\n```jsx\n<BarChart data={d}>\n  <Bar dataKey=\"a\" />";
        let frame = prepare_frame(text, true);
        let RenderFrame::Chart {
            explanation,
            markup,
            streaming,
        } = frame
        else {
            panic!("expected chart frame");
        };
        assert_eq!(explanation, "Trend:");
        assert!(streaming);
        assert!(markup.ends_with("</BarChart>"));
    }

    #[test]
    fn test_finished_chart_is_untouched() {
        let text = "Trend:\n```jsx\n<BarChart>\n  <Bar dataKey=\"a\" />\n</BarChart>\n```";
        let frame = prepare_frame(text, false);
        let RenderFrame::Chart { markup, streaming, .. } = frame else {
            panic!("expected chart frame");
        };
        assert!(!streaming);
        assert_eq!(markup, "<BarChart>\n  <Bar dataKey=\"a\" />\n</BarChart>");
    }

    #[test]
    fn test_finished_unclosed_payload_is_left_as_is() {
        // An assistant that never closes a tag is a renderer-level display
        // defect, not a core failure; the final frame carries it verbatim.
        let text = "```jsx\n<BarChart>\n```";
        let frame = prepare_frame(text, false);
        let RenderFrame::Chart { markup, .. } = frame else {
            panic!("expected chart frame");
        };
        assert_eq!(markup, "<BarChart>");
    }

    #[test]
    fn test_frame_serializes_with_mode_tag() {
        let frame = prepare_frame("hello", false);
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"mode\":\"text\""));

        let frame = prepare_frame("```jsx\n<PieChart>", true);
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"mode\":\"chart\""));
        assert!(json.contains("\"streaming\":true"));
    }
}
