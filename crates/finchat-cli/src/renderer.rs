//! Terminal renderer for chat frames.
//!
//! Owns the allow-list of renderable element names: the classifier only
//! signals "this is markup", while deciding which elements can actually be
//! drawn is a rendering concern.

use finchat_core::markup::next_tag;
use finchat_core::render::RenderFrame;

/// Element names the chart surface knows how to draw.
pub const RENDERABLE_ELEMENTS: &[&str] = &[
    "ResponsiveContainer",
    "BarChart",
    "Bar",
    "LineChart",
    "Line",
    "AreaChart",
    "Area",
    "PieChart",
    "Pie",
    "Cell",
    "ScatterChart",
    "Scatter",
    "XAxis",
    "YAxis",
    "CartesianGrid",
    "Tooltip",
    "Legend",
    "div",
    "span",
    "button",
];

/// Incremental printer for a streaming turn.
///
/// Text frames are printed as append-only suffixes so the terminal shows a
/// live transcript; a chart frame is announced once and rendered in full
/// when the turn finishes.
pub struct StreamPrinter {
    printed: usize,
    chart_announced: bool,
}

impl StreamPrinter {
    pub fn new() -> Self {
        Self {
            printed: 0,
            chart_announced: false,
        }
    }

    /// Returns the text to append to the terminal for an in-progress frame.
    pub fn streaming_update(&mut self, frame: &RenderFrame) -> String {
        match frame {
            RenderFrame::Text { content } => {
                let suffix = content.get(self.printed.min(content.len())..).unwrap_or("");
                self.printed = content.len();
                suffix.to_string()
            }
            RenderFrame::Chart { .. } => {
                if self.chart_announced {
                    String::new()
                } else {
                    self.chart_announced = true;
                    if self.printed == 0 {
                        "[building chart...]\n".to_string()
                    } else {
                        "\n[building chart...]\n".to_string()
                    }
                }
            }
        }
    }

    /// Returns the output for the finished frame.
    pub fn finish(&mut self, frame: &RenderFrame) -> String {
        match frame {
            RenderFrame::Text { content } => {
                let suffix = content.get(self.printed.min(content.len())..).unwrap_or("");
                self.printed = content.len();
                format!("{suffix}\n")
            }
            RenderFrame::Chart {
                explanation,
                markup,
                ..
            } => {
                let mut out = String::new();
                if !explanation.is_empty() {
                    out.push_str(explanation);
                    out.push_str("\n\n");
                }
                out.push_str("```jsx\n");
                out.push_str(markup);
                out.push_str("\n```\n");

                let unknown = unknown_elements(markup);
                if !unknown.is_empty() {
                    out.push_str(&format!(
                        "(elements not renderable here: {})\n",
                        unknown.join(", ")
                    ));
                }
                out
            }
        }
    }
}

impl Default for StreamPrinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Element names in `markup` missing from the renderable allow-list, in
/// order of first appearance.
pub fn unknown_elements(markup: &str) -> Vec<String> {
    let mut unknown: Vec<String> = Vec::new();
    let mut pos = 0;
    while let Some(token) = next_tag(markup, pos) {
        if !RENDERABLE_ELEMENTS.contains(&token.name)
            && !unknown.iter().any(|n| n == token.name)
        {
            unknown.push(token.name.to_string());
        }
        pos = token.end;
    }
    unknown
}

#[cfg(test)]
mod tests {
    use finchat_core::render::prepare_frame;

    use super::*;

    #[test]
    fn test_text_frames_print_append_only_suffixes() {
        let mut printer = StreamPrinter::new();

        let first = prepare_frame("Total spend", true);
        assert_eq!(printer.streaming_update(&first), "Total spend");

        let second = prepare_frame("Total spend: $452.10", true);
        assert_eq!(printer.streaming_update(&second), ": $452.10");

        let done = prepare_frame("Total spend: $452.10", false);
        assert_eq!(printer.finish(&done), "\n");
    }

    #[test]
    fn test_chart_announced_once_then_rendered_in_full() {
        let mut printer = StreamPrinter::new();

        let explain = prepare_frame("Here is the trend.\n", true);
        printer.streaming_update(&explain);

        let partial = prepare_frame("Here is the trend.\n```jsx\n<BarChart>", true);
        let announce = printer.streaming_update(&partial);
        assert!(announce.contains("[building chart...]"));

        let more = prepare_frame("Here is the trend.\n```jsx\n<BarChart><Bar />", true);
        assert_eq!(printer.streaming_update(&more), "");

        let full = "Here is the trend.\n```jsx\n<BarChart><Bar />\n</BarChart>\n```";
        let out = printer.finish(&prepare_frame(full, false));
        assert!(out.contains("Here is the trend."));
        assert!(out.contains("<BarChart><Bar />\n</BarChart>"));
        assert!(out.contains("```jsx"));
    }

    #[test]
    fn test_unknown_elements_are_reported_once() {
        let unknown = unknown_elements("<BarChart><Sparkline /><Sparkline /><Gauge>");
        assert_eq!(unknown, vec!["Sparkline".to_string(), "Gauge".to_string()]);
    }

    #[test]
    fn test_fully_renderable_markup_has_no_unknowns() {
        let unknown = unknown_elements("<ResponsiveContainer><PieChart><Pie /></PieChart></ResponsiveContainer>");
        assert!(unknown.is_empty());
    }
}
