//! Line-oriented markdown subset used by `markdown` elements.
//!
//! Each line is classified by its prefix (`#`, `##`, `###`, `- `, `* `, fenced code) and styled
//! from the book's `markdown` table, which is inherited over the built-in defaults.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::{
    foundation::{
        core::Color,
        props::{Props, PropsExt},
    },
    model::inherit,
    parse::style::{FontSpec, TextAlign, parse_color, parse_font, parse_text_align},
};

const CODE_FENCE: &str = "```";

/// Resolved per-prefix text styles.
#[derive(Clone, Debug, Default)]
pub struct MarkdownStyles {
    styles: BTreeMap<String, Props>,
}

impl MarkdownStyles {
    /// Built-in defaults with the document's overrides merged on top.
    pub fn resolve(overrides: Option<&Props>) -> Self {
        let defaults = json!({
            "#": {"fontSize": 32, "textAlign": "center"},
            "##": {"fontSize": 28, "textAlign": "center"},
            "###": {"fontSize": 24, "textAlign": "center"},
            "*": {"fontSize": 20, "textAlign": "left", "bullet": "\u{2022}"},
            "-": {"fontSize": 20, "textAlign": "left", "bullet": "\u{2022}"},
            "```": {"fontSize": 14, "textAlign": "left", "fontName": ["Courier"]},
            "": {"fontSize": 20, "textAlign": "left"}
        });
        let mut styles = BTreeMap::new();
        if let Value::Object(map) = defaults {
            for (prefix, style) in map {
                let base = style.as_object().cloned().unwrap_or_default();
                let own = overrides
                    .and_then(|o| o.object(&prefix))
                    .cloned()
                    .unwrap_or_default();
                styles.insert(prefix, inherit::merge(&own, Some(&base)));
            }
        }
        Self { styles }
    }

    fn style(&self, prefix: &str) -> Option<&Props> {
        self.styles.get(prefix).or_else(|| self.styles.get(""))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub font: FontSpec,
    pub color: Color,
    pub align: TextAlign,
    pub bullet: Option<String>,
}

/// Style `lines` into runs. `full_height` resolves percentage font sizes; `scale` converts
/// document units to device units.
pub fn render_markdown(
    lines: &[String],
    styles: &MarkdownStyles,
    full_height: f64,
    scale: f64,
) -> Vec<TextRun> {
    let mut runs = Vec::with_capacity(lines.len());
    let mut in_code = false;
    for line in lines {
        if line.trim_start().starts_with(CODE_FENCE) {
            in_code = !in_code;
            continue;
        }
        let (prefix, text) = if in_code {
            (CODE_FENCE, line.as_str())
        } else {
            classify(line)
        };
        let Some(style) = styles.style(prefix) else {
            continue;
        };
        runs.push(TextRun {
            text: text.to_owned(),
            font: parse_font(style, full_height, scale),
            color: style
                .value("textColor")
                .and_then(parse_color)
                .unwrap_or(Color::BLACK),
            align: parse_text_align(style.value("textAlign")),
            bullet: style.string("bullet").map(str::to_owned),
        });
    }
    runs
}

fn classify(line: &str) -> (&'static str, &str) {
    for (marker, prefix) in [
        ("### ", "###"),
        ("## ", "##"),
        ("# ", "#"),
        ("- ", "-"),
        ("* ", "*"),
    ] {
        if let Some(rest) = line.strip_prefix(marker) {
            return (prefix, rest.trim_start());
        }
    }
    ("", line)
}

#[cfg(test)]
#[path = "../../tests/unit/parse/markdown.rs"]
mod tests;
