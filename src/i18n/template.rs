//! Message templates
//!
//! Templates are parsed once, when a catalog is built, into literal text,
//! `{name}` / `{name:parameter}` placeholders and legacy formatting codes
//! (`&a`, `§l`, `&#ff8800`, `&r`). Rendering substitutes placeholders and
//! strips the formatting codes from the output, reporting them instead as
//! [`FormatSpan`]s over the rendered text so a presentation layer can apply
//! them without re-parsing.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\{(?P<placeholder>[^{}:\s]+):?(?P<parameter>[^{}]+)?\}|[&§](?:(?P<style>[k-o])|(?P<reset>r)|(?P<color>[0-9a-f])|#(?P<hex>[0-9a-f]{6}))",
        )
        .expect("segment pattern is valid")
    })
}

/// Text color carried by a formatting directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    White,
    Rgb(u32),
}

impl Color {
    fn from_code(code: char) -> Option<Self> {
        let color = match code.to_ascii_lowercase() {
            '0' => Color::Black,
            '1' => Color::DarkBlue,
            '2' => Color::DarkGreen,
            '3' => Color::DarkAqua,
            '4' => Color::DarkRed,
            '5' => Color::DarkPurple,
            '6' => Color::Gold,
            '7' => Color::Gray,
            '8' => Color::DarkGray,
            '9' => Color::Blue,
            'a' => Color::Green,
            'b' => Color::Aqua,
            'c' => Color::Red,
            'd' => Color::LightPurple,
            'e' => Color::Yellow,
            'f' => Color::White,
            _ => return None,
        };
        Some(color)
    }
}

/// Text decoration carried by a formatting directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decoration {
    Obfuscated,
    Bold,
    Strikethrough,
    Underlined,
    Italic,
}

impl Decoration {
    fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_lowercase() {
            'k' => Some(Decoration::Obfuscated),
            'l' => Some(Decoration::Bold),
            'm' => Some(Decoration::Strikethrough),
            'n' => Some(Decoration::Underlined),
            'o' => Some(Decoration::Italic),
            _ => None,
        }
    }
}

/// Style in effect over a span of text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    pub color: Option<Color>,
    pub decorations: BTreeSet<Decoration>,
}

impl Style {
    pub fn is_plain(&self) -> bool {
        self.color.is_none() && self.decorations.is_empty()
    }
}

/// Byte range of rendered text carrying a non-default style
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpan {
    pub start: usize,
    pub end: usize,
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleChange {
    Color(Color),
    Decorate(Decoration),
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Placeholder {
        name: String,
        parameter: Option<String>,
    },
    Style(StyleChange),
}

/// A parsed message template. Serializes as its raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Template {
    raw: String,
    segments: Vec<Segment>,
}

impl From<String> for Template {
    fn from(raw: String) -> Self {
        Template::parse(raw)
    }
}

impl From<Template> for String {
    fn from(template: Template) -> Self {
        template.raw
    }
}

/// Output of [`Template::render`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub spans: Vec<FormatSpan>,
    /// Placeholder names no value was supplied for
    pub unresolved: Vec<String>,
}

impl Template {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut segments = Vec::new();
        let mut index = 0;

        for caps in segment_pattern().captures_iter(&raw) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() != index {
                segments.push(Segment::Text(raw[index..whole.start()].to_string()));
            }
            index = whole.end();

            let segment = if let Some(name) = caps.name("placeholder") {
                Segment::Placeholder {
                    name: name.as_str().trim().to_string(),
                    parameter: caps.name("parameter").map(|p| p.as_str().to_string()),
                }
            } else if let Some(style) = caps.name("style") {
                match style.as_str().chars().next().and_then(Decoration::from_code) {
                    Some(decoration) => Segment::Style(StyleChange::Decorate(decoration)),
                    None => Segment::Text(whole.as_str().to_string()),
                }
            } else if caps.name("reset").is_some() {
                Segment::Style(StyleChange::Reset)
            } else if let Some(color) = caps.name("color") {
                match color.as_str().chars().next().and_then(Color::from_code) {
                    Some(color) => Segment::Style(StyleChange::Color(color)),
                    None => Segment::Text(whole.as_str().to_string()),
                }
            } else if let Some(hex) = caps.name("hex") {
                match u32::from_str_radix(hex.as_str(), 16) {
                    Ok(rgb) => Segment::Style(StyleChange::Color(Color::Rgb(rgb))),
                    Err(_) => Segment::Text(whole.as_str().to_string()),
                }
            } else {
                Segment::Text(whole.as_str().to_string())
            };
            segments.push(segment);
        }

        if index != raw.len() {
            segments.push(Segment::Text(raw[index..].to_string()));
        }

        Self { raw, segments }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of all placeholders, in order of first appearance
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        let mut seen = BTreeSet::new();
        self.segments.iter().filter_map(move |segment| match segment {
            Segment::Placeholder { name, .. } if seen.insert(name.as_str()) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Render with `value` supplying placeholder substitutions.
    ///
    /// Placeholders for which `value` returns `None` are kept verbatim.
    pub fn render<F>(&self, mut value: F) -> Rendered
    where
        F: FnMut(&str, Option<&str>) -> Option<String>,
    {
        let mut out = Rendered::default();
        let mut style = Style::default();

        for segment in &self.segments {
            match segment {
                Segment::Text(text) => push_styled(&mut out, &style, text),
                Segment::Placeholder { name, parameter } => {
                    match value(name, parameter.as_deref()) {
                        Some(text) => push_styled(&mut out, &style, &text),
                        None => {
                            let literal = match parameter {
                                Some(parameter) => format!("{{{}:{}}}", name, parameter),
                                None => format!("{{{}}}", name),
                            };
                            push_styled(&mut out, &style, &literal);
                            if !out.unresolved.contains(name) {
                                out.unresolved.push(name.clone());
                            }
                        }
                    }
                }
                Segment::Style(StyleChange::Color(color)) => {
                    style.color = Some(*color);
                    style.decorations.clear();
                }
                Segment::Style(StyleChange::Decorate(decoration)) => {
                    style.decorations.insert(*decoration);
                }
                Segment::Style(StyleChange::Reset) => style = Style::default(),
            }
        }

        out
    }
}

fn push_styled(out: &mut Rendered, style: &Style, text: &str) {
    if text.is_empty() {
        return;
    }
    let start = out.text.len();
    out.text.push_str(text);
    let end = out.text.len();

    if style.is_plain() {
        return;
    }
    match out.spans.last_mut() {
        Some(last) if last.end == start && last.style == *style => last.end = end,
        _ => out.spans.push(FormatSpan {
            start,
            end,
            style: style.clone(),
        }),
    }
}
