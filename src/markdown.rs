//! Markdown Renderer
//!
//! Renders note text with pulldown-cmark plus:
//! - Tables, strikethrough and task lists
//! - Autolinks for bare `http://`, `https://` and `www.` URLs
//! - Syntax highlighting of fenced code (syntect)
//!
//! Raw HTML in the source is shown as text, never passed through.

use pulldown_cmark::{html::push_html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::sync::OnceLock;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::components::escape_html;

/// Syntax highlighter resources (lazy loaded)
static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();

const THEME: &str = "InspiredGitHub";
const URL_PREFIXES: [&str; 3] = ["https://", "http://", "www."];
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')'];

fn get_syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn get_theme() -> Option<&'static Theme> {
    THEME_SET.get_or_init(ThemeSet::load_defaults).themes.get(THEME)
}

/// Render markdown to an HTML string
pub fn render_markdown(text: &str) -> String {
    let parser = Parser::new_ext(text, get_options());
    let events = transform_events(parser);
    let mut html_output = String::new();
    push_html(&mut html_output, events.into_iter());
    html_output
}

/// Render for inline use (strips outer <p> tags)
pub fn render_markdown_inline(text: &str) -> String {
    let html = render_markdown(text);

    html.trim()
        .strip_prefix("<p>")
        .and_then(|s| s.strip_suffix("</p>"))
        .map(|s| s.to_string())
        .unwrap_or(html)
}

fn get_options() -> Options {
    Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES | Options::ENABLE_TASKLISTS
}

// State for the event transformer
enum State {
    Normal,
    InCodeBlock { lang: Option<String>, content: String },
    /// Inside an explicit link; its text is not autolinked
    InLink { depth: usize },
}

fn transform_events<'a>(parser: Parser<'a>) -> Vec<Event<'a>> {
    let mut events = Vec::new();
    let mut state = State::Normal;

    for event in parser {
        match state {
            State::Normal => match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(l) if !l.is_empty() => Some(l.to_string()),
                        _ => None,
                    };
                    state = State::InCodeBlock {
                        lang,
                        content: String::new(),
                    };
                }
                Event::Start(tag @ Tag::Link { .. }) => {
                    events.push(Event::Start(tag));
                    state = State::InLink { depth: 0 };
                }
                Event::Text(text) => events.extend(autolink(text)),
                Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
                other => events.push(other),
            },

            State::InCodeBlock {
                ref lang,
                ref mut content,
            } => match event {
                Event::Text(t) => content.push_str(&t),
                Event::End(TagEnd::CodeBlock) => {
                    let html = highlight_code(content, lang.as_deref());
                    events.push(Event::Html(CowStr::from(html)));
                    state = State::Normal;
                }
                _ => {}
            },

            State::InLink { ref mut depth } => {
                match &event {
                    Event::Start(_) => *depth += 1,
                    Event::End(TagEnd::Link) if *depth == 0 => state = State::Normal,
                    Event::End(_) => *depth = depth.saturating_sub(1),
                    _ => {}
                }
                match event {
                    Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
                    other => events.push(other),
                }
            }
        }
    }

    events
}

fn highlight_code(code: &str, lang: Option<&str>) -> String {
    let ss = get_syntax_set();
    let syntax = lang
        .and_then(|l| ss.find_syntax_by_token(l))
        .unwrap_or_else(|| ss.find_syntax_plain_text());

    get_theme()
        .and_then(|theme| highlighted_html_for_string(code, ss, syntax, theme).ok())
        .unwrap_or_else(|| format!("<pre><code>{}</code></pre>", escape_html(code)))
}

/// Split a text event around bare URLs
fn autolink(text: CowStr<'_>) -> Vec<Event<'_>> {
    let Some(first) = find_url(&text, 0) else {
        return vec![Event::Text(text)];
    };

    let mut events = Vec::new();
    let mut cursor = 0;
    let mut next = Some(first);
    while let Some((start, end)) = next {
        if start > cursor {
            events.push(Event::Text(CowStr::from(text[cursor..start].to_string())));
        }
        let url = &text[start..end];
        let href = if url.starts_with("www.") {
            format!("http://{}", url)
        } else {
            url.to_string()
        };
        events.push(Event::Html(CowStr::from(format!(
            r#"<a href="{}">"#,
            escape_html(&href)
        ))));
        events.push(Event::Text(CowStr::from(url.to_string())));
        events.push(Event::Html(CowStr::from("</a>")));
        cursor = end;
        next = find_url(&text, cursor);
    }
    if cursor < text.len() {
        events.push(Event::Text(CowStr::from(text[cursor..].to_string())));
    }
    events
}

/// Byte range of the next bare URL at or after `from`
fn find_url(text: &str, from: usize) -> Option<(usize, usize)> {
    let mut search = from;
    loop {
        let rest = &text[search..];
        let (offset, prefix) = URL_PREFIXES
            .iter()
            .filter_map(|p| rest.find(p).map(|i| (i, *p)))
            .min_by_key(|(i, p)| (*i, std::cmp::Reverse(p.len())))?;
        let start = search + offset;

        let at_boundary = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric() && c != '/' && c != '.');
        let body_end = text[start..]
            .find(|c: char| c.is_whitespace() || c == '<')
            .map_or(text.len(), |i| start + i);
        let end = start + text[start..body_end].trim_end_matches(TRAILING_PUNCTUATION).len();

        if at_boundary && end > start + prefix.len() {
            return Some((start, end));
        }
        search = start + prefix.len();
    }
}
