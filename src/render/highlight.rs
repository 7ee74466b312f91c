//! Syntax highlighting for fenced code blocks

use super::node::{HighlightedLine, StyledSpan, TokenStyle};
use regex::Regex;
use std::sync::OnceLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style, Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

const THEME_NAME: &str = "base16-ocean.dark";

/// Lazily loaded syntect assets, shared by every render
struct Assets {
    syntax_set: SyntaxSet,
    theme: Option<Theme>,
}

fn assets() -> &'static Assets {
    static ASSETS: OnceLock<Assets> = OnceLock::new();
    ASSETS.get_or_init(|| {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let theme_set = ThemeSet::load_defaults();
        let theme = theme_set
            .themes
            .get(THEME_NAME)
            .or_else(|| theme_set.themes.values().next())
            .cloned();
        Assets { syntax_set, theme }
    })
}

fn language_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_+#.-]+").expect("valid language regex"))
}

/// Language tag from a fence info string: `rust,ignore` and
/// `python {.numberLines}` both yield the first token
pub(super) fn language_from_info(info: &str) -> Option<String> {
    language_re()
        .find(info.trim())
        .map(|m| m.as_str().to_string())
}

/// Highlight `code` as `language`.
///
/// `None` when the language is unknown; the caller renders the block
/// unhighlighted. The spans cover every byte of `code`.
pub(super) fn highlight(code: &str, language: &str) -> Option<Vec<HighlightedLine>> {
    let assets = assets();
    let theme = assets.theme.as_ref()?;
    let syntax = assets.syntax_set.find_syntax_by_token(language)?;
    let mut highlighter = HighlightLines::new(syntax, theme);

    let mut lines = Vec::new();
    for line in LinesWithEndings::from(code) {
        let ranges = match highlighter.highlight_line(line, &assets.syntax_set) {
            Ok(ranges) => ranges,
            Err(e) => {
                tracing::debug!(language, error = %e, "Highlighting failed, rendering plain");
                return None;
            }
        };
        lines.push(HighlightedLine {
            spans: ranges
                .into_iter()
                .map(|(style, text)| StyledSpan {
                    text: text.to_string(),
                    style: token_style(style),
                })
                .collect(),
        });
    }
    Some(lines)
}

fn token_style(style: Style) -> TokenStyle {
    let fg = style.foreground;
    TokenStyle {
        foreground: (fg.r, fg.g, fg.b),
        bold: style.font_style.contains(FontStyle::BOLD),
        italic: style.font_style.contains(FontStyle::ITALIC),
        underline: style.font_style.contains(FontStyle::UNDERLINE),
    }
}
