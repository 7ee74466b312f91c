//! Terminal presentation of a session
//!
//! Turns snapshots and rendered documents into text for a line-oriented
//! terminal. Styling is optional so output stays readable under `NO_COLOR`
//! and in tests.

use crate::attachment::{AttachmentInfo, AttachmentKind};
use crate::copy_state::CopyKey;
use crate::message::{Message, Role};
use crate::render::{
    Alignment, Block, CodeBlock, Document, Inline, List, MarkupNode, MessageView, Table,
};
use crate::runtime::SessionSnapshot;
use crossterm::style::{Color, StyledContent, Stylize};
use std::borrow::Cow;

pub const EMPTY_TITLE: &str = "Ready to help you learn!";
pub const EMPTY_SUBTITLE: &str = "Upload a file and start asking questions";
pub const THINKING: &str = "Thinking...";

const ACCENT: Color = Color::Magenta;
const RULE_WIDTH: usize = 40;

/// Drop control characters other than newline and tab.
///
/// Message text comes from the user and the model; raw escape sequences in it
/// must not reach the terminal.
pub fn inert(text: &str) -> Cow<'_, str> {
    if text.chars().any(is_unsafe_control) {
        Cow::Owned(text.chars().filter(|c| !is_unsafe_control(*c)).collect())
    } else {
        Cow::Borrowed(text)
    }
}

fn is_unsafe_control(c: char) -> bool {
    c.is_control() && c != '\n' && c != '\t'
}

/// Command that copies the block behind `key`
pub fn copy_command(key: CopyKey) -> String {
    match key {
        CopyKey::Message(index) => format!("/copy {index}"),
        CopyKey::Code { message, block } => format!("/copy {message} code {block}"),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TerminalRenderer {
    color: bool,
}

impl TerminalRenderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Colored unless `NO_COLOR` is set to anything non-empty
    pub fn from_env() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        Self::new(!no_color)
    }

    fn paint<'a>(
        &self,
        text: &'a str,
        style: impl FnOnce(StyledContent<&'a str>) -> StyledContent<&'a str>,
    ) -> String {
        if self.color {
            style(text.stylize()).to_string()
        } else {
            text.to_string()
        }
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Whole transcript; `copied` is the block currently showing as copied
    pub fn render_transcript(&self, snapshot: &SessionSnapshot, copied: Option<CopyKey>) -> String {
        let mut out = String::new();
        if snapshot.history.is_empty() && !snapshot.state.is_sending() {
            out.push_str(&self.paint(EMPTY_TITLE, |s| s.bold()));
            out.push('\n');
            out.push_str(&self.paint(EMPTY_SUBTITLE, |s| s.dim()));
            out.push('\n');
            return out;
        }

        for (view, message) in snapshot.views().iter().zip(&snapshot.history) {
            out.push_str(&self.render_message(view, message, copied));
            out.push('\n');
        }
        if snapshot.state.is_sending() {
            out.push_str(&self.thinking());
            out.push('\n');
        }
        out
    }

    pub fn thinking(&self) -> String {
        self.paint(THINKING, |s| s.with(ACCENT).italic())
    }

    pub fn render_message(
        &self,
        view: &MessageView,
        message: &Message,
        copied: Option<CopyKey>,
    ) -> String {
        let author = match (&message.role, &message.model) {
            (Role::User, _) => "You".to_string(),
            (Role::Assistant, Some(model)) => format!("Assistant ({})", inert(model)),
            (Role::Assistant, None) => "Assistant".to_string(),
        };

        let mut out = format!(
            "{} {}\n",
            self.paint(&author, |s| s.bold().with(ACCENT)),
            self.copy_label(view.copy_key(), copied)
        );
        match view {
            MessageView::Plain { text, .. } => {
                out.push_str(&inert(text));
                out.push('\n');
            }
            MessageView::Rich(document) => out.push_str(&self.render_document(document, copied)),
        }
        out
    }

    fn copy_label(&self, key: CopyKey, copied: Option<CopyKey>) -> String {
        if copied == Some(key) {
            self.paint("[copied]", |s| s.green())
        } else {
            self.paint(&format!("[{}]", copy_command(key)), |s| s.dim())
        }
    }

    /// The attachment card, or the picker hints when nothing is bound
    pub fn render_attachment(&self, attachment: Option<&AttachmentInfo>) -> String {
        match attachment {
            Some(info) => format!(
                "{} {} ({}, {})\n",
                self.paint("Attached:", |s| s.bold()),
                inert(&info.name),
                info.kind.label(),
                info.display_size()
            ),
            None => {
                let mut out = self.paint("No file attached. Use /attach <path>:", |s| s.dim());
                out.push('\n');
                for kind in AttachmentKind::ALL {
                    out.push_str(&format!("  {:<11} {}\n", kind.label(), kind.accept_hint()));
                }
                out
            }
        }
    }

    // ========================================================================
    // Documents
    // ========================================================================

    pub fn render_document(&self, document: &Document, copied: Option<CopyKey>) -> String {
        let mut out = String::new();
        for block in &document.blocks {
            self.render_block(block, copied, "", &mut out);
        }
        out
    }

    fn render_block(&self, block: &Block, copied: Option<CopyKey>, indent: &str, out: &mut String) {
        match block {
            Block::Paragraph(inlines) => {
                push_lines(out, indent, &self.render_inlines(inlines));
            }
            Block::Heading { level, content } => {
                let marker = "#".repeat(usize::from(*level));
                let text = format!("{marker} {}", self.render_inlines(content));
                push_lines(out, indent, &self.paint(&text, |s| s.bold().with(ACCENT)));
            }
            Block::BlockQuote(blocks) => {
                let quoted = format!("{indent}> ");
                for inner in blocks {
                    self.render_block(inner, copied, &quoted, out);
                }
            }
            Block::List(list) => self.render_list(list, copied, indent, out),
            Block::CodeBlock(code) => self.render_code(code, copied, indent, out),
            Block::Table(table) => self.render_table(table, indent, out),
            Block::Rule => push_lines(out, indent, &"─".repeat(RULE_WIDTH)),
            Block::Markup(nodes) => {
                let mut text = String::new();
                markup_text(nodes, &mut text);
                push_lines(out, indent, text.trim_matches('\n'));
            }
        }
    }

    fn render_list(&self, list: &List, copied: Option<CopyKey>, indent: &str, out: &mut String) {
        for (i, item) in list.items.iter().enumerate() {
            let bullet = match list.start {
                Some(start) => format!("{}. ", start + i as u64),
                None => "- ".to_string(),
            };
            let task = match item.checked {
                Some(true) => "[x] ",
                Some(false) => "[ ] ",
                None => "",
            };
            let nested = format!("{indent}{}", " ".repeat(bullet.chars().count()));

            let mut body = String::new();
            for block in &item.blocks {
                self.render_block(block, copied, &nested, &mut body);
            }
            // The first line carries the bullet in place of the nested indent
            let body = body.strip_prefix(nested.as_str()).unwrap_or(&body);
            out.push_str(&format!("{indent}{bullet}{task}{body}"));
            if body.is_empty() {
                out.push('\n');
            }
        }
    }

    fn render_code(&self, code: &CodeBlock, copied: Option<CopyKey>, indent: &str, out: &mut String) {
        let fence = format!("```{}", inert(code.language.as_deref().unwrap_or_default()));
        out.push_str(&format!(
            "{indent}{} {}\n",
            self.paint(&fence, |s| s.dim()),
            self.copy_label(code.copy_key, copied)
        ));

        let body = match (&code.highlighted, self.color) {
            (Some(lines), true) => lines
                .iter()
                .flat_map(|line| line.spans.iter())
                .map(|span| {
                    let (r, g, b) = span.style.foreground;
                    let text = inert(&span.text);
                    let mut styled = text.as_ref().with(Color::Rgb { r, g, b });
                    if span.style.bold {
                        styled = styled.bold();
                    }
                    if span.style.italic {
                        styled = styled.italic();
                    }
                    if span.style.underline {
                        styled = styled.underlined();
                    }
                    styled.to_string()
                })
                .collect::<String>(),
            _ => inert(&code.plain_text()).into_owned(),
        };
        push_lines(out, indent, body.strip_suffix('\n').unwrap_or(&body));
        out.push_str(&format!("{indent}{}\n", self.paint("```", |s| s.dim())));
    }

    fn render_table(&self, table: &Table, indent: &str, out: &mut String) {
        let header: Vec<String> = table.header.iter().map(|c| self.render_inlines(c)).collect();
        out.push_str(&format!("{indent}| {} |\n", header.join(" | ")));

        let separators: Vec<&str> = table
            .alignments
            .iter()
            .map(|a| match a {
                Alignment::None => "---",
                Alignment::Left => ":--",
                Alignment::Center => ":-:",
                Alignment::Right => "--:",
            })
            .collect();
        out.push_str(&format!("{indent}| {} |\n", separators.join(" | ")));

        for row in &table.rows {
            let cells: Vec<String> = row.iter().map(|c| self.render_inlines(c)).collect();
            out.push_str(&format!("{indent}| {} |\n", cells.join(" | ")));
        }
    }

    fn render_inlines(&self, inlines: &[Inline]) -> String {
        let mut out = String::new();
        for inline in inlines {
            match inline {
                Inline::Text(text) => out.push_str(&inert(text)),
                Inline::Code(code) => {
                    let code = inert(code);
                    if self.color {
                        out.push_str(&self.paint(&code, |s| s.with(ACCENT)));
                    } else {
                        out.push_str(&format!("`{code}`"));
                    }
                }
                Inline::Emphasis(children) => {
                    out.push_str(&self.paint(&self.render_inlines(children), |s| s.italic()));
                }
                Inline::Strong(children) => {
                    out.push_str(&self.paint(&self.render_inlines(children), |s| s.bold()));
                }
                Inline::Strikethrough(children) => {
                    out.push_str(&self.paint(&self.render_inlines(children), |s| s.crossed_out()));
                }
                Inline::Link(link) => {
                    let text = self.render_inlines(&link.children);
                    out.push_str(&self.paint(&text, |s| s.underlined().with(ACCENT)));
                    if let Some(href) = link.href.as_deref().filter(|href| *href != text) {
                        out.push_str(&format!(" <{}>", inert(href)));
                    }
                }
                Inline::Image { src, alt } => match src {
                    Some(src) => {
                        out.push_str(&format!("[image: {}] <{}>", inert(alt), inert(src)));
                    }
                    None => out.push_str(&format!("[image: {}]", inert(alt))),
                },
                Inline::SoftBreak => out.push(' '),
                Inline::HardBreak => out.push('\n'),
                Inline::Element { children, .. } => out.push_str(&self.render_inlines(children)),
            }
        }
        out
    }
}

fn push_lines(out: &mut String, indent: &str, text: &str) {
    for line in text.split('\n') {
        out.push_str(indent);
        out.push_str(line);
        out.push('\n');
    }
}

const BLOCK_TAGS: &[&str] = &[
    "blockquote", "br", "dd", "div", "dl", "dt", "figure", "h1", "h2", "h3", "h4", "h5", "h6",
    "hr", "li", "p", "pre", "table", "tr",
];

fn markup_text(nodes: &[MarkupNode], out: &mut String) {
    for node in nodes {
        match node {
            MarkupNode::Text { text } => out.push_str(&inert(text)),
            MarkupNode::Link { children, href } => {
                markup_text(children, out);
                if let Some(href) = href {
                    out.push_str(&format!(" <{}>", inert(href)));
                }
            }
            MarkupNode::Element { tag, children } => {
                markup_text(children, out);
                if BLOCK_TAGS.contains(tag) && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }
    }
}
