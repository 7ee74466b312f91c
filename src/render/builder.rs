//! Builds the node tree from the markdown event stream
//!
//! Every `Start` event pushes exactly one frame and every `End` pops it.
//! Raw inline tags push frames of their own; any still open when the
//! enclosing markdown element ends are closed with it.

use super::highlight::{highlight, language_from_info};
use super::node::{
    inlines_text, Alignment, Block, CodeBlock, Document, Inline, Link, List, ListItem,
    MarkupNode, Table,
};
use super::sanitize::{parse_tag, policy, sanitize_fragment, sanitize_href, Policy, TagToken};
use crate::copy_state::CopyKey;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag};

/// Markdown extensions replies are written with
pub(super) fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

pub(super) fn build_document(message: usize, markdown: &str) -> Document {
    let mut builder = TreeBuilder::new(message);
    for event in Parser::new_ext(markdown, parser_options()) {
        builder.handle(event);
    }
    builder.finish()
}

// ============================================================================
// Frames
// ============================================================================

#[derive(Debug)]
enum BlockKind {
    Root,
    BlockQuote,
    Item { checked: Option<bool> },
    /// Containers with no node of their own; children are spliced upward
    Transparent,
}

#[derive(Debug)]
enum InlineKind {
    Paragraph,
    Heading(u8),
    Emphasis,
    Strong,
    Strikethrough,
    Link {
        href: Option<String>,
        title: Option<String>,
    },
    Image {
        src: Option<String>,
    },
    TableCell,
    Transparent,
    /// Allow-listed raw tag such as `<sub>`
    Raw(&'static str),
    /// Raw `<a href>`
    RawLink {
        href: Option<String>,
    },
    /// Dropped raw tag; swallows everything until it closes
    Suppressed(String),
}

impl InlineKind {
    fn is_raw(&self) -> bool {
        matches!(
            self,
            InlineKind::Raw(_) | InlineKind::RawLink { .. } | InlineKind::Suppressed(_)
        )
    }

    fn raw_name(&self) -> Option<&str> {
        match self {
            InlineKind::Raw(tag) => Some(*tag),
            InlineKind::RawLink { .. } => Some("a"),
            InlineKind::Suppressed(tag) => Some(tag.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum Frame {
    Blocks {
        kind: BlockKind,
        blocks: Vec<Block>,
        /// Inline content of tight list items, which has no paragraph
        loose: Vec<Inline>,
    },
    Inlines {
        kind: InlineKind,
        children: Vec<Inline>,
    },
    List {
        start: Option<u64>,
        items: Vec<ListItem>,
    },
    Table {
        alignments: Vec<Alignment>,
        header: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
    Row {
        head: bool,
        cells: Vec<Vec<Inline>>,
    },
    Code {
        language: Option<String>,
        code: String,
    },
    Html(String),
}

impl Frame {
    fn blocks(kind: BlockKind) -> Self {
        Frame::Blocks {
            kind,
            blocks: Vec::new(),
            loose: Vec::new(),
        }
    }

    fn inlines(kind: InlineKind) -> Self {
        Frame::Inlines {
            kind,
            children: Vec::new(),
        }
    }

    fn is_raw(&self) -> bool {
        matches!(self, Frame::Inlines { kind, .. } if kind.is_raw())
    }
}

// ============================================================================
// Builder
// ============================================================================

struct TreeBuilder {
    message: usize,
    stack: Vec<Frame>,
    next_code_block: usize,
}

impl TreeBuilder {
    fn new(message: usize) -> Self {
        Self {
            message,
            stack: vec![Frame::blocks(BlockKind::Root)],
            next_code_block: 0,
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => {
                while self.stack.last().is_some_and(Frame::is_raw) {
                    self.close_top();
                }
                self.close_top();
            }
            Event::Text(text) => self.text(text),
            Event::Code(code) => self.push_inline(Inline::Code(code.into_string())),
            Event::InlineMath(math) | Event::DisplayMath(math) => {
                self.push_inline(Inline::Text(math.into_string()));
            }
            Event::Html(html) => {
                if let Some(Frame::Html(buf)) = self.stack.last_mut() {
                    buf.push_str(&html);
                } else {
                    self.inline_tag(&html);
                }
            }
            Event::InlineHtml(html) => self.inline_tag(&html),
            Event::FootnoteReference(label) => {
                self.push_inline(Inline::Text(format!("[{}]", &*label)));
            }
            Event::SoftBreak => self.push_inline(Inline::SoftBreak),
            Event::HardBreak => self.push_inline(Inline::HardBreak),
            Event::Rule => self.push_block(Block::Rule),
            Event::TaskListMarker(checked) => self.mark_task(checked),
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let frame = match tag {
            Tag::Paragraph => Frame::inlines(InlineKind::Paragraph),
            Tag::Heading { level, .. } => Frame::inlines(InlineKind::Heading(heading_level(level))),
            Tag::BlockQuote(_) => Frame::blocks(BlockKind::BlockQuote),
            Tag::CodeBlock(kind) => Frame::Code {
                language: match kind {
                    CodeBlockKind::Fenced(info) => language_from_info(&info),
                    CodeBlockKind::Indented => None,
                },
                code: String::new(),
            },
            Tag::HtmlBlock => Frame::Html(String::new()),
            Tag::List(start) => Frame::List {
                start,
                items: Vec::new(),
            },
            Tag::Item => Frame::blocks(BlockKind::Item { checked: None }),
            Tag::Table(alignments) => Frame::Table {
                alignments: alignments.into_iter().map(alignment).collect(),
                header: Vec::new(),
                rows: Vec::new(),
            },
            Tag::TableHead => Frame::Row {
                head: true,
                cells: Vec::new(),
            },
            Tag::TableRow => Frame::Row {
                head: false,
                cells: Vec::new(),
            },
            Tag::TableCell => Frame::inlines(InlineKind::TableCell),
            Tag::Emphasis => Frame::inlines(InlineKind::Emphasis),
            Tag::Strong => Frame::inlines(InlineKind::Strong),
            Tag::Strikethrough => Frame::inlines(InlineKind::Strikethrough),
            Tag::Link {
                dest_url, title, ..
            } => Frame::inlines(InlineKind::Link {
                href: sanitize_href(&dest_url),
                title: non_empty(title),
            }),
            Tag::Image { dest_url, .. } => Frame::inlines(InlineKind::Image {
                src: sanitize_href(&dest_url),
            }),
            Tag::FootnoteDefinition(_)
            | Tag::DefinitionList
            | Tag::DefinitionListTitle
            | Tag::DefinitionListDefinition
            | Tag::MetadataBlock(_) => Frame::blocks(BlockKind::Transparent),
            _ => Frame::inlines(InlineKind::Transparent),
        };
        self.stack.push(frame);
    }

    fn finish(mut self) -> Document {
        while self.stack.len() > 1 {
            self.close_top();
        }
        let blocks = match self.stack.pop() {
            Some(Frame::Blocks {
                mut blocks, loose, ..
            }) => {
                flush_loose(&mut blocks, loose);
                blocks
            }
            _ => Vec::new(),
        };
        Document {
            blocks,
            copy_key: CopyKey::Message(self.message),
        }
    }

    // ------------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------------

    fn text(&mut self, text: CowStr<'_>) {
        match self.stack.last_mut() {
            Some(Frame::Code { code, .. }) => code.push_str(&text),
            Some(Frame::Html(buf)) => buf.push_str(&text),
            _ => self.push_inline(Inline::Text(text.into_string())),
        }
    }

    fn push_inline(&mut self, inline: Inline) {
        let target = match self.stack.last_mut() {
            Some(Frame::Inlines {
                kind: InlineKind::Suppressed(_),
                ..
            }) => return,
            Some(Frame::Inlines { children, .. }) => children,
            Some(Frame::Blocks { loose, .. }) => loose,
            _ => return,
        };
        if let (Inline::Text(text), Some(Inline::Text(last))) = (&inline, target.last_mut()) {
            last.push_str(text);
            return;
        }
        target.push(inline);
    }

    fn push_block(&mut self, block: Block) {
        let container = self.stack.iter_mut().rev().find_map(|frame| match frame {
            Frame::Blocks { blocks, loose, .. } => Some((blocks, loose)),
            _ => None,
        });
        if let Some((blocks, loose)) = container {
            flush_loose(blocks, std::mem::take(loose));
            blocks.push(block);
        }
    }

    fn mark_task(&mut self, checked: bool) {
        let item = self.stack.iter_mut().rev().find_map(|frame| match frame {
            Frame::Blocks {
                kind: BlockKind::Item { checked },
                ..
            } => Some(checked),
            _ => None,
        });
        if let Some(slot) = item {
            *slot = Some(checked);
        }
    }

    // ------------------------------------------------------------------------
    // Raw inline tags
    // ------------------------------------------------------------------------

    fn inline_tag(&mut self, raw: &str) {
        let token = parse_tag(raw);

        // Inside a dropped element only its own closing tag matters
        if let Some(Frame::Inlines {
            kind: InlineKind::Suppressed(open),
            ..
        }) = self.stack.last()
        {
            let closes = matches!(&token, TagToken::Close { name } if name == open);
            if closes {
                self.stack.pop();
            }
            return;
        }

        match token {
            TagToken::Open {
                name,
                href,
                self_closing,
            } => match policy(&name) {
                Policy::Drop if self_closing => {}
                Policy::Drop => self.stack.push(Frame::inlines(InlineKind::Suppressed(name))),
                Policy::Unwrap => {}
                Policy::Allow("br") => self.push_inline(Inline::HardBreak),
                Policy::Allow(_) if self_closing => {}
                Policy::Allow("a") => self.stack.push(Frame::inlines(InlineKind::RawLink { href })),
                Policy::Allow(tag) => self.stack.push(Frame::inlines(InlineKind::Raw(tag))),
            },
            TagToken::Close { name } => self.close_raw(&name),
            TagToken::Ignored => {}
        }
    }

    /// Close the innermost open raw tag named `name`, along with any raw
    /// tags opened inside it. Never crosses a markdown element.
    fn close_raw(&mut self, name: &str) {
        let depth = self
            .stack
            .iter()
            .rev()
            .take_while(|frame| frame.is_raw())
            .position(|frame| match frame {
                Frame::Inlines { kind, .. } => kind.raw_name() == Some(name),
                _ => false,
            });
        if let Some(depth) = depth {
            for _ in 0..=depth {
                self.close_top();
            }
        }
    }

    // ------------------------------------------------------------------------
    // Closing frames
    // ------------------------------------------------------------------------

    fn close_top(&mut self) {
        // The root frame is only taken by `finish`
        if self.stack.len() <= 1 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        match frame {
            Frame::Blocks {
                kind,
                mut blocks,
                loose,
            } => {
                flush_loose(&mut blocks, loose);
                match kind {
                    BlockKind::Root => {}
                    BlockKind::BlockQuote => self.push_block(Block::BlockQuote(blocks)),
                    BlockKind::Item { checked } => {
                        if let Some(Frame::List { items, .. }) = self.stack.last_mut() {
                            items.push(ListItem { checked, blocks });
                        }
                    }
                    BlockKind::Transparent => {
                        for block in blocks {
                            self.push_block(block);
                        }
                    }
                }
            }
            Frame::Inlines { kind, children } => self.close_inlines(kind, children),
            Frame::List { start, items } => self.push_block(Block::List(List { start, items })),
            Frame::Table {
                alignments,
                header,
                rows,
            } => self.push_block(Block::Table(Table {
                alignments,
                header,
                rows,
            })),
            Frame::Row { head, cells } => {
                if let Some(Frame::Table { header, rows, .. }) = self.stack.last_mut() {
                    if head {
                        *header = cells;
                    } else {
                        rows.push(cells);
                    }
                }
            }
            Frame::Code { language, code } => {
                let message = self.message;
                let block = self.next_code_block;
                self.next_code_block += 1;
                let highlighted = language
                    .as_deref()
                    .and_then(|language| highlight(&code, language));
                self.push_block(Block::CodeBlock(CodeBlock {
                    language,
                    code,
                    highlighted,
                    copy_key: CopyKey::Code { message, block },
                }));
            }
            Frame::Html(html) => {
                let nodes = sanitize_fragment(&html);
                if !is_blank_markup(&nodes) {
                    self.push_block(Block::Markup(nodes));
                }
            }
        }
    }

    fn close_inlines(&mut self, kind: InlineKind, children: Vec<Inline>) {
        match kind {
            InlineKind::Paragraph => {
                if !is_blank(&children) {
                    self.push_block(Block::Paragraph(children));
                }
            }
            InlineKind::Heading(level) => self.push_block(Block::Heading {
                level,
                content: children,
            }),
            InlineKind::Emphasis => self.push_inline(Inline::Emphasis(children)),
            InlineKind::Strong => self.push_inline(Inline::Strong(children)),
            InlineKind::Strikethrough => self.push_inline(Inline::Strikethrough(children)),
            InlineKind::Link { href, title } => self.push_inline(Inline::Link(Link {
                href,
                title,
                children,
            })),
            InlineKind::Image { src } => self.push_inline(Inline::Image {
                src,
                alt: inlines_text(&children),
            }),
            InlineKind::TableCell => {
                if let Some(Frame::Row { cells, .. }) = self.stack.last_mut() {
                    cells.push(children);
                }
            }
            InlineKind::Transparent => {
                for child in children {
                    self.push_inline(child);
                }
            }
            InlineKind::Raw(tag) => self.push_inline(Inline::Element { tag, children }),
            InlineKind::RawLink { href } => self.push_inline(Inline::Link(Link {
                href,
                title: None,
                children,
            })),
            InlineKind::Suppressed(_) => {}
        }
    }
}

fn flush_loose(blocks: &mut Vec<Block>, loose: Vec<Inline>) {
    if !is_blank(&loose) {
        blocks.push(Block::Paragraph(loose));
    }
}

/// Nothing visible: only whitespace and line breaks
fn is_blank(inlines: &[Inline]) -> bool {
    inlines.iter().all(|inline| match inline {
        Inline::Text(text) => text.trim().is_empty(),
        Inline::SoftBreak | Inline::HardBreak => true,
        _ => false,
    })
}

fn is_blank_markup(nodes: &[MarkupNode]) -> bool {
    nodes
        .iter()
        .all(|node| matches!(node, MarkupNode::Text { text } if text.trim().is_empty()))
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn alignment(alignment: pulldown_cmark::Alignment) -> Alignment {
    match alignment {
        pulldown_cmark::Alignment::None => Alignment::None,
        pulldown_cmark::Alignment::Left => Alignment::Left,
        pulldown_cmark::Alignment::Center => Alignment::Center,
        pulldown_cmark::Alignment::Right => Alignment::Right,
    }
}

fn non_empty(value: CowStr<'_>) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.into_string())
    }
}
