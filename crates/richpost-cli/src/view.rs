//! Turns the editor's document into styled terminal lines.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use richpost_engine::model::{ListKind, NodeKind};
use richpost_engine::selection::{self, Point};
use richpost_engine::{Document, NodeKey, Selection, TextFormat, ToolbarState};

const CARET: &str = "▏";
const RULE: &str = "────────────────";

pub fn format_style(format: TextFormat) -> Style {
    let mut style = Style::default();
    if format.contains(TextFormat::BOLD) {
        style = style.add_modifier(Modifier::BOLD);
    }
    if format.contains(TextFormat::ITALIC) {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if format.contains(TextFormat::UNDERLINE) {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if format.contains(TextFormat::STRIKETHROUGH) {
        style = style.add_modifier(Modifier::CROSSED_OUT);
    }
    if format.contains(TextFormat::CODE) {
        style = style.fg(Color::Yellow);
    }
    style
}

/// Block position and char offset, comparable in document order.
type Pos = (usize, usize);

struct Painter {
    caret: Option<Pos>,
    selected: Option<(Pos, Pos)>,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    pending: String,
    pending_style: Style,
}

impl Painter {
    fn is_selected(&self, at: Pos) -> bool {
        self.selected
            .is_some_and(|(start, end)| start <= at && at < end)
    }

    fn push(&mut self, text: &str, style: Style) {
        if style != self.pending_style {
            self.flush();
            self.pending_style = style;
        }
        self.pending.push_str(text);
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            let text = std::mem::take(&mut self.pending);
            self.spans.push(Span::styled(text, self.pending_style));
        }
    }

    fn caret_at(&mut self, at: Pos) {
        if self.caret == Some(at) {
            self.push(CARET, Style::default().fg(Color::Cyan));
        }
    }

    fn end_line(&mut self) {
        self.flush();
        self.pending_style = Style::default();
        self.lines.push(Line::from(std::mem::take(&mut self.spans)));
    }
}

fn point_pos(blocks: &[NodeKey], point: Point) -> Option<Pos> {
    let index = blocks.iter().position(|&b| b == point.block)?;
    Some((index, point.offset))
}

/// Styled lines for the whole document, with the caret and the selected
/// range drawn in.
pub fn document_lines(doc: &Document, selection: Option<Selection>) -> Vec<Line<'static>> {
    let blocks = selection::selectable_blocks(doc);
    let mut painter = Painter {
        caret: selection.and_then(|s| point_pos(&blocks, s.focus)),
        selected: selection
            .filter(|s| !s.is_collapsed())
            .and_then(|s| s.ordered(doc).ok())
            .and_then(|(start, end)| Some((point_pos(&blocks, start)?, point_pos(&blocks, end)?))),
        lines: Vec::new(),
        spans: Vec::new(),
        pending: String::new(),
        pending_style: Style::default(),
    };

    for (index, &block) in blocks.iter().enumerate() {
        let Ok(kind) = doc.kind(block) else {
            continue;
        };
        match kind {
            NodeKind::Image { src, alt_text } => {
                let style = leaf_style(&painter, index, Color::Magenta);
                painter.caret_at((index, 0));
                painter.push(&format!("[image: {alt_text}] {src}"), style);
                painter.caret_at((index, 1));
                painter.end_line();
            }
            NodeKind::HorizontalRule => {
                let style = leaf_style(&painter, index, Color::DarkGray);
                painter.caret_at((index, 0));
                painter.push(RULE, style);
                painter.caret_at((index, 1));
                painter.end_line();
            }
            _ => paint_text_block(&mut painter, doc, block, index),
        }
    }
    painter.lines
}

fn leaf_style(painter: &Painter, index: usize, color: Color) -> Style {
    let style = Style::default().fg(color);
    if painter.is_selected((index, 0)) {
        style.add_modifier(Modifier::REVERSED)
    } else {
        style
    }
}

fn paint_text_block(painter: &mut Painter, doc: &Document, block: NodeKey, index: usize) {
    let prefix = block_prefix(doc, block);
    let prefix_style = Style::default().fg(Color::DarkGray);
    // Continuation lines of a code block or a soft break keep the gutter.
    let gutter = if prefix.starts_with('┃') {
        prefix.clone()
    } else {
        " ".repeat(prefix.chars().count())
    };

    let mut styles = Vec::new();
    for run in selection::runs(doc, block).unwrap_or_default() {
        let mut style = format_style(run.format);
        if run.link.is_some() {
            style = style.fg(Color::Blue).add_modifier(Modifier::UNDERLINED);
        }
        styles.extend(std::iter::repeat_n(style, run.end - run.start));
    }

    painter.push(&prefix, prefix_style);
    let text = doc.text_content(block);
    let mut buf = [0u8; 4];
    for (offset, ch) in text.chars().enumerate() {
        painter.caret_at((index, offset));
        if ch == '\n' {
            if painter.is_selected((index, offset)) {
                painter.push(" ", Style::default().add_modifier(Modifier::REVERSED));
            }
            painter.end_line();
            painter.push(&gutter, prefix_style);
            continue;
        }
        let mut style = styles.get(offset).copied().unwrap_or_default();
        if painter.is_selected((index, offset)) {
            style = style.add_modifier(Modifier::REVERSED);
        }
        painter.push(ch.encode_utf8(&mut buf), style);
    }
    painter.caret_at((index, text.chars().count()));
    painter.end_line();
}

fn block_prefix(doc: &Document, block: NodeKey) -> String {
    match doc.kind(block) {
        Ok(NodeKind::Heading { level }) => format!("{} ", "#".repeat(usize::from(level.get()))),
        Ok(NodeKind::Quote) => "│ ".to_string(),
        Ok(NodeKind::CodeBlock { .. }) => "┃ ".to_string(),
        Ok(NodeKind::ListItem) => {
            let list = doc.parent(block).and_then(|p| doc.kind(p).ok());
            match list {
                Some(NodeKind::List {
                    kind: ListKind::Ordered { start },
                }) => {
                    let position = doc.index_in_parent(block).unwrap_or(0) as u32;
                    format!("{}. ", start.saturating_add(position))
                }
                _ => "• ".to_string(),
            }
        }
        _ => String::new(),
    }
}

/// Name of the block the caret is in, for the status bar.
pub fn block_label(doc: &Document, selection: Option<Selection>) -> &'static str {
    let Some(selection) = selection else {
        return "";
    };
    match doc.kind(selection.focus.block) {
        Ok(NodeKind::Paragraph) => "Paragraph",
        Ok(NodeKind::Heading { level }) => match level.get() {
            1 => "Heading 1",
            2 => "Heading 2",
            3 => "Heading 3",
            4 => "Heading 4",
            5 => "Heading 5",
            _ => "Heading 6",
        },
        Ok(NodeKind::Quote) => "Quote",
        Ok(NodeKind::CodeBlock { .. }) => "Code",
        Ok(NodeKind::ListItem) => match doc
            .parent(selection.focus.block)
            .and_then(|p| doc.kind(p).ok())
        {
            Some(NodeKind::List {
                kind: ListKind::Ordered { .. },
            }) => "Numbered list",
            _ => "Bullet list",
        },
        Ok(NodeKind::Image { .. }) => "Image",
        Ok(NodeKind::HorizontalRule) => "Rule",
        _ => "",
    }
}

/// The format buttons, lit when active.
pub fn toolbar_line(toolbar: ToolbarState, block: &'static str) -> Line<'static> {
    let button = |label: &'static str, on: bool| {
        if on {
            Span::styled(
                label,
                Style::default().fg(Color::Black).bg(Color::Yellow),
            )
        } else {
            Span::styled(label, Style::default().fg(Color::DarkGray))
        }
    };
    Line::from(vec![
        button(" B ", toolbar.bold),
        button(" I ", toolbar.italic),
        button(" U ", toolbar.underline),
        button(" S ", toolbar.strikethrough),
        button(" ` ", toolbar.code),
        Span::raw(" | "),
        Span::raw(block),
    ])
}
