//! HTML output.
//!
//! [`document_to_html`] renders the live tree directly. For stored posts,
//! [`stored_markdown_to_html`] goes through `pulldown-cmark`, teaching it
//! the two conventions plain CommonMark lacks: the blank-line sentinel and
//! image grids.

use html_escape::{encode_double_quoted_attribute, encode_text};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html};

use crate::error::Result;
use crate::model::{Document, ListKind, NodeKey, NodeKind, TextFormat};

/// What a blank-line sentinel paragraph renders as.
pub const BLANK_LINE_HTML: &str = "<p><br /></p>";

/// Two or more image blocks in a row share one of these.
const IMAGE_GRID_CLASS: &str = "image-grid";

fn image_tag(src: &str, alt: &str) -> String {
    format!(
        "<img src=\"{}\" alt=\"{}\" />",
        encode_double_quoted_attribute(src),
        encode_double_quoted_attribute(alt)
    )
}

fn image_grid(images: &[(String, String)]) -> String {
    let imgs: String = images.iter().map(|(src, alt)| image_tag(src, alt)).collect();
    format!("<div class=\"{IMAGE_GRID_CLASS}\">{imgs}</div>")
}

/// Renders the tree, one block per line.
pub fn document_to_html(doc: &Document) -> Result<String> {
    let mut out: Vec<String> = Vec::new();
    let mut images: Vec<(String, String)> = Vec::new();
    for &block in doc.blocks() {
        if let NodeKind::Image { src, alt_text } = doc.kind(block)? {
            images.push((src.clone(), alt_text.clone()));
            continue;
        }
        flush_images(&mut out, &mut images);
        out.push(block_html(doc, block)?);
    }
    flush_images(&mut out, &mut images);
    Ok(out.join("\n"))
}

fn flush_images(out: &mut Vec<String>, images: &mut Vec<(String, String)>) {
    match images.len() {
        0 => {}
        1 => out.push(image_tag(&images[0].0, &images[0].1)),
        _ => out.push(image_grid(images)),
    }
    images.clear();
}

fn block_html(doc: &Document, block: NodeKey) -> Result<String> {
    Ok(match doc.kind(block)? {
        NodeKind::Paragraph => {
            let inner = inline_html(doc, block)?;
            if inner.is_empty() {
                BLANK_LINE_HTML.to_string()
            } else {
                format!("<p>{inner}</p>")
            }
        }
        NodeKind::Heading { level } => {
            let n = level.get();
            format!("<h{n}>{}</h{n}>", inline_html(doc, block)?)
        }
        NodeKind::Quote => format!("<blockquote>{}</blockquote>", inline_html(doc, block)?),
        NodeKind::CodeBlock { language } => {
            let class = language
                .as_deref()
                .map(|l| format!(" class=\"language-{}\"", encode_double_quoted_attribute(l)))
                .unwrap_or_default();
            format!(
                "<pre><code{class}>{}</code></pre>",
                encode_text(&doc.text_content(block))
            )
        }
        NodeKind::List { kind } => {
            let open = match kind {
                ListKind::Bullet => "<ul>".to_string(),
                ListKind::Ordered { start: 1 } => "<ol>".to_string(),
                ListKind::Ordered { start } => format!("<ol start=\"{start}\">"),
            };
            let close = match kind {
                ListKind::Bullet => "</ul>",
                ListKind::Ordered { .. } => "</ol>",
            };
            let items = doc
                .children(block)?
                .iter()
                .map(|&item| Ok(format!("<li>{}</li>", inline_html(doc, item)?)))
                .collect::<Result<String>>()?;
            format!("{open}{items}{close}")
        }
        NodeKind::HorizontalRule => "<hr />".to_string(),
        NodeKind::Image { src, alt_text } => image_tag(src, alt_text),
        _ => String::new(),
    })
}

const TAGS: [(TextFormat, &str); 5] = [
    (TextFormat::UNDERLINE, "u"),
    (TextFormat::STRIKETHROUGH, "s"),
    (TextFormat::BOLD, "strong"),
    (TextFormat::ITALIC, "em"),
    (TextFormat::CODE, "code"),
];

fn run_html(text: &str, format: TextFormat, out: &mut String) {
    for (flag, tag) in TAGS {
        if format.contains(flag) {
            out.push_str(&format!("<{tag}>"));
        }
    }
    out.push_str(&encode_text(text));
    for (flag, tag) in TAGS.iter().rev() {
        if format.contains(*flag) {
            out.push_str(&format!("</{tag}>"));
        }
    }
}

fn inline_html(doc: &Document, block: NodeKey) -> Result<String> {
    let mut out = String::new();
    for &child in doc.children(block)? {
        match doc.kind(child)? {
            NodeKind::Text { text, format } => run_html(text, *format, &mut out),
            NodeKind::Link { url } => {
                out.push_str(&format!("<a href=\"{}\">", encode_double_quoted_attribute(url)));
                for &inner in doc.children(child)? {
                    if let NodeKind::Text { text, format } = doc.kind(inner)? {
                        run_html(text, *format, &mut out);
                    }
                }
                out.push_str("</a>");
            }
            _ => {}
        }
    }
    Ok(out)
}

/// Renders stored post text. Sentinel paragraphs become
/// [`BLANK_LINE_HTML`] and runs of image-only paragraphs become a grid.
/// Raw HTML in the text is shown as text, never passed through.
pub fn stored_markdown_to_html(text: &str) -> String {
    let events: Vec<Event<'_>> = Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH)
        .map(literal_html)
        .collect();
    let mut out: Vec<Event<'_>> = Vec::with_capacity(events.len());
    let mut group: Vec<(&[Event<'_>], (String, String))> = Vec::new();

    let mut i = 0;
    while i < events.len() {
        let paragraph = matches!(events[i], Event::Start(Tag::Paragraph))
            .then(|| paragraph_len(&events[i..]))
            .flatten();
        let Some(len) = paragraph else {
            flush_group(&mut out, &mut group);
            out.push(events[i].clone());
            i += 1;
            continue;
        };
        let para = &events[i..i + len];
        let inner = &para[1..len - 1];
        i += len;
        if let Some(image) = lone_image(inner) {
            group.push((para, image));
            continue;
        }
        flush_group(&mut out, &mut group);
        if is_sentinel(inner) {
            out.push(Event::Html(format!("{BLANK_LINE_HTML}\n").into()));
        } else {
            out.extend_from_slice(para);
        }
    }
    flush_group(&mut out, &mut group);

    let mut html_out = String::new();
    html::push_html(&mut html_out, out.into_iter());
    html_out
}

fn literal_html(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    }
}

/// Events from a paragraph start up to and including its end.
fn paragraph_len(events: &[Event<'_>]) -> Option<usize> {
    events
        .iter()
        .position(|e| matches!(e, Event::End(TagEnd::Paragraph)))
        .map(|end| end + 1)
}

fn is_sentinel(inner: &[Event<'_>]) -> bool {
    matches!(inner, [Event::Text(t)] if t.as_ref() == "\u{a0}")
}

/// `(src, alt)` if the paragraph holds exactly one image and nothing else.
fn lone_image(inner: &[Event<'_>]) -> Option<(String, String)> {
    let (Event::Start(Tag::Image { dest_url, .. }), Event::End(TagEnd::Image)) =
        (inner.first()?, inner.last()?)
    else {
        return None;
    };
    let mut alt = String::new();
    for e in &inner[1..inner.len() - 1] {
        match e {
            Event::Text(t) | Event::Code(t) => alt.push_str(t),
            Event::Start(Tag::Image { .. }) | Event::End(TagEnd::Image) => return None,
            _ => {}
        }
    }
    Some((dest_url.to_string(), alt))
}

fn flush_group<'a>(out: &mut Vec<Event<'a>>, group: &mut Vec<(&[Event<'a>], (String, String))>) {
    if group.len() > 1 {
        let images: Vec<(String, String)> = group.iter().map(|(_, img)| img.clone()).collect();
        out.push(Event::Html(format!("{}\n", image_grid(&images)).into()));
    } else {
        for (para, _) in group.iter() {
            out.extend_from_slice(para);
        }
    }
    group.clear();
}
