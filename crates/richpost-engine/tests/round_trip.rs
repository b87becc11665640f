use pretty_assertions::assert_eq;
use richpost_engine::model::{HeadingLevel, ListKind};
use richpost_engine::{Document, MarkdownCodec, NodeKey, NodeKind, TextFormat};
use rstest::rstest;

fn paragraph(doc: &mut Document, runs: &[(&str, TextFormat)]) -> NodeKey {
    let root = doc.root();
    let p = doc.append_new(root, NodeKind::Paragraph).unwrap();
    for (text, format) in runs {
        doc.append_new(p, NodeKind::text(*text, *format)).unwrap();
    }
    p
}

/// Documents whose text is full of characters the markdown dialect uses.
fn awkward_documents() -> Vec<(&'static str, Document)> {
    let mut out = Vec::new();

    let mut doc = Document::new();
    paragraph(
        &mut doc,
        &[(
            r"2 * 3 = 6, snake_case, ~tilde~, [brackets], `tick`, C:\dir, &nbsp; here",
            TextFormat::PLAIN,
        )],
    );
    for line in ["# not a heading", "- not a list", "+ nor this", "12. nor this", "> no quote", "---", "```"] {
        paragraph(&mut doc, &[(line, TextFormat::PLAIN)]);
    }
    paragraph(&mut doc, &[("&nbsp;", TextFormat::PLAIN)]);
    paragraph(
        &mut doc,
        &[(
            "<b>x</b> <script>alert(1)</script> &amp; &#60; Tom & Jerry <http://x/>",
            TextFormat::PLAIN,
        )],
    );
    out.push(("literal markup", doc));

    let mut doc = Document::new();
    let root = doc.root();
    let h = doc
        .append_new(root, NodeKind::heading(HeadingLevel::new(3).unwrap()))
        .unwrap();
    for (text, format) in [
        ("b", TextFormat::BOLD),
        ("bi", TextFormat::BOLD | TextFormat::ITALIC),
        (" u ", TextFormat::UNDERLINE),
        ("s", TextFormat::STRIKETHROUGH | TextFormat::ITALIC),
        ("c*de", TextFormat::CODE),
        (" and ", TextFormat::PLAIN),
        ("`x`", TextFormat::CODE),
        ("end", TextFormat::PLAIN),
    ] {
        doc.append_new(h, NodeKind::text(text, format)).unwrap();
    }
    out.push(("every format", doc));

    let mut doc = Document::new();
    let root = doc.root();
    let list = doc
        .append_new(root, NodeKind::List { kind: ListKind::Ordered { start: 3 } })
        .unwrap();
    for label in ["first", "second"] {
        let item = doc.append_new(list, NodeKind::ListItem).unwrap();
        doc.append_new(item, NodeKind::plain("see ")).unwrap();
        let link = doc
            .append_new(item, NodeKind::link(format!("http://x/{label}?a=(1)")))
            .unwrap();
        doc.append_new(link, NodeKind::text(label, TextFormat::BOLD))
            .unwrap();
        doc.append_new(item, NodeKind::plain("!")).unwrap();
    }
    doc.append_new(root, NodeKind::Paragraph).unwrap();
    let bullets = doc
        .append_new(root, NodeKind::List { kind: ListKind::Bullet })
        .unwrap();
    doc.append_new(bullets, NodeKind::ListItem).unwrap();
    out.push(("lists and links", doc));

    let mut doc = Document::new();
    let root = doc.root();
    let code = doc
        .append_new(root, NodeKind::CodeBlock { language: Some("rust".into()) })
        .unwrap();
    doc.append_new(code, NodeKind::plain("fn a() {\n\n    let s = \"```\";\n}\n&nbsp;"))
        .unwrap();
    doc.append_new(root, NodeKind::CodeBlock { language: None })
        .unwrap();
    out.push(("code blocks", doc));

    let mut doc = Document::new();
    let root = doc.root();
    doc.append_new(root, NodeKind::image("http://x/a b.png", "alt [1]"))
        .unwrap();
    doc.append_new(root, NodeKind::image("http://x/(c).png", ""))
        .unwrap();
    doc.append_new(root, NodeKind::HorizontalRule).unwrap();
    let q = doc.append_new(root, NodeKind::Quote).unwrap();
    doc.append_new(q, NodeKind::plain("wait!")).unwrap();
    let link = doc.append_new(q, NodeKind::link("u")).unwrap();
    doc.append_new(link, NodeKind::plain("this")).unwrap();
    doc.append_new(root, NodeKind::Paragraph).unwrap();
    doc.append_new(root, NodeKind::Paragraph).unwrap();
    out.push(("leaves and quotes", doc));

    out
}

#[test]
fn test_decode_of_encode_is_identity() {
    let codec = MarkdownCodec::default();
    for (name, doc) in awkward_documents() {
        let stored = codec.encode(&doc).unwrap();
        let parsed = codec.decode(&stored);
        assert_eq!(parsed.document, doc, "{name}: {stored:?}");
        assert!(parsed.ambiguities.is_empty(), "{name}: {:?}", parsed.ambiguities);
    }
}

#[test]
fn test_re_encoding_is_a_no_op() {
    let codec = MarkdownCodec::default();
    for (name, doc) in awkward_documents() {
        let once = codec.encode(&doc).unwrap();
        let twice = codec.encode(&codec.decode(&once).document).unwrap();
        assert_eq!(once, twice, "{name}");
    }
}

#[test]
fn test_hand_written_posts_settle_after_one_pass() {
    let codec = MarkdownCodec::default();
    for text in [
        "unclosed **bold and `code",
        "a\nb\n\n\nc",
        "[broken](link\n\n![x](",
        "* star line\n\n***\n\n",
        "```\nnever closed",
    ] {
        let once = codec.encode(&codec.decode(text).document).unwrap();
        let twice = codec.encode(&codec.decode(&once).document).unwrap();
        assert_eq!(once, twice, "{text:?}");
    }
}

#[rstest]
fn test_blank_lines_are_kept(#[values(1, 2, 3, 5)] n: usize) {
    let codec = MarkdownCodec::default();
    let mut doc = Document::new();
    paragraph(&mut doc, &[("top", TextFormat::PLAIN)]);
    for _ in 0..n {
        paragraph(&mut doc, &[]);
    }
    paragraph(&mut doc, &[("bottom", TextFormat::PLAIN)]);

    let stored = codec.encode(&doc).unwrap();
    assert_eq!(stored.matches("&nbsp;").count(), n);

    let back = codec.decode(&stored).document;
    let empty = back
        .blocks()
        .iter()
        .filter(|&&b| back.text_content(b).is_empty())
        .count();
    assert_eq!(empty, n);
}

#[test]
fn test_portable_json_round_trip() {
    for (name, doc) in awkward_documents() {
        let json = doc.to_json().unwrap();
        let back = Document::from_json(&json).unwrap();
        assert_eq!(back, doc, "{name}");
    }
}
