use crate::model::TextFormat;
use crate::transform::{Registry, Transformer, TransformerKind};

use super::{
    cursor::Cursor, CodeSpan, Construct, Emphasis, InlineItem, Run,
};

/// What the inline grammar may produce in a given block.
#[derive(Debug, Clone)]
pub struct InlineContext {
    /// Inline transformers in precedence order.
    order: Vec<Transformer>,
    formats: TextFormat,
}

impl InlineContext {
    pub fn new(registry: &Registry) -> Self {
        Self {
            order: registry
                .iter()
                .filter(|t| t.kind() != TransformerKind::Element)
                .collect(),
            formats: registry.formats(),
        }
    }

    /// Images are block-level, so only paragraphs read them.
    pub fn without_images(&self) -> Self {
        self.without(Transformer::Image)
    }

    fn without(&self, t: Transformer) -> Self {
        Self {
            order: self.order.iter().copied().filter(|&x| x != t).collect(),
            formats: self.formats,
        }
    }

    fn allows(&self, t: Transformer) -> bool {
        self.order.contains(&t)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineParse {
    pub items: Vec<InlineItem>,
    /// `(column, construct)` for every piece of markup read literally.
    pub ambiguities: Vec<(usize, Construct)>,
}

/// Intermediate token stream, before delimiters are balanced.
#[derive(Debug, Clone)]
enum Seg {
    Text(String),
    Code(String),
    Toggle { flags: TextFormat, column: usize },
    Link { url: String, label: Vec<Seg> },
    Image { src: String, alt_text: String },
}

/// Parses one line of inline markdown. `base` is the column where `s`
/// starts in its line and is only used for ambiguity reports.
///
/// Never fails: anything that does not parse is kept as literal text and
/// reported in [`InlineParse::ambiguities`].
pub fn parse_inline(s: &str, base: usize, ctx: &InlineContext) -> InlineParse {
    let mut ambiguities = Vec::new();
    let mut cur = Cursor::new(s, base);
    let mut segs = tokenize(&mut cur, ctx, &mut ambiguities);
    balance(&mut segs, &mut ambiguities);
    let mut items = Vec::new();
    flatten(segs, TextFormat::PLAIN, &mut items);
    ambiguities.sort_by_key(|&(col, _)| col);
    InlineParse { items, ambiguities }
}

fn push_text(segs: &mut Vec<Seg>, text: &str) {
    if let Some(Seg::Text(t)) = segs.last_mut() {
        t.push_str(text);
    } else {
        segs.push(Seg::Text(text.to_string()));
    }
}

fn tokenize(
    cur: &mut Cursor<'_>,
    ctx: &InlineContext,
    amb: &mut Vec<(usize, Construct)>,
) -> Vec<Seg> {
    let mut segs = Vec::new();
    'outer: while !cur.eof() {
        if cur.peek() == Some(b'\\') {
            cur.bump();
            match cur.peek() {
                Some(b) if b.is_ascii_punctuation() => {
                    cur.bump();
                    push_text(&mut segs, &(b as char).to_string());
                }
                _ => push_text(&mut segs, "\\"),
            }
            continue;
        }

        for &t in &ctx.order {
            if let Some(seg) = try_construct(t, cur, ctx, amb) {
                segs.push(seg);
                continue 'outer;
            }
        }

        // Backtick and star runs are atomic even when they match nothing.
        let column = cur.pos();
        match cur.peek() {
            Some(CodeSpan::TICK) => {
                let n = cur.run_len(CodeSpan::TICK);
                if ctx.allows(Transformer::InlineCode) {
                    amb.push((column, Construct::UnclosedCodeSpan));
                }
                cur.bump_n(n);
                push_text(&mut segs, &"`".repeat(n));
            }
            Some(Emphasis::STAR) => {
                let n = cur.run_len(Emphasis::STAR);
                cur.bump_n(n);
                push_text(&mut segs, &"*".repeat(n));
            }
            _ => {
                if let Some(ch) = cur.bump_char() {
                    let mut buf = [0u8; 4];
                    push_text(&mut segs, ch.encode_utf8(&mut buf));
                }
            }
        }
    }
    segs
}

fn try_construct(
    t: Transformer,
    cur: &mut Cursor<'_>,
    ctx: &InlineContext,
    amb: &mut Vec<(usize, Construct)>,
) -> Option<Seg> {
    match t {
        Transformer::InlineCode => try_code_span(cur),
        Transformer::Image => try_image(cur, amb),
        Transformer::Link => try_link(cur, ctx, amb),
        Transformer::Bold | Transformer::Italic => try_star_run(cur, ctx),
        Transformer::Underline => {
            try_pair(cur, Emphasis::UNDERLINE, TextFormat::UNDERLINE, ctx)
        }
        Transformer::Strikethrough => {
            try_pair(cur, Emphasis::STRIKETHROUGH, TextFormat::STRIKETHROUGH, ctx)
        }
        _ => None,
    }
}

fn try_star_run(cur: &mut Cursor<'_>, ctx: &InlineContext) -> Option<Seg> {
    let n = cur.run_len(Emphasis::STAR);
    if n == 0 {
        return None;
    }
    let flags = Emphasis::star_run(n);
    let flags = TextFormat::from_bits(flags.bits() & ctx.formats.bits());
    if flags.is_plain() {
        return None;
    }
    let column = cur.pos();
    cur.bump_n(n);
    Some(Seg::Toggle { flags, column })
}

fn try_pair(
    cur: &mut Cursor<'_>,
    delim: &str,
    flag: TextFormat,
    ctx: &InlineContext,
) -> Option<Seg> {
    if !ctx.formats.contains(flag) || !cur.starts_with(delim.as_bytes()) {
        return None;
    }
    let column = cur.pos();
    cur.bump_n(delim.len());
    Some(Seg::Toggle {
        flags: flag,
        column,
    })
}

/// Byte index just past the backtick run of length `n` that closes a code
/// span opened at `from`, if any.
fn code_span_end(s: &str, from: usize, n: usize) -> Option<(usize, usize)> {
    let b = s.as_bytes();
    let mut j = from;
    while j < b.len() {
        if b[j] == CodeSpan::TICK {
            let run = b[j..].iter().take_while(|&&c| c == CodeSpan::TICK).count();
            if run == n {
                return Some((j, j + run));
            }
            j += run;
        } else {
            j += 1;
        }
    }
    None
}

fn try_code_span(cur: &mut Cursor<'_>) -> Option<Seg> {
    let n = cur.run_len(CodeSpan::TICK);
    if n == 0 {
        return None;
    }
    let inner_start = cur.i + n;
    let (inner_end, end) = code_span_end(cur.s, inner_start, n)?;
    let mut inner = &cur.s[inner_start..inner_end];
    if inner.len() >= 2
        && inner.starts_with(' ')
        && inner.ends_with(' ')
        && !inner.bytes().all(|b| b == b' ')
    {
        inner = &inner[1..inner.len() - 1];
    }
    let seg = Seg::Code(inner.to_string());
    cur.i = end;
    Some(seg)
}

/// Reads backslash-escaped text up to an unescaped `close`. Returns the
/// unescaped text and the index of `close`.
fn read_escaped(s: &str, from: usize, close: u8) -> Option<(String, usize)> {
    let b = s.as_bytes();
    let mut out = String::new();
    let mut j = from;
    while j < b.len() {
        match b[j] {
            c if c == close => return Some((out, j)),
            b'\\' if j + 1 < b.len() && b[j + 1].is_ascii_punctuation() => {
                out.push(b[j + 1] as char);
                j += 2;
            }
            _ => {
                let ch = s[j..].chars().next()?;
                out.push(ch);
                j += ch.len_utf8();
            }
        }
    }
    None
}

/// Parses `(dest)` starting at the `(`; returns the URL and the index just
/// past the `)`.
fn read_destination(s: &str, open: usize) -> Option<(String, usize)> {
    let b = s.as_bytes();
    if b.get(open) != Some(&b'(') {
        return None;
    }
    let start = open + 1;
    if b.get(start) == Some(&b'<') {
        let (url, close) = read_escaped(s, start + 1, b'>')?;
        return (b.get(close + 1) == Some(&b')')).then_some((url, close + 2));
    }
    let mut out = String::new();
    let mut depth = 0usize;
    let mut j = start;
    while j < b.len() {
        match b[j] {
            b'\\' if j + 1 < b.len() && b[j + 1].is_ascii_punctuation() => {
                out.push(b[j + 1] as char);
                j += 2;
                continue;
            }
            b'(' => depth += 1,
            b')' if depth == 0 => return Some((out, j + 1)),
            b')' => depth -= 1,
            c if c.is_ascii_whitespace() => return None,
            _ => {}
        }
        let ch = s[j..].chars().next()?;
        out.push(ch);
        j += ch.len_utf8();
    }
    None
}

/// Index of the `]` closing a link label that opens at `open`.
fn label_end(s: &str, open: usize) -> Option<usize> {
    let b = s.as_bytes();
    let mut depth = 0usize;
    let mut j = open + 1;
    while j < b.len() {
        match b[j] {
            b'\\' => j += 2,
            CodeSpan::TICK => {
                let n = b[j..].iter().take_while(|&&c| c == CodeSpan::TICK).count();
                j = code_span_end(s, j + n, n).map_or(j + n, |(_, end)| end);
            }
            b'[' => {
                depth += 1;
                j += 1;
            }
            b']' if depth == 0 => return Some(j),
            b']' => {
                depth -= 1;
                j += 1;
            }
            _ => j += 1,
        }
    }
    None
}

fn try_link(
    cur: &mut Cursor<'_>,
    ctx: &InlineContext,
    amb: &mut Vec<(usize, Construct)>,
) -> Option<Seg> {
    if cur.peek() != Some(b'[') {
        return None;
    }
    let open = cur.i;
    let close = label_end(cur.s, open)?;
    if cur.s.as_bytes().get(close + 1) != Some(&b'(') {
        return None;
    }
    let Some((url, end)) = read_destination(cur.s, close + 1) else {
        amb.push((cur.pos(), Construct::MalformedLink));
        return None;
    };
    let label_ctx = ctx.without(Transformer::Link).without(Transformer::Image);
    let mut label_cur = Cursor::new(&cur.s[open + 1..close], cur.base + open + 1);
    let mut label = tokenize(&mut label_cur, &label_ctx, amb);
    balance(&mut label, amb);
    cur.i = end;
    Some(Seg::Link { url, label })
}

fn try_image(cur: &mut Cursor<'_>, amb: &mut Vec<(usize, Construct)>) -> Option<Seg> {
    if !cur.starts_with(b"![") {
        return None;
    }
    let (alt_text, close) = read_escaped(cur.s, cur.i + 2, b']')?;
    if cur.s.as_bytes().get(close + 1) != Some(&b'(') {
        return None;
    }
    let Some((src, end)) = read_destination(cur.s, close + 1) else {
        amb.push((cur.pos(), Construct::MalformedImage));
        return None;
    };
    cur.i = end;
    Some(Seg::Image { src, alt_text })
}

/// Turns delimiters that are never closed back into literal text.
///
/// For every format bit still set at the end of the line, the last toggle
/// that switched it on loses that bit and its delimiter becomes text.
fn balance(segs: &mut Vec<Seg>, amb: &mut Vec<(usize, Construct)>) {
    let mut state = TextFormat::PLAIN;
    let mut last_on: Vec<(TextFormat, usize)> = Vec::new();
    for (idx, seg) in segs.iter().enumerate() {
        if let Seg::Toggle { flags, .. } = seg {
            for flag in Emphasis::ORDER {
                if flags.contains(flag) {
                    state = state.toggled(flag);
                    if state.contains(flag) {
                        last_on.retain(|&(f, _)| f != flag);
                        last_on.push((flag, idx));
                    }
                }
            }
        }
    }
    let mut demote: Vec<(usize, TextFormat)> = Vec::new();
    for (flag, idx) in last_on {
        if !state.contains(flag) {
            continue;
        }
        match demote.iter_mut().find(|(i, _)| *i == idx) {
            Some((_, f)) => *f = *f | flag,
            None => demote.push((idx, flag)),
        }
    }
    demote.sort_by(|a, b| b.0.cmp(&a.0));
    for (idx, lost) in demote {
        let Seg::Toggle { flags, column } = segs[idx].clone() else {
            continue;
        };
        amb.push((column, Construct::UnclosedEmphasis));
        let literal = literal_delimiters(lost);
        let rest = flags.without(lost);
        if rest.is_plain() {
            segs[idx] = Seg::Text(literal);
        } else {
            segs[idx] = Seg::Toggle {
                flags: rest,
                column,
            };
            segs.insert(idx, Seg::Text(literal));
        }
    }
}

fn literal_delimiters(flags: TextFormat) -> String {
    let stars = 2 * usize::from(flags.contains(TextFormat::BOLD))
        + usize::from(flags.contains(TextFormat::ITALIC));
    let mut out = "*".repeat(stars);
    if flags.contains(TextFormat::UNDERLINE) {
        out.push_str(Emphasis::UNDERLINE);
    }
    if flags.contains(TextFormat::STRIKETHROUGH) {
        out.push_str(Emphasis::STRIKETHROUGH);
    }
    out
}

fn push_run(runs: &mut Vec<Run>, text: String, format: TextFormat) {
    if text.is_empty() {
        return;
    }
    match runs.last_mut() {
        Some(last) if last.format == format => last.text.push_str(&text),
        _ => runs.push(Run { text, format }),
    }
}

fn flatten(segs: Vec<Seg>, base: TextFormat, items: &mut Vec<InlineItem>) {
    let mut state = TextFormat::PLAIN;
    for seg in segs {
        match seg {
            Seg::Text(text) => push_item_text(items, text, base | state),
            Seg::Code(text) => push_item_text(items, text, base | state | TextFormat::CODE),
            Seg::Toggle { flags, .. } => state = state.toggled(flags),
            Seg::Link { url, label } => {
                let mut nested = Vec::new();
                flatten(label, base | state, &mut nested);
                let mut runs = Vec::new();
                for item in nested {
                    if let InlineItem::Text(run) = item {
                        push_run(&mut runs, run.text, run.format);
                    }
                }
                items.push(InlineItem::Link { url, label: runs });
            }
            Seg::Image { src, alt_text } => items.push(InlineItem::Image { src, alt_text }),
        }
    }
}

fn push_item_text(items: &mut Vec<InlineItem>, text: String, format: TextFormat) {
    if text.is_empty() {
        return;
    }
    if let Some(InlineItem::Text(last)) = items.last_mut()
        && last.format == format
    {
        last.text.push_str(&text);
        return;
    }
    items.push(InlineItem::Text(Run { text, format }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(s: &str) -> InlineParse {
        parse_inline(s, 0, &InlineContext::new(&Registry::standard()))
    }

    fn runs(s: &str) -> Vec<(String, TextFormat)> {
        parse(s)
            .items
            .into_iter()
            .map(|item| match item {
                InlineItem::Text(r) => (r.text, r.format),
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    fn run(text: &str, format: TextFormat) -> (String, TextFormat) {
        (text.to_string(), format)
    }

    #[test]
    fn test_plain_text_is_one_run() {
        assert_eq!(runs("hello world"), vec![run("hello world", TextFormat::PLAIN)]);
    }

    #[test]
    fn test_bold_italic_and_both() {
        assert_eq!(
            runs("a **b** *c* ***d***"),
            vec![
                run("a ", TextFormat::PLAIN),
                run("b", TextFormat::BOLD),
                run(" ", TextFormat::PLAIN),
                run("c", TextFormat::ITALIC),
                run(" ", TextFormat::PLAIN),
                run("d", TextFormat::BOLD | TextFormat::ITALIC),
            ]
        );
    }

    #[test]
    fn test_four_stars_flip_only_bold() {
        // italic "a" followed by bold-italic "b"
        assert_eq!(
            runs("*a****b***"),
            vec![
                run("a", TextFormat::ITALIC),
                run("b", TextFormat::BOLD | TextFormat::ITALIC),
            ]
        );
    }

    #[test]
    fn test_underline_and_strikethrough() {
        assert_eq!(
            runs("__u__ ~~s~~"),
            vec![
                run("u", TextFormat::UNDERLINE),
                run(" ", TextFormat::PLAIN),
                run("s", TextFormat::STRIKETHROUGH),
            ]
        );
    }

    #[test]
    fn test_single_underscore_and_tilde_are_literal() {
        assert_eq!(runs("a_b~c"), vec![run("a_b~c", TextFormat::PLAIN)]);
    }

    #[test]
    fn test_code_span_keeps_markup_literal() {
        assert_eq!(
            runs("x `**y**` z"),
            vec![
                run("x ", TextFormat::PLAIN),
                run("**y**", TextFormat::CODE),
                run(" z", TextFormat::PLAIN),
            ]
        );
    }

    #[test]
    fn test_code_span_padding_is_stripped_once() {
        assert_eq!(runs("``  `a`  ``"), vec![run(" `a` ", TextFormat::CODE)]);
        assert_eq!(runs("`  `"), vec![run("  ", TextFormat::CODE)]);
    }

    #[test]
    fn test_code_inside_bold() {
        assert_eq!(
            runs("**`x`**"),
            vec![run("x", TextFormat::BOLD | TextFormat::CODE)]
        );
    }

    #[test]
    fn test_escapes_are_literal() {
        assert_eq!(runs(r"\*not\* \\ \q"), vec![run(r"*not* \ \q", TextFormat::PLAIN)]);
    }

    #[test]
    fn test_unclosed_emphasis_is_literal_and_reported() {
        let parsed = parse("a **b");
        assert_eq!(
            parsed.items,
            vec![InlineItem::Text(Run::new("a **b", TextFormat::PLAIN))]
        );
        assert_eq!(parsed.ambiguities, vec![(2, Construct::UnclosedEmphasis)]);
    }

    #[test]
    fn test_only_the_unclosed_half_of_a_star_run_is_demoted() {
        assert_eq!(
            runs("***a**"),
            vec![run("*", TextFormat::PLAIN), run("a", TextFormat::BOLD)]
        );
    }

    #[test]
    fn test_unclosed_code_span_is_literal() {
        let parsed = parse("a `b");
        assert_eq!(
            parsed.items,
            vec![InlineItem::Text(Run::new("a `b", TextFormat::PLAIN))]
        );
        assert_eq!(parsed.ambiguities, vec![(2, Construct::UnclosedCodeSpan)]);
    }

    #[test]
    fn test_link_with_formatted_label() {
        assert_eq!(
            parse("see [the **docs**](https://x.com/a_(b)) now").items,
            vec![
                InlineItem::Text(Run::new("see ", TextFormat::PLAIN)),
                InlineItem::Link {
                    url: "https://x.com/a_(b)".into(),
                    label: vec![
                        Run::new("the ", TextFormat::PLAIN),
                        Run::new("docs", TextFormat::BOLD),
                    ],
                },
                InlineItem::Text(Run::new(" now", TextFormat::PLAIN)),
            ]
        );
    }

    #[test]
    fn test_link_inherits_surrounding_format() {
        assert_eq!(
            parse("**[a](u)**").items,
            vec![InlineItem::Link {
                url: "u".into(),
                label: vec![Run::new("a", TextFormat::BOLD)],
            }]
        );
    }

    #[test]
    fn test_angle_destination() {
        assert_eq!(
            parse("[a](<http://x/a b>)").items,
            vec![InlineItem::Link {
                url: "http://x/a b".into(),
                label: vec![Run::new("a", TextFormat::PLAIN)],
            }]
        );
    }

    #[test]
    fn test_malformed_link_is_text() {
        let parsed = parse("[a](http://x y)");
        assert_eq!(
            parsed.items,
            vec![InlineItem::Text(Run::new("[a](http://x y)", TextFormat::PLAIN))]
        );
        assert_eq!(parsed.ambiguities, vec![(0, Construct::MalformedLink)]);
    }

    #[test]
    fn test_image_is_preferred_over_link() {
        assert_eq!(
            parse("![cat](http://x/cat.png)").items,
            vec![InlineItem::Image {
                src: "http://x/cat.png".into(),
                alt_text: "cat".into(),
            }]
        );
    }

    #[test]
    fn test_without_images_the_bang_is_text() {
        let ctx = InlineContext::new(&Registry::standard()).without_images();
        assert_eq!(
            parse_inline("![cat](u)", 0, &ctx).items,
            vec![
                InlineItem::Text(Run::new("!", TextFormat::PLAIN)),
                InlineItem::Link {
                    url: "u".into(),
                    label: vec![Run::new("cat", TextFormat::PLAIN)],
                },
            ]
        );
    }

    #[test]
    fn test_emphasis_inside_urls_is_not_markup() {
        assert_eq!(
            parse("[x](http://a/*b*)").items,
            vec![InlineItem::Link {
                url: "http://a/*b*".into(),
                label: vec![Run::new("x", TextFormat::PLAIN)],
            }]
        );
    }

    #[test]
    fn test_disabled_formats_stay_literal() {
        let registry = Registry::from_order([Transformer::Bold]);
        let ctx = InlineContext::new(&registry);
        let parsed = parse_inline("*a* **b**", 0, &ctx);
        assert_eq!(
            parsed.items,
            vec![
                InlineItem::Text(Run::new("*a* ", TextFormat::PLAIN)),
                InlineItem::Text(Run::new("b", TextFormat::BOLD)),
            ]
        );
    }
}
