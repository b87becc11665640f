use std::ops::Range;

use regex::Regex;

use super::{Registry, Transformer, TransformerKind};

/// A shortcut pattern that matched the text in front of the caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutMatch {
    pub transformer: Transformer,
    /// The replaced text, in chars of the matched string.
    pub span: Range<usize>,
    /// Capture groups after the span group (element rules: all groups).
    pub captures: Vec<String>,
}

/// Compiled live-typing patterns, tried in registry order.
#[derive(Debug, Clone)]
pub struct ShortcutMatcher {
    rules: Vec<(Transformer, Regex)>,
}

impl ShortcutMatcher {
    pub fn new(registry: &Registry) -> Result<Self, regex::Error> {
        let rules = registry
            .iter()
            .map(|t| Ok((t, Regex::new(t.shortcut_pattern())?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules })
    }

    /// Finds the first rule fired by `trigger` that matches the end of
    /// `before_caret` (which already ends with the trigger).
    ///
    /// Only the first match is returned; if it cannot be applied the caller
    /// stops there instead of trying weaker rules.
    pub fn find(&self, before_caret: &str, trigger: char) -> Option<ShortcutMatch> {
        for (t, re) in &self.rules {
            if t.trigger() != trigger {
                continue;
            }
            let Some(caps) = re.captures(before_caret) else {
                continue;
            };
            let (span, first_capture) = if t.kind() == TransformerKind::Element {
                (caps.get(0)?.range(), 1)
            } else {
                (caps.get(1)?.range(), 2)
            };
            let to_chars = |byte: usize| before_caret[..byte].chars().count();
            let captures = (first_capture..caps.len())
                .map(|i| caps.get(i).map_or(String::new(), |m| m.as_str().to_string()))
                .collect();
            log::debug!("shortcut {} matched {:?}", t.name(), &before_caret[span.clone()]);
            return Some(ShortcutMatch {
                transformer: *t,
                span: to_chars(span.start)..to_chars(span.end),
                captures,
            });
        }
        None
    }
}
