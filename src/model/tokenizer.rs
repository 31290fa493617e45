// File: ./src/model/tokenizer.rs
// Lowercase tokens with byte offsets into the source. Markup, control
// characters and bare punctuation runs are separators.

use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Lowercased text with edge punctuation trimmed.
    pub text: String,
    /// Byte offsets of the trimmed token inside the source.
    pub start: usize,
    pub end: usize,
    /// Inside a `( ... )` group.
    pub bracketed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    source: String,
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Token> {
        self.tokens.get(idx)
    }

    /// Lowercased text of token `idx`, or `""` past the end.
    pub fn text(&self, idx: usize) -> &str {
        self.tokens.get(idx).map(|t| t.text.as_str()).unwrap_or("")
    }

    /// Verbatim source text of token `idx`.
    pub fn original(&self, idx: usize) -> &str {
        match self.tokens.get(idx) {
            Some(t) => &self.source[t.start..t.end],
            None => "",
        }
    }

    /// Verbatim source text covering tokens `range` (inner separators included).
    pub fn original_span(&self, range: Range<usize>) -> &str {
        if range.is_empty() || range.end > self.tokens.len() {
            return "";
        }
        let start = self.tokens[range.start].start;
        let end = self.tokens[range.end - 1].end;
        &self.source[start..end]
    }

    /// Lowercased tokens in `range` joined by single spaces.
    pub fn joined(&self, range: Range<usize>) -> String {
        let end = range.end.min(self.tokens.len());
        let start = range.start.min(end);
        self.tokens[start..end]
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace()
        || c.is_control()
        || matches!(
            c,
            ',' | ';' | '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>' | '|' | '"' | '`'
        )
}

fn is_edge_punct(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | ':' | '\'' | '*' | '_' | '=')
}

/// Lone symbols that carry meaning for the recognizers ("90 %", "10 - 11").
fn is_meaningful_symbol(s: &str) -> bool {
    matches!(s, "%" | "-" | "/" | "–" | "—")
}

/// Marks the byte ranges of `<tag ...>` sequences so they are treated as separators.
fn markup_ranges(source: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open: Option<usize> = None;
    let mut chars = source.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        match c {
            '<' => {
                let next = chars.peek().map(|(_, n)| *n);
                if next.is_some_and(|n| n.is_ascii_alphabetic() || n == '/' || n == '!') {
                    open = Some(idx);
                }
            }
            '>' => {
                if let Some(start) = open.take() {
                    ranges.push(start..idx + 1);
                }
            }
            _ => {}
        }
    }
    ranges
}

/// Truncate to at most `max_chars` characters on a char boundary.
fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

pub fn normalize(input: &str) -> TokenStream {
    normalize_with_limit(input, usize::MAX)
}

pub fn normalize_with_limit(input: &str, max_chars: usize) -> TokenStream {
    let source = truncate_chars(input, max_chars).to_string();
    let markup = markup_ranges(&source);
    let in_markup = |idx: usize| markup.iter().any(|r| r.contains(&idx));

    let mut tokens = Vec::new();
    let mut depth: u32 = 0;
    let mut word_start: Option<usize> = None;
    let mut word_bracketed = false;

    let flush = |start: usize, end: usize, bracketed: bool, tokens: &mut Vec<Token>| {
        let raw = &source[start..end];
        let lead = raw.len() - raw.trim_start_matches(is_edge_punct).len();
        let trimmed = raw.trim_start_matches(is_edge_punct).trim_end_matches(is_edge_punct);
        if trimmed.is_empty() {
            return;
        }
        let keep = trimmed.chars().any(|c| c.is_alphanumeric() || !c.is_ascii())
            || is_meaningful_symbol(trimmed);
        if !keep {
            return;
        }
        let text = trimmed.to_lowercase().replace(['–', '—'], "-");
        let t_start = start + lead;
        tokens.push(Token {
            text,
            start: t_start,
            end: t_start + trimmed.len(),
            bracketed,
        });
    };

    for (idx, c) in source.char_indices() {
        let separator = is_separator(c) || in_markup(idx);
        if separator {
            if let Some(start) = word_start.take() {
                flush(start, idx, word_bracketed, &mut tokens);
            }
            if !in_markup(idx) {
                match c {
                    '(' => depth += 1,
                    ')' => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
        } else if word_start.is_none() {
            word_start = Some(idx);
            word_bracketed = depth > 0;
        }
    }
    if let Some(start) = word_start {
        flush(start, source.len(), word_bracketed, &mut tokens);
    }

    log::trace!("normalized {} chars into {} tokens", source.len(), tokens.len());
    TokenStream { source, tokens }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(ts: &TokenStream) -> Vec<&str> {
        ts.tokens().iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn offsets_keep_original_casing() {
        let ts = normalize("Got 18/20 (90%) on CS101 midterm.");
        assert_eq!(texts(&ts), ["got", "18/20", "90%", "on", "cs101", "midterm"]);
        assert_eq!(ts.original(4), "CS101");
        assert!(ts.get(2).unwrap().bracketed);
        assert!(!ts.get(3).unwrap().bracketed);
    }

    #[test]
    fn empty_and_whitespace() {
        assert!(normalize("").is_empty());
        assert!(normalize("   \t\n ").is_empty());
        assert!(normalize("\u{0}\u{7}\u{1b}").is_empty());
    }

    #[test]
    fn markup_and_sql_are_separators() {
        let ts = normalize("<script>alert(1)</script>'; DROP TABLE grades; --");
        assert_eq!(texts(&ts), ["alert", "1", "drop", "table", "grades"]);
    }

    #[test]
    fn emoji_survive() {
        let ts = normalize("🎉 Party tomorrow");
        assert_eq!(texts(&ts), ["🎉", "party", "tomorrow"]);
        assert_eq!(ts.original(1), "Party");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let ts = normalize_with_limit("ééééé abc", 3);
        assert_eq!(ts.source(), "ééé");
    }

    #[test]
    fn spans() {
        let ts = normalize("Computer   Science 101 final");
        assert_eq!(ts.original_span(0..3), "Computer   Science 101");
        assert_eq!(ts.joined(0..3), "computer science 101");
        assert_eq!(ts.original_span(2..2), "");
    }
}
