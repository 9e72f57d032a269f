//! Character-level scanning helpers shared by the whole extraction pipeline.
//!
//! Everything here operates on plain text with a small amount of state
//! (parenthesis depth, quote tracking) instead of a token stream: the parser
//! built on top is best-effort and structural, so these helpers must degrade
//! gracefully on unbalanced input rather than error out.

use crate::model::UnionOperator;

/// Tracks whether the scan position is inside a `'`, `"` or `` ` `` quoted
/// region, with a one-character backslash-escape look-back.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct QuoteTracker {
    open: Option<char>,
    escaped: bool,
}

impl QuoteTracker {
    pub(crate) fn step(&mut self, c: char) {
        if self.escaped {
            self.escaped = false;
            return;
        }
        match self.open {
            Some(q) => {
                if c == '\\' {
                    self.escaped = true;
                } else if c == q {
                    self.open = None;
                }
            }
            None => {
                if c == '\'' || c == '"' || c == '`' {
                    self.open = Some(c);
                }
            }
        }
    }

    pub(crate) fn in_quote(&self) -> bool {
        self.open.is_some()
    }
}

/// Removes `--` line comments and `/* */` block comments.
///
/// Not quote-aware: a string literal containing `--` or `/*` is corrupted.
/// Known limitation, kept deliberately cheap.
pub fn strip_comments(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '-' && chars.get(i + 1) == Some(&'-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() {
                if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                    i += 2;
                    break;
                }
                i += 1;
            }
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Collapses whitespace runs to single spaces and trims. All regex-based
/// extraction downstream assumes text normalized through here.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(c);
            last_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Splits on `;` at parenthesis depth 0, skipping semicolons inside quoted
/// regions. Empty statements are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = vec![];
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut quotes = QuoteTracker::default();
    for c in sql.chars() {
        let was_quoted = quotes.in_quote();
        quotes.step(c);
        if !was_quoted && !quotes.in_quote() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                ';' if depth <= 0 => {
                    let stmt = current.trim().to_owned();
                    if !stmt.is_empty() {
                        statements.push(stmt);
                    }
                    current.clear();
                    continue;
                }
                _ => {}
            }
        }
        current.push(c);
    }
    let stmt = current.trim().to_owned();
    if !stmt.is_empty() {
        statements.push(stmt);
    }
    statements
}

/// Returns the byte index of the `)` closing the `(` at `open_idx`,
/// or `None` when the input is unbalanced. Callers treat `None` as
/// "cannot extract here, leave the text unchanged".
pub fn find_matching_paren(text: &str, open_idx: usize) -> Option<usize> {
    debug_assert_eq!(text.as_bytes().get(open_idx), Some(&b'('));
    let mut depth: i32 = 0;
    let mut quotes = QuoteTracker::default();
    for (i, c) in text[open_idx..].char_indices() {
        let was_quoted = quotes.in_quote();
        quotes.step(c);
        if was_quoted || quotes.in_quote() {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open_idx + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on `delimiter` at parenthesis depth 0, outside quotes. Used for
/// comma-separated SELECT lists and GROUP BY / ORDER BY terms.
pub fn split_top_level(text: &str, delimiter: char) -> Vec<String> {
    let mut parts = vec![];
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut quotes = QuoteTracker::default();
    for c in text.chars() {
        let was_quoted = quotes.in_quote();
        quotes.step(c);
        if !was_quoted && !quotes.in_quote() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ if c == delimiter && depth <= 0 => {
                    parts.push(current.trim().to_owned());
                    current.clear();
                    continue;
                }
                _ => {}
            }
        }
        current.push(c);
    }
    let tail = current.trim().to_owned();
    if !tail.is_empty() || !parts.is_empty() {
        parts.push(tail);
    }
    parts
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-insensitive word-boundary match of `word` at byte offset `at`.
/// `text` must be whitespace-normalized when `word` contains spaces.
fn word_at(text: &str, at: usize, word: &str) -> bool {
    let end = at + word.len();
    if end > text.len() || !text.is_char_boundary(at) || !text.is_char_boundary(end) {
        return false;
    }
    if !text[at..end].eq_ignore_ascii_case(word) {
        return false;
    }
    let before_ok = at == 0 || !is_word_char(text[..at].chars().next_back().unwrap_or(' '));
    let after_ok = end == text.len() || !is_word_char(text[end..].chars().next().unwrap_or(' '));
    before_ok && after_ok
}

/// Finds the byte offset of the first depth-0, quote-free occurrence of
/// `keyword` (word-boundary, case-insensitive) at or after `from`.
/// Multi-word keywords like `GROUP BY` assume normalized whitespace.
pub fn find_top_level_keyword(text: &str, keyword: &str, from: usize) -> Option<usize> {
    let mut depth: i32 = 0;
    let mut quotes = QuoteTracker::default();
    for (i, c) in text.char_indices() {
        let was_quoted = quotes.in_quote();
        quotes.step(c);
        if was_quoted || quotes.in_quote() {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {
                if i >= from && depth <= 0 && word_at(text, i, keyword) {
                    return Some(i);
                }
            }
        }
    }
    None
}

/// Splits a query body on `UNION [ALL]` at depth 0 and reports which
/// operator was found. Only the first operator encountered is reported:
/// a chain mixing `UNION` and `UNION ALL` is not disambiguated (known
/// limitation).
pub fn split_by_union(text: &str) -> (Vec<String>, Option<UnionOperator>) {
    let mut branches = vec![];
    let mut operator = None;
    let mut branch_start = 0;
    let mut depth: i32 = 0;
    let mut quotes = QuoteTracker::default();
    let mut skip_until = 0;
    for (i, c) in text.char_indices() {
        let was_quoted = quotes.in_quote();
        quotes.step(c);
        if was_quoted || quotes.in_quote() || i < skip_until {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ if depth <= 0 && word_at(text, i, "UNION") => {
                let mut end = i + "UNION".len();
                // Optional ALL after whitespace.
                let rest = &text[end..];
                let trimmed = rest.trim_start();
                let ws = rest.len() - trimmed.len();
                let mut op = UnionOperator::Union;
                if ws > 0 && word_at(text, end + ws, "ALL") {
                    end = end + ws + "ALL".len();
                    op = UnionOperator::UnionAll;
                }
                if operator.is_none() {
                    operator = Some(op);
                }
                branches.push(text[branch_start..i].trim().to_owned());
                branch_start = end;
                skip_until = end;
            }
            _ => {}
        }
    }
    branches.push(text[branch_start..].trim().to_owned());
    (branches, operator)
}
