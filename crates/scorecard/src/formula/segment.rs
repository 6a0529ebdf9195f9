use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '*',
            Operator::Divide => '/',
        }
    }
}

/// One lexical piece of a formula. Free text between operators becomes a `Reference`.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Number(f64),
    Operator(Operator),
    Open,
    Close,
    Reference(String),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Number(value) => write!(f, "{value}"),
            Segment::Operator(op) => write!(f, "{}", op.symbol()),
            Segment::Open => f.write_str("("),
            Segment::Close => f.write_str(")"),
            Segment::Reference(name) => write!(f, "[{name}]"),
        }
    }
}

static WORD_MULTIPLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+(?:x|times|multiplied by)\s+").expect("multiply pattern compiles")
});
static WORD_DIVIDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+divided by\s+").expect("divide pattern compiles"));
static WORD_PLUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+plus\s+").expect("plus pattern compiles"));
static WORD_MINUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+minus\s+").expect("minus pattern compiles"));

/// Canonicalize operator spellings and drop a leading `Name =` label.
pub fn normalize(formula: &str) -> String {
    let symbols: String = formula
        .chars()
        .map(|ch| match ch {
            '×' | '✕' | '∗' => '*',
            '÷' | '∕' => '/',
            '−' | '–' | '—' => '-',
            '\u{a0}' => ' ',
            other => other,
        })
        .collect();

    let body = match assignment_split(&symbols) {
        Some(position) => &symbols[position + 1..],
        None => symbols.as_str(),
    };

    let spaced = format!(" {body} ");
    let spaced = WORD_MULTIPLY.replace_all(&spaced, " * ");
    let spaced = WORD_DIVIDE.replace_all(&spaced, " / ");
    let spaced = WORD_PLUS.replace_all(&spaced, " + ");
    let spaced = WORD_MINUS.replace_all(&spaced, " - ");
    spaced.trim().to_string()
}

fn assignment_split(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    bytes.iter().enumerate().find_map(|(index, byte)| {
        if *byte != b'=' {
            return None;
        }
        let before = index.checked_sub(1).map(|previous| bytes[previous]);
        let after = bytes.get(index + 1).copied();
        let comparison = matches!(before, Some(b'<' | b'>' | b'!' | b'='))
            || matches!(after, Some(b'=' | b'<' | b'>'));
        (!comparison).then_some(index)
    })
}

/// Split a formula into numbers, operators, parentheses and reference phrases.
///
/// A parenthesised group without operators directly after a phrase (`Earned Value (EV)`,
/// `Cost (No.)`) is an annotation and stays part of the phrase. `[...]` is always a reference.
pub fn segment(formula: &str) -> Vec<Segment> {
    let normalized = normalize(formula);
    let chars: Vec<char> = normalized.chars().collect();
    let mut segments = Vec::new();
    let mut phrase = String::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        match ch {
            '[' => {
                if let Some(end) = find_from(&chars, index + 1, ']') {
                    flush(&mut phrase, &mut segments);
                    let name: String = chars[index + 1..end].iter().collect();
                    let name = name.trim();
                    if !name.is_empty() {
                        segments.push(Segment::Reference(name.to_string()));
                    }
                    index = end + 1;
                    continue;
                }
                phrase.push(ch);
            }
            '(' => {
                if let Some(end) = matching_paren(&chars, index) {
                    if !phrase.trim().is_empty() && !has_operator(&chars[index + 1..end]) {
                        phrase.extend(&chars[index..=end]);
                        index = end + 1;
                        continue;
                    }
                }
                flush(&mut phrase, &mut segments);
                segments.push(Segment::Open);
            }
            ')' => {
                flush(&mut phrase, &mut segments);
                segments.push(Segment::Close);
            }
            '+' | '*' | '/' => {
                flush(&mut phrase, &mut segments);
                segments.push(Segment::Operator(match ch {
                    '+' => Operator::Add,
                    '*' => Operator::Multiply,
                    _ => Operator::Divide,
                }));
            }
            '-' if !is_word_hyphen(&chars, index) => {
                flush(&mut phrase, &mut segments);
                segments.push(Segment::Operator(Operator::Subtract));
            }
            _ if phrase.trim().is_empty() && starts_number(&chars, index) => {
                match read_number(&chars, index) {
                    Some((value, end)) => {
                        phrase.clear();
                        segments.push(Segment::Number(value));
                        index = end;
                        continue;
                    }
                    None => phrase.push(ch),
                }
            }
            _ => phrase.push(ch),
        }
        index += 1;
    }
    flush(&mut phrase, &mut segments);
    segments
}

/// Distinct reference phrases in order of first appearance.
pub fn references(formula: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for segment in segment(formula) {
        if let Segment::Reference(name) = segment {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
    }
    seen
}

/// Render segments back to a compact arithmetic string.
pub fn render(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Operator(_) => {
                out.push(' ');
                out.push_str(&segment.to_string());
                out.push(' ');
            }
            _ => out.push_str(&segment.to_string()),
        }
    }
    out
}

fn flush(phrase: &mut String, segments: &mut Vec<Segment>) {
    let trimmed = phrase
        .trim()
        .trim_matches(|ch: char| matches!(ch, ',' | ';' | ':' | '.') || ch.is_whitespace());
    if trimmed.chars().any(char::is_alphanumeric) {
        segments.push(Segment::Reference(trimmed.to_string()));
    }
    phrase.clear();
}

fn find_from(chars: &[char], start: usize, target: char) -> Option<usize> {
    chars[start..]
        .iter()
        .position(|ch| *ch == target)
        .map(|offset| start + offset)
}

fn matching_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, ch) in chars[open..].iter().enumerate() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn has_operator(chars: &[char]) -> bool {
    chars.iter().enumerate().any(|(index, ch)| match ch {
        '+' | '*' | '/' | '(' => true,
        '-' => !is_word_hyphen(chars, index),
        _ => false,
    })
}

fn is_word_hyphen(chars: &[char], index: usize) -> bool {
    let before = index
        .checked_sub(1)
        .and_then(|previous| chars.get(previous));
    let after = chars.get(index + 1);
    let joins_words =
        matches!((before, after), (Some(b), Some(a)) if b.is_alphanumeric() && a.is_alphabetic())
            || matches!((before, after), (Some(b), Some(a)) if b.is_alphabetic() && a.is_alphanumeric());
    // `EV-AC` is a difference of two abbreviations, not one hyphenated name.
    joins_words && !(is_acronym(word_before(chars, index)) && is_acronym(word_after(chars, index)))
}

fn word_before(chars: &[char], index: usize) -> &[char] {
    let start = chars[..index]
        .iter()
        .rposition(|ch| !ch.is_alphanumeric())
        .map_or(0, |position| position + 1);
    &chars[start..index]
}

fn word_after(chars: &[char], index: usize) -> &[char] {
    let rest = &chars[index + 1..];
    let end = rest
        .iter()
        .position(|ch| !ch.is_alphanumeric())
        .unwrap_or(rest.len());
    &rest[..end]
}

fn is_acronym(word: &[char]) -> bool {
    word.len() >= 2
        && word[0].is_ascii_uppercase()
        && word
            .iter()
            .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
}

fn starts_number(chars: &[char], index: usize) -> bool {
    match chars[index] {
        ch if ch.is_ascii_digit() => true,
        '.' => chars.get(index + 1).is_some_and(char::is_ascii_digit),
        _ => false,
    }
}

fn read_number(chars: &[char], start: usize) -> Option<(f64, usize)> {
    let mut digits = String::new();
    let mut index = start;
    while let Some(&ch) = chars.get(index) {
        if ch.is_ascii_digit() || ch == '.' {
            digits.push(ch);
        } else if ch == ',' && chars.get(index + 1).is_some_and(char::is_ascii_digit) {
            // thousands separator
        } else {
            break;
        }
        index += 1;
    }

    if chars.get(index).is_some_and(|ch| ch.is_alphabetic()) {
        return None;
    }

    let mut value = digits.parse::<f64>().ok()?;
    let mut lookahead = index;
    while chars.get(lookahead).is_some_and(|ch| *ch == ' ') {
        lookahead += 1;
    }
    if chars.get(lookahead) == Some(&'%') {
        value /= 100.0;
        index = lookahead + 1;
    }
    Some((value, index))
}
