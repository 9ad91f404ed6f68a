//! Notation tokenizer

use std::fmt;

use super::NotationError;

const UNLESS: char = '但';
const OR_KEYWORD: &str = "又は";
const SECONDS: char = '秒';
const SEPARATORS: [char; 3] = ['、', ',', '・'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `((`
    OpenTotalControl,
    /// `))`
    CloseTotalControl,
    /// A run of `N` `[`
    OpenNeighbor(usize),
    /// A run of `N` `]`
    CloseNeighbor(usize),
    OpenGroup,
    CloseGroup,
    OpenParen,
    CloseParen,
    OpenUnlock,
    CloseUnlock,
    /// `但 N秒`
    Timer(u32),
    /// `但` on its own
    Unless,
    /// `又は`
    Or,
    Ident(String),
}

impl Token {
    /// Whether the token ends the current sequence
    pub fn is_closing(&self) -> bool {
        matches!(
            self,
            Token::CloseTotalControl
                | Token::CloseNeighbor(_)
                | Token::CloseGroup
                | Token::CloseParen
                | Token::CloseUnlock
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::OpenTotalControl => write!(f, "(("),
            Token::CloseTotalControl => write!(f, "))"),
            Token::OpenNeighbor(n) => write!(f, "{}", "[".repeat(*n)),
            Token::CloseNeighbor(n) => write!(f, "{}", "]".repeat(*n)),
            Token::OpenGroup => write!(f, "{{"),
            Token::CloseGroup => write!(f, "}}"),
            Token::OpenParen => write!(f, "("),
            Token::CloseParen => write!(f, ")"),
            Token::OpenUnlock => write!(f, "｢"),
            Token::CloseUnlock => write!(f, "｣"),
            Token::Timer(seconds) => write!(f, "{}{}{}", UNLESS, seconds, SECONDS),
            Token::Unless => write!(f, "{}", UNLESS),
            Token::Or => write!(f, "{}", OR_KEYWORD),
            Token::Ident(name) => write!(f, "{}", name),
        }
    }
}

/// Split a table cell into tokens
pub fn tokenize(input: &str) -> Result<Vec<Token>, NotationError> {
    let mut tokens = Vec::new();
    let mut rest = input;

    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() || SEPARATORS.contains(&c) {
            rest = &rest[c.len_utf8()..];
            continue;
        }

        let (token, len) = match c {
            '[' => {
                let n = run_length(rest, '[');
                (Token::OpenNeighbor(n), n)
            }
            ']' => {
                let n = run_length(rest, ']');
                (Token::CloseNeighbor(n), n)
            }
            '(' if rest.starts_with("((") => (Token::OpenTotalControl, 2),
            ')' if rest.starts_with("))") => (Token::CloseTotalControl, 2),
            '(' => (Token::OpenParen, 1),
            ')' => (Token::CloseParen, 1),
            '{' => (Token::OpenGroup, 1),
            '}' => (Token::CloseGroup, 1),
            '｢' => (Token::OpenUnlock, c.len_utf8()),
            '｣' => (Token::CloseUnlock, c.len_utf8()),
            UNLESS => match timer(&rest[c.len_utf8()..]) {
                Some((seconds, timer_len)) => (Token::Timer(seconds), c.len_utf8() + timer_len),
                None => (Token::Unless, c.len_utf8()),
            },
            _ if rest.starts_with(OR_KEYWORD) => (Token::Or, OR_KEYWORD.len()),
            _ if is_ident_char(c) => {
                let len = ident_length(rest);
                (Token::Ident(rest[..len].to_string()), len)
            }
            _ => return Err(NotationError::UnknownToken(c.to_string())),
        };

        tokens.push(token);
        rest = &rest[len..];
    }

    Ok(tokens)
}

/// Number of consecutive `bracket` characters (all single-byte)
fn run_length(input: &str, bracket: char) -> usize {
    input.chars().take_while(|c| *c == bracket).count()
}

/// Parse `\s*\d+秒` after `但`, returning the seconds and the consumed byte length
fn timer(input: &str) -> Option<(u32, usize)> {
    let trimmed = input.trim_start();
    let skipped = input.len() - trimmed.len();
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || !trimmed[digits..].starts_with(SECONDS) {
        return None;
    }
    let seconds = trimmed[..digits].parse().ok()?;
    Some((seconds, skipped + digits + SECONDS.len_utf8()))
}

fn is_ident_char(c: char) -> bool {
    if c == UNLESS || SEPARATORS.contains(&c) {
        return false;
    }
    c.is_ascii_alphanumeric()
        || matches!(c,
            '\u{3040}'..='\u{309F}'   // hiragana
            | '\u{30A0}'..='\u{30FF}' // katakana
            | '\u{4E00}'..='\u{9FFF}' // CJK ideographs
            | '\u{FF66}'..='\u{FF9F}' // half-width katakana
        )
}

fn ident_length(input: &str) -> usize {
    let mut len = 0;
    for c in input.chars() {
        if !is_ident_char(c) || input[len..].starts_with(OR_KEYWORD) {
            break;
        }
        len += c.len_utf8();
    }
    len
}
