use std::{fmt, iter::Peekable, str::Chars};

use crate::token::{Pos, Token, TokenKind, CHAR_NAMES, KEYWORDS};

/// Characters that terminate a word. All of them except whitespace form
/// tokens of their own.
const DELIMITERS: &str = " \t\r\n()[]{};,'\":";

/// Lexes the whole input, failing on the first (and only) lexical error:
/// an unterminated string literal.
pub fn lex(src: &str) -> Result<Vec<Token>, Error> {
    Lexer::new(src).collect()
}

/// The tern lexer: a forward-only iterator over tokens. Lexers are cheap
/// to construct and re-lexing the same input always yields the same
/// sequence.
pub struct Lexer<'src> {
    iter: Peekable<Chars<'src>>,
    line: u32,
    col: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Lexer<'src> {
        Lexer {
            iter: src.chars().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn scan(&mut self) -> Option<Result<Token, Error>> {
        self.skip_whitespace();
        let pos = self.pos();
        let first = self.advance()?;
        use TokenKind::*;
        Some(match first {
            '(' => Ok(Token::new(LPar, "(", pos)),
            ')' => Ok(Token::new(RPar, ")", pos)),
            '[' => Ok(Token::new(LBrack, "[", pos)),
            ']' => Ok(Token::new(RBrack, "]", pos)),
            '{' => Ok(Token::new(LBrace, "{", pos)),
            '}' => Ok(Token::new(RBrace, "}", pos)),
            ',' => Ok(Token::new(Comma, ",", pos)),
            ':' => Ok(Token::new(Colon, ":", pos)),
            '\'' => Ok(Token::new(SQuote, "'", pos)),
            ';' => Ok(Token::new(End, ";", pos)),
            '"' => self.string(pos),
            _ => Ok(self.word(first, pos)),
        })
    }

    /// Reads a `"`-delimited string literal. The contents are copied
    /// verbatim, line breaks included; only the delimiters are dropped.
    fn string(&mut self, pos: Pos) -> Result<Token, Error> {
        let mut text = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(Token::new(TokenKind::Str, text, pos)),
                Some(c) => text.push(c),
                None => return Err(Error::UnterminatedString { pos }),
            }
        }
    }

    /// Grabs a maximal delimiter-free run and classifies it.
    fn word(&mut self, first: char, pos: Pos) -> Token {
        let mut text = String::from(first);
        while let Some(c) = self.peek() {
            if DELIMITERS.contains(c) {
                break;
            }
            text.push(c);
            self.advance();
        }
        classify(text, pos)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\r' | '\n')) {
            self.advance();
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.iter.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.iter.peek().copied()
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.col)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scan()
    }
}

/// Classifies a word by trying each reading in priority order: keyword,
/// character, radix integer, decimal number. The first success wins and
/// the identifier reading at the end always succeeds, so a word that
/// merely *resembles* a number or character escape lexes as an
/// identifier rather than an error.
fn classify(text: String, pos: Pos) -> Token {
    if let Some(&kind) = KEYWORDS.get(text.as_str()) {
        return Token::new(kind, text, pos);
    }
    character(&text, pos)
        .or_else(|| radix_int(&text, pos))
        .or_else(|| number(&text, pos))
        .unwrap_or_else(|| Token::new(TokenKind::Id, text, pos))
}

/// `\c` for a single character, or one of the named escapes. A backslash
/// followed by any longer unrecognized word is not a character.
fn character(text: &str, pos: Pos) -> Option<Token> {
    let rest = text.strip_prefix('\\')?;
    if rest.len() == 1 || CHAR_NAMES.contains_key(rest) {
        Some(Token::new(TokenKind::Char, text, pos))
    } else {
        None
    }
}

/// `0b`/`0o`/`0d`/`0h`-prefixed integers, normalized to base 10.
fn radix_int(text: &str, pos: Pos) -> Option<Token> {
    let mut chars = text.chars();
    if chars.next() != Some('0') {
        return None;
    }
    let radix = match chars.next() {
        Some('b') => 2,
        Some('o') => 8,
        Some('d') => 10,
        Some('h') => 16,
        _ => return None,
    };
    let value = i64::from_str_radix(chars.as_str(), radix).ok()?;
    Some(Token::new(TokenKind::Int, value.to_string(), pos))
}

/// Decimal integers and floats: an optional sign, a digit run, and for
/// floats exactly one `.` followed by more digits. Anything that fails
/// the full grammar (`123a`, `123..0`, `1e5`) is left to the identifier
/// fallback.
fn number(text: &str, pos: Pos) -> Option<Token> {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match unsigned.split_once('.') {
        Some((whole, frac)) => {
            if !all_digits(whole) || !all_digits(frac) {
                return None;
            }
            let value: f64 = text.parse().ok().filter(|v: &f64| v.is_finite())?;
            Some(Token::new(TokenKind::Float, format!("{value:.6}"), pos))
        }
        None => {
            if !all_digits(unsigned) {
                return None;
            }
            let value: i64 = text.parse().ok()?;
            Some(Token::new(TokenKind::Int, value.to_string(), pos))
        }
    }
}

/// Typed readback of a token's resolved text.
pub mod extract {
    use super::*;

    pub fn int(token: &Token) -> Option<i64> {
        debug_assert_eq!(token.kind, TokenKind::Int);
        token.text.parse().ok()
    }

    pub fn float(token: &Token) -> Option<f64> {
        debug_assert_eq!(token.kind, TokenKind::Float);
        token.text.parse().ok()
    }

    pub fn character(token: &Token) -> Option<u8> {
        debug_assert_eq!(token.kind, TokenKind::Char);
        let rest = token.text.strip_prefix('\\')?;
        match CHAR_NAMES.get(rest) {
            Some(&byte) => Some(byte),
            None => rest.bytes().next().filter(|_| rest.len() == 1),
        }
    }

    pub fn boolean(token: &Token) -> bool {
        debug_assert_eq!(token.kind, TokenKind::Bool);
        token.text == "true"
    }

    pub fn string(token: &Token) -> String {
        debug_assert_eq!(token.kind, TokenKind::Str);
        token.text.clone()
    }
}

/// The single lexical failure mode. It aborts the unit: the scanner has
/// hit end of input mid-literal and cannot resynchronize.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnterminatedString { pos: Pos },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Error::UnterminatedString { pos } = self;
        write!(f, "{pos}: unterminated string literal")
    }
}

impl std::error::Error for Error {}
