use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The resolved spelling of the token: radix integers are normalized
    /// to base-10, floats to six-decimal fixed form, characters to their
    /// `\name` escape. Re-lexing the rendered text yields an equal token.
    pub text: String,
    pub pos: Pos,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, pos: Pos) -> Token {
        Token {
            kind,
            text: text.into(),
            pos,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Checks for a context-sensitive keyword (`def`, `if`, ...), which
    /// the lexer emits as a plain identifier.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Id && self.text == word
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {:?}, {})", self.kind, self.text, self.pos)
    }
}

/// The re-lexable spelling: string literals get their delimiters back,
/// everything else renders its resolved text as-is.
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Str => write!(f, "\"{}\"", self.text),
            _ => f.write_str(&self.text),
        }
    }
}

/// A line/column pair, both 1-based.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Pos {
        Pos { line, col }
    }
}

impl fmt::Debug for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({self})")
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    LBrack,
    RBrack,
    LPar,
    RPar,
    LBrace,
    RBrace,
    SQuote,
    DQuote,
    Comma,
    Colon,
    /// Statement terminator, spelled `;` or `end`.
    End,

    Int,
    Float,
    Char,
    Str,
    Bool,
    Id,

    Eof,
}

impl TokenKind {
    /// Whether the token dump renders this kind with its text attached.
    pub fn has_text(self) -> bool {
        use TokenKind::*;
        matches!(self, Int | Float | Char | Str | Bool | Id)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        f.write_str(match self {
            LBrack => "LBRACK",
            RBrack => "RBRACK",
            LPar => "LPAR",
            RPar => "RPAR",
            LBrace => "LBRACE",
            RBrace => "RBRACE",
            SQuote => "SQUOTE",
            DQuote => "DQUOTE",
            Comma => "COMMA",
            Colon => "COLON",
            End => "END",
            Int => "INT",
            Float => "FLOAT",
            Char => "CHAR",
            Str => "STRING",
            Bool => "BOOL",
            Id => "ID",
            Eof => "EOF",
        })
    }
}

/// Words the lexer classifies eagerly; every other keyword of the
/// grammar stays an identifier and is matched by the parser.
pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "end" => TokenKind::End,
    "true" => TokenKind::Bool,
    "false" => TokenKind::Bool,
};

/// Named character escapes: `\space` and friends.
pub static CHAR_NAMES: phf::Map<&'static str, u8> = phf::phf_map! {
    "space" => b' ',
    "newline" => b'\n',
    "return" => b'\r',
    "tab" => b'\t',
    "vtab" => b'\x0b',
};

/// Reverse of [`CHAR_NAMES`], for rendering a character's canonical
/// spelling.
pub fn char_name(byte: u8) -> Option<&'static str> {
    match byte {
        b' ' => Some("space"),
        b'\n' => Some("newline"),
        b'\r' => Some("return"),
        b'\t' => Some("tab"),
        b'\x0b' => Some("vtab"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_resolved_text() {
        let pos = Pos::new(1, 1);
        assert_eq!(Token::new(TokenKind::Int, "5", pos).to_string(), "5");
        assert_eq!(
            Token::new(TokenKind::Str, "hi", pos).to_string(),
            "\"hi\""
        );
        assert_eq!(
            Token::new(TokenKind::Char, "\\space", pos).to_string(),
            "\\space"
        );
    }

    #[test]
    fn test_char_names_are_inverses() {
        for (name, byte) in &CHAR_NAMES {
            assert_eq!(char_name(*byte), Some(*name));
        }
    }
}
