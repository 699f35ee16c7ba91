//! The IDL tokenizer.

use crate::error::LexError;

/// Token kinds produced by [`tokenize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `package` keyword.
    Package,
    /// `struct` keyword.
    Struct,
    /// `const` keyword.
    Const,
    /// `;`
    Semi,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `=`
    Eq,
    /// `.`
    Dot,
    /// Identifier.
    Ident,
    /// Decimal integer literal, possibly signed.
    IntLit,
    /// Hex literal beginning `0x`/`0X`, possibly signed.
    HexLit,
    /// Float literal, possibly signed.
    FloatLit,
    /// End of input.
    Eof,
}

/// One token with its source position and any doc comment that preceded
/// it.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What kind of token this is.
    pub kind: TokenKind,
    /// Exact source text of the token.
    pub text: String,
    /// One-based line of the first character.
    pub line: u32,
    /// One-based column of the first character.
    pub column: u32,
    /// Accumulated `///` comment lines attached to this token.
    pub doc: Option<String>,
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    pending_doc: Option<String>,
}

/// Tokenize an IDL source string into a stream terminated by an
/// [`TokenKind::Eof`] token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        src: source.as_bytes(),
        pos: 0,
        line: 1,
        column: 1,
        pending_doc: None,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(byte)
    }

    fn error(&self, line: u32, column: u32, message: impl Into<String>) -> LexError {
        LexError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Skip whitespace and comments, accumulating `///` doc lines.
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(byte) if byte.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    let doc = self.peek_at(2) == Some(b'/');
                    self.bump();
                    self.bump();
                    if doc {
                        self.bump();
                        let mut text = String::new();
                        while let Some(byte) = self.peek() {
                            if byte == b'\n' {
                                break;
                            }
                            text.push(char::from(byte));
                            self.bump();
                        }
                        let text = text.trim().to_owned();
                        match &mut self.pending_doc {
                            Some(doc) => {
                                doc.push('\n');
                                doc.push_str(&text);
                            }
                            None => self.pending_doc = Some(text),
                        }
                    } else {
                        while let Some(byte) = self.peek() {
                            if byte == b'\n' {
                                break;
                            }
                            self.bump();
                        }
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => {
                                return Err(self.error(line, column, "unterminated block comment"))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia()?;
        let (line, column) = (self.line, self.column);
        let doc = self.pending_doc.take();
        let token = |kind, text: String| Token {
            kind,
            text,
            line,
            column,
            doc,
        };

        let Some(byte) = self.peek() else {
            return Ok(token(TokenKind::Eof, String::new()));
        };

        let punct = match byte {
            b';' => Some(TokenKind::Semi),
            b'{' => Some(TokenKind::LBrace),
            b'}' => Some(TokenKind::RBrace),
            b'[' => Some(TokenKind::LBracket),
            b']' => Some(TokenKind::RBracket),
            b',' => Some(TokenKind::Comma),
            b'=' => Some(TokenKind::Eq),
            b'.' => Some(TokenKind::Dot),
            _ => None,
        };
        if let Some(kind) = punct {
            self.bump();
            return Ok(token(kind, char::from(byte).to_string()));
        }

        if byte == b'_' || byte.is_ascii_alphabetic() {
            let mut text = String::new();
            while let Some(byte) = self.peek() {
                if byte == b'_' || byte.is_ascii_alphanumeric() {
                    text.push(char::from(byte));
                    self.bump();
                } else {
                    break;
                }
            }
            let kind = match text.as_str() {
                "package" => TokenKind::Package,
                "struct" => TokenKind::Struct,
                "const" => TokenKind::Const,
                _ => TokenKind::Ident,
            };
            return Ok(token(kind, text));
        }

        if byte.is_ascii_digit()
            || (byte == b'-' && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()))
        {
            let (kind, text) = self.scan_number();
            return Ok(token(kind, text));
        }

        if byte.is_ascii() {
            Err(self.error(
                line,
                column,
                format!("unrecognized character `{}`", char::from(byte)),
            ))
        } else {
            Err(self.error(line, column, "unrecognized non-ASCII character"))
        }
    }

    /// Scan a numeric literal. The caller has already seen a digit, or a
    /// `-` followed by a digit.
    fn scan_number(&mut self) -> (TokenKind, String) {
        let mut text = String::new();
        if self.peek() == Some(b'-') {
            text.push('-');
            self.bump();
        }

        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            text.push(char::from(self.bump().unwrap_or(b'0')));
            text.push(char::from(self.bump().unwrap_or(b'x')));
            while let Some(byte) = self.peek() {
                if byte.is_ascii_hexdigit() {
                    text.push(char::from(byte));
                    self.bump();
                } else {
                    break;
                }
            }
            return (TokenKind::HexLit, text);
        }

        let mut float = false;
        while let Some(byte) = self.peek() {
            if byte.is_ascii_digit() {
                text.push(char::from(byte));
                self.bump();
            } else {
                break;
            }
        }
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
            float = true;
            text.push('.');
            self.bump();
            while let Some(byte) = self.peek() {
                if byte.is_ascii_digit() {
                    text.push(char::from(byte));
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some(b'+') | Some(b'-')));
            if self.peek_at(1 + sign).is_some_and(|b| b.is_ascii_digit()) {
                float = true;
                for _ in 0..=sign {
                    if let Some(byte) = self.bump() {
                        text.push(char::from(byte));
                    }
                }
                while let Some(byte) = self.peek() {
                    if byte.is_ascii_digit() {
                        text.push(char::from(byte));
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }

        let kind = if float {
            TokenKind::FloatLit
        } else {
            TokenKind::IntLit
        };
        (kind, text)
    }
}
