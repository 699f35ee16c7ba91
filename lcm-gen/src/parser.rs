//! Recursive-descent parser over the token stream.

use std::path::PathBuf;

use crate::ast::{ArrayDim, Constant, DimMode, File, Member, Struct, TypeRef, PRIMITIVE_TYPES};
use crate::error::{Error, ParseError};
use crate::lexer::{self, Token, TokenKind};

/// Parse one IDL source into a [`File`].
pub fn parse(path: impl Into<PathBuf>, source: &str) -> Result<File, Error> {
    let tokens = lexer::tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.file(path.into()).map_err(Error::from)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(token: &Token, message: impl Into<String>) -> ParseError {
        ParseError {
            line: token.line,
            column: token.column,
            message: message.into(),
        }
    }

    fn describe(token: &Token) -> String {
        match token.kind {
            TokenKind::Eof => "end of input".to_owned(),
            _ => format!("`{}`", token.text),
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            let token = self.peek();
            Err(Self::error(
                token,
                format!("expected {what}, found {}", Self::describe(token)),
            ))
        }
    }

    fn file(&mut self, path: PathBuf) -> Result<File, ParseError> {
        let package = if self.peek().kind == TokenKind::Package {
            Some(self.package()?)
        } else {
            None
        };
        let mut structs = Vec::new();
        while self.peek().kind != TokenKind::Eof {
            structs.push(self.parse_struct(package.as_deref())?);
        }
        Ok(File {
            path,
            package,
            structs,
        })
    }

    /// `package ident ('.' ident)* ';'`
    fn package(&mut self) -> Result<String, ParseError> {
        self.expect(TokenKind::Package, "`package`")?;
        let mut name = self.expect(TokenKind::Ident, "package name")?.text;
        while self.peek().kind == TokenKind::Dot {
            self.advance();
            name.push('.');
            name.push_str(&self.expect(TokenKind::Ident, "package name")?.text);
        }
        self.expect(TokenKind::Semi, "`;`")?;
        Ok(name)
    }

    /// `struct ident '{' (const | member)* '}'`
    fn parse_struct(&mut self, package: Option<&str>) -> Result<Struct, ParseError> {
        let keyword = self.expect(TokenKind::Struct, "`struct`")?;
        let name = self.expect(TokenKind::Ident, "struct name")?.text;
        self.expect(TokenKind::LBrace, "`{`")?;

        let mut st = Struct {
            name,
            package: package.map(str::to_owned),
            members: Vec::new(),
            constants: Vec::new(),
            doc: keyword.doc,
        };
        loop {
            match self.peek().kind {
                TokenKind::RBrace => {
                    self.advance();
                    return Ok(st);
                }
                TokenKind::Const => self.constants(&mut st)?,
                _ => self.member(&mut st, package)?,
            }
        }
    }

    /// `const type ident '=' literal (',' ident '=' literal)* ';'`
    fn constants(&mut self, st: &mut Struct) -> Result<(), ParseError> {
        self.expect(TokenKind::Const, "`const`")?;
        let ty = self.expect(TokenKind::Ident, "constant type")?;
        if !PRIMITIVE_TYPES.contains(&ty.text.as_str())
            || matches!(ty.text.as_str(), "string" | "boolean")
        {
            return Err(Self::error(
                &ty,
                format!("`{}` is not a numeric constant type", ty.text),
            ));
        }
        loop {
            let name = self.expect(TokenKind::Ident, "constant name")?.text;
            self.expect(TokenKind::Eq, "`=`")?;
            let literal = self.literal()?;
            let int_value = Self::integer_value(&literal);
            st.constants.push(Constant {
                ty: ty.text.clone(),
                name,
                literal: literal.text,
                int_value,
            });
            match self.advance() {
                token if token.kind == TokenKind::Comma => continue,
                token if token.kind == TokenKind::Semi => return Ok(()),
                token => {
                    return Err(Self::error(
                        &token,
                        format!("expected `,` or `;`, found {}", Self::describe(&token)),
                    ))
                }
            }
        }
    }

    fn literal(&mut self) -> Result<Token, ParseError> {
        match self.peek().kind {
            TokenKind::IntLit | TokenKind::HexLit | TokenKind::FloatLit => Ok(self.advance()),
            _ => {
                let token = self.peek();
                Err(Self::error(
                    token,
                    format!("expected literal, found {}", Self::describe(token)),
                ))
            }
        }
    }

    fn integer_value(literal: &Token) -> Option<i64> {
        match literal.kind {
            TokenKind::IntLit => literal.text.parse().ok(),
            TokenKind::HexLit => {
                let (negative, digits) = match literal.text.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, literal.text.as_str()),
                };
                let digits = &digits[2..];
                let value = i64::try_from(u64::from_str_radix(digits, 16).ok()?).ok()?;
                Some(if negative { -value } else { value })
            }
            _ => None,
        }
    }

    /// `typeRef ident array_dims? ';'`
    fn member(&mut self, st: &mut Struct, package: Option<&str>) -> Result<(), ParseError> {
        let ty = self.type_ref(package)?;
        let name = self.expect(TokenKind::Ident, "member name")?.text;
        let mut dims = Vec::new();
        while self.peek().kind == TokenKind::LBracket {
            self.advance();
            dims.push(self.dimension(st)?);
            self.expect(TokenKind::RBracket, "`]`")?;
        }
        self.expect(TokenKind::Semi, "`;`")?;
        st.members.push(Member { ty, name, dims });
        Ok(())
    }

    /// `ident ('.' ident)*`
    fn type_ref(&mut self, package: Option<&str>) -> Result<TypeRef, ParseError> {
        let mut dotted = self.expect(TokenKind::Ident, "type name")?.text;
        while self.peek().kind == TokenKind::Dot {
            self.advance();
            dotted.push('.');
            dotted.push_str(&self.expect(TokenKind::Ident, "type name")?.text);
        }
        Ok(TypeRef::new(&dotted, package))
    }

    /// `'[' (int_literal | ident) ']'`, already inside the brackets.
    ///
    /// A literal becomes a constant dimension. An identifier resolves
    /// against previously parsed integer constants, then previously
    /// parsed members; anything else, including a constant of
    /// non-integer type, is kept as a symbolic constant dimension so
    /// the fingerprint still sees its text.
    fn dimension(&mut self, st: &Struct) -> Result<ArrayDim, ParseError> {
        match self.peek().kind {
            TokenKind::IntLit => {
                let token = self.advance();
                let resolved = token.text.parse().ok();
                if resolved.is_none() {
                    return Err(Self::error(
                        &token,
                        format!("array dimension `{}` is not a valid size", token.text),
                    ));
                }
                Ok(ArrayDim {
                    mode: DimMode::Const,
                    size: token.text,
                    resolved,
                })
            }
            TokenKind::Ident => {
                let token = self.advance();
                if let Some(constant) = st.constants.iter().find(|c| c.name == token.text) {
                    if let Some(value) = constant.int_value.and_then(|v| u64::try_from(v).ok()) {
                        return Ok(ArrayDim {
                            mode: DimMode::Const,
                            size: constant.literal.clone(),
                            resolved: Some(value),
                        });
                    }
                }
                if st.members.iter().any(|m| m.name == token.text) {
                    return Ok(ArrayDim {
                        mode: DimMode::Var,
                        size: token.text,
                        resolved: None,
                    });
                }
                Ok(ArrayDim {
                    mode: DimMode::Const,
                    size: token.text,
                    resolved: None,
                })
            }
            _ => {
                let token = self.peek();
                Err(Self::error(
                    token,
                    format!(
                        "expected array dimension, found {}",
                        Self::describe(token)
                    ),
                ))
            }
        }
    }
}
