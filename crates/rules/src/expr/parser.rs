//! Recursive-descent parser.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or_expr    := and_expr ("or" and_expr)*
//! and_expr   := atom ("and" atom)*
//! atom       := "(" or_expr ")" | operand CMP operand
//! operand    := IDENT | INT | STRING | "[" literal ("," literal)* "]"
//! ```
//!
//! A chain of the same operator keeps only its first two operands. Later
//! operands must still parse but are discarded. Parentheses nest at most
//! [`MAX_NESTING`] deep.

use super::ast::{Literal, Node, Operand};
use super::error::{ExprError, Result};
use super::lexer::{Token, TokenKind};

/// Deepest parenthesis nesting accepted.
pub(crate) const MAX_NESTING: usize = 128;

pub(crate) struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    end_offset: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(tokens: &'a [Token], source_len: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end_offset: source_len,
            depth: 0,
        }
    }

    /// Parse a whole expression, rejecting trailing tokens.
    pub(crate) fn parse(mut self) -> Result<Node> {
        if self.tokens.is_empty() {
            return Err(ExprError::syntax(0, "empty expression"));
        }
        let node = self.or_expr()?;
        if let Some(tok) = self.peek() {
            return Err(ExprError::syntax(
                tok.offset,
                format!("unexpected {}", describe(&tok.kind)),
            ));
        }
        Ok(node)
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn offset(&self) -> usize {
        self.peek().map(|t| t.offset).unwrap_or(self.end_offset)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().map(|t| &t.kind) == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or_expr(&mut self) -> Result<Node> {
        let first = self.and_expr()?;
        let mut rest = Vec::new();
        while self.eat(&TokenKind::Or) {
            rest.push(self.and_expr()?);
        }
        Ok(fold_first_two(first, rest, Node::Or))
    }

    fn and_expr(&mut self) -> Result<Node> {
        let first = self.atom()?;
        let mut rest = Vec::new();
        while self.eat(&TokenKind::And) {
            rest.push(self.atom()?);
        }
        Ok(fold_first_two(first, rest, Node::And))
    }

    fn atom(&mut self) -> Result<Node> {
        let open = self.offset();
        if self.eat(&TokenKind::LParen) {
            if self.depth == MAX_NESTING {
                return Err(ExprError::syntax(open, "expression nested too deeply"));
            }
            self.depth += 1;
            let inner = self.or_expr()?;
            if !self.eat(&TokenKind::RParen) {
                return Err(ExprError::syntax(self.offset(), "expected `)`"));
            }
            self.depth -= 1;
            return Ok(inner);
        }

        let left = self.operand()?;
        let op = match self.next() {
            Some(Token {
                kind: TokenKind::Cmp(op),
                ..
            }) => *op,
            Some(tok) => {
                return Err(ExprError::syntax(
                    tok.offset,
                    format!("expected comparison operator, found {}", describe(&tok.kind)),
                ))
            }
            None => {
                return Err(ExprError::syntax(
                    self.end_offset,
                    "expected comparison operator, found end of expression",
                ))
            }
        };
        let right = self.operand()?;
        Ok(Node::Compare { left, op, right })
    }

    fn operand(&mut self) -> Result<Operand> {
        let offset = self.offset();
        match self.next().map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => Ok(Operand::Ident(name.clone())),
            Some(TokenKind::Int(n)) => Ok(Operand::Int(*n)),
            Some(TokenKind::Str(s)) => Ok(Operand::Str(s.clone())),
            Some(TokenKind::LBracket) => self.list(offset),
            Some(other) => Err(ExprError::syntax(
                offset,
                format!("expected operand, found {}", describe(other)),
            )),
            None => Err(ExprError::syntax(
                offset,
                "expected operand, found end of expression",
            )),
        }
    }

    fn list(&mut self, open: usize) -> Result<Operand> {
        let mut items = Vec::new();
        loop {
            let offset = self.offset();
            match self.next().map(|t| &t.kind) {
                Some(TokenKind::Int(n)) => items.push(Literal::Int(*n)),
                Some(TokenKind::Str(s)) => items.push(Literal::Str(s.clone())),
                Some(TokenKind::RBracket) if items.is_empty() => {
                    return Err(ExprError::syntax(open, "list literal must not be empty"))
                }
                Some(other) => {
                    return Err(ExprError::syntax(
                        offset,
                        format!("list items must be integers or strings, found {}", describe(other)),
                    ))
                }
                None => return Err(ExprError::syntax(open, "unterminated list literal")),
            }

            if self.eat(&TokenKind::Comma) {
                continue;
            }
            if self.eat(&TokenKind::RBracket) {
                return Ok(Operand::List(items));
            }
            return Err(ExprError::syntax(self.offset(), "expected `,` or `]` in list"));
        }
    }
}

/// Collapse an operand chain, keeping at most the first two.
fn fold_first_two(first: Node, rest: Vec<Node>, make: fn(Box<Node>, Box<Node>) -> Node) -> Node {
    if rest.len() > 1 {
        tracing::trace!(dropped = rest.len() - 1, "truncating boolean chain");
    }
    match rest.into_iter().next() {
        Some(second) => make(Box::new(first), Box::new(second)),
        None => first,
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(name) => format!("identifier `{}`", name),
        TokenKind::Int(n) => format!("integer `{}`", n),
        TokenKind::Str(s) => format!("string \"{}\"", s),
        TokenKind::Cmp(op) => format!("operator `{}`", op),
        TokenKind::And => "`and`".into(),
        TokenKind::Or => "`or`".into(),
        TokenKind::LParen => "`(`".into(),
        TokenKind::RParen => "`)`".into(),
        TokenKind::LBracket => "`[`".into(),
        TokenKind::RBracket => "`]`".into(),
        TokenKind::Comma => "`,`".into(),
    }
}
