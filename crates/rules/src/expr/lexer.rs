//! Tokenizer for the `if` expression language.

use super::ast::CmpOp;
use super::error::{ExprError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident(String),
    Int(i64),
    Str(String),
    Cmp(CmpOp),
    And,
    Or,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// Split `source` into tokens.
///
/// Identifiers are capability words (`[A-Z][A-Z0-9_]*`); lower-case words
/// are only valid as the keywords `and`, `or`, `in`, `not in`.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let single = match c {
            b'(' => Some(TokenKind::LParen),
            b')' => Some(TokenKind::RParen),
            b'[' => Some(TokenKind::LBracket),
            b']' => Some(TokenKind::RBracket),
            b',' => Some(TokenKind::Comma),
            _ => None,
        };
        if let Some(kind) = single {
            tokens.push(Token { kind, offset: start });
            i += 1;
            continue;
        }

        match c {
            b'=' | b'!' | b'<' | b'>' => {
                let next = bytes.get(i + 1).copied();
                let (op, len) = match (c, next) {
                    (b'=', Some(b'=')) => (CmpOp::Eq, 2),
                    (b'!', Some(b'=')) => (CmpOp::Ne, 2),
                    (b'<', Some(b'=')) => (CmpOp::Le, 2),
                    (b'>', Some(b'=')) => (CmpOp::Ge, 2),
                    (b'<', _) => (CmpOp::Lt, 1),
                    (b'>', _) => (CmpOp::Gt, 1),
                    _ => {
                        return Err(ExprError::syntax(
                            start,
                            format!("unknown operator `{}`", operator_text(source, start)),
                        ))
                    }
                };
                tokens.push(Token {
                    kind: TokenKind::Cmp(op),
                    offset: start,
                });
                i += len;
            }
            b'"' => {
                let (value, end) = lex_string(source, start)?;
                tokens.push(Token {
                    kind: TokenKind::Str(value),
                    offset: start,
                });
                i = end;
            }
            b'\'' => {
                return Err(ExprError::syntax(
                    start,
                    "string literals must use double quotes",
                ));
            }
            b'0'..=b'9' => {
                let (value, end) = lex_int(source, start)?;
                tokens.push(Token {
                    kind: TokenKind::Int(value),
                    offset: start,
                });
                i = end;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let end = scan_word(bytes, start);
                let word = &source[start..end];
                let kind = match word {
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "in" => TokenKind::Cmp(CmpOp::In),
                    "not" => {
                        let after = skip_ws(bytes, end);
                        let in_end = scan_word(bytes, after);
                        if after < bytes.len() && &source[after..in_end] == "in" {
                            i = in_end;
                            tokens.push(Token {
                                kind: TokenKind::Cmp(CmpOp::NotIn),
                                offset: start,
                            });
                            continue;
                        }
                        return Err(ExprError::syntax(start, "`not` must be followed by `in`"));
                    }
                    w if is_capability_word(w) => TokenKind::Ident(w.to_string()),
                    w => {
                        return Err(ExprError::syntax(
                            start,
                            format!("unexpected word `{}` (strings must be double-quoted)", w),
                        ))
                    }
                };
                tokens.push(Token { kind, offset: start });
                i = end;
            }
            _ => {
                let ch = source[start..].chars().next().unwrap_or('?');
                return Err(ExprError::syntax(start, format!("unexpected character `{}`", ch)));
            }
        }
    }

    Ok(tokens)
}

fn is_capability_word(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn scan_word(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    i
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn operator_text(source: &str, start: usize) -> &str {
    let end = source[start..]
        .find(|c: char| c.is_whitespace() || c.is_alphanumeric() || c == '"')
        .map(|n| start + n)
        .unwrap_or(source.len());
    &source[start..end.max(start + 1).min(source.len())]
}

/// Lex a double-quoted string starting at `start`; returns value and end offset.
fn lex_string(source: &str, start: usize) -> Result<(String, usize)> {
    let mut value = String::new();
    let mut chars = source[start + 1..].char_indices();

    while let Some((idx, ch)) = chars.next() {
        match ch {
            '"' => return Ok((value, start + 1 + idx + 1)),
            '\\' => match chars.next() {
                Some((_, '"')) => value.push('"'),
                Some((_, '\\')) => value.push('\\'),
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => break,
            },
            other => value.push(other),
        }
    }

    Err(ExprError::syntax(start, "unterminated string literal"))
}

/// Lex a decimal or `0x` hexadecimal integer starting at `start`.
fn lex_int(source: &str, start: usize) -> Result<(i64, usize)> {
    let bytes = source.as_bytes();
    let is_hex = bytes[start] == b'0' && matches!(bytes.get(start + 1), Some(b'x') | Some(b'X'));

    let (digits_start, radix) = if is_hex { (start + 2, 16) } else { (start, 10) };
    let mut end = digits_start;
    while end < bytes.len() && bytes[end].is_ascii_alphanumeric() {
        end += 1;
    }

    let digits = &source[digits_start..end];
    if digits.is_empty() {
        return Err(ExprError::syntax(start, "hex literal has no digits"));
    }
    let value = i64::from_str_radix(digits, radix).map_err(|_| {
        ExprError::syntax(start, format!("invalid integer literal `{}`", &source[start..end]))
    })?;
    Ok((value, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_comparison_without_spaces() {
        assert_eq!(
            kinds(r#"IDF_TARGET=="esp32""#),
            vec![
                TokenKind::Ident("IDF_TARGET".into()),
                TokenKind::Cmp(CmpOp::Eq),
                TokenKind::Str("esp32".into()),
            ]
        );
    }

    #[test]
    fn lexes_hex_and_not_in() {
        assert_eq!(
            kinds("0x1F not in [1, 2]"),
            vec![
                TokenKind::Int(31),
                TokenKind::Cmp(CmpOp::NotIn),
                TokenKind::LBracket,
                TokenKind::Int(1),
                TokenKind::Comma,
                TokenKind::Int(2),
                TokenKind::RBracket,
            ]
        );
    }

    #[test]
    fn rejects_unquoted_and_single_quoted_strings() {
        assert!(matches!(tokenize("IDF_TARGET == esp32"), Err(ExprError::Syntax { offset: 14, .. })));
        assert!(tokenize("IDF_TARGET == 'esp32'").is_err());
    }

    #[test]
    fn rejects_unknown_operators() {
        assert!(tokenize("A = 1").is_err());
        assert!(tokenize("A =< 1").is_err());
        assert!(tokenize("A ~ 1").is_err());
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(tokenize(r#"A == "abc"#).is_err());
    }

    #[test]
    fn string_escapes() {
        assert_eq!(kinds(r#""a\"b""#), vec![TokenKind::Str("a\"b".into())]);
    }
}
