//! Tokenizer for the C subset. Produces a flat `Vec<Token>` the parser
//! walks with an index cursor, instead of the source compiler's singly
//! linked token list threaded through a process-wide `token` global.
//!
//! Every `kind` the external token-stream contract names is represented
//! here; punctuation tokens that the grammar matches literally (`(`, `;`,
//! `{`, ...) are `TokenKind::Punct` carrying the single ASCII byte, the
//! same "reuse the ASCII code" trick the source compiler uses instead of
//! inventing a named variant per punctuation mark.

use cminic_session::{Diagnostic, Span};

/// A type spelled out in source, before the parser has resolved struct
/// names or wrapped it in pointer/array suffixes. Lexed eagerly because
/// the source compiler pre-builds `token->type` for `TK_TYPE` tokens; a
/// struct tag's full member list is filled in later by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexType {
    Void,
    Char,
    Int,
    Struct(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Num(i64),
    Ident(String),
    /// The literal's decoded bytes and its index into the lexer's string table.
    Str(String, usize),
    Type(LexType),
    Return,
    If,
    Else,
    While,
    For,
    Break,
    Continue,
    Sizeof,
    Eq,
    Ne,
    Le,
    Ge,
    AddEq,
    SubEq,
    MulEq,
    DivEq,
    ModEq,
    Inc,
    Dec,
    Arrow,
    LogicalAnd,
    LogicalOr,
    /// A punctuation token that the grammar matches literally: `(`, `)`,
    /// `{`, `}`, `[`, `]`, `;`, `,`, `.`, `=`, `+`, `-`, `*`, `/`, `%`,
    /// `<`, `>`, `&`, `|`, `^`, `~`, `!`, `?`, `:`.
    Punct(char),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// The string literals collected while lexing, in first-seen order; the
/// parser copies this into the AST's `StringTable` unchanged so `.LC<id>`
/// indices line up with what codegen emits.
#[derive(Debug, Default)]
pub struct StringLiterals {
    pub strings: Vec<String>,
}

pub fn tokenize(src: &str) -> Result<(Vec<Token>, StringLiterals), Diagnostic> {
    let bytes = src.as_bytes();
    let mut i = 0usize;
    let mut tokens = Vec::new();
    let mut strings = StringLiterals::default();

    while i < bytes.len() {
        let c = bytes[i];

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if src[i..].starts_with("//") {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if src[i..].starts_with("/*") {
            let start = i;
            i += 2;
            loop {
                if i + 1 >= bytes.len() {
                    return Err(Diagnostic::new(Span::point(start), "unterminated block comment"));
                }
                if bytes[i] == b'*' && bytes[i + 1] == b'/' {
                    i += 2;
                    break;
                }
                i += 1;
            }
            continue;
        }

        let start = i;

        if c == b'"' {
            i += 1;
            let mut decoded = String::new();
            loop {
                if i >= bytes.len() {
                    return Err(Diagnostic::new(Span::point(start), "unterminated string literal"));
                }
                match bytes[i] {
                    b'"' => {
                        i += 1;
                        break;
                    }
                    b'\\' if i + 1 < bytes.len() => {
                        let escaped = match bytes[i + 1] {
                            b'n' => '\n',
                            b't' => '\t',
                            b'0' => '\0',
                            b'\\' => '\\',
                            b'"' => '"',
                            other => other as char,
                        };
                        decoded.push(escaped);
                        i += 2;
                    }
                    b => {
                        decoded.push(b as char);
                        i += 1;
                    }
                }
            }
            let idx = strings.strings.len();
            strings.strings.push(decoded.clone());
            tokens.push(Token {
                kind: TokenKind::Str(decoded, idx),
                span: Span::new(start, i),
            });
            continue;
        }

        if c.is_ascii_digit() {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let val: i64 = src[start..i]
                .parse()
                .map_err(|_| Diagnostic::new(Span::new(start, i), "invalid numeric literal"))?;
            tokens.push(Token {
                kind: TokenKind::Num(val),
                span: Span::new(start, i),
            });
            continue;
        }

        if is_ident_start(c) {
            while i < bytes.len() && is_ident_continue(bytes[i]) {
                i += 1;
            }
            let word = &src[start..i];
            let kind = keyword_or_ident(word);
            tokens.push(Token {
                kind,
                span: Span::new(start, i),
            });
            continue;
        }

        // Multi-character punctuation, longest match first.
        let rest = &src[i..];
        if let Some((text, kind)) = [
            ("==", TokenKind::Eq),
            ("!=", TokenKind::Ne),
            ("<=", TokenKind::Le),
            (">=", TokenKind::Ge),
            ("+=", TokenKind::AddEq),
            ("-=", TokenKind::SubEq),
            ("*=", TokenKind::MulEq),
            ("/=", TokenKind::DivEq),
            ("%=", TokenKind::ModEq),
            ("++", TokenKind::Inc),
            ("--", TokenKind::Dec),
            ("->", TokenKind::Arrow),
            ("&&", TokenKind::LogicalAnd),
            ("||", TokenKind::LogicalOr),
        ]
        .into_iter()
        .find(|(text, _)| rest.starts_with(text))
        {
            i += text.len();
            tokens.push(Token {
                kind,
                span: Span::new(start, i),
            });
            continue;
        }

        if is_single_punct(c as char) {
            i += 1;
            tokens.push(Token {
                kind: TokenKind::Punct(c as char),
                span: Span::new(start, i),
            });
            continue;
        }

        return Err(Diagnostic::new(
            Span::point(start),
            format!("unexpected character '{}'", c as char),
        ));
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::point(bytes.len()),
    });

    Ok((tokens, strings))
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn is_single_punct(c: char) -> bool {
    matches!(
        c,
        '(' | ')' | '{' | '}' | '[' | ']' | ';' | ',' | '.' | '=' | '+' | '-' | '*' | '/' | '%'
            | '<' | '>' | '&' | '|' | '^' | '~' | '!' | '?' | ':'
    )
}

fn keyword_or_ident(word: &str) -> TokenKind {
    match word {
        "void" => TokenKind::Type(LexType::Void),
        "char" => TokenKind::Type(LexType::Char),
        "int" => TokenKind::Type(LexType::Int),
        "struct" => TokenKind::Type(LexType::Struct(String::new())),
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "sizeof" => TokenKind::Sizeof,
        _ => TokenKind::Ident(word.to_string()),
    }
}

/// A cursor over a token slice. `peek_nth`/`bump` mirror
/// `get_nafter_token`/`next_token`'s lookahead contract without a global.
pub struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        TokenCursor { tokens, pos: 0 }
    }

    pub fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    pub fn peek_nth(&self, n: usize) -> &Token {
        self.tokens
            .get(self.pos + n)
            .unwrap_or_else(|| self.tokens.last().unwrap())
    }

    pub fn bump(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    pub fn at_eof(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_a_minimal_function() {
        let (tokens, _) = tokenize("int main() { return 0; }").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Type(LexType::Int),
                TokenKind::Ident("main".into()),
                TokenKind::Punct('('),
                TokenKind::Punct(')'),
                TokenKind::Punct('{'),
                TokenKind::Return,
                TokenKind::Num(0),
                TokenKind::Punct(';'),
                TokenKind::Punct('}'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn interns_string_literals_in_order() {
        let (tokens, strings) = tokenize(r#"char *a = "hi"; char *b = "there";"#).unwrap();
        assert_eq!(strings.strings, vec!["hi".to_string(), "there".to_string()]);
        let indices: Vec<_> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Str(_, idx) => Some(*idx),
                _ => None,
            })
            .collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn distinguishes_assign_from_eq() {
        let (tokens, _) = tokenize("a = b; a == b;").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| &t.kind).collect();
        assert!(kinds.contains(&&TokenKind::Punct('=')));
        assert!(kinds.contains(&&TokenKind::Eq));
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(tokenize("\"abc").is_err());
    }
}
