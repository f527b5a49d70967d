use crate::diagnostics::{Diagnostic, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Lokal,
    Fungsi,
    Kembali,
    Tutup,
    Jika,
    Maka,
    Kalau,
    Sebaliknya,
    Selama,
    Untuk,
    Ke,
    Langkah,
    Lakukan,
    Kelas,
    Benar,
    Salah,
    Nil,
    Dan,
    Atau,
    Bukan,
    Impor,
    SelfKw,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Lokal => "lokal",
            Keyword::Fungsi => "fungsi",
            Keyword::Kembali => "kembali",
            Keyword::Tutup => "tutup",
            Keyword::Jika => "jika",
            Keyword::Maka => "maka",
            Keyword::Kalau => "kalau",
            Keyword::Sebaliknya => "sebaliknya",
            Keyword::Selama => "selama",
            Keyword::Untuk => "untuk",
            Keyword::Ke => "ke",
            Keyword::Langkah => "langkah",
            Keyword::Lakukan => "lakukan",
            Keyword::Kelas => "kelas",
            Keyword::Benar => "benar",
            Keyword::Salah => "salah",
            Keyword::Nil => "nil",
            Keyword::Dan => "dan",
            Keyword::Atau => "atau",
            Keyword::Bukan => "bukan",
            Keyword::Impor => "impor",
            Keyword::SelfKw => "self",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier,
    Number(f64),
    String(String),
    Keyword(Keyword),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    BangEqual,
    EqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    ShiftLeft,
    ShiftRight,
    Eof,
}

impl TokenKind {
    /// Human-readable description used in parse errors.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Identifier => "identifier".into(),
            TokenKind::Number(_) => "number".into(),
            TokenKind::String(_) => "string".into(),
            TokenKind::Keyword(kw) => format!("`{}`", kw.as_str()),
            TokenKind::Eof => "end of input".into(),
            other => format!("`{}`", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Assign => "=",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::StarAssign => "*=",
            TokenKind::SlashAssign => "/=",
            TokenKind::PercentAssign => "%=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::BangEqual => "!=",
            TokenKind::EqualEqual => "==",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Ampersand => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::ShiftLeft => "<<",
            TokenKind::ShiftRight => ">>",
            _ => "?",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: SourceSpan,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>,
    current: usize,
    peeked: Option<(usize, char)>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices(),
            current: 0,
            peeked: None,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = match self.peeked.take() {
            Some(pair) => Some(pair),
            None => self.chars.next(),
        };
        if let Some((idx, ch)) = next {
            self.current = idx + ch.len_utf8();
        }
        next
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    /// Character after the peeked one, without consuming anything.
    fn peek_second(&mut self) -> Option<char> {
        self.peek()?;
        self.chars.clone().next().map(|(_, ch)| ch)
    }

    fn match_next(&mut self, expected: char) -> bool {
        match self.peek() {
            Some((_, ch)) if ch == expected => {
                self.bump();
                true
            }
            _ => false,
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while let Some((_, ch)) = self.peek() {
                if ch.is_whitespace() {
                    self.bump();
                } else {
                    break;
                }
            }

            let is_comment =
                matches!(self.peek(), Some((_, '-'))) && self.peek_second() == Some('-');
            if !is_comment {
                break;
            }
            self.bump();
            self.bump();

            if matches!(self.peek(), Some((_, '['))) && self.peek_second() == Some('[') {
                self.bump();
                self.bump();
                while let Some((_, ch)) = self.bump() {
                    if ch == ']' && matches!(self.peek(), Some((_, ']'))) {
                        self.bump();
                        break;
                    }
                }
            } else {
                while let Some((_, ch)) = self.peek() {
                    if ch == '\n' {
                        break;
                    }
                    self.bump();
                }
            }
        }
    }

    fn identifier_or_keyword(&mut self, start: usize) -> Token {
        while let Some((_, ch)) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let end = self.current;
        let lexeme = self.source[start..end].to_string();
        let kind = keyword_for(&lexeme).unwrap_or(TokenKind::Identifier);
        Token {
            kind,
            lexeme,
            span: SourceSpan { start, end },
        }
    }

    fn number_literal(&mut self, start: usize, first: char) -> Result<Token, Diagnostic> {
        if first == '0' {
            let radix = match self.peek() {
                Some((_, 'x' | 'X')) => Some(16),
                Some((_, 'b' | 'B')) => Some(2),
                Some((_, 'o' | 'O')) => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                self.bump();
                return self.radix_literal(start, radix);
            }
        }

        while let Some((_, ch)) = self.peek() {
            if ch.is_ascii_digit() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        if matches!(self.peek(), Some((_, '.')))
            && self.peek_second().is_some_and(|ch| ch.is_ascii_digit())
        {
            self.bump();
            while let Some((_, ch)) = self.peek() {
                if ch.is_ascii_digit() || ch == '_' {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if let Some((_, 'e' | 'E')) = self.peek() {
            self.bump();
            if let Some((_, '+' | '-')) = self.peek() {
                self.bump();
            }
            while let Some((_, ch)) = self.peek() {
                if ch.is_ascii_digit() {
                    self.bump();
                } else {
                    break;
                }
            }
        }

        let end = self.current;
        let lexeme = self.source[start..end].to_string();
        let cleaned: String = lexeme.chars().filter(|ch| *ch != '_').collect();
        let value = cleaned.parse::<f64>().map_err(|_| {
            Diagnostic::lexer(format!("malformed number literal `{lexeme}`"))
                .with_span(SourceSpan { start, end })
        })?;
        Ok(Token {
            kind: TokenKind::Number(value),
            lexeme,
            span: SourceSpan { start, end },
        })
    }

    fn radix_literal(&mut self, start: usize, radix: u32) -> Result<Token, Diagnostic> {
        let mut digits = String::new();
        while let Some((_, ch)) = self.peek() {
            if ch.is_digit(radix) {
                digits.push(ch);
                self.bump();
            } else if ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let end = self.current;
        let lexeme = self.source[start..end].to_string();
        let value = u64::from_str_radix(&digits, radix).map_err(|_| {
            Diagnostic::lexer(format!("malformed number literal `{lexeme}`"))
                .with_span(SourceSpan { start, end })
        })?;
        Ok(Token {
            kind: TokenKind::Number(value as f64),
            lexeme,
            span: SourceSpan { start, end },
        })
    }

    fn string_literal(&mut self, start: usize) -> Result<Token, Diagnostic> {
        let mut value = String::new();
        while let Some((_, ch)) = self.bump() {
            match ch {
                '"' => {
                    let end = self.current;
                    return Ok(Token {
                        kind: TokenKind::String(value),
                        lexeme: self.source[start..end].to_string(),
                        span: SourceSpan { start, end },
                    });
                }
                '\\' => match self.bump() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, '"')) => value.push('"'),
                    Some((_, '\\')) => value.push('\\'),
                    Some((idx, other)) => {
                        return Err(Diagnostic::lexer(format!(
                            "unknown escape sequence `\\{other}`"
                        ))
                        .with_span(SourceSpan::new(idx - 1, idx + other.len_utf8())));
                    }
                    None => break,
                },
                _ => value.push(ch),
            }
        }
        Err(Diagnostic::lexer("unterminated string literal")
            .with_span(SourceSpan::new(start, self.current)))
    }

    fn simple_token(&mut self, start: usize, kind: TokenKind) -> Token {
        let end = self.current;
        Token {
            kind,
            lexeme: self.source[start..end].to_string(),
            span: SourceSpan { start, end },
        }
    }

    fn with_assign(&mut self, start: usize, plain: TokenKind, compound: TokenKind) -> Token {
        if self.match_next('=') {
            self.simple_token(start, compound)
        } else {
            self.simple_token(start, plain)
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let Some((start, ch)) = self.bump() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    lexeme: String::new(),
                    span: SourceSpan::new(self.current, self.current),
                });
                break;
            };

            let token = match ch {
                c if c.is_alphabetic() || c == '_' => self.identifier_or_keyword(start),
                '0'..='9' => self.number_literal(start, ch)?,
                '"' => self.string_literal(start)?,
                '(' => self.simple_token(start, TokenKind::LParen),
                ')' => self.simple_token(start, TokenKind::RParen),
                '{' => self.simple_token(start, TokenKind::LBrace),
                '}' => self.simple_token(start, TokenKind::RBrace),
                '[' => self.simple_token(start, TokenKind::LBracket),
                ']' => self.simple_token(start, TokenKind::RBracket),
                ',' => self.simple_token(start, TokenKind::Comma),
                '.' => self.simple_token(start, TokenKind::Dot),
                ':' => self.simple_token(start, TokenKind::Colon),
                ';' => self.simple_token(start, TokenKind::Semicolon),
                '+' => self.with_assign(start, TokenKind::Plus, TokenKind::PlusAssign),
                '-' => self.with_assign(start, TokenKind::Minus, TokenKind::MinusAssign),
                '*' => self.with_assign(start, TokenKind::Star, TokenKind::StarAssign),
                '/' => self.with_assign(start, TokenKind::Slash, TokenKind::SlashAssign),
                '%' => self.with_assign(start, TokenKind::Percent, TokenKind::PercentAssign),
                '=' => self.with_assign(start, TokenKind::Assign, TokenKind::EqualEqual),
                '!' => self.with_assign(start, TokenKind::Bang, TokenKind::BangEqual),
                '<' if self.match_next('<') => self.simple_token(start, TokenKind::ShiftLeft),
                '>' if self.match_next('>') => self.simple_token(start, TokenKind::ShiftRight),
                '<' => self.with_assign(start, TokenKind::Less, TokenKind::LessEqual),
                '>' => self.with_assign(start, TokenKind::Greater, TokenKind::GreaterEqual),
                '&' => self.simple_token(start, TokenKind::Ampersand),
                '|' => self.simple_token(start, TokenKind::Pipe),
                '^' => self.simple_token(start, TokenKind::Caret),
                '~' => self.simple_token(start, TokenKind::Tilde),
                other => {
                    return Err(Diagnostic::lexer(format!("unexpected character `{other}`"))
                        .with_span(SourceSpan::new(start, self.current)));
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }
}

/// Convenience wrapper around [`Lexer::tokenize`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostic> {
    Lexer::new(source).tokenize()
}

fn keyword_for(ident: &str) -> Option<TokenKind> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "lokal" => Kw::Lokal,
        "fungsi" => Kw::Fungsi,
        "kembali" => Kw::Kembali,
        "tutup" => Kw::Tutup,
        "jika" => Kw::Jika,
        "maka" => Kw::Maka,
        "kalau" => Kw::Kalau,
        "sebaliknya" => Kw::Sebaliknya,
        "selama" => Kw::Selama,
        "untuk" => Kw::Untuk,
        "ke" => Kw::Ke,
        "langkah" => Kw::Langkah,
        "lakukan" => Kw::Lakukan,
        "kelas" => Kw::Kelas,
        "benar" => Kw::Benar,
        "salah" => Kw::Salah,
        "nil" => Kw::Nil,
        "dan" => Kw::Dan,
        "atau" => Kw::Atau,
        "bukan" => Kw::Bukan,
        "impor" => Kw::Impor,
        "self" => Kw::SelfKw,
        _ => return None,
    };
    Some(TokenKind::Keyword(keyword))
}
