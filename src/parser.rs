use std::rc::Rc;

use crate::{
    ast::{
        BinaryOp, Expr, ExprKind, FunctionDecl, IfBranch, Literal, Program, Stmt, StmtKind,
        UnaryOp,
    },
    diagnostics::{Diagnostic, SourceSpan},
    lexer::{Keyword, Lexer, Token, TokenKind},
    stack::ensure_sufficient_stack,
};

pub fn parse_program(source: &str) -> Result<Program, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

/// Parses an already tokenized source.
pub fn parse(tokens: Vec<Token>) -> Result<Program, Diagnostic> {
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let end = tokens.last().map(|t| t.span.end).unwrap_or(0);
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                span: SourceSpan::new(end, end),
            });
        }
        Self { tokens, current: 0 }
    }

    fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut items = Vec::new();
        while !self.is_at_end() {
            if self.at_block_end() {
                let token = self.peek().clone();
                return Err(self.error(
                    &token,
                    &format!("unexpected {}", token.kind.describe()),
                ));
            }
            items.push(self.parse_statement()?);
        }
        Ok(Program { items })
    }

    /// Statements up to (not including) `tutup`, `kalau`, `sebaliknya` or end of input.
    fn parse_block_items(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        let mut items = Vec::new();
        while !self.at_block_end() {
            items.push(ensure_sufficient_stack(|| self.parse_statement())?);
        }
        Ok(items)
    }

    fn at_block_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Keyword(Keyword::Tutup | Keyword::Kalau | Keyword::Sebaliknya)
                | TokenKind::Eof
        )
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let stmt = match self.peek().kind {
            TokenKind::Keyword(Keyword::Lokal) => self.parse_local()?,
            TokenKind::Keyword(Keyword::Fungsi)
                if matches!(self.peek_next().map(|t| &t.kind), Some(TokenKind::Identifier)) =>
            {
                let keyword = self.advance();
                self.parse_function_statement(keyword.span.start)?
            }
            TokenKind::Keyword(Keyword::Kelas) => self.parse_class()?,
            TokenKind::Keyword(Keyword::Jika) => self.parse_if()?,
            TokenKind::Keyword(Keyword::Selama) => self.parse_while()?,
            TokenKind::Keyword(Keyword::Untuk) => self.parse_for()?,
            TokenKind::Keyword(Keyword::Lakukan) => self.parse_do_block()?,
            TokenKind::Keyword(Keyword::Kembali) => self.parse_return()?,
            _ => self.parse_expression_statement()?,
        };
        self.consume_optional_semicolon();
        Ok(stmt)
    }

    fn parse_local(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Lokal)?.span.start;
        if self.matches_keyword(Keyword::Fungsi) {
            return self.parse_function_statement(start);
        }
        let name_token = self.consume_identifier("expected variable name after `lokal`")?;
        let mut end = name_token.span.end;
        let initializer = if self.matches(TokenKind::Assign) {
            let expr = self.parse_expression()?;
            end = expr.span.end;
            Some(expr)
        } else {
            None
        };
        Ok(Stmt {
            span: SourceSpan { start, end },
            kind: StmtKind::Local {
                name: name_token.lexeme,
                initializer,
            },
        })
    }

    /// `fungsi` has already been consumed; `start` is where the statement began.
    fn parse_function_statement(&mut self, start: usize) -> Result<Stmt, Diagnostic> {
        let decl = self.parse_function_decl(start, true)?;
        Ok(Stmt {
            span: decl.span,
            kind: StmtKind::Function(decl),
        })
    }

    fn parse_function_decl(
        &mut self,
        start: usize,
        named: bool,
    ) -> Result<Rc<FunctionDecl>, Diagnostic> {
        let name = if named {
            Some(self.consume_identifier("expected function name")?.lexeme)
        } else {
            None
        };
        self.consume(TokenKind::LParen, "expected `(` before parameter list")?;
        let mut params: Vec<String> = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let param = self.consume_identifier("expected parameter name")?;
                if params.contains(&param.lexeme) {
                    return Err(self.error(
                        &param,
                        &format!("duplicate parameter `{}`", param.lexeme),
                    ));
                }
                params.push(param.lexeme);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected `)` after parameters")?;
        let body = self.parse_block_items()?;
        let end = self.consume_keyword(Keyword::Tutup)?.span.end;
        Ok(Rc::new(FunctionDecl {
            name,
            params,
            body,
            span: SourceSpan { start, end },
        }))
    }

    fn parse_class(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Kelas)?.span.start;
        let name = self.consume_identifier("expected class name after `kelas`")?;
        self.matches_keyword(Keyword::Maka);
        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();
        while !self.check_keyword(Keyword::Tutup) {
            let keyword = self.consume_keyword(Keyword::Fungsi)?;
            let method = self.parse_function_decl(keyword.span.start, true)?;
            self.consume_optional_semicolon();
            methods.push(method);
        }
        let end = self.consume_keyword(Keyword::Tutup)?.span.end;
        Ok(Stmt {
            span: SourceSpan { start, end },
            kind: StmtKind::Class {
                name: name.lexeme,
                methods,
            },
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Jika)?.span.start;
        let mut branches = vec![self.parse_if_branch()?];
        let mut else_branch = None;
        loop {
            if self.matches_keyword(Keyword::Kalau) {
                branches.push(self.parse_if_branch()?);
            } else if self.matches_keyword(Keyword::Sebaliknya) {
                if self.matches_keyword(Keyword::Jika) {
                    branches.push(self.parse_if_branch()?);
                    continue;
                }
                else_branch = Some(self.parse_block_items()?);
                break;
            } else {
                break;
            }
        }
        let end = self.consume_keyword(Keyword::Tutup)?.span.end;
        Ok(Stmt {
            span: SourceSpan { start, end },
            kind: StmtKind::If {
                branches,
                else_branch,
            },
        })
    }

    fn parse_if_branch(&mut self) -> Result<IfBranch, Diagnostic> {
        let condition = self.parse_expression()?;
        self.matches_keyword(Keyword::Maka);
        let body = self.parse_block_items()?;
        Ok(IfBranch { condition, body })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Selama)?.span.start;
        let condition = self.parse_expression()?;
        self.consume_keyword(Keyword::Lakukan)?;
        let body = self.parse_block_items()?;
        let end = self.consume_keyword(Keyword::Tutup)?.span.end;
        Ok(Stmt {
            span: SourceSpan { start, end },
            kind: StmtKind::While { condition, body },
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Untuk)?.span.start;
        let binding = self.consume_identifier("expected loop variable after `untuk`")?;
        self.consume(TokenKind::Assign, "expected `=` after loop variable")?;
        let from = self.parse_expression()?;
        self.consume_keyword(Keyword::Ke)?;
        let to = self.parse_expression()?;
        let step = if self.matches_keyword(Keyword::Langkah) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume_keyword(Keyword::Lakukan)?;
        let body = self.parse_block_items()?;
        let end = self.consume_keyword(Keyword::Tutup)?.span.end;
        Ok(Stmt {
            span: SourceSpan { start, end },
            kind: StmtKind::For {
                binding: binding.lexeme,
                start: from,
                end: to,
                step,
                body,
            },
        })
    }

    fn parse_do_block(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Lakukan)?.span.start;
        let items = self.parse_block_items()?;
        let end = self.consume_keyword(Keyword::Tutup)?.span.end;
        Ok(Stmt {
            span: SourceSpan { start, end },
            kind: StmtKind::Block(items),
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.consume_keyword(Keyword::Kembali)?;
        let ends_statement = self.at_block_end()
            || matches!(
                self.peek().kind,
                TokenKind::Semicolon
                    | TokenKind::Keyword(
                        Keyword::Lokal
                            | Keyword::Jika
                            | Keyword::Selama
                            | Keyword::Untuk
                            | Keyword::Lakukan
                            | Keyword::Kelas
                            | Keyword::Kembali
                    )
            );
        if ends_statement {
            return Ok(Stmt {
                span: keyword.span,
                kind: StmtKind::Return(None),
            });
        }
        let value = self.parse_expression()?;
        Ok(Stmt {
            span: keyword.span.to(value.span),
            kind: StmtKind::Return(Some(value)),
        })
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let expr = self.parse_expression()?;
        Ok(Stmt {
            span: expr.span,
            kind: StmtKind::Expr(expr),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        ensure_sufficient_stack(|| self.parse_assignment())
    }

    fn parse_assignment(&mut self) -> Result<Expr, Diagnostic> {
        let expr = self.parse_or()?;
        let compound = match self.peek().kind {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(BinaryOp::Add),
            TokenKind::MinusAssign => Some(BinaryOp::Sub),
            TokenKind::StarAssign => Some(BinaryOp::Mul),
            TokenKind::SlashAssign => Some(BinaryOp::Div),
            TokenKind::PercentAssign => Some(BinaryOp::Mod),
            _ => return Ok(expr),
        };
        let operator = self.advance();
        if !matches!(
            expr.kind,
            ExprKind::Variable(_) | ExprKind::Index { .. } | ExprKind::Member { .. }
        ) {
            return Err(self.error(&operator, "invalid assignment target"));
        }
        let rhs = self.parse_assignment()?;
        let span = expr.span.to(rhs.span);
        let value = match compound {
            None => rhs,
            Some(op) => Expr {
                span,
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(expr.clone()),
                    right: Box::new(rhs),
                },
            },
        };
        Ok(Expr {
            span,
            kind: ExprKind::Assign {
                target: Box::new(expr),
                value: Box::new(value),
            },
        })
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_and()?;
        while self.matches_keyword(Keyword::Atau) {
            let right = self.parse_and()?;
            expr = binary(BinaryOp::Or, expr, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_bit_or()?;
        while self.matches_keyword(Keyword::Dan) {
            let right = self.parse_bit_or()?;
            expr = binary(BinaryOp::And, expr, right);
        }
        Ok(expr)
    }

    fn parse_bit_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_bit_xor()?;
        while self.matches(TokenKind::Pipe) {
            let right = self.parse_bit_xor()?;
            expr = binary(BinaryOp::BitOr, expr, right);
        }
        Ok(expr)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_bit_and()?;
        while self.matches(TokenKind::Caret) {
            let right = self.parse_bit_and()?;
            expr = binary(BinaryOp::BitXor, expr, right);
        }
        Ok(expr)
    }

    fn parse_bit_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_equality()?;
        while self.matches(TokenKind::Ampersand) {
            let right = self.parse_equality()?;
            expr = binary(BinaryOp::BitAnd, expr, right);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_comparison()?;
        while let Some(op) = self.match_operator(&[
            (TokenKind::EqualEqual, BinaryOp::Equal),
            (TokenKind::BangEqual, BinaryOp::NotEqual),
        ]) {
            let right = self.parse_comparison()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_shift()?;
        while let Some(op) = self.match_operator(&[
            (TokenKind::LessEqual, BinaryOp::LessEqual),
            (TokenKind::GreaterEqual, BinaryOp::GreaterEqual),
            (TokenKind::Less, BinaryOp::Less),
            (TokenKind::Greater, BinaryOp::Greater),
        ]) {
            let right = self.parse_shift()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_shift(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_term()?;
        while let Some(op) = self.match_operator(&[
            (TokenKind::ShiftLeft, BinaryOp::ShiftLeft),
            (TokenKind::ShiftRight, BinaryOp::ShiftRight),
        ]) {
            let right = self.parse_term()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_factor()?;
        while let Some(op) = self.match_operator(&[
            (TokenKind::Plus, BinaryOp::Add),
            (TokenKind::Minus, BinaryOp::Sub),
        ]) {
            let right = self.parse_factor()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_unary()?;
        while let Some(op) = self.match_operator(&[
            (TokenKind::Star, BinaryOp::Mul),
            (TokenKind::Slash, BinaryOp::Div),
            (TokenKind::Percent, BinaryOp::Mod),
        ]) {
            let right = self.parse_unary()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Bang | TokenKind::Keyword(Keyword::Bukan) => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::BitNot,
            _ => return self.parse_postfix(),
        };
        let operator = self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr {
            span: operator.span.to(operand.span),
            kind: ExprKind::Unary {
                op,
                expr: Box::new(operand),
            },
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(TokenKind::LParen) {
                let args = self.parse_arguments()?;
                let paren = self.consume(TokenKind::RParen, "expected `)` after arguments")?;
                expr = Expr {
                    span: expr.span.to(paren.span),
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
            } else if self.matches(TokenKind::LBracket) {
                expr = self.parse_index_or_slice(expr)?;
            } else if self.matches(TokenKind::Dot) {
                let ident = self.consume_identifier("expected member name after `.`")?;
                expr = Expr {
                    span: expr.span.to(ident.span),
                    kind: ExprKind::Member {
                        target: Box::new(expr),
                        name: ident.lexeme,
                    },
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, Diagnostic> {
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        Ok(args)
    }

    /// `[` has been consumed.
    fn parse_index_or_slice(&mut self, target: Expr) -> Result<Expr, Diagnostic> {
        let start = if self.check(&TokenKind::Colon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        if self.matches(TokenKind::Colon) {
            let end = if self.check(&TokenKind::RBracket) {
                None
            } else {
                Some(Box::new(self.parse_expression()?))
            };
            let bracket = self.consume(TokenKind::RBracket, "expected `]` after slice")?;
            return Ok(Expr {
                span: target.span.to(bracket.span),
                kind: ExprKind::Slice {
                    target: Box::new(target),
                    start: start.map(Box::new),
                    end,
                },
            });
        }
        let bracket = self.consume(TokenKind::RBracket, "expected `]` after index")?;
        let Some(index) = start else {
            return Err(self.error(&bracket, "expected index expression"));
        };
        Ok(Expr {
            span: target.span.to(bracket.span),
            kind: ExprKind::Index {
                target: Box::new(target),
                index: Box::new(index),
            },
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::Number(value) => ExprKind::Literal(Literal::Number(value)),
            TokenKind::String(ref text) => ExprKind::Literal(Literal::String(text.clone())),
            TokenKind::Keyword(Keyword::Benar) => ExprKind::Literal(Literal::Bool(true)),
            TokenKind::Keyword(Keyword::Salah) => ExprKind::Literal(Literal::Bool(false)),
            TokenKind::Keyword(Keyword::Nil) => ExprKind::Literal(Literal::Nil),
            TokenKind::Keyword(Keyword::SelfKw) => ExprKind::SelfRef,
            TokenKind::Identifier => ExprKind::Variable(token.lexeme.clone()),
            TokenKind::LParen => {
                let inner = self.parse_expression()?;
                let paren = self.consume(TokenKind::RParen, "expected `)` after expression")?;
                return Ok(Expr {
                    span: token.span.to(paren.span),
                    kind: ExprKind::Group(Box::new(inner)),
                });
            }
            TokenKind::LBracket => {
                let mut elements = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    elements.push(self.parse_expression()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
                let bracket =
                    self.consume(TokenKind::RBracket, "expected `]` after array elements")?;
                return Ok(Expr {
                    span: token.span.to(bracket.span),
                    kind: ExprKind::ArrayLiteral(elements),
                });
            }
            TokenKind::LBrace => {
                let mut entries = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    let key = self.consume_identifier("expected object key")?;
                    self.consume(TokenKind::Colon, "expected `:` after object key")?;
                    entries.push((key.lexeme, self.parse_expression()?));
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
                let brace = self.consume(TokenKind::RBrace, "expected `}` after object entries")?;
                return Ok(Expr {
                    span: token.span.to(brace.span),
                    kind: ExprKind::ObjectLiteral(entries),
                });
            }
            TokenKind::Keyword(Keyword::Fungsi) => {
                let decl = self.parse_function_decl(token.span.start, false)?;
                return Ok(Expr {
                    span: decl.span,
                    kind: ExprKind::Function(decl),
                });
            }
            TokenKind::Keyword(Keyword::Impor) => {
                self.consume(TokenKind::LParen, "expected `(` after `impor`")?;
                let name = self.parse_expression()?;
                let paren = self.consume(TokenKind::RParen, "expected `)` after module name")?;
                return Ok(Expr {
                    span: token.span.to(paren.span),
                    kind: ExprKind::Import(Box::new(name)),
                });
            }
            ref other => {
                return Err(self.error(
                    &token,
                    &format!("expected expression, found {}", other.describe()),
                ));
            }
        };
        Ok(Expr {
            span: token.span,
            kind,
        })
    }

    fn match_operator(&mut self, table: &[(TokenKind, BinaryOp)]) -> Option<BinaryOp> {
        let op = table
            .iter()
            .find(|(kind, _)| self.check(kind))
            .map(|(_, op)| *op)?;
        self.advance();
        Some(op)
    }

    fn consume_optional_semicolon(&mut self) {
        while self.matches(TokenKind::Semicolon) {}
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(&kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            let token = self.peek().clone();
            Err(self.expected(&token, message))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        if self.check_keyword(keyword) {
            Ok(self.advance())
        } else {
            let token = self.peek().clone();
            Err(self.expected(&token, &format!("expected `{}`", keyword.as_str())))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, Diagnostic> {
        if self.check(&TokenKind::Identifier) {
            Ok(self.advance())
        } else {
            let token = self.peek().clone();
            Err(self.expected(&token, message))
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek().kind == TokenKind::Keyword(keyword)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.current.min(last)]
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        Diagnostic::parser(message.to_string()).with_span(token.span)
    }

    fn expected(&self, token: &Token, message: &str) -> Diagnostic {
        Diagnostic::parser(format!("{message}, found {}", token.kind.describe()))
            .with_span(token.span)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr {
        span: left.span.to(right.span),
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}
