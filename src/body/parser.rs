//! AST and recursive-descent / Pratt parser for the node body language
//!
//! Expression bodies are a single expression. Script bodies are a statement
//! block: `let` bindings, assignments to declared outputs, and `if`/`else`.

use crate::error::CompileError;

use super::lexer::{tokenize, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Boolean(bool),
    Text(String),
    Var(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `cond ? a : b`
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let { name: String, expr: Expr },
    Assign { name: String, expr: Expr },
    If {
        cond: Expr,
        then: Block,
        otherwise: Option<Block>,
    },
}

pub type Block = Vec<Stmt>;

/// Parse a single expression (expression-map body form).
pub fn parse_expression(source: &str) -> Result<Expr, CompileError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr(0)?;
    parser.expect(TokenKind::Eof)?;
    Ok(expr)
}

/// Parse a statement block (script body form).
pub fn parse_script(source: &str) -> Result<Block, CompileError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let block = parser.stmts_until(TokenKind::Eof)?;
    Ok(block)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), CompileError> {
        let token = self.peek();
        if token.kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(CompileError::Parse {
                offset: token.offset,
                message: format!("expected {}, found {}", kind.describe(), token.kind.describe()),
            })
        }
    }

    fn unexpected(&self, context: &str) -> CompileError {
        let token = self.peek();
        CompileError::Parse {
            offset: token.offset,
            message: format!("expected {}, found {}", context, token.kind.describe()),
        }
    }

    // ---- statements -----------------------------------------------------

    fn stmts_until(&mut self, terminator: TokenKind) -> Result<Block, CompileError> {
        let mut stmts = Vec::new();
        while self.peek().kind != terminator {
            stmts.push(self.stmt()?);
        }
        self.expect(terminator)?;
        Ok(stmts)
    }

    fn stmt(&mut self) -> Result<Stmt, CompileError> {
        match self.peek().kind.clone() {
            TokenKind::Let => {
                self.advance();
                let name = self.ident("binding name after 'let'")?;
                self.expect(TokenKind::Assign)?;
                let expr = self.expr(0)?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Let { name, expr })
            }
            TokenKind::If => {
                self.advance();
                self.if_tail()
            }
            TokenKind::Ident(name) => {
                self.advance();
                self.expect(TokenKind::Assign)?;
                let expr = self.expr(0)?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Assign { name, expr })
            }
            _ => Err(self.unexpected("a statement ('let', 'if', or an assignment)")),
        }
    }

    fn if_tail(&mut self) -> Result<Stmt, CompileError> {
        let cond = self.expr(0)?;
        self.expect(TokenKind::LBrace)?;
        let then = self.stmts_until(TokenKind::RBrace)?;
        let otherwise = if self.eat(&TokenKind::Else) {
            if self.peek().kind == TokenKind::If {
                self.advance();
                // else-if chain desugars to a nested single-statement block
                Some(vec![self.if_tail()?])
            } else {
                self.expect(TokenKind::LBrace)?;
                Some(self.stmts_until(TokenKind::RBrace)?)
            }
        } else {
            None
        };
        Ok(Stmt::If { cond, then, otherwise })
    }

    fn ident(&mut self, context: &str) -> Result<String, CompileError> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(context)),
        }
    }

    // ---- expressions (Pratt) --------------------------------------------

    fn expr(&mut self, min_bp: u8) -> Result<Expr, CompileError> {
        let mut lhs = self.prefix()?;

        loop {
            // Ternary binds loosest and is right-associative.
            if min_bp == 0 && self.peek().kind == TokenKind::Question {
                self.advance();
                let then = self.expr(0)?;
                self.expect(TokenKind::Colon)?;
                let otherwise = self.expr(0)?;
                lhs = Expr::Ternary {
                    cond: Box::new(lhs),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                };
                continue;
            }

            let Some((op, lbp, rbp)) = binary_op(&self.peek().kind) else {
                break;
            };
            if lbp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.expr(rbp)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, CompileError> {
        match self.peek().kind.clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Boolean(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Boolean(false))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Text(s))
            }
            TokenKind::Minus => {
                self.advance();
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(self.expr(UNARY_BP)?),
                })
            }
            TokenKind::Bang => {
                self.advance();
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(self.expr(UNARY_BP)?),
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr(0)?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.eat(&TokenKind::LParen) {
                    let mut args = Vec::new();
                    if self.peek().kind != TokenKind::RParen {
                        loop {
                            args.push(self.expr(0)?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}

const UNARY_BP: u8 = 15;

/// (operator, left binding power, right binding power)
fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8, u8)> {
    Some(match kind {
        TokenKind::OrOr => (BinaryOp::Or, 1, 2),
        TokenKind::AndAnd => (BinaryOp::And, 3, 4),
        TokenKind::Eq => (BinaryOp::Eq, 5, 6),
        TokenKind::NotEq => (BinaryOp::NotEq, 5, 6),
        TokenKind::Lt => (BinaryOp::Lt, 7, 8),
        TokenKind::LtEq => (BinaryOp::LtEq, 7, 8),
        TokenKind::Gt => (BinaryOp::Gt, 7, 8),
        TokenKind::GtEq => (BinaryOp::GtEq, 7, 8),
        TokenKind::Plus => (BinaryOp::Add, 9, 10),
        TokenKind::Minus => (BinaryOp::Sub, 9, 10),
        TokenKind::Star => (BinaryOp::Mul, 11, 12),
        TokenKind::Slash => (BinaryOp::Div, 11, 12),
        TokenKind::Percent => (BinaryOp::Rem, 11, 12),
        // Right-associative
        TokenKind::Caret => (BinaryOp::Pow, 14, 13),
        _ => return None,
    })
}
