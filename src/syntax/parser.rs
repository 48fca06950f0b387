//! A recursive-descent parser for the Tiger expression language.
//!
//! Precedence, loosest first: assignment, `|`, `&`, comparisons
//! (non-associative), `+` `-`, `*` `/`, unary minus. Unary minus is
//! expressed as `0 - e`, so the rest of the pipeline only ever sees
//! binary operators.
use super::errors::ParseError;
use super::tokenizer::{Location, Token, TokenKind, Tokenizer};
use super::tree::*;
use crate::symbol::Symbol;

const DEBUG: bool = false;

#[derive(Debug)]
pub struct Parser<'a> {
    tokenizer: Tokenizer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(tokenizer: Tokenizer<'a>) -> Self {
        Self { tokenizer }
    }

    pub fn parse_string<S: AsRef<str> + ?Sized>(src: &'a S) -> Result<Expr, ParseError> {
        let tokenizer = Tokenizer::from_string(src);
        let mut parser = Parser::new(tokenizer);

        parser.parse()
    }

    /// Parses a whole program: one expression followed by end of input.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;

        let token = self.tokenizer.next_token()?;
        match token.kind {
            TokenKind::Eos => Ok(expr),
            _ => Err(ParseError::mismatch_token(&token, "end of input")),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.debug_trace("parse_expr");

        let expr = self.parse_or()?;

        if *self.tokenizer.peek_kind()? != TokenKind::Assign {
            return Ok(expr);
        }
        self.tokenizer.next_token()?;

        let loc = expr.loc;
        let var = match expr.kind {
            ExprKind::Var(var) => var,
            _ => return Err(ParseError::syntax_error(loc, "Invalid assignment target")),
        };
        let value = self.parse_expr()?;

        Ok(Expr {
            kind: ExprKind::Assign {
                var,
                value: Box::new(value),
            },
            loc,
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        self.debug_trace("parse_or");

        let mut lhs = self.parse_and()?;
        while *self.tokenizer.peek_kind()? == TokenKind::Char('|') {
            let token = self.tokenizer.next_token()?;
            let rhs = self.parse_and()?;
            lhs = binary(Op::Or, token.loc, lhs, rhs);
        }

        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        self.debug_trace("parse_and");

        let mut lhs = self.parse_comparison()?;
        while *self.tokenizer.peek_kind()? == TokenKind::Char('&') {
            let token = self.tokenizer.next_token()?;
            let rhs = self.parse_comparison()?;
            lhs = binary(Op::And, token.loc, lhs, rhs);
        }

        Ok(lhs)
    }

    /// Comparisons do not associate: `a < b < c` is a syntax error, caught
    /// when the enclosing construct finds the second `<` unconsumed.
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        self.debug_trace("parse_comparison");

        let lhs = self.parse_additive()?;

        let op = match self.tokenizer.peek_kind()? {
            TokenKind::Eq => Op::Eq,
            TokenKind::Neq => Op::Neq,
            TokenKind::Lt => Op::Lt,
            TokenKind::Le => Op::Le,
            TokenKind::Gt => Op::Gt,
            TokenKind::Ge => Op::Ge,
            _ => return Ok(lhs),
        };

        let token = self.tokenizer.next_token()?;
        let rhs = self.parse_additive()?;

        Ok(binary(op, token.loc, lhs, rhs))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        self.debug_trace("parse_additive");

        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.tokenizer.peek_kind()? {
                TokenKind::Char('+') => Op::Plus,
                TokenKind::Char('-') => Op::Minus,
                _ => return Ok(lhs),
            };

            let token = self.tokenizer.next_token()?;
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, token.loc, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.debug_trace("parse_multiplicative");

        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.tokenizer.peek_kind()? {
                TokenKind::Char('*') => Op::Times,
                TokenKind::Char('/') => Op::Divide,
                _ => return Ok(lhs),
            };

            let token = self.tokenizer.next_token()?;
            let rhs = self.parse_unary()?;
            lhs = binary(op, token.loc, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.debug_trace("parse_unary");

        if *self.tokenizer.peek_kind()? != TokenKind::Char('-') {
            return self.parse_primary();
        }

        let token = self.tokenizer.next_token()?;
        let operand = self.parse_unary()?;
        let zero = Expr {
            kind: ExprKind::Int(0),
            loc: token.loc,
        };

        Ok(binary(Op::Minus, token.loc, zero, operand))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        self.debug_trace("parse_primary");

        let token = self.tokenizer.next_token()?;
        let loc = token.loc;

        let kind = match token.kind {
            TokenKind::Int(i) => ExprKind::Int(i),
            TokenKind::Str(s) => ExprKind::Str(Symbol::intern(&s)),
            TokenKind::Nil => ExprKind::Nil,
            TokenKind::Break => ExprKind::Break,
            TokenKind::If => return self.parse_if(loc),
            TokenKind::While => return self.parse_while(loc),
            TokenKind::For => return self.parse_for(loc),
            TokenKind::Let => return self.parse_let(loc),
            TokenKind::Char('(') => return self.parse_parenthesized(loc),
            TokenKind::Ident(name) => {
                return self.parse_ident_expr(Symbol::intern(&name), loc);
            }
            _ => return Err(ParseError::mismatch_token(&token, "an expression")),
        };

        Ok(Expr { kind, loc })
    }

    fn parse_if(&mut self, loc: Location) -> Result<Expr, ParseError> {
        self.debug_trace("parse_if");

        let cond = self.parse_expr()?;
        self.expect(&TokenKind::Then)?;
        let then = self.parse_expr()?;

        let else_ = if *self.tokenizer.peek_kind()? == TokenKind::Else {
            self.tokenizer.next_token()?;
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };

        Ok(Expr {
            kind: ExprKind::If {
                cond: Box::new(cond),
                then: Box::new(then),
                else_,
            },
            loc,
        })
    }

    fn parse_while(&mut self, loc: Location) -> Result<Expr, ParseError> {
        self.debug_trace("parse_while");

        let cond = self.parse_expr()?;
        self.expect(&TokenKind::Do)?;
        let body = self.parse_expr()?;

        Ok(Expr {
            kind: ExprKind::While {
                cond: Box::new(cond),
                body: Box::new(body),
            },
            loc,
        })
    }

    fn parse_for(&mut self, loc: Location) -> Result<Expr, ParseError> {
        self.debug_trace("parse_for");

        let (var, _) = self.expect_ident()?;
        self.expect(&TokenKind::Assign)?;
        let lo = self.parse_expr()?;
        self.expect(&TokenKind::To)?;
        let hi = self.parse_expr()?;
        self.expect(&TokenKind::Do)?;
        let body = self.parse_expr()?;

        Ok(Expr {
            kind: ExprKind::For {
                var,
                lo: Box::new(lo),
                hi: Box::new(hi),
                body: Box::new(body),
            },
            loc,
        })
    }

    fn parse_let(&mut self, loc: Location) -> Result<Expr, ParseError> {
        self.debug_trace("parse_let");

        let decs = self.parse_decs()?;
        self.expect(&TokenKind::In)?;
        let body_loc = self.tokenizer.peek()?.loc;
        let exprs = self.parse_expr_seq(&TokenKind::End)?;
        self.expect(&TokenKind::End)?;

        Ok(Expr {
            kind: ExprKind::Let {
                decs,
                body: Box::new(seq_to_expr(exprs, body_loc)),
            },
            loc,
        })
    }

    /// `()`, `(e)`, or `(e1; e2; …)`.
    fn parse_parenthesized(&mut self, loc: Location) -> Result<Expr, ParseError> {
        self.debug_trace("parse_parenthesized");

        let exprs = self.parse_expr_seq(&TokenKind::Char(')'))?;
        self.expect(&TokenKind::Char(')'))?;

        Ok(seq_to_expr(exprs, loc))
    }

    /// Expressions separated by `;`, stopping before `terminator`.
    fn parse_expr_seq(&mut self, terminator: &TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = vec![];

        if *self.tokenizer.peek_kind()? == *terminator {
            return Ok(exprs);
        }

        loop {
            exprs.push(self.parse_expr()?);
            if !self.eat_char(';')? {
                return Ok(exprs);
            }
        }
    }

    /// An expression starting with an identifier: a call `f(…)`, a record
    /// literal `T { … }`, an array literal `T [n] of v`, or an l-value.
    fn parse_ident_expr(&mut self, sym: Symbol, loc: Location) -> Result<Expr, ParseError> {
        self.debug_trace("parse_ident_expr");

        match self.tokenizer.peek_kind()? {
            TokenKind::Char('(') => {
                self.tokenizer.next_token()?;
                let args = self.parse_call_args()?;
                self.expect(&TokenKind::Char(')'))?;

                Ok(Expr {
                    kind: ExprKind::Call { func: sym, args },
                    loc,
                })
            }
            TokenKind::Char('{') => {
                self.tokenizer.next_token()?;
                let fields = self.parse_field_inits()?;
                self.expect(&TokenKind::Char('}'))?;

                Ok(Expr {
                    kind: ExprKind::Record {
                        type_id: sym,
                        fields,
                    },
                    loc,
                })
            }
            TokenKind::Char('[') => {
                // `T [size] of init` and `a[index]` share their first four
                // tokens; the `of` keyword settles which one it was.
                self.tokenizer.next_token()?;
                let size = self.parse_expr()?;
                self.expect(&TokenKind::Char(']'))?;

                if *self.tokenizer.peek_kind()? == TokenKind::Of {
                    self.tokenizer.next_token()?;
                    let init = self.parse_expr()?;

                    return Ok(Expr {
                        kind: ExprKind::Array {
                            type_id: sym,
                            size: Box::new(size),
                            init: Box::new(init),
                        },
                        loc,
                    });
                }

                let var = Var {
                    kind: VarKind::Index(
                        Box::new(Var {
                            kind: VarKind::Simple(sym),
                            loc,
                        }),
                        Box::new(size),
                    ),
                    loc,
                };
                self.parse_lvalue_suffix(var)
            }
            _ => self.parse_lvalue_suffix(Var {
                kind: VarKind::Simple(sym),
                loc,
            }),
        }
    }

    fn parse_lvalue_suffix(&mut self, mut var: Var) -> Result<Expr, ParseError> {
        let loc = var.loc;

        loop {
            match self.tokenizer.peek_kind()? {
                TokenKind::Char('.') => {
                    self.tokenizer.next_token()?;
                    let (field, _) = self.expect_ident()?;
                    var = Var {
                        kind: VarKind::Field(Box::new(var), field),
                        loc,
                    };
                }
                TokenKind::Char('[') => {
                    self.tokenizer.next_token()?;
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::Char(']'))?;
                    var = Var {
                        kind: VarKind::Index(Box::new(var), Box::new(index)),
                        loc,
                    };
                }
                _ => {
                    return Ok(Expr {
                        kind: ExprKind::Var(var),
                        loc,
                    });
                }
            }
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = vec![];

        if *self.tokenizer.peek_kind()? == TokenKind::Char(')') {
            return Ok(args);
        }

        loop {
            args.push(self.parse_expr()?);
            if !self.eat_char(',')? {
                return Ok(args);
            }
        }
    }

    fn parse_field_inits(&mut self) -> Result<Vec<FieldInit>, ParseError> {
        let mut fields = vec![];

        if *self.tokenizer.peek_kind()? == TokenKind::Char('}') {
            return Ok(fields);
        }

        loop {
            let (name, loc) = self.expect_ident()?;
            self.expect(&TokenKind::Eq)?;
            let value = self.parse_expr()?;
            fields.push(FieldInit { name, value, loc });

            if !self.eat_char(',')? {
                return Ok(fields);
            }
        }
    }

    // --- Declarations

    fn parse_decs(&mut self) -> Result<Vec<Dec>, ParseError> {
        let mut decs = vec![];

        loop {
            match self.tokenizer.peek_kind()? {
                TokenKind::Type => decs.push(Dec::Types(self.parse_type_decs()?)),
                TokenKind::Function => decs.push(Dec::Functions(self.parse_fun_decs()?)),
                TokenKind::Var => decs.push(Dec::Var(self.parse_var_dec()?)),
                _ => return Ok(decs),
            }
        }
    }

    /// Adjacent `type` declarations form one mutually recursive group.
    fn parse_type_decs(&mut self) -> Result<Vec<TypeDec>, ParseError> {
        self.debug_trace("parse_type_decs");

        let mut decs = vec![];
        while *self.tokenizer.peek_kind()? == TokenKind::Type {
            let loc = self.tokenizer.next_token()?.loc;
            let (name, _) = self.expect_ident()?;
            self.expect(&TokenKind::Eq)?;
            let ty = self.parse_ty()?;

            decs.push(TypeDec { name, ty, loc });
        }

        Ok(decs)
    }

    /// Adjacent `function` declarations form one mutually recursive group.
    fn parse_fun_decs(&mut self) -> Result<Vec<FunDec>, ParseError> {
        self.debug_trace("parse_fun_decs");

        let mut decs = vec![];
        while *self.tokenizer.peek_kind()? == TokenKind::Function {
            let loc = self.tokenizer.next_token()?.loc;
            let (name, _) = self.expect_ident()?;
            self.expect(&TokenKind::Char('('))?;
            let params = self.parse_type_fields()?;
            self.expect(&TokenKind::Char(')'))?;

            let result = if self.eat_char(':')? {
                let (sym, loc) = self.expect_ident()?;
                Some(SymbolLoc { sym, loc })
            } else {
                None
            };

            self.expect(&TokenKind::Eq)?;
            let body = self.parse_expr()?;

            decs.push(FunDec {
                name,
                params,
                result,
                body,
                loc,
            });
        }

        Ok(decs)
    }

    fn parse_var_dec(&mut self) -> Result<VarDec, ParseError> {
        self.debug_trace("parse_var_dec");

        let loc = self.tokenizer.next_token()?.loc; // `var`
        let (name, _) = self.expect_ident()?;

        let type_id = if self.eat_char(':')? {
            let (sym, loc) = self.expect_ident()?;
            Some(SymbolLoc { sym, loc })
        } else {
            None
        };

        self.expect(&TokenKind::Assign)?;
        let init = self.parse_expr()?;

        Ok(VarDec {
            name,
            type_id,
            init,
            loc,
        })
    }

    fn parse_ty(&mut self) -> Result<Ty, ParseError> {
        self.debug_trace("parse_ty");

        let token = self.tokenizer.next_token()?;
        let loc = token.loc;

        let kind = match token.kind {
            TokenKind::Ident(name) => TyKind::Name(Symbol::intern(&name)),
            TokenKind::Char('{') => {
                let fields = self.parse_type_fields()?;
                self.expect(&TokenKind::Char('}'))?;
                TyKind::Record(fields)
            }
            TokenKind::Array => {
                self.expect(&TokenKind::Of)?;
                let (element, _) = self.expect_ident()?;
                TyKind::Array(element)
            }
            _ => return Err(ParseError::mismatch_token(&token, "a type")),
        };

        Ok(Ty { kind, loc })
    }

    /// `name: type, …` — record type fields and function parameters.
    fn parse_type_fields(&mut self) -> Result<Vec<TypeField>, ParseError> {
        let mut fields = vec![];

        if !matches!(self.tokenizer.peek_kind()?, TokenKind::Ident(_)) {
            return Ok(fields);
        }

        loop {
            let (name, loc) = self.expect_ident()?;
            self.expect(&TokenKind::Char(':'))?;
            let (type_id, _) = self.expect_ident()?;
            fields.push(TypeField { name, type_id, loc });

            if !self.eat_char(',')? {
                return Ok(fields);
            }
        }
    }

    // --- Helpers

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        let token = self.tokenizer.next_token()?;
        if token.kind == *kind {
            Ok(token)
        } else {
            Err(ParseError::mismatch_token(&token, format!("'{}'", kind)))
        }
    }

    fn expect_ident(&mut self) -> Result<(Symbol, Location), ParseError> {
        let token = self.tokenizer.next_token()?;
        match token.kind {
            TokenKind::Ident(name) => Ok((Symbol::intern(&name), token.loc)),
            _ => Err(ParseError::mismatch_token(&token, "an identifier")),
        }
    }

    fn eat_char(&mut self, c: char) -> Result<bool, ParseError> {
        if *self.tokenizer.peek_kind()? == TokenKind::Char(c) {
            self.tokenizer.next_token()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn debug_trace(&self, name: &str) {
        if DEBUG {
            eprintln!(
                "[{}] location: {}",
                name,
                self.tokenizer.current_location()
            );
        }
    }
}

fn binary(op: Op, loc: Location, lhs: Expr, rhs: Expr) -> Expr {
    Expr {
        kind: ExprKind::Op {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        loc,
    }
}

fn seq_to_expr(mut exprs: Vec<Expr>, loc: Location) -> Expr {
    match exprs.len() {
        0 => Expr {
            kind: ExprKind::Unit,
            loc,
        },
        1 => exprs.remove(0),
        _ => Expr {
            kind: ExprKind::Seq(exprs),
            loc,
        },
    }
}
