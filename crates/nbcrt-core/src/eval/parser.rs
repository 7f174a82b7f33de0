// ── Expression parser ──
//
// `chumsky` pratt parser over the token stream from `lexer.rs`. Function
// names and arities, plus literal `matches` patterns, are checked here so a
// bad expression fails once at compile time instead of on every device.

use chumsky::{input::ValueInput, pratt::*, prelude::*};
use regex::Regex;
use serde_json::Value;

use super::EvalError;
use super::functions::Function;
use super::lexer::{Token, syntax_error, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Coalesce,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `matches` against a literal pattern, compiled once.
    Regex(Box<Expr>, Regex),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

// Binding powers, lowest first.
const TERNARY: u16 = 1;
const COALESCE: u16 = 2;
const OR: u16 = 3;
const AND: u16 = 4;
const EQUALITY: u16 = 5;
const RELATIONAL: u16 = 6;
const ADDITIVE: u16 = 7;
const MULTIPLICATIVE: u16 = 8;
const PREFIX: u16 = 9;

/// Trailing `.field` or `[index]`.
enum Access {
    Member(String),
    Index(Expr),
}

fn binary(lhs: Expr, op: BinaryOp, rhs: Expr) -> Expr {
    Expr::Binary(op, Box::new(lhs), Box::new(rhs))
}

/// Compile expression source into an AST.
pub fn parse(source: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(EvalError::Syntax {
            offset: 0,
            message: "empty expression".into(),
        });
    }

    let eoi = SimpleSpan::from(source.len()..source.len());
    let input = tokens.as_slice().map(eoi, |(token, span)| (token, span));
    parser().parse(input).into_result().map_err(syntax_error)
}

fn parser<'src, I>() -> impl Parser<'src, I, Expr, extra::Err<Rich<'src, Token>>> + Clone
where
    I: ValueInput<'src, Token = Token, Span = SimpleSpan>,
{
    recursive(|expr| {
        let literal = select! {
            Token::Str(s) => Expr::Literal(Value::String(s)),
            Token::Int(n) => Expr::Literal(Value::from(n)),
            Token::Float(n) => Expr::Literal(Value::from(n)),
            Token::True => Expr::Literal(Value::Bool(true)),
            Token::False => Expr::Literal(Value::Bool(false)),
            Token::Nil => Expr::Literal(Value::Null),
        };
        let ident = select! { Token::Ident(name) => name };
        let pattern = select! { Token::Str(pattern) => pattern };

        let items = expr
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>();

        let call_or_ident = ident
            .clone()
            .then(
                items
                    .clone()
                    .delimited_by(just(Token::LParen), just(Token::RParen))
                    .or_not(),
            )
            .try_map(|(name, args), span| {
                let Some(args) = args else {
                    return Ok(Expr::Ident(name));
                };
                let function = Function::lookup(&name)
                    .ok_or_else(|| Rich::custom(span, format!("unknown function '{name}'")))?;
                function
                    .check_arity(args.len())
                    .map_err(|message| Rich::custom(span, message))?;
                Ok(Expr::Call(function, args))
            });

        let list = items
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(|items| Expr::Call(Function::List, items));

        let nested = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let access = choice((
            just(Token::Dot).ignore_then(ident).map(Access::Member),
            expr.clone()
                .delimited_by(just(Token::LBracket), just(Token::RBracket))
                .map(Access::Index),
        ));

        let operand = choice((literal, call_or_ident, list, nested)).foldl(
            access.repeated(),
            |base, access| match access {
                Access::Member(field) => Expr::Member(Box::new(base), field),
                Access::Index(index) => Expr::Index(Box::new(base), Box::new(index)),
            },
        );

        // `x matches '<literal>'` compiles its pattern here; any other
        // right-hand side is matched at run time.
        let literal_pattern = just(Token::Matches)
            .ignore_then(pattern.clone())
            .try_map(|pattern, span| {
                Regex::new(&pattern)
                    .map_err(|e| Rich::custom(span, format!("invalid pattern '{pattern}': {e}")))
            });
        let dynamic_matches = just(Token::Matches)
            .then_ignore(pattern.not())
            .to(BinaryOp::Matches);

        let coalesce = just(Token::QuestionQuestion).to(BinaryOp::Coalesce);
        let or = just(Token::OrOr).or(just(Token::Or)).to(BinaryOp::Or);
        let and = just(Token::AndAnd).or(just(Token::And)).to(BinaryOp::And);
        let equality = select! {
            Token::EqEq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::NotEq,
        };
        let relational = select! {
            Token::Lt => BinaryOp::Lt,
            Token::Le => BinaryOp::Le,
            Token::Gt => BinaryOp::Gt,
            Token::Ge => BinaryOp::Ge,
            Token::In => BinaryOp::In,
            Token::Contains => BinaryOp::Contains,
            Token::StartsWith => BinaryOp::StartsWith,
            Token::EndsWith => BinaryOp::EndsWith,
        };
        let additive = select! {
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
        };
        let multiplicative = select! {
            Token::Star => BinaryOp::Mul,
            Token::Slash => BinaryOp::Div,
            Token::Percent => BinaryOp::Rem,
        };
        let not = just(Token::Bang).or(just(Token::Not)).to(UnaryOp::Not);
        let neg = just(Token::Minus).to(UnaryOp::Neg);

        // `c ? a : b`: the branch between `?` and `:` is the operator.
        let then_branch = just(Token::Question)
            .ignore_then(expr)
            .then_ignore(just(Token::Colon));

        operand.pratt((
            infix(right(TERNARY), then_branch, |cond, then, otherwise, _| {
                Expr::Conditional(Box::new(cond), Box::new(then), Box::new(otherwise))
            }),
            infix(left(COALESCE), coalesce, |l, op, r, _| binary(l, op, r)),
            infix(left(OR), or, |l, op, r, _| binary(l, op, r)),
            infix(left(AND), and, |l, op, r, _| binary(l, op, r)),
            infix(left(EQUALITY), equality, |l, op, r, _| binary(l, op, r)),
            postfix(RELATIONAL, literal_pattern, |lhs, regex, _| {
                Expr::Regex(Box::new(lhs), regex)
            }),
            infix(left(RELATIONAL), dynamic_matches, |l, op, r, _| binary(l, op, r)),
            infix(left(RELATIONAL), relational, |l, op, r, _| binary(l, op, r)),
            infix(left(ADDITIVE), additive, |l, op, r, _| binary(l, op, r)),
            infix(left(MULTIPLICATIVE), multiplicative, |l, op, r, _| binary(l, op, r)),
            prefix(PREFIX, not, |op, rhs, _| Expr::Unary(op, Box::new(rhs))),
            prefix(PREFIX, neg, |op, rhs, _| Expr::Unary(op, Box::new(rhs))),
        ))
    })
}
