// ── Expression lexer ──

use std::fmt;

use chumsky::prelude::*;

use super::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Str(String),
    Int(i64),
    Float(f64),
    Ident(String),
    True,
    False,
    Nil,

    // Word operators
    And,
    Or,
    Not,
    In,
    Contains,
    StartsWith,
    EndsWith,
    Matches,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    QuestionQuestion,
    Colon,

    // Symbol operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::Int(n) => write!(f, "{n}"),
            Token::Float(n) => write!(f, "{n}"),
            Token::Ident(name) => write!(f, "{name}"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Nil => write!(f, "nil"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::In => write!(f, "in"),
            Token::Contains => write!(f, "contains"),
            Token::StartsWith => write!(f, "startsWith"),
            Token::EndsWith => write!(f, "endsWith"),
            Token::Matches => write!(f, "matches"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Question => write!(f, "?"),
            Token::QuestionQuestion => write!(f, "??"),
            Token::Colon => write!(f, ":"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Bang => write!(f, "!"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
        }
    }
}

/// A token with its byte span in the source.
pub type Spanned = (Token, SimpleSpan);

fn keyword(word: &str) -> Option<Token> {
    Some(match word {
        "true" => Token::True,
        "false" => Token::False,
        "nil" | "null" => Token::Nil,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        "contains" => Token::Contains,
        "startsWith" => Token::StartsWith,
        "endsWith" => Token::EndsWith,
        "matches" => Token::Matches,
        _ => return None,
    })
}

pub fn lexer<'src>() -> impl Parser<'src, &'src str, Vec<Spanned>, extra::Err<Rich<'src, char>>> {
    let escape = just('\\').ignore_then(choice((
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
        any(),
    )));

    let double_quoted = just('"')
        .ignore_then(
            escape
                .clone()
                .or(none_of("\\\""))
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just('"'));
    let single_quoted = just('\'')
        .ignore_then(escape.or(none_of("\\'")).repeated().collect::<String>())
        .then_ignore(just('\''));
    let string = double_quoted.or(single_quoted).map(Token::Str);

    // `1_000` and `1.5`; a dot only continues a number when digits follow.
    let number = text::digits(10)
        .then(one_of("0123456789_").repeated())
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .try_map(|text: &str, span| {
            let clean = text.replace('_', "");
            let token = if clean.contains('.') {
                clean.parse().ok().map(Token::Float)
            } else {
                clean.parse().ok().map(Token::Int)
            };
            token.ok_or_else(|| Rich::custom(span, format!("invalid number literal '{text}'")))
        });

    let word = text::ident()
        .map(|word: &str| keyword(word).unwrap_or_else(|| Token::Ident(word.to_owned())));

    let operator = choice((
        just("==").to(Token::EqEq),
        just("!=").to(Token::NotEq),
        just("<=").to(Token::Le),
        just(">=").to(Token::Ge),
        just("&&").to(Token::AndAnd),
        just("||").to(Token::OrOr),
        just("??").to(Token::QuestionQuestion),
        just('<').to(Token::Lt),
        just('>').to(Token::Gt),
        just('!').to(Token::Bang),
        just('?').to(Token::Question),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
    ));

    let punctuation = choice((
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('[').to(Token::LBracket),
        just(']').to(Token::RBracket),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
        just(':').to(Token::Colon),
    ));

    choice((string, number, word, operator, punctuation))
        .map_with(|token, extra| (token, extra.span()))
        .padded()
        .repeated()
        .collect()
        .padded()
}

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, EvalError> {
    lexer().parse(source).into_result().map_err(syntax_error)
}

/// The first parse error as an `EvalError`.
pub(super) fn syntax_error<T: fmt::Display>(errors: Vec<Rich<'_, T>>) -> EvalError {
    match errors.into_iter().next() {
        Some(error) => EvalError::Syntax {
            offset: error.span().start,
            message: error.to_string(),
        },
        None => EvalError::Syntax {
            offset: 0,
            message: "invalid expression".into(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|(token, _)| token).collect()
    }

    #[test]
    fn lexes_operators_and_words() {
        assert_eq!(
            kinds("site_name == 'CPH' && not is_console_session"),
            vec![
                Token::Ident("site_name".into()),
                Token::EqEq,
                Token::Str("CPH".into()),
                Token::AndAnd,
                Token::Not,
                Token::Ident("is_console_session".into()),
            ]
        );
    }

    #[test]
    fn lexes_numbers() {
        assert_eq!(
            kinds("22 1.5 1_000"),
            vec![Token::Int(22), Token::Float(1.5), Token::Int(1000)]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(kinds(r#""a\"b\n""#), vec![Token::Str("a\"b\n".into())]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(matches!(tokenize("'abc"), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn spans_are_byte_offsets() {
        let tokens = tokenize("  a >= 'b'").unwrap();
        let starts: Vec<usize> = tokens.iter().map(|(_, span)| span.start).collect();
        assert_eq!(starts, vec![2, 4, 7]);
    }

    #[test]
    fn dot_after_integer_is_member_access() {
        assert_eq!(
            kinds("tags[0].name"),
            vec![
                Token::Ident("tags".into()),
                Token::LBracket,
                Token::Int(0),
                Token::RBracket,
                Token::Dot,
                Token::Ident("name".into()),
            ]
        );
    }

    #[test]
    fn unknown_character_is_an_error() {
        assert!(matches!(tokenize("a # b"), Err(EvalError::Syntax { offset: 2, .. })));
    }
}
