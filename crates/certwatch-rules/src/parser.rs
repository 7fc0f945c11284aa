//! Recursive-descent parser for keyword expressions.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! or      := and ("OR" and)*
//! and     := not ("AND" not)*
//! not     := "NOT" not | primary
//! primary := "(" or ")" | KEYWORD
//! ```
//!
//! Operators are case-sensitive; anything else is a keyword and is
//! lower-cased. Parentheses terminate tokens even without surrounding
//! whitespace.

use certwatch_types::CertwatchError;

use crate::expr::Expr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Keyword(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::And => "'AND'".to_string(),
            Token::Or => "'OR'".to_string(),
            Token::Not => "'NOT'".to_string(),
            Token::Keyword(k) => format!("{k:?}"),
        }
    }
}

/// Parse a keyword expression into an [`Expr`].
///
/// # Errors
///
/// [`CertwatchError::EmptyExpression`] for empty or all-whitespace input,
/// [`CertwatchError::ParseError`] for anything structurally invalid.
pub fn parse(input: &str) -> Result<Expr, CertwatchError> {
    let tokens = tokenize(input);
    if tokens.is_empty() {
        return Err(CertwatchError::EmptyExpression);
    }

    let mut stream = TokenStream { tokens, pos: 0 };
    let expr = parse_or(&mut stream)?;

    if let Some(extra) = stream.peek() {
        return Err(CertwatchError::ParseError(format!(
            "unexpected token {}",
            extra.describe()
        )));
    }

    Ok(expr)
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    let mut flush = |current: &mut String, tokens: &mut Vec<Token>| {
        if current.is_empty() {
            return;
        }
        let token = match current.as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            word => Token::Keyword(word.to_lowercase()),
        };
        tokens.push(token);
        current.clear();
    };

    for ch in input.trim().chars() {
        match ch {
            '(' => {
                flush(&mut current, &mut tokens);
                tokens.push(Token::LParen);
            }
            ')' => {
                flush(&mut current, &mut tokens);
                tokens.push(Token::RParen);
            }
            c if c.is_whitespace() => flush(&mut current, &mut tokens),
            c => current.push(c),
        }
    }
    flush(&mut current, &mut tokens);

    tokens
}

struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenStream {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }
}

fn parse_or(stream: &mut TokenStream) -> Result<Expr, CertwatchError> {
    let mut left = parse_and(stream)?;
    while stream.peek() == Some(&Token::Or) {
        stream.advance();
        let right = parse_and(stream)?;
        left = Expr::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_and(stream: &mut TokenStream) -> Result<Expr, CertwatchError> {
    let mut left = parse_not(stream)?;
    while stream.peek() == Some(&Token::And) {
        stream.advance();
        let right = parse_not(stream)?;
        left = Expr::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_not(stream: &mut TokenStream) -> Result<Expr, CertwatchError> {
    if stream.peek() == Some(&Token::Not) {
        stream.advance();
        // NOT may stack: "NOT NOT k" is legal.
        let inner = parse_not(stream)?;
        return Ok(Expr::Not(Box::new(inner)));
    }
    parse_primary(stream)
}

fn parse_primary(stream: &mut TokenStream) -> Result<Expr, CertwatchError> {
    match stream.advance() {
        None => Err(CertwatchError::ParseError(
            "unexpected end of expression".to_string(),
        )),
        Some(Token::LParen) => {
            let expr = parse_or(stream)?;
            match stream.advance() {
                Some(Token::RParen) => Ok(expr),
                Some(other) => Err(CertwatchError::ParseError(format!(
                    "expected ')', got {}",
                    other.describe()
                ))),
                None => Err(CertwatchError::ParseError("expected ')'".to_string())),
            }
        }
        Some(Token::RParen) => Err(CertwatchError::ParseError("unexpected ')'".to_string())),
        Some(Token::And) | Some(Token::Or) => Err(CertwatchError::ParseError(
            "operator without left-hand operand".to_string(),
        )),
        Some(Token::Not) => unreachable!("NOT is consumed by parse_not"),
        Some(Token::Keyword(keyword)) => {
            if keyword.contains('(') || keyword.contains(')') {
                return Err(CertwatchError::ParseError(format!(
                    "invalid keyword {keyword:?}"
                )));
            }
            Ok(Expr::Keyword(keyword))
        }
    }
}
