//! Tokenizer for condition expressions.

use crate::error::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    And,
    Or,
    True,
    False,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    LeftParen,
    RightParen,
    Identifier(String),
    String(String),
    Integer(i64),
    Decimal(f64),
}

impl Token {
    pub fn display_name(&self) -> String {
        match self {
            Token::And => "keyword 'AND'".to_string(),
            Token::Or => "keyword 'OR'".to_string(),
            Token::True => "keyword 'true'".to_string(),
            Token::False => "keyword 'false'".to_string(),
            Token::Eq => "'='".to_string(),
            Token::Ne => "'!='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Le => "'<='".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Ge => "'>='".to_string(),
            Token::Match => "'~='".to_string(),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
            Token::Identifier(s) => format!("identifier '{}'", s),
            Token::String(s) => format!("string '{}'", s),
            Token::Integer(n) => format!("number {}", n),
            Token::Decimal(n) => format!("number {}", n),
        }
    }
}

/// Token plus its 1-based starting column.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub column: usize,
}

fn keyword(word: &str) -> Option<Token> {
    match word.to_ascii_lowercase().as_str() {
        "and" => Some(Token::And),
        "or" => Some(Token::Or),
        "true" => Some(Token::True),
        "false" => Some(Token::False),
        _ => None,
    }
}

fn error(column: usize, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Parse {
        column,
        message: message.into(),
    }
}

pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, ExpressionError> {
    let mut tokens = Vec::with_capacity(input.len() / 4);
    let mut chars = input.chars().peekable();
    let mut col = 1;

    while let Some(&ch) = chars.peek() {
        let start = col;

        match ch {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
                col += 1;
            }

            '(' | ')' => {
                chars.next();
                col += 1;
                let token = if ch == '(' {
                    Token::LeftParen
                } else {
                    Token::RightParen
                };
                tokens.push(SpannedToken {
                    token,
                    column: start,
                });
            }

            '\'' | '"' => {
                let quote = ch;
                chars.next();
                col += 1;

                let mut string = String::new();
                let mut escaped = false;
                let mut closed = false;

                while let Some(ch) = chars.next() {
                    col += 1;
                    if escaped {
                        string.push(match ch {
                            'n' => '\n',
                            't' => '\t',
                            _ => ch,
                        });
                        escaped = false;
                    } else if ch == '\\' {
                        escaped = true;
                    } else if ch == quote {
                        closed = true;
                        break;
                    } else {
                        string.push(ch);
                    }
                }

                if !closed {
                    return Err(error(start, "unterminated string literal"));
                }
                tokens.push(SpannedToken {
                    token: Token::String(string),
                    column: start,
                });
            }

            '0'..='9' | '-' => {
                let mut num_str = String::new();
                num_str.push(ch);
                chars.next();
                col += 1;
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' {
                        num_str.push(ch);
                        chars.next();
                        col += 1;
                    } else {
                        break;
                    }
                }

                let token = if num_str.contains('.') {
                    num_str.parse::<f64>().map(Token::Decimal).ok()
                } else {
                    num_str.parse::<i64>().map(Token::Integer).ok()
                };
                let token =
                    token.ok_or_else(|| error(start, format!("invalid number '{}'", num_str)))?;
                tokens.push(SpannedToken {
                    token,
                    column: start,
                });
            }

            '=' | '!' | '<' | '>' | '~' => {
                chars.next();
                col += 1;
                let next = chars.peek().copied();

                let (token, consumed) = match (ch, next) {
                    ('=', _) => (Token::Eq, false),
                    ('!', Some('=')) => (Token::Ne, true),
                    ('<', Some('>')) => (Token::Ne, true),
                    ('<', Some('=')) => (Token::Le, true),
                    ('<', _) => (Token::Lt, false),
                    ('>', Some('=')) => (Token::Ge, true),
                    ('>', _) => (Token::Gt, false),
                    ('~', Some('=')) => (Token::Match, true),
                    ('!', _) => return Err(error(start, "unexpected '!', did you mean '!='?")),
                    _ => return Err(error(start, "unexpected '~', did you mean '~='?")),
                };
                if consumed {
                    chars.next();
                    col += 1;
                }
                tokens.push(SpannedToken {
                    token,
                    column: start,
                });
            }

            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' || ch == '-' {
                        ident.push(ch);
                        chars.next();
                        col += 1;
                    } else {
                        break;
                    }
                }

                let token = keyword(&ident).unwrap_or(Token::Identifier(ident));
                tokens.push(SpannedToken {
                    token,
                    column: start,
                });
            }

            other => {
                return Err(error(start, format!("unexpected character '{}'", other)));
            }
        }
    }

    Ok(tokens)
}
