//! Recursive-descent parser for condition expressions.
//!
//! ```text
//! expr      := and_group (OR and_group)*
//! and_group := condition (AND condition)*
//! condition := identifier [op rhs] | '(' expr ')'
//! rhs       := string | number | boolean | identifier
//! ```

use regex::Regex;

use super::ast::{CompareOp, Comparison, Expr, Literal};
use super::lexer::{tokenize, SpannedToken, Token};
use crate::error::ExpressionError;

pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    end_column: usize,
}

type Result<T> = std::result::Result<T, ExpressionError>;

/// Parse `input` into an expression tree.
pub fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end_column: input.chars().count() + 1,
    };
    if parser.peek().is_none() {
        return Err(parser.error_here("expression is empty"));
    }
    let expr = parser.parse_logical_or()?;
    if let Some(st) = parser.tokens.get(parser.pos) {
        return Err(ExpressionError::Parse {
            column: st.column,
            message: format!("unexpected {}", st.token.display_name()),
        });
    }
    Ok(expr)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|st| &st.token)
    }

    fn advance(&mut self) -> Option<SpannedToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn current_column(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|st| st.column)
            .unwrap_or(self.end_column)
    }

    fn error_here(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Parse {
            column: self.current_column(),
            message: message.into(),
        }
    }

    fn parse_logical_or(&mut self) -> Result<Expr> {
        let mut items = vec![self.parse_logical_and()?];
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            items.push(self.parse_logical_and()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::Or(items)
        })
    }

    fn parse_logical_and(&mut self) -> Result<Expr> {
        let mut items = vec![self.parse_condition()?];
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            items.push(self.parse_condition()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::And(items)
        })
    }

    fn parse_condition(&mut self) -> Result<Expr> {
        let Some(st) = self.advance() else {
            return Err(self.error_here("expected a condition, found end of expression"));
        };

        match st.token {
            Token::LeftParen => {
                let inner = self.parse_logical_or()?;
                match self.advance() {
                    Some(SpannedToken {
                        token: Token::RightParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(ExpressionError::Parse {
                        column: other.column,
                        message: format!("expected ')', got {}", other.token.display_name()),
                    }),
                    None => Err(self.error_here("expected ')', found end of expression")),
                }
            }
            Token::Identifier(variable) => self.parse_comparison(variable, st.column),
            other => Err(ExpressionError::Parse {
                column: st.column,
                message: format!("expected a variable or '(', got {}", other.display_name()),
            }),
        }
    }

    fn parse_comparison(&mut self, variable: String, column: usize) -> Result<Expr> {
        let op = match self.peek() {
            Some(Token::Eq) => CompareOp::Eq,
            Some(Token::Ne) => CompareOp::Ne,
            Some(Token::Lt) => CompareOp::Lt,
            Some(Token::Le) => CompareOp::Le,
            Some(Token::Gt) => CompareOp::Gt,
            Some(Token::Ge) => CompareOp::Ge,
            Some(Token::Match) => CompareOp::Match,
            _ => {
                return Ok(Expr::Compare(Comparison {
                    variable,
                    op: CompareOp::Eq,
                    value: Literal::Bool(true),
                    pattern: None,
                    column,
                }))
            }
        };
        self.advance();

        let rhs_column = self.current_column();
        let value = match self.advance().map(|st| st.token) {
            Some(Token::String(s)) | Some(Token::Identifier(s)) => Literal::Text(s),
            Some(Token::Integer(n)) => Literal::Integer(n),
            Some(Token::Decimal(n)) => Literal::Decimal(n),
            Some(Token::True) => Literal::Bool(true),
            Some(Token::False) => Literal::Bool(false),
            Some(other) => {
                return Err(ExpressionError::Parse {
                    column: rhs_column,
                    message: format!("expected a value, got {}", other.display_name()),
                })
            }
            None => {
                return Err(ExpressionError::Parse {
                    column: rhs_column,
                    message: format!("expected a value after '{}'", op.as_str()),
                })
            }
        };

        let pattern = if op == CompareOp::Match {
            let Literal::Text(source) = &value else {
                return Err(ExpressionError::Parse {
                    column: rhs_column,
                    message: "'~=' needs a string pattern".to_string(),
                });
            };
            let compiled =
                Regex::new(&format!("^(?:{})", source)).map_err(|e| ExpressionError::Parse {
                    column: rhs_column,
                    message: format!("invalid pattern: {}", e),
                })?;
            Some(compiled)
        } else {
            None
        };

        Ok(Expr::Compare(Comparison {
            variable,
            op,
            value,
            pattern,
            column,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison(expr: &Expr) -> &Comparison {
        match expr {
            Expr::Compare(c) => c,
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn bare_identifier_is_equal_true() {
        let expr = parse("draft").unwrap();
        let cmp = comparison(&expr);
        assert_eq!(cmp.variable, "draft");
        assert_eq!(cmp.op, CompareOp::Eq);
        assert_eq!(cmp.value, Literal::Bool(true));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse("a OR b AND c").unwrap();
        match expr {
            Expr::Or(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[1], Expr::And(_)));
            }
            other => panic!("expected OR, got {:?}", other),
        }
    }

    #[test]
    fn parentheses_group() {
        let expr = parse("(a or b) and c").unwrap();
        match expr {
            Expr::And(items) => assert!(matches!(items[0], Expr::Or(_))),
            other => panic!("expected AND, got {:?}", other),
        }
    }

    #[test]
    fn bare_identifier_rhs_is_text() {
        let expr = parse("base=main").unwrap();
        assert_eq!(comparison(&expr).value, Literal::Text("main".into()));
    }

    #[test]
    fn variables_are_collected_statically() {
        let expr = parse("label='x' AND (number_reviewers>1 OR label='y')").unwrap();
        let vars: Vec<String> = expr.variables().into_iter().collect();
        assert_eq!(vars, vec!["label", "number_reviewers"]);
    }

    #[test]
    fn syntax_errors() {
        for bad in ["", "a =", "a = 1 b", "(a", "= 1", "a ~= 3", "a ~= '('"] {
            let err = parse(bad).unwrap_err();
            assert!(
                matches!(err, ExpressionError::Parse { .. }),
                "{bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn error_column_points_at_offender() {
        let err = parse("a = 1 b").unwrap_err();
        assert_eq!(
            err,
            ExpressionError::Parse {
                column: 7,
                message: "unexpected identifier 'b'".into()
            }
        );
    }
}
