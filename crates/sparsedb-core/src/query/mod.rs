//! Query layer - postfix (RPN) expression evaluation
//!
//! [`ReversePolish`] is a stack machine that knows nothing about the values
//! it computes. It is assembled from three pieces:
//! - a [`Tokenize`] implementation splitting the raw statement into operand
//!   names and operators with fixed arity
//! - a [`Dispatch`] table applying an operator to its operands
//! - a [`Resolve`] function turning an operand name into a value
//!
//! Operand names are pushed unresolved and only resolved when an operator
//! consumes them (or when the final result is taken), so names that are
//! never used are never looked up.
//!
//! The boolean set instantiation used by the catalog lives in [`boolean`].

pub mod boolean;

use crate::{Error, Result};
use std::fmt;
use tracing::trace;

pub use boolean::{BoolOp, BoolTokenizer, SetAlgebra};

/// One token of a postfix expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<Op> {
    /// Name to be resolved into a value
    Operand(String),
    /// Operator consuming `arity` stack entries
    Operator {
        /// Operator
        op: Op,
        /// Number of operands popped
        arity: usize,
    },
}

/// Splits a statement into tokens
pub trait Tokenize {
    /// Operator type produced by this tokenizer
    type Op;

    /// Tokens in postfix order
    fn tokenize(&self, statement: &str) -> Vec<Token<Self::Op>>;
}

/// Applies an operator to operands given oldest first
pub trait Dispatch<Op, V> {
    /// Compute the operator's result
    fn dispatch(&self, op: &Op, operands: Vec<V>) -> Result<V>;
}

impl<Op, V, F> Dispatch<Op, V> for F
where
    F: Fn(&Op, Vec<V>) -> Result<V>,
{
    fn dispatch(&self, op: &Op, operands: Vec<V>) -> Result<V> {
        self(op, operands)
    }
}

/// Resolves an operand name into a value
pub trait Resolve<V> {
    /// Look up `name`
    fn resolve(&self, name: &str) -> Result<V>;
}

impl<V, F> Resolve<V> for F
where
    F: Fn(&str) -> Result<V>,
{
    fn resolve(&self, name: &str) -> Result<V> {
        self(name)
    }
}

/// Stack entry: an operand not yet looked up, or a computed value
enum StackItem<V> {
    Name(String),
    Value(V),
}

/// Postfix expression evaluator
pub struct ReversePolish<T, D, R> {
    tokenizer: T,
    dispatcher: D,
    resolver: R,
}

impl<T, D, R> ReversePolish<T, D, R>
where
    T: Tokenize,
    T::Op: fmt::Display,
{
    /// Assemble an evaluator
    pub fn new(tokenizer: T, dispatcher: D, resolver: R) -> Self {
        Self {
            tokenizer,
            dispatcher,
            resolver,
        }
    }

    /// Evaluate `statement` and return its resolved result
    ///
    /// Operators pop their `arity` most recent entries and receive them in
    /// push order. The expression must reduce to exactly one entry: leftover
    /// operands and empty statements are [`Error::MalformedExpression`].
    pub fn execute<V>(&self, statement: &str) -> Result<V>
    where
        D: Dispatch<T::Op, V>,
        R: Resolve<V>,
    {
        let tokens = self.tokenizer.tokenize(statement);
        trace!(tokens = tokens.len(), statement, "evaluating postfix expression");

        let mut stack: Vec<StackItem<V>> = Vec::with_capacity(tokens.len());
        for token in tokens {
            match token {
                Token::Operand(name) => stack.push(StackItem::Name(name)),
                Token::Operator { op, arity } => {
                    if stack.len() < arity {
                        return Err(Error::StackUnderflow {
                            operator: op.to_string(),
                            needed: arity,
                            available: stack.len(),
                        });
                    }
                    let operands = stack
                        .split_off(stack.len() - arity)
                        .into_iter()
                        .map(|item| self.unwrap(item))
                        .collect::<Result<Vec<V>>>()?;
                    let result = self.dispatcher.dispatch(&op, operands)?;
                    stack.push(StackItem::Value(result));
                }
            }
        }

        let top = stack
            .pop()
            .ok_or_else(|| Error::malformed(format!("empty expression: {:?}", statement)))?;
        if !stack.is_empty() {
            return Err(Error::malformed(format!(
                "{} operand(s) left unconsumed in {:?}",
                stack.len(),
                statement
            )));
        }
        self.unwrap(top)
    }

    fn unwrap<V>(&self, item: StackItem<V>) -> Result<V>
    where
        R: Resolve<V>,
    {
        match item {
            StackItem::Name(name) => self.resolver.resolve(&name),
            StackItem::Value(value) => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Integer arithmetic over whitespace-separated tokens
    struct Arith;

    impl Tokenize for Arith {
        type Op = char;

        fn tokenize(&self, statement: &str) -> Vec<Token<char>> {
            statement
                .split_whitespace()
                .map(|t| match t {
                    "+" | "-" | "*" => Token::Operator {
                        op: t.chars().next().unwrap_or('+'),
                        arity: 2,
                    },
                    "neg" => Token::Operator { op: '~', arity: 1 },
                    "?" => Token::Operator { op: '?', arity: 1 },
                    _ => Token::Operand(t.to_string()),
                })
                .collect()
        }
    }

    fn arith_dispatch(op: &char, args: Vec<i64>) -> Result<i64> {
        match op {
            '+' => Ok(args[0] + args[1]),
            '-' => Ok(args[0] - args[1]),
            '*' => Ok(args[0] * args[1]),
            '~' => Ok(-args[0]),
            other => Err(Error::UnknownOperator(other.to_string())),
        }
    }

    fn parse(name: &str) -> Result<i64> {
        name.parse()
            .map_err(|_| Error::UnknownColumn(name.to_string()))
    }

    fn eval(statement: &str) -> Result<i64> {
        ReversePolish::new(Arith, arith_dispatch, parse).execute(statement)
    }

    #[test]
    fn test_operand_order() {
        assert_eq!(eval("10 3 -").unwrap(), 7);
        assert_eq!(eval("2 3 4 * +").unwrap(), 14);
        assert_eq!(eval("5 neg").unwrap(), -5);
    }

    #[test]
    fn test_single_operand() {
        assert_eq!(eval("42").unwrap(), 42);
    }

    #[test]
    fn test_stack_underflow() {
        let err = eval("1 +").unwrap_err();
        assert!(matches!(
            err,
            Error::StackUnderflow {
                needed: 2,
                available: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_residual_stack_rejected() {
        let err = eval("1 2 3 +").unwrap_err();
        assert!(matches!(err, Error::MalformedExpression(_)));
    }

    #[test]
    fn test_empty_expression() {
        let err = eval("   ").unwrap_err();
        assert!(matches!(err, Error::MalformedExpression(_)));
    }

    #[test]
    fn test_unknown_operator() {
        let err = eval("1 ?").unwrap_err();
        assert!(matches!(err, Error::UnknownOperator(op) if op == "?"));
    }

    #[test]
    fn test_resolver_error_propagates() {
        let err = eval("1 x +").unwrap_err();
        assert!(matches!(err, Error::UnknownColumn(name) if name == "x"));
    }

    #[test]
    fn test_closures() {
        let rpn = ReversePolish::new(
            Arith,
            |op: &char, args: Vec<String>| -> Result<String> {
                Ok(format!("({} {} {})", args[0], op, args[1]))
            },
            |name: &str| -> Result<String> { Ok(name.to_uppercase()) },
        );
        assert_eq!(
            rpn.execute::<String>("a b + c *").unwrap(),
            "((A + B) * C)"
        );
    }
}
