//! Boolean set algebra over presence bitmaps
//!
//! | symbol | arity | result                         |
//! |--------|-------|--------------------------------|
//! | `&`    | 2     | intersection                   |
//! | `\|`   | 2     | union                          |
//! | `^`    | 2     | symmetric difference           |
//! | `-`    | 2     | left minus right               |
//! | `!`    | 1     | complement within `[0, rows)`  |

use super::{Dispatch, Token, Tokenize};
use crate::{Error, MAX_ROWS, Result};
use regex::Regex;
use roaring::RoaringBitmap;
use std::fmt;
use std::sync::LazyLock;

static OPERATOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([&|^\-!])").unwrap());

/// Set operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    Xor,
    /// `-`
    Diff,
    /// `!`
    Not,
}

impl BoolOp {
    /// Every operator
    pub const ALL: [BoolOp; 5] = [Self::And, Self::Or, Self::Xor, Self::Diff, Self::Not];

    /// Operator character
    pub fn symbol(self) -> char {
        match self {
            Self::And => '&',
            Self::Or => '|',
            Self::Xor => '^',
            Self::Diff => '-',
            Self::Not => '!',
        }
    }

    /// Number of operands consumed
    pub fn arity(self) -> usize {
        match self {
            Self::Not => 1,
            _ => 2,
        }
    }

    /// Operator for a single-character token
    pub fn from_symbol(token: &str) -> Option<Self> {
        let mut chars = token.chars();
        let symbol = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Splits a statement around operator characters, then on whitespace
///
/// Operators need no surrounding spaces: `a b&!` is `a b & !`. Anything
/// that is not a lone operator character is an operand name.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolTokenizer;

impl Tokenize for BoolTokenizer {
    type Op = BoolOp;

    fn tokenize(&self, statement: &str) -> Vec<Token<BoolOp>> {
        let spaced = OPERATOR_PATTERN.replace_all(statement, " ${1} ");
        spaced
            .split_whitespace()
            .map(|t| match BoolOp::from_symbol(t) {
                Some(op) => Token::Operator {
                    op,
                    arity: op.arity(),
                },
                None => Token::Operand(t.to_string()),
            })
            .collect()
    }
}

/// Applies [`BoolOp`]s to bitmaps over the item domain `[0, row_count)`
#[derive(Debug, Clone, Copy)]
pub struct SetAlgebra {
    row_count: u64,
}

impl SetAlgebra {
    /// Algebra over `[0, row_count)`; `row_count` is clamped to 2^32
    pub fn new(row_count: u64) -> Self {
        Self {
            row_count: row_count.min(MAX_ROWS),
        }
    }

    /// Every item in the domain
    pub fn domain(&self) -> RoaringBitmap {
        let mut full = RoaringBitmap::new();
        if self.row_count == MAX_ROWS {
            full.insert_range(..);
        } else if self.row_count > 0 {
            full.insert_range(0..self.row_count as u32);
        }
        full
    }

    /// Items in the domain but not in `set`
    pub fn complement(&self, set: &RoaringBitmap) -> RoaringBitmap {
        self.domain() - set
    }
}

impl Dispatch<BoolOp, RoaringBitmap> for SetAlgebra {
    fn dispatch(&self, op: &BoolOp, operands: Vec<RoaringBitmap>) -> Result<RoaringBitmap> {
        if operands.len() != op.arity() {
            return Err(Error::malformed(format!(
                "operator '{}' applied to {} operands",
                op,
                operands.len()
            )));
        }

        let mut operands = operands.into_iter();
        let mut next = || operands.next().unwrap_or_default();
        let lhs = next();

        Ok(match op {
            BoolOp::And => lhs & next(),
            BoolOp::Or => lhs | next(),
            BoolOp::Xor => lhs ^ next(),
            BoolOp::Diff => lhs - next(),
            BoolOp::Not => self.complement(&lhs),
        })
    }
}
