//! Expression compilation: folds the flat operand/operator token list the
//! parser captures into a precedence-correct tree. Unary `!`/`~` (tier 1)
//! bind to a single atom and are resolved directly while parsing an atom
//! (see `parse.rs`), so the token list handled here only ever carries the
//! binary tiers 2 through 12.

use crate::ast::{BinOp, Expr, ExprKind};
use crate::error::Location;
use std::collections::VecDeque;

/// One element of the flat sequence the parser captures for an expression:
/// alternating operands and (non-assignment) binary operators, with a
/// trailing run of `Assign` tokens reserved for the loosest, right-assoc
/// tier.
#[derive(Debug)]
pub enum Token {
    Operand(Expr),
    Op(BinOp, Location),
    Assign(Location),
}

/// Precedence tiers, tightest first, left-associative. Tier 1 (unary) and
/// tier 12 (assignment) are not folded here: see the module docs.
const TIERS: &[&[BinOp]] = &[
    &[BinOp::Mul, BinOp::Div, BinOp::Rem],
    &[BinOp::Add, BinOp::Sub],
    &[BinOp::Shl, BinOp::Shr],
    &[BinOp::Lt, BinOp::Le, BinOp::Gt, BinOp::Ge],
    &[BinOp::Eq, BinOp::Ne],
    &[BinOp::BitAnd],
    &[BinOp::BitXor],
    &[BinOp::BitOr],
    &[BinOp::And],
    &[BinOp::Or],
];

/// Fold a flat token list into a single expression tree.
pub fn fold(tokens: Vec<Token>) -> Expr {
    let mut tokens = tokens;
    for tier in TIERS {
        tokens = reduce_left_assoc(tokens, tier);
    }
    fold_assign(tokens.into_iter().collect())
}

fn reduce_left_assoc(tokens: Vec<Token>, tier: &[BinOp]) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter();
    while let Some(tok) = iter.next() {
        match tok {
            Token::Op(op, loc) if tier.contains(&op) => {
                let rhs = match iter.next() {
                    Some(Token::Operand(e)) => e,
                    _ => unreachable!("a binary operator must be followed by an operand"),
                };
                let lhs = match out.pop() {
                    Some(Token::Operand(e)) => e,
                    _ => unreachable!("a binary operator must be preceded by an operand"),
                };
                out.push(Token::Operand(Expr {
                    loc,
                    kind: ExprKind::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                }));
            }
            other => out.push(other),
        }
    }
    out
}

/// Right-associative fold of the assignment tier: `a = b = c` becomes
/// `a = (b = c)`, by recursing on the tail first.
fn fold_assign(mut tokens: VecDeque<Token>) -> Expr {
    let first = match tokens.pop_front() {
        Some(Token::Operand(e)) => e,
        _ => unreachable!("an expression token list must start with an operand"),
    };
    if tokens.is_empty() {
        return first;
    }
    let assign_loc = match tokens.pop_front() {
        Some(Token::Assign(loc)) => loc,
        _ => unreachable!("only `=` tokens may remain once all tighter tiers are folded"),
    };
    let rhs = fold_assign(tokens);
    Expr {
        loc: assign_loc,
        kind: ExprKind::Assign {
            target: Box::new(first),
            value: Box::new(rhs),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprKind;

    fn num(n: i64) -> Expr {
        Expr {
            loc: Location::new("t", 1),
            kind: ExprKind::Number(n),
        }
    }

    fn op(op: BinOp) -> Token {
        Token::Op(op, Location::new("t", 1))
    }

    #[test]
    fn precedence_mul_before_add() {
        // 1 + 2 * 3  =>  1 + (2 * 3)
        let tokens = vec![
            Token::Operand(num(1)),
            op(BinOp::Add),
            Token::Operand(num(2)),
            op(BinOp::Mul),
            Token::Operand(num(3)),
        ];
        let e = fold(tokens);
        match e.kind {
            ExprKind::Binary { op: BinOp::Add, rhs, .. } => match rhs.kind {
                ExprKind::Binary { op: BinOp::Mul, .. } => {}
                _ => panic!("expected a nested multiplication"),
            },
            _ => panic!("expected a top-level addition"),
        }
    }

    #[test]
    fn left_associative_same_tier() {
        // 1 - 2 - 3 => (1 - 2) - 3
        let tokens = vec![
            Token::Operand(num(1)),
            op(BinOp::Sub),
            Token::Operand(num(2)),
            op(BinOp::Sub),
            Token::Operand(num(3)),
        ];
        let e = fold(tokens);
        match e.kind {
            ExprKind::Binary { op: BinOp::Sub, lhs, .. } => match lhs.kind {
                ExprKind::Binary { op: BinOp::Sub, .. } => {}
                _ => panic!("expected a nested subtraction on the left"),
            },
            _ => panic!("expected a top-level subtraction"),
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        let tokens = vec![
            Token::Operand(num(1)),
            Token::Assign(Location::new("t", 1)),
            Token::Operand(num(2)),
            Token::Assign(Location::new("t", 1)),
            Token::Operand(num(3)),
        ];
        let e = fold(tokens);
        match e.kind {
            ExprKind::Assign { value, .. } => match value.kind {
                ExprKind::Assign { .. } => {}
                _ => panic!("expected the right-hand assignment nested in `value`"),
            },
            _ => panic!("expected a top-level assignment"),
        }
    }
}
