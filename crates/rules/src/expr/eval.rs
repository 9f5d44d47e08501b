//! Tree-walking evaluator.

use super::ast::{CmpOp, Literal, Node, Operand};
use super::error::{ExprError, Result};
use super::value::Value;

/// Source of identifier values during evaluation.
///
/// Unknown identifiers should resolve to `Value::Int(0)` rather than fail.
pub trait Lookup {
    fn lookup(&self, name: &str) -> Value;
}

impl Lookup for std::collections::HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Value {
        self.get(name).cloned().unwrap_or(Value::Int(0))
    }
}

pub(crate) fn eval_node(node: &Node, env: &dyn Lookup) -> Result<bool> {
    match node {
        Node::And(a, b) => Ok(eval_node(a, env)? && eval_node(b, env)?),
        Node::Or(a, b) => Ok(eval_node(a, env)? || eval_node(b, env)?),
        Node::Compare { left, op, right } => {
            let lhs = resolve(left, env);
            let rhs = resolve(right, env);
            compare(&lhs, *op, &rhs)
        }
    }
}

fn resolve(operand: &Operand, env: &dyn Lookup) -> Value {
    match operand {
        Operand::Ident(name) => env.lookup(name),
        Operand::Int(n) => Value::Int(*n),
        Operand::Str(s) => Value::Str(s.clone()),
        Operand::List(items) => Value::List(
            items
                .iter()
                .map(|item| match item {
                    Literal::Int(n) => Value::Int(*n),
                    Literal::Str(s) => Value::Str(s.clone()),
                })
                .collect(),
        ),
    }
}

fn compare(lhs: &Value, op: CmpOp, rhs: &Value) -> Result<bool> {
    match op {
        CmpOp::In | CmpOp::NotIn => {
            let Value::List(items) = rhs else {
                return Err(ExprError::evaluation(format!(
                    "right side of `{}` must be a list, got {} `{}`",
                    op,
                    rhs.type_name(),
                    rhs
                )));
            };
            if matches!(lhs, Value::List(_)) {
                return Err(ExprError::evaluation(format!(
                    "left side of `{}` must not be a list",
                    op
                )));
            }
            let mut found = false;
            for item in items {
                if member_eq(lhs, item) {
                    found = true;
                    break;
                }
            }
            Ok(if op == CmpOp::In { found } else { !found })
        }
        CmpOp::Eq => lhs.loose_eq(rhs),
        CmpOp::Ne => lhs.loose_eq(rhs).map(|eq| !eq),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            if matches!(lhs, Value::List(_)) || matches!(rhs, Value::List(_)) {
                return Err(ExprError::evaluation(format!(
                    "lists cannot be compared with `{}`",
                    op
                )));
            }
            let ord = lhs.ordering(rhs)?;
            Ok(match op {
                CmpOp::Lt => ord.is_lt(),
                CmpOp::Le => ord.is_le(),
                CmpOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            })
        }
    }
}

// Membership never raises: a version that can't be matched against a
// non-version item just isn't a member.
fn member_eq(lhs: &Value, item: &Value) -> bool {
    lhs.loose_eq(item).unwrap_or(false)
}
