//! Syntax tree of a compiled expression.

use std::fmt;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// List element literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Int(i64),
    Str(String),
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Ident(String),
    Int(i64),
    Str(String),
    List(Vec<Literal>),
}

/// Boolean expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Compare {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

impl Node {
    /// Identifiers referenced anywhere in the tree.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Node::Compare { left, right, .. } => {
                for side in [left, right] {
                    if let Operand::Ident(name) = side {
                        if !out.contains(&name.as_str()) {
                            out.push(name);
                        }
                    }
                }
            }
            Node::And(a, b) | Node::Or(a, b) => {
                a.collect_identifiers(out);
                b.collect_identifiers(out);
            }
        }
    }
}
