use crate::errors::Error;
use crate::record::schema::Schema;
use crate::record::Record;
use crate::types::Value;
use anyhow::{bail, Result};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            CmpOp::Eq => "=",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtEq => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtEq => ">=",
        };
        write!(f, "{symbol}")
    }
}

/// Pure predicate over a (record, schema) pair. Comparisons require both
/// sides to carry the same type; the logical operators require booleans.
#[derive(Debug, Clone)]
pub enum Expr {
    /// attribute by position in the schema
    Attr(usize),
    Const(Value),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn cmp(op: CmpOp, left: Expr, right: Expr) -> Self {
        Expr::Cmp(op, Box::new(left), Box::new(right))
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Or(Box::new(left), Box::new(right))
    }

    pub fn not(inner: Expr) -> Self {
        Expr::Not(Box::new(inner))
    }

    pub fn eval(&self, record: &Record, schema: &Schema) -> Result<Value> {
        match self {
            Expr::Attr(i) => record.get_attr(*i, schema),
            Expr::Const(value) => Ok(value.clone()),
            Expr::Cmp(op, left, right) => {
                let left = left.eval(record, schema)?;
                let right = right.eval(record, schema)?;
                let ord = left.compare(&right)?;
                let result = match op {
                    CmpOp::Eq => ord == Ordering::Equal,
                    CmpOp::NotEq => ord != Ordering::Equal,
                    CmpOp::Lt => ord == Ordering::Less,
                    CmpOp::LtEq => ord != Ordering::Greater,
                    CmpOp::Gt => ord == Ordering::Greater,
                    CmpOp::GtEq => ord != Ordering::Less,
                };
                Ok(Value::Bool(result))
            }
            Expr::And(left, right) => {
                let left = self.operand_bool(left, record, schema)?;
                let right = self.operand_bool(right, record, schema)?;
                Ok(Value::Bool(left && right))
            }
            Expr::Or(left, right) => {
                let left = self.operand_bool(left, record, schema)?;
                let right = self.operand_bool(right, record, schema)?;
                Ok(Value::Bool(left || right))
            }
            Expr::Not(inner) => {
                let inner = self.operand_bool(inner, record, schema)?;
                Ok(Value::Bool(!inner))
            }
        }
    }

    /// Evaluates the whole predicate down to a boolean, as a scan condition
    /// must.
    pub fn eval_bool(&self, record: &Record, schema: &Schema) -> Result<bool> {
        match self.eval(record, schema)? {
            Value::Bool(result) => Ok(result),
            _ => bail!(Error::NotBoolean(self.to_string())),
        }
    }

    fn operand_bool(&self, operand: &Expr, record: &Record, schema: &Schema) -> Result<bool> {
        match operand.eval(record, schema)? {
            Value::Bool(result) => Ok(result),
            _ => bail!(Error::NotBoolean(operand.to_string())),
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Attr(i) => write!(f, "#{i}"),
            Expr::Const(value) => write!(f, "{value}"),
            Expr::Cmp(op, left, right) => write!(f, "({left} {op} {right})"),
            Expr::And(left, right) => write!(f, "({left} AND {right})"),
            Expr::Or(left, right) => write!(f, "({left} OR {right})"),
            Expr::Not(inner) => write!(f, "(NOT {inner})"),
        }
    }
}
