//! Query expressions and their compilation to store-native filters.
//!
//! The engine consumes an already-parsed expression tree of property
//! references, literals, and binary operators; the textual query language
//! and its parser live with the host. Expressions are built with chainable
//! constructors:
//!
//! ```ignore
//! use graphdoc_core::query::Expr;
//!
//! let expr = Expr::property("name")
//!     .eq(Expr::literal("a"))
//!     .and(Expr::property("name").ne(Expr::literal("b")));
//! ```
//!
//! [`QueryCompiler`] lowers the tree into a filter document. Store filters
//! are conjunctions of per-field predicates, not generic boolean trees, so
//! `&&` does not nest: both sides compile independently and are merged per
//! field. Two negations of one field fold into a single `$nin`, scalar
//! constraints fold into `$all` lists, and pairs with no per-field merge
//! (two `$or` disjunctions among them) fall back to a top-level `$and`,
//! which makes the merge total.

use bson::{Bson, Document, doc, oid::ObjectId};

use crate::document::ID_KEY;
use crate::error::{GraphStoreError, GraphStoreResult};

/// A binary operator of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    And,
    Or,
}

/// A parsed boolean expression over object properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A property path, e.g. `name`.
    Property(String),
    /// A literal value in its textual form.
    Literal(String),
    /// The `null` keyword.
    Null,
    /// A binary operation over two sub-expressions.
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
}

impl Expr {
    /// Creates a property reference.
    pub fn property(name: impl Into<String>) -> Expr {
        Expr::Property(name.into())
    }

    /// Creates a literal.
    pub fn literal(value: impl Into<String>) -> Expr {
        Expr::Literal(value.into())
    }

    /// Creates the `null` keyword.
    pub fn null() -> Expr {
        Expr::Null
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary { op, left: Box::new(left), right: Box::new(right) }
    }

    /// Combines with `==`.
    pub fn eq(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Eq, self, rhs)
    }

    /// Combines with `!=`.
    pub fn ne(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Ne, self, rhs)
    }

    /// Combines with `&&`.
    pub fn and(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::And, self, rhs)
    }

    /// Combines with `||`.
    pub fn or(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Or, self, rhs)
    }
}

/// Compiles expression trees into store-native filter documents.
pub struct QueryCompiler;

impl QueryCompiler {
    /// Compiles an expression into a filter document.
    ///
    /// # Errors
    ///
    /// Returns an error when the expression is not a boolean operation over
    /// property references and literals, or when an identifier literal does
    /// not parse as a store identifier.
    pub fn compile(expr: &Expr) -> GraphStoreResult<Document> {
        match expr {
            Expr::Binary { op, left, right } => match op {
                BinaryOp::Eq => Self::compile_eq(left, right),
                BinaryOp::Ne => Self::compile_ne(left, right),
                BinaryOp::And => {
                    let compiled = Self::compile(left)?;
                    Ok(Self::merge_and(compiled, Self::compile(right)?))
                }
                BinaryOp::Or => {
                    let compiled = Self::compile(left)?;
                    Ok(Self::merge_or(compiled, Self::compile(right)?))
                }
            },
            other => Err(GraphStoreError::Serialization(format!(
                "expression {other:?} is not a boolean operation"
            ))),
        }
    }

    fn property_of(expr: &Expr) -> GraphStoreResult<&str> {
        match expr {
            Expr::Property(name) => Ok(name),
            other => Err(GraphStoreError::Serialization(format!(
                "expected a property reference, found {other:?}"
            ))),
        }
    }

    fn compile_eq(left: &Expr, right: &Expr) -> GraphStoreResult<Document> {
        let property = Self::property_of(left)?;

        match right {
            Expr::Literal(value) if property == ID_KEY => {
                let id = ObjectId::parse_str(value).map_err(|e| {
                    GraphStoreError::Conversion(format!("invalid identifier literal '{value}': {e}"))
                })?;
                Ok(doc! { property: id })
            }
            Expr::Literal(value) => Ok(doc! { property: value.as_str() }),
            Expr::Null => Ok(doc! { property: { "$exists": false } }),
            other => Err(GraphStoreError::Serialization(format!(
                "unsupported right operand {other:?} for '=='"
            ))),
        }
    }

    fn compile_ne(left: &Expr, right: &Expr) -> GraphStoreResult<Document> {
        let property = Self::property_of(left)?;

        match right {
            Expr::Literal(value) => Ok(doc! { property: { "$ne": value.as_str() } }),
            Expr::Null => Ok(doc! { property: { "$exists": true } }),
            other => Err(GraphStoreError::Serialization(format!(
                "unsupported right operand {other:?} for '!='"
            ))),
        }
    }

    /// Disjunction: extend an existing `$or` list, otherwise start one.
    fn merge_or(mut left: Document, right: Document) -> Document {
        if let Some(Bson::Array(_)) = left.get("$or") {
            if let Some(Bson::Array(branches)) = left.get_mut("$or") {
                branches.push(Bson::Document(right));
            }
            left
        } else {
            doc! { "$or": [left, right] }
        }
    }

    /// Conjunction: merge the right side into the left, per field.
    fn merge_and(mut left: Document, right: Document) -> Document {
        for (field, right_value) in right {
            // Two disjunctions cannot be merged field-wise; conjoin them
            // under a top-level $and.
            if field == "$or" && left.contains_key("$or") {
                let left_or = left.remove("$or").unwrap_or(Bson::Null);
                Self::push_and(&mut left, doc! { "$or": left_or });
                Self::push_and(&mut left, doc! { "$or": right_value });
                continue;
            }

            let Some(left_value) = left.remove(&field) else {
                left.insert(field, right_value);
                continue;
            };

            match (left_value, right_value) {
                (Bson::Document(mut left_doc), Bson::Document(right_doc)) => {
                    if left_doc.contains_key("$nin") && right_doc.contains_key("$ne") {
                        if let Some(Bson::Array(values)) = left_doc.get_mut("$nin") {
                            values.push(right_doc.get("$ne").cloned().unwrap_or(Bson::Null));
                        }
                        left.insert(field, left_doc);
                    } else if left_doc.contains_key("$ne") && right_doc.contains_key("$ne") {
                        let excluded = vec![
                            left_doc.get("$ne").cloned().unwrap_or(Bson::Null),
                            right_doc.get("$ne").cloned().unwrap_or(Bson::Null),
                        ];
                        left.insert(field, doc! { "$nin": excluded });
                    } else {
                        for (key, value) in right_doc {
                            left_doc.insert(key, value);
                        }
                        left.insert(field, left_doc);
                    }
                }
                (Bson::Document(mut left_doc), right_value) => {
                    if let Some(Bson::Array(values)) = left_doc.get_mut("$all") {
                        values.push(right_value);
                        left.insert(field, left_doc);
                    } else {
                        // No per-field merge exists; conjoin both
                        // constraints explicitly.
                        Self::push_and(&mut left, doc! { field.clone(): left_doc });
                        Self::push_and(&mut left, doc! { field: right_value });
                    }
                }
                (Bson::Array(mut left_values), Bson::Array(right_values)) => {
                    left_values.extend(right_values);
                    left.insert(field, left_values);
                }
                (Bson::Array(mut left_values), right_value) => {
                    left_values.push(right_value);
                    left.insert(field, left_values);
                }
                (left_value, Bson::Array(mut right_values)) => {
                    right_values.insert(0, left_value);
                    left.insert(field, right_values);
                }
                (left_value, right_value) => {
                    left.insert(field, doc! { "$all": [left_value, right_value] });
                }
            }
        }

        left
    }

    fn push_and(document: &mut Document, clause: Document) {
        match document.get_mut("$and") {
            Some(Bson::Array(clauses)) => clauses.push(Bson::Document(clause)),
            _ => {
                document.insert("$and", vec![Bson::Document(clause)]);
            }
        }
    }
}
