//! Filter evaluation for in-memory document matching.
//!
//! The backend contract takes compiled filter documents, so this module
//! interprets the operator subset the query compiler emits: top-level `$or`
//! and `$and`, per-field `$eq`/`$ne`/`$in`/`$nin`/`$all`/`$exists`, and
//! plain equality. Comparisons against array-valued fields use the store's
//! contains semantics: a scalar matches when the array holds it.

use bson::{Bson, Document};

/// Whether a stored document matches a filter document. Every filter entry
/// must hold; an empty filter matches everything.
pub(crate) fn matches(filter: &Document, document: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$or" => match condition {
            Bson::Array(branches) => branches
                .iter()
                .any(|branch| branch.as_document().is_some_and(|b| matches(b, document))),
            _ => false,
        },
        "$and" => match condition {
            Bson::Array(clauses) => clauses
                .iter()
                .all(|clause| clause.as_document().is_some_and(|c| matches(c, document))),
            _ => false,
        },
        field => field_matches(document.get(field), condition),
    })
}

fn field_matches(actual: Option<&Bson>, condition: &Bson) -> bool {
    match condition {
        Bson::Document(operators) if is_operator_document(operators) => operators
            .iter()
            .all(|(operator, argument)| operator_matches(actual, operator, argument)),
        // An explicit null condition matches null and missing alike.
        Bson::Null => matches!(actual, None | Some(Bson::Null)),
        expected => actual.is_some_and(|a| equals_or_contains(a, expected)),
    }
}

fn is_operator_document(document: &Document) -> bool {
    document.keys().next().is_some_and(|key| key.starts_with('$'))
}

fn operator_matches(actual: Option<&Bson>, operator: &str, argument: &Bson) -> bool {
    match operator {
        "$exists" => {
            let want = matches!(argument, Bson::Boolean(true));
            actual.is_some() == want
        }
        "$eq" => actual.is_some_and(|a| equals_or_contains(a, argument)),
        // A missing field is "not equal" to everything.
        "$ne" => !actual.is_some_and(|a| equals_or_contains(a, argument)),
        "$in" => match argument {
            Bson::Array(allowed) => {
                actual.is_some_and(|a| allowed.iter().any(|v| equals_or_contains(a, v)))
            }
            _ => false,
        },
        "$nin" => match argument {
            Bson::Array(excluded) => {
                !actual.is_some_and(|a| excluded.iter().any(|v| equals_or_contains(a, v)))
            }
            _ => false,
        },
        "$all" => match argument {
            // Every required element must hold; operator-document elements
            // apply to the field itself.
            Bson::Array(required) => required.iter().all(|requirement| match requirement {
                Bson::Document(operators) if is_operator_document(operators) => {
                    field_matches(actual, requirement)
                }
                expected => actual.is_some_and(|a| equals_or_contains(a, expected)),
            }),
            _ => false,
        },
        _ => false,
    }
}

fn equals_or_contains(actual: &Bson, expected: &Bson) -> bool {
    if let Bson::Array(elements) = actual {
        if elements.iter().any(|element| element == expected) {
            return true;
        }
    }
    actual == expected
}
