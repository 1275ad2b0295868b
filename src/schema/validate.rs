//! Request/schema compatibility checks
//!
//! A request tree is accepted against a schema tree when every node the
//! request selects exists at the same relative position in the schema with an
//! assignable shape. Violations are collected into a tree of messages rather
//! than failing on the first one.

use crate::schema::types::{NodeKind, SchemaNode, Tag};
use std::fmt;
use thiserror::Error;

/// A single incompatibility between a request and a schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("expected {expected}, the request has {found}")]
    TagMismatch { expected: Tag, found: Tag },

    #[error("scalar `{found}` is not assignable to `{expected}`")]
    ScalarMismatch { expected: String, found: String },

    #[error("scalar `{name}` is {expected} in the schema")]
    StrictnessMismatch { name: String, expected: &'static str },

    #[error("typename `{found}` does not match `{expected}`")]
    TypenameMismatch { expected: String, found: String },

    #[error("member `{0}` does not exist in the schema")]
    UnknownMember(String),

    #[error("variable `{0}` is not declared by the schema")]
    UnknownVariable(String),

    #[error("in `{segment}`")]
    Nested {
        segment: String,
        errors: Vec<ValidationError>,
    },
}

/// Tree-shaped list of validation errors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of top-level errors
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<ValidationError> {
        self.0
    }

    /// Count of leaf messages across the whole tree
    pub fn leaf_count(&self) -> usize {
        fn count(errors: &[ValidationError]) -> usize {
            errors
                .iter()
                .map(|error| match error {
                    ValidationError::Nested { errors, .. } => count(errors),
                    _ => 1,
                })
                .sum()
        }
        count(&self.0)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn render(
            f: &mut fmt::Formatter<'_>,
            errors: &[ValidationError],
            depth: usize,
        ) -> fmt::Result {
            for error in errors {
                writeln!(f, "{:indent$}- {}", "", error, indent = depth * 2)?;
                if let ValidationError::Nested { errors, .. } = error {
                    render(f, errors, depth + 1)?;
                }
            }
            Ok(())
        }
        render(f, &self.0, 0)
    }
}

/// Check `request` against `schema`
pub fn validate(request: &SchemaNode, schema: &SchemaNode) -> ValidationErrors {
    ValidationErrors(check(request, schema))
}

fn check(request: &SchemaNode, schema: &SchemaNode) -> Vec<ValidationError> {
    let request = request.unwrap_mutation();
    let schema = schema.unwrap_mutation();
    let mut errors = Vec::new();

    for name in request.variables().keys() {
        if !schema.variables().contains_key(name) {
            errors.push(ValidationError::UnknownVariable(name.clone()));
        }
    }

    match (request.kind(), schema.kind()) {
        (
            NodeKind::Scalar {
                name: found,
                strict: found_strict,
            },
            NodeKind::Scalar {
                name: expected,
                strict: expected_strict,
            },
        ) => {
            if found != expected {
                errors.push(ValidationError::ScalarMismatch {
                    expected: expected.clone(),
                    found: found.clone(),
                });
            } else if found_strict != expected_strict {
                errors.push(ValidationError::StrictnessMismatch {
                    name: expected.clone(),
                    expected: if *expected_strict { "strict" } else { "lenient" },
                });
            }
        }
        (NodeKind::Option(r), NodeKind::Option(s))
        | (NodeKind::Array(r), NodeKind::Array(s))
        | (NodeKind::NonEmptyArray(r), NodeKind::NonEmptyArray(s)) => {
            errors.extend(nested("item", check(r, s)));
        }
        (
            NodeKind::Map {
                key: request_key,
                item: request_item,
            },
            NodeKind::Map {
                key: schema_key,
                item: schema_item,
            },
        ) => {
            errors.extend(nested("key", check(request_key, schema_key)));
            errors.extend(nested("item", check(request_item, schema_item)));
        }
        (
            NodeKind::Type {
                typename: found,
                members: requested,
            },
            NodeKind::Type {
                typename: expected,
                members: declared,
            },
        ) => {
            if found != expected {
                errors.push(ValidationError::TypenameMismatch {
                    expected: expected.clone(),
                    found: found.clone(),
                });
            }
            errors.extend(check_members(requested, declared));
        }
        (NodeKind::Sum { members: requested }, NodeKind::Sum { members: declared }) => {
            errors.extend(check_members(requested, declared));
        }
        (found, expected) if found.tag() == expected.tag() => {}
        (found, expected) => errors.push(ValidationError::TagMismatch {
            expected: expected.tag(),
            found: found.tag(),
        }),
    }

    errors
}

fn check_members<'a>(
    requested: &'a std::collections::BTreeMap<String, SchemaNode>,
    declared: &'a std::collections::BTreeMap<String, SchemaNode>,
) -> impl Iterator<Item = ValidationError> + 'a {
    requested
        .iter()
        .filter_map(|(name, request)| match declared.get(name) {
            None => Some(ValidationError::UnknownMember(name.clone())),
            Some(schema) => nested(name, check(request, schema)),
        })
}

fn nested(segment: &str, errors: Vec<ValidationError>) -> Option<ValidationError> {
    if errors.is_empty() {
        None
    } else {
        Some(ValidationError::Nested {
            segment: segment.to_string(),
            errors,
        })
    }
}
