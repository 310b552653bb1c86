//! Pre-flight parameter validation.
//!
//! The validator walks the caller's parameter tree against the operation's
//! input shape before any network activity. It collects *all* violations
//! found — missing required members, undeclared keys (structures are
//! closed), and scalar type mismatches — then fails once at the end: a
//! single violation is returned as-is, several are aggregated into one
//! composite error listing every one.

use serde_json::Value;

use crate::error::{MultipleValidationErrors, SdkError, ValidationError};

use super::{Shape, ShapeRef, SchemaRegistry};

/// Validates a parameter tree against a shape.
///
/// # Errors
///
/// Returns [`SdkError::Validation`] describing every violation found, or
/// [`SdkError::Schema`] if the shape graph contains an unresolvable named
/// reference (a programming defect, reported immediately).
///
/// # Example
///
/// ```rust
/// use nimbus_client::schema::{validate, Member, SchemaRegistry, Shape, ShapeRef, StructureShape};
/// use serde_json::json;
///
/// let registry = SchemaRegistry::new();
/// let input = ShapeRef::inline(Shape::Structure(
///     StructureShape::new()
///         .member("Name", Member::new(ShapeRef::inline(Shape::String)))
///         .require("Name"),
/// ));
///
/// assert!(validate::validate(&registry, &input, &json!({"Name": "abc"})).is_ok());
/// assert!(validate::validate(&registry, &input, &json!({})).is_err());
/// ```
pub fn validate(
    registry: &SchemaRegistry,
    shape: &ShapeRef,
    params: &Value,
) -> Result<(), SdkError> {
    let mut errors = Vec::new();
    let resolved = shape.resolve(registry)?;
    walk(registry, &resolved, params, "", &mut errors)?;

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0).into()),
        _ => Err(ValidationError::Multiple(MultipleValidationErrors { errors }).into()),
    }
}

fn walk(
    registry: &SchemaRegistry,
    shape: &Shape,
    value: &Value,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Result<(), SdkError> {
    match shape {
        Shape::Structure(structure) => {
            let Value::Object(map) = value else {
                errors.push(mismatch(path, "structure"));
                return Ok(());
            };

            for required in &structure.required {
                let missing = match map.get(required) {
                    None | Some(Value::Null) => true,
                    Some(_) => false,
                };
                if missing {
                    errors.push(ValidationError::MissingRequiredParameter {
                        path: join(path, required),
                    });
                }
            }

            for (key, member_value) in map {
                let Some(member) = structure.get(key) else {
                    errors.push(ValidationError::UnexpectedParameter {
                        path: join(path, key),
                    });
                    continue;
                };
                if member_value.is_null() {
                    continue;
                }
                let member_shape = member.shape.resolve(registry)?;
                walk(registry, &member_shape, member_value, &join(path, key), errors)?;
            }
        }
        Shape::List(list) => {
            let Value::Array(items) = value else {
                errors.push(mismatch(path, "list"));
                return Ok(());
            };
            let element_shape = list.member.shape.resolve(registry)?;
            for (index, item) in items.iter().enumerate() {
                walk(
                    registry,
                    &element_shape,
                    item,
                    &format!("{path}[{index}]"),
                    errors,
                )?;
            }
        }
        Shape::Map(map_shape) => {
            let Value::Object(entries) = value else {
                errors.push(mismatch(path, "map"));
                return Ok(());
            };
            let value_shape = map_shape.value.shape.resolve(registry)?;
            for (key, entry_value) in entries {
                walk(registry, &value_shape, entry_value, &join(path, key), errors)?;
            }
        }
        Shape::String => {
            if !value.is_string() {
                errors.push(mismatch(path, "string"));
            }
        }
        Shape::Integer => {
            if value.as_i64().is_none() && value.as_u64().is_none() {
                errors.push(mismatch(path, "integer"));
            }
        }
        Shape::Float => {
            if !value.is_number() {
                errors.push(mismatch(path, "float"));
            }
        }
        Shape::Boolean => {
            if !value.is_boolean() {
                errors.push(mismatch(path, "boolean"));
            }
        }
        Shape::Timestamp(_) => {
            if super::coerce::value_to_timestamp(value).is_none() {
                errors.push(mismatch(path, "timestamp"));
            }
        }
        Shape::Binary => {
            if !value.is_string() {
                errors.push(mismatch(path, "binary"));
            }
        }
    }
    Ok(())
}

fn mismatch(path: &str, expected: &str) -> ValidationError {
    ValidationError::InvalidParameterType {
        path: if path.is_empty() {
            "params".to_string()
        } else {
            path.to_string()
        },
        expected: expected.to_string(),
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ListShape, MapShape, Member, StructureShape};
    use serde_json::json;

    fn simple_input() -> ShapeRef {
        ShapeRef::inline(Shape::Structure(
            StructureShape::new()
                .member("Name", Member::new(ShapeRef::inline(Shape::String)))
                .member(
                    "Tags",
                    Member::new(ShapeRef::inline(Shape::List(ListShape::new(Member::new(
                        ShapeRef::inline(Shape::String),
                    ))))),
                )
                .member("Count", Member::new(ShapeRef::inline(Shape::Integer)))
                .require("Name"),
        ))
    }

    #[test]
    fn test_valid_params_pass() {
        let registry = SchemaRegistry::new();
        let result = validate(
            &registry,
            &simple_input(),
            &json!({"Name": "abc", "Tags": ["a", "b"], "Count": 3}),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_required_member_yields_exactly_one_error() {
        let registry = SchemaRegistry::new();
        let err = validate(&registry, &simple_input(), &json!({})).unwrap_err();
        match err {
            SdkError::Validation(ValidationError::MissingRequiredParameter { path }) => {
                assert_eq!(path, "Name");
            }
            other => panic!("expected MissingRequiredParameter, got {other:?}"),
        }
    }

    #[test]
    fn test_null_required_member_is_missing() {
        let registry = SchemaRegistry::new();
        let err = validate(&registry, &simple_input(), &json!({"Name": null})).unwrap_err();
        assert!(matches!(
            err,
            SdkError::Validation(ValidationError::MissingRequiredParameter { .. })
        ));
    }

    #[test]
    fn test_undeclared_key_yields_unexpected_parameter() {
        let registry = SchemaRegistry::new();
        let err = validate(
            &registry,
            &simple_input(),
            &json!({"Name": "abc", "Extra": 1}),
        )
        .unwrap_err();
        match err {
            SdkError::Validation(ValidationError::UnexpectedParameter { path }) => {
                assert_eq!(path, "Extra");
            }
            other => panic!("expected UnexpectedParameter, got {other:?}"),
        }
    }

    #[test]
    fn test_list_of_string_rejects_non_string_elements() {
        let registry = SchemaRegistry::new();
        let err = validate(
            &registry,
            &simple_input(),
            &json!({"Name": "abc", "Tags": ["ok", 5]}),
        )
        .unwrap_err();
        match err {
            SdkError::Validation(ValidationError::InvalidParameterType { path, expected }) => {
                assert_eq!(path, "Tags[1]");
                assert_eq!(expected, "string");
            }
            other => panic!("expected InvalidParameterType, got {other:?}"),
        }
    }

    #[test]
    fn test_multiple_violations_are_aggregated() {
        let registry = SchemaRegistry::new();
        let err = validate(
            &registry,
            &simple_input(),
            &json!({"Extra": 1, "Count": "three"}),
        )
        .unwrap_err();
        match err {
            SdkError::Validation(ValidationError::Multiple(aggregate)) => {
                assert_eq!(aggregate.errors.len(), 3);
                let codes: Vec<&str> = aggregate.errors.iter().map(ValidationError::code).collect();
                assert!(codes.contains(&"MissingRequiredParameter"));
                assert!(codes.contains(&"UnexpectedParameter"));
                assert!(codes.contains(&"InvalidParameterType"));
            }
            other => panic!("expected aggregate, got {other:?}"),
        }
    }

    #[test]
    fn test_nested_paths_are_dotted() {
        let registry = SchemaRegistry::new();
        let input = ShapeRef::inline(Shape::Structure(StructureShape::new().member(
            "Config",
            Member::new(ShapeRef::inline(Shape::Structure(
                StructureShape::new()
                    .member("Name", Member::new(ShapeRef::inline(Shape::String)))
                    .require("Name"),
            ))),
        )));

        let err = validate(&registry, &input, &json!({"Config": {}})).unwrap_err();
        match err {
            SdkError::Validation(ValidationError::MissingRequiredParameter { path }) => {
                assert_eq!(path, "Config.Name");
            }
            other => panic!("expected nested missing parameter, got {other:?}"),
        }
    }

    #[test]
    fn test_map_values_are_validated() {
        let registry = SchemaRegistry::new();
        let input = ShapeRef::inline(Shape::Structure(StructureShape::new().member(
            "Attributes",
            Member::new(ShapeRef::inline(Shape::Map(MapShape::new(Member::new(
                ShapeRef::inline(Shape::Integer),
            ))))),
        )));

        let err = validate(
            &registry,
            &input,
            &json!({"Attributes": {"a": 1, "b": "nope"}}),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SdkError::Validation(ValidationError::InvalidParameterType { .. })
        ));
    }

    #[test]
    fn test_unknown_named_reference_is_schema_error() {
        let registry = SchemaRegistry::new();
        let input = ShapeRef::inline(Shape::Structure(
            StructureShape::new().member("X", Member::new(ShapeRef::named("Ghost"))),
        ));
        let err = validate(&registry, &input, &json!({"X": "value"})).unwrap_err();
        assert!(matches!(err, SdkError::Schema(_)));
    }
}
