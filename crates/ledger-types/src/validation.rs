//! Configuration validation utilities for the ledger system.
//!
//! This module provides a small declarative framework for validating the
//! TOML tables that configure pluggable implementations. A schema lists
//! required and optional fields with their expected types; backends expose
//! their schema through `ConfigSchema` so wiring code can validate
//! configuration before constructing anything.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// Error that occurs when a required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// Error that occurs when a field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// Error that occurs when field type is incorrect.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Represents the type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	/// A string value.
	String,
	/// An integer value with optional minimum and maximum bounds.
	Integer {
		/// Minimum allowed value (inclusive).
		min: Option<i64>,
		/// Maximum allowed value (inclusive).
		max: Option<i64>,
	},
	/// A boolean value.
	Boolean,
}

impl FieldType {
	fn name(&self) -> &'static str {
		match self {
			FieldType::String => "string",
			FieldType::Integer { .. } => "integer",
			FieldType::Boolean => "boolean",
		}
	}
}

/// Describes the TOML type of a value for error messages.
fn type_name(value: &toml::Value) -> &'static str {
	match value {
		toml::Value::String(_) => "string",
		toml::Value::Integer(_) => "integer",
		toml::Value::Float(_) => "float",
		toml::Value::Boolean(_) => "boolean",
		toml::Value::Datetime(_) => "datetime",
		toml::Value::Array(_) => "array",
		toml::Value::Table(_) => "table",
	}
}

/// A field in a configuration schema.
#[derive(Debug)]
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
}

impl Field {
	/// Creates a new field with the given name and type.
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
		}
	}

	fn validate(&self, value: &toml::Value) -> Result<(), ValidationError> {
		match (&self.field_type, value) {
			(FieldType::String, toml::Value::String(_)) => Ok(()),
			(FieldType::Boolean, toml::Value::Boolean(_)) => Ok(()),
			(FieldType::Integer { min, max }, toml::Value::Integer(i)) => {
				if let Some(min) = min {
					if i < min {
						return Err(ValidationError::InvalidValue {
							field: self.name.clone(),
							message: format!("{} is below the minimum of {}", i, min),
						});
					}
				}
				if let Some(max) = max {
					if i > max {
						return Err(ValidationError::InvalidValue {
							field: self.name.clone(),
							message: format!("{} is above the maximum of {}", i, max),
						});
					}
				}
				Ok(())
			}
			(expected, actual) => Err(ValidationError::TypeMismatch {
				field: self.name.clone(),
				expected: expected.name().to_string(),
				actual: type_name(actual).to_string(),
			}),
		}
	}
}

/// Defines a validation schema for a TOML configuration table.
///
/// A schema consists of required fields that must be present and optional
/// fields that may be present.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	/// Creates a new schema with required and optional fields.
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	///
	/// Checks that all required fields are present and that every known
	/// field has the expected type. Unknown fields are ignored.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let empty = toml::map::Map::new();
		let table = config.as_table().unwrap_or(&empty);

		for field in &self.required {
			match table.get(&field.name) {
				Some(value) => field.validate(value)?,
				None => return Err(ValidationError::MissingField(field.name.clone())),
			}
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.validate(value)?;
			}
		}

		Ok(())
	}
}

/// Trait implemented by components that validate their own configuration.
pub trait ConfigSchema: Send + Sync {
	/// Validates the given configuration table.
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_schema() -> Schema {
		Schema::new(
			vec![Field::new("storage_path", FieldType::String)],
			vec![Field::new(
				"sync_interval_seconds",
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			)],
		)
	}

	#[test]
	fn accepts_valid_table() {
		let config: toml::Value = toml::from_str(
			r#"
			storage_path = "./data"
			sync_interval_seconds = 30
			"#,
		)
		.unwrap();
		assert!(sample_schema().validate(&config).is_ok());
	}

	#[test]
	fn rejects_missing_required_field() {
		let config: toml::Value = toml::from_str("sync_interval_seconds = 30").unwrap();
		let err = sample_schema().validate(&config).unwrap_err();
		assert!(matches!(err, ValidationError::MissingField(f) if f == "storage_path"));
	}

	#[test]
	fn rejects_type_mismatch_and_range() {
		let config: toml::Value = toml::from_str("storage_path = 42").unwrap();
		let err = sample_schema().validate(&config).unwrap_err();
		assert!(matches!(err, ValidationError::TypeMismatch { .. }));

		let config: toml::Value = toml::from_str(
			r#"
			storage_path = "./data"
			sync_interval_seconds = -1
			"#,
		)
		.unwrap();
		let err = sample_schema().validate(&config).unwrap_err();
		assert!(matches!(err, ValidationError::InvalidValue { .. }));
	}
}
