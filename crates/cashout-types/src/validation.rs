//! Schema checks for the free-form TOML tables handed to pluggable
//! implementations (storage backends, settlement providers).

use thiserror::Error;

/// Errors raised when a config table does not match its schema.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: &'static str,
		actual: String,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
	String,
	Boolean,
	/// Credit amount in minor units, at least `min`.
	Amount { min: u64 },
}

impl FieldType {
	fn name(self) -> &'static str {
		match self {
			FieldType::String => "string",
			FieldType::Boolean => "boolean",
			FieldType::Amount { .. } => "amount",
		}
	}
}

pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field with a type and an optional value check.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a check run after the type check passes.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of one implementation table.
#[derive(Debug, Default)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table",
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn check_type(field: &str, value: &toml::Value, expected: FieldType) -> Result<(), ValidationError> {
	match (expected, value) {
		(FieldType::String, toml::Value::String(_)) | (FieldType::Boolean, toml::Value::Boolean(_)) => {
			Ok(())
		}
		(FieldType::Amount { min }, toml::Value::Integer(raw)) => match u64::try_from(*raw) {
			Ok(amount) if amount >= min => Ok(()),
			_ => Err(ValidationError::InvalidValue {
				field: field.to_string(),
				message: format!("{} is not an amount of at least {}", raw, min),
			}),
		},
		_ => Err(ValidationError::TypeMismatch {
			field: field.to_string(),
			expected: expected.name(),
			actual: value.type_str().to_string(),
		}),
	}
}

/// Implemented by every pluggable component that accepts a config table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}
