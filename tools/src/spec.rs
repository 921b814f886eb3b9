//! Tool input specifications.
//!
//! A [`ToolSpec`] describes the arguments a tool accepts. It renders to the
//! JSON Schema shown to the generator and validates the arguments the
//! generator sends back.

use serde::{Deserialize, Serialize};

/// Specification for a tool's arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Input parameters for the tool.
    pub inputs: Vec<ToolInput>,
}

impl ToolSpec {
    /// Create a new empty tool spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input parameter.
    pub fn with_input(mut self, input: ToolInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Generate JSON Schema from inputs (function-calling format).
    pub fn generate_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for input in &self.inputs {
            properties.insert(input.name.clone(), input.to_schema());
            if input.required {
                required.push(serde_json::Value::String(input.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }

    /// Validate argument values against the spec.
    ///
    /// Missing required inputs, wrong types, violated constraints and
    /// arguments the spec does not declare are all rejected.
    pub fn validate_inputs(&self, values: &serde_json::Value) -> Result<(), String> {
        let obj = values
            .as_object()
            .ok_or_else(|| "arguments must be an object".to_string())?;

        for input in &self.inputs {
            if input.required && !obj.contains_key(&input.name) {
                return Err(format!("missing required input: {}", input.name));
            }

            if let Some(value) = obj.get(&input.name) {
                input.validate(value)?;
            }
        }

        if let Some(unknown) = obj
            .keys()
            .find(|key| !self.inputs.iter().any(|input| &input.name == *key))
        {
            return Err(format!("unexpected input: {unknown}"));
        }

        Ok(())
    }
}

/// An input parameter for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInput {
    /// Parameter name.
    pub name: String,

    /// Data type.
    pub data_type: DataType,

    /// Description of the parameter.
    pub description: String,

    /// Whether the parameter is required.
    pub required: bool,

    /// Validation constraints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<InputConstraints>,
}

impl ToolInput {
    /// Create a new required input parameter.
    pub fn required(
        name: impl Into<String>,
        data_type: DataType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            description: description.into(),
            required: true,
            constraints: None,
        }
    }

    /// Create a new optional input parameter.
    pub fn optional(
        name: impl Into<String>,
        data_type: DataType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            description: description.into(),
            required: false,
            constraints: None,
        }
    }

    /// Add constraints.
    pub fn with_constraints(mut self, constraints: InputConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Convert to JSON Schema.
    pub fn to_schema(&self) -> serde_json::Value {
        let mut schema = serde_json::json!({
            "type": self.data_type.to_json_type(),
            "description": self.description
        });

        if let Some(constraints) = &self.constraints {
            constraints.apply_to_schema(&mut schema);
        }

        schema
    }

    /// Validate a value against this input's type and constraints.
    pub fn validate(&self, value: &serde_json::Value) -> Result<(), String> {
        let valid_type = match self.data_type {
            DataType::String => value.is_string(),
            DataType::Integer => value.is_i64() || value.is_u64(),
        };

        if !valid_type {
            return Err(format!(
                "invalid type for {}: expected {}",
                self.name,
                self.data_type.to_json_type()
            ));
        }

        if let Some(constraints) = &self.constraints {
            constraints.validate(value, &self.name)?;
        }

        Ok(())
    }
}

/// Data types for tool parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    String,
    Integer,
}

impl DataType {
    /// Convert to JSON Schema type string.
    pub fn to_json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
        }
    }
}

/// Constraints for input validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputConstraints {
    /// Minimum value (for integers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Maximum value (for integers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Minimum length in characters (for strings).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    /// Maximum length in characters (for strings).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl InputConstraints {
    /// Create constraints for a numeric range.
    pub fn range(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Default::default()
        }
    }

    /// Create constraints for string length.
    pub fn length(min: usize, max: usize) -> Self {
        Self {
            min_length: Some(min),
            max_length: Some(max),
            ..Default::default()
        }
    }

    /// Apply constraints to a JSON Schema object.
    pub fn apply_to_schema(&self, schema: &mut serde_json::Value) {
        if let Some(min) = self.min {
            schema["minimum"] = serde_json::json!(min);
        }
        if let Some(max) = self.max {
            schema["maximum"] = serde_json::json!(max);
        }
        if let Some(min_len) = self.min_length {
            schema["minLength"] = serde_json::json!(min_len);
        }
        if let Some(max_len) = self.max_length {
            schema["maxLength"] = serde_json::json!(max_len);
        }
    }

    /// Validate a value against these constraints.
    pub fn validate(&self, value: &serde_json::Value, name: &str) -> Result<(), String> {
        if let Some(num) = value.as_f64() {
            if let Some(min) = self.min
                && num < min
            {
                return Err(format!("{name}: value {num} is less than minimum {min}"));
            }
            if let Some(max) = self.max
                && num > max
            {
                return Err(format!("{name}: value {num} is greater than maximum {max}"));
            }
        }

        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if let Some(min) = self.min_length
                && len < min
            {
                return Err(format!("{name}: length {len} is less than {min}"));
            }
            if let Some(max) = self.max_length
                && len > max
            {
                return Err(format!("{name}: length {len} is greater than {max}"));
            }
        }

        Ok(())
    }
}
