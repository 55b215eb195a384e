use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::ValidationOutcome;
use crate::util::strip_code_fence;

/// The fixed listing schema (JSON Schema draft 2020-12).
///
/// `floor` is a string: listings print values such as "parter", "3/4" or
/// "mansarda" that do not fit an integer.
pub fn listing_schema() -> Value {
    json!({
        "type": "object",
        "description": "Schema for the extracted property information.",
        "properties": {
            "name": {
                "type": "string",
                "description": "Name of the listing."
            },
            "city": {
                "type": "string",
                "description": "City where the apartment is located."
            },
            "area": {
                "type": "string",
                "description": "The address if available, otherwise the area where the apartment is located."
            },
            "shortDescription": {
                "type": "string",
                "description": "The apartment description."
            },
            "price": {
                "type": "integer",
                "description": "Price of the apartment. Only the number, not the currency."
            },
            "surface": {
                "type": "integer",
                "description": "Surface area of the apartment in square meters."
            },
            "noOfRooms": {
                "type": "integer",
                "description": "Number of rooms in the apartment."
            },
            "floor": {
                "type": "string",
                "description": "Floor of the apartment."
            },
            "ownerName": {
                "type": "string",
                "description": "Name of the owner."
            },
            "imageUrls": {
                "type": "array",
                "description": "A list of all found image URLs from the page.",
                "items": { "type": "string" }
            }
        },
        "required": [
            "name", "city", "area", "shortDescription", "price",
            "surface", "noOfRooms", "floor", "ownerName"
        ]
    })
}

/// Compiled JSON Schema validator.
pub struct SchemaValidator {
    schema: Value,
    validator: jsonschema::Validator,
}

impl SchemaValidator {
    /// Compile `schema` with draft 2020-12 semantics.
    pub fn new(schema: Value) -> Result<Self, AppError> {
        let validator = jsonschema::draft202012::new(&schema)
            .map_err(|e| AppError::SchemaValidationError(format!("Invalid schema: {e}")))?;
        Ok(Self { schema, validator })
    }

    /// Validator for [`listing_schema`].
    pub fn listing() -> Result<Self, AppError> {
        Self::new(listing_schema())
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Structural validation: types, required properties, array items.
    pub fn validate(&self, instance: &Value) -> ValidationOutcome {
        let errors: Vec<String> = self
            .validator
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect();

        if errors.is_empty() {
            ValidationOutcome::valid()
        } else {
            ValidationOutcome::invalid(errors)
        }
    }

    /// Normalize, parse and validate raw formatter output.
    ///
    /// Unparsable or empty output is reported as an invalid outcome with a
    /// synthetic `malformed output` error.
    pub fn check_output(&self, raw: &str) -> (ValidationOutcome, Option<Value>) {
        match parse_candidate(raw) {
            Ok(value) => (self.validate(&value), Some(value)),
            Err(error) => (ValidationOutcome::invalid(vec![error]), None),
        }
    }
}

/// Strip optional fences and parse the remainder as JSON.
pub fn parse_candidate(raw: &str) -> Result<Value, String> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err("malformed output: formatter returned an empty response".to_string());
    }
    serde_json::from_str(body).map_err(|e| format!("malformed output: not valid JSON ({e})"))
}
