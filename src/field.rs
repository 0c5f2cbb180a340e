use crate::error::BindingError;
use serde_json::Value;
use std::collections::HashMap;

/// Presence flags keyed by field name, `true` meaning the field was found
pub type Fields = HashMap<String, bool>;

/// Metadata about a field of a service configuration struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMetadata {
    /// Key of the field inside the service payload
    pub key: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Whether the field must be present
    pub required: bool,
}

/// Checks that every field in the map is flagged as present
///
/// All absent fields are reported together in one [`BindingError::FieldMissing`].
/// The order of the reported names follows the map's iteration order.
///
/// # Example
/// ```rust
/// use service_loadr::check_all_fields;
///
/// let result = check_all_fields([("url", true), ("clientid", false)]);
/// assert!(result.unwrap_err().is_field_missing());
/// ```
pub fn check_all_fields<I, K>(fields: I) -> Result<(), BindingError>
where
    I: IntoIterator<Item = (K, bool)>,
    K: Into<String>,
{
    let missing: Vec<String> = fields
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name.into())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(BindingError::FieldMissing { fields: missing })
    }
}

/// Error for a single missing field
pub fn missing_field_error(field: impl Into<String>) -> BindingError {
    BindingError::FieldMissing {
        fields: vec![field.into()],
    }
}

/// Whether a JSON value counts as present: `null` and the empty string do not
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
