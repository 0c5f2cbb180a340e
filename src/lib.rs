pub mod environment;
pub mod error;
pub mod field;
pub mod loader;
pub mod resolver;

// Re-export main types
pub use environment::{Environment, Source};
pub use error::BindingError;
pub use field::{FieldMetadata, Fields, check_all_fields, is_present, missing_field_error};
pub use loader::{
    DEFAULT_CATALOG_KEY, DEFAULT_ENV_FILE, DEFAULT_ENV_VAR, Dotenv, Loader, ProcessEnv, VarLookup,
    load_env, load_env_from_file, load_env_from_reader,
};
pub use resolver::resolve;
pub use serde_json::value::RawValue;

// Re-export macro
pub use service_loadr_macros::define_service;

/// Trait for types that populate themselves from one service payload
pub trait UnmarshalService {
    /// Error returned by [`UnmarshalService::unmarshal_service`]; must be able to
    /// carry [`BindingError::ServiceNotFound`]
    type Error: From<BindingError>;

    /// Read `raw` and fill in `self`, or fail without a usable value
    fn unmarshal_service(&mut self, raw: &RawValue) -> Result<(), Self::Error>;
}

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
