use colored::Colorize;
use std::{fmt::Write, io};

/// Errors that can occur while resolving or consuming service bindings
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    /// Reading the environment variable, file or stream failed
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The catalog or one of its service entries is not valid JSON of the expected shape
    #[error("malformed service catalog: {0}")]
    Parse(#[source] serde_json::Error),
    /// No service with this name is bound
    #[error("service not found: {name}")]
    ServiceNotFound { name: String },
    /// One or more required fields are absent from a service configuration
    #[error("field(s) missing: {}", .fields.join(", "))]
    FieldMissing { fields: Vec<String> },
    /// A service payload could not be deserialized into the consumer's type
    #[error("invalid service configuration: {0}")]
    Deserialize(#[source] serde_json::Error),
    /// An environment variable is set but its value is not valid unicode
    #[error("environment variable {key} is not valid unicode")]
    InvalidVar { key: String },
    /// A provenance tag other than `file`, `environment` or `raw`
    #[error("unknown source '{value}', expected 'file', 'environment' or 'raw'")]
    InvalidSource { value: String },
}

impl BindingError {
    pub fn service_not_found(name: impl Into<String>) -> Self {
        Self::ServiceNotFound { name: name.into() }
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    pub fn is_service_not_found(&self) -> bool {
        matches!(self, Self::ServiceNotFound { .. })
    }

    pub fn is_field_missing(&self) -> bool {
        matches!(self, Self::FieldMissing { .. })
    }

    /// Names of the missing fields, empty for every other kind of error
    pub fn missing_fields(&self) -> &[String] {
        match self {
            Self::FieldMissing { fields } => fields,
            _ => &[],
        }
    }

    /// Render the error as a human readable, colored diagnostic
    pub fn report(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = match self {
            Self::Io(err) => writeln!(
                out,
                "{}: Could not read service catalog\n\tCause: {}",
                "I/O".magenta().bold(),
                err
            ),
            Self::Parse(err) => writeln!(
                out,
                "{}: Service catalog is malformed\n\tCause: {}",
                "Catalog".magenta().bold(),
                err
            ),
            Self::ServiceNotFound { name } => writeln!(
                out,
                "{}: Is not bound to this application",
                name.magenta().bold()
            ),
            Self::FieldMissing { fields } => {
                let names = fields
                    .iter()
                    .map(|f| f.cyan().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(
                    out,
                    "{}: Required field(s) missing from service configuration: {}",
                    "Fields".magenta().bold(),
                    names
                )
            }
            Self::InvalidVar { key } => writeln!(
                out,
                "{}: Is set but does not hold valid unicode",
                key.magenta().bold()
            ),
            Self::InvalidSource { value } => writeln!(
                out,
                "{}: Invalid value {}\n\tExpected one of: file, environment, raw",
                "Source".magenta().bold(),
                format!("'{}'", value).red()
            ),
            Self::Deserialize(err) => writeln!(
                out,
                "{}: Service configuration has an invalid value\n\tCause: {}",
                "Service".magenta().bold(),
                format!("{err}").red()
            ),
        };
        out
    }
}
