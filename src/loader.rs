use crate::{
    environment::{Environment, Source},
    error::BindingError,
    resolver::resolve,
};
use std::{
    collections::HashMap,
    env, fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

/// Environment variable holding the service catalog
pub const DEFAULT_ENV_VAR: &str = "VCAP_SERVICES";

/// File read when the environment variable is not set
pub const DEFAULT_ENV_FILE: &str = "default-env.json";

/// Top-level key of the catalog payload
pub const DEFAULT_CATALOG_KEY: &str = "VCAP_SERVICES";

/// Source of environment variable values
pub trait VarLookup {
    /// Current value of `key`, `Ok(None)` when unset
    ///
    /// A variable that is set but unreadable is an error, never `None`.
    fn var(&self, key: &str) -> Result<Option<String>, BindingError>;
}

fn set_or_unset(
    key: &str,
    value: Result<String, env::VarError>,
) -> Result<Option<String>, BindingError> {
    match value {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(BindingError::InvalidVar {
            key: key.to_string(),
        }),
    }
}

/// Reads the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl VarLookup for ProcessEnv {
    fn var(&self, key: &str) -> Result<Option<String>, BindingError> {
        set_or_unset(key, env::var(key))
    }
}

/// Loads `.env` from the working directory (or a parent) before reading the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct Dotenv;

impl VarLookup for Dotenv {
    fn var(&self, key: &str) -> Result<Option<String>, BindingError> {
        match dotenvy::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(dotenvy::Error::EnvVar(err)) => set_or_unset(key, Err(err)),
            Err(err) => Err(BindingError::Io(io::Error::other(err))),
        }
    }
}

impl VarLookup for HashMap<String, String> {
    fn var(&self, key: &str) -> Result<Option<String>, BindingError> {
        Ok(self.get(key).cloned())
    }
}

/// Resolves a service catalog from a reader, the environment or a file
///
/// # Example
/// ```rust
/// use service_loadr::Loader;
///
/// let env = Loader::new()
///     .load_from_str(r#"{"VCAP_SERVICES": {"xsuaa": [{"name": "portal-uaa"}]}}"#)
///     .unwrap();
/// assert!(env.contains("Portal-UAA"));
/// ```
#[derive(Debug)]
pub struct Loader<L = ProcessEnv> {
    var_name: String,
    default_file: PathBuf,
    catalog_key: String,
    lookup: L,
}

impl Loader {
    /// Create a loader with the default variable, file and catalog key
    pub fn new() -> Self {
        Self {
            var_name: DEFAULT_ENV_VAR.to_string(),
            default_file: PathBuf::from(DEFAULT_ENV_FILE),
            catalog_key: DEFAULT_CATALOG_KEY.to_string(),
            lookup: ProcessEnv,
        }
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: VarLookup> Loader<L> {
    /// Name of the environment variable checked by [`Loader::load`]
    pub fn var_name(mut self, name: impl Into<String>) -> Self {
        self.var_name = name.into();
        self
    }

    /// File read by [`Loader::load`] when the variable is unset
    pub fn default_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_file = path.into();
        self
    }

    /// Top-level key under which the categories are listed
    pub fn catalog_key(mut self, key: impl Into<String>) -> Self {
        self.catalog_key = key.into();
        self
    }

    /// Replace how environment variables are looked up
    pub fn lookup<M: VarLookup>(self, lookup: M) -> Loader<M> {
        Loader {
            var_name: self.var_name,
            default_file: self.default_file,
            catalog_key: self.catalog_key,
            lookup,
        }
    }

    /// Load from the environment variable if set, otherwise from the default file
    pub fn load(&self) -> Result<Environment, BindingError> {
        match self.lookup.var(&self.var_name)? {
            Some(value) => {
                tracing::debug!(var = %self.var_name, "loading service catalog from environment");
                self.load_from_bytes(value.as_bytes(), Source::Environment)
            }
            None => {
                tracing::debug!(
                    var = %self.var_name,
                    file = %self.default_file.display(),
                    "environment variable unset, falling back to file"
                );
                self.load_from_file(&self.default_file)
            }
        }
    }

    /// Load from a file
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> Result<Environment, BindingError> {
        let data = fs::read(path.as_ref())?;
        self.load_from_bytes(&data, Source::File)
    }

    /// Load from a reader, consuming it to the end
    pub fn load_from_reader(&self, mut reader: impl Read) -> Result<Environment, BindingError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.load_from_bytes(&data, Source::Raw)
    }

    /// Load from an in-memory string
    pub fn load_from_str(&self, data: &str) -> Result<Environment, BindingError> {
        self.load_from_bytes(data.as_bytes(), Source::Raw)
    }

    /// Load from raw bytes tagged with the given source
    pub fn load_from_bytes(&self, data: &[u8], source: Source) -> Result<Environment, BindingError> {
        resolve(data, source, &self.catalog_key)
    }
}

/// Load from `VCAP_SERVICES` if set, otherwise from `default-env.json`
pub fn load_env() -> Result<Environment, BindingError> {
    Loader::new().load()
}

/// Load a catalog file
pub fn load_env_from_file(path: impl AsRef<Path>) -> Result<Environment, BindingError> {
    Loader::new().load_from_file(path)
}

/// Load a catalog from a reader
pub fn load_env_from_reader(reader: impl Read) -> Result<Environment, BindingError> {
    Loader::new().load_from_reader(reader)
}
