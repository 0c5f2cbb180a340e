use crate::{UnmarshalService, error::BindingError};
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use std::{collections::HashMap, fmt, str::FromStr};

/// Where a service catalog was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    File,
    Environment,
    Raw,
}

impl FromStr for Source {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "environment" => Ok(Self::Environment),
            "raw" => Ok(Self::Raw),
            _ => Err(BindingError::InvalidSource {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Environment => write!(f, "environment"),
            Self::Raw => write!(f, "raw"),
        }
    }
}

impl Source {
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File)
    }

    pub fn is_environment(&self) -> bool {
        matches!(self, Self::Environment)
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw)
    }
}

/// Resolved service bindings, indexed by lower-cased service name
#[derive(Debug)]
pub struct Environment {
    source: Source,
    services_by_name: HashMap<String, Box<RawValue>>,
}

impl Environment {
    /// Keys must already be lower-cased; the resolver guarantees this
    pub(crate) fn new(source: Source, services_by_name: HashMap<String, Box<RawValue>>) -> Self {
        Self {
            source,
            services_by_name,
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    /// The full index, keyed by lower-cased service name
    pub fn services_by_name(&self) -> &HashMap<String, Box<RawValue>> {
        &self.services_by_name
    }

    /// Raw payload of a service, looked up case-insensitively
    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.services_by_name
            .get(&name.to_lowercase())
            .map(|raw| &**raw)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services_by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.services_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services_by_name.is_empty()
    }

    /// Hand the payload of service `name` to `target`
    ///
    /// Returns [`BindingError::ServiceNotFound`] (converted into the target's error
    /// type) when nothing is bound under that name. Errors from the target itself
    /// are returned as-is.
    pub fn load_service<T>(&self, target: &mut T, name: &str) -> Result<(), T::Error>
    where
        T: UnmarshalService + ?Sized,
    {
        let raw = self
            .get(name)
            .ok_or_else(|| BindingError::service_not_found(name))?;
        tracing::trace!(service = name, "unmarshalling service configuration");
        target.unmarshal_service(raw)
    }

    /// Load service `name` into a fresh, default-initialised `T`
    pub fn service<T>(&self, name: &str) -> Result<T, T::Error>
    where
        T: UnmarshalService + Default,
    {
        let mut target = T::default();
        self.load_service(&mut target, name)?;
        Ok(target)
    }

    /// Deserialize the payload of service `name` with serde, no presence checks
    pub fn deserialize_service<T: DeserializeOwned>(&self, name: &str) -> Result<T, BindingError> {
        let raw = self
            .get(name)
            .ok_or_else(|| BindingError::service_not_found(name))?;
        serde_json::from_str(raw.get()).map_err(BindingError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn raw(json: &str) -> Box<RawValue> {
        RawValue::from_string(json.to_string()).unwrap()
    }

    fn sample() -> Environment {
        let mut services = HashMap::new();
        services.insert(
            "portal-uaa".to_string(),
            raw(r#"{"name":"Portal-UAA","credentials":{"url":"https://uaa"}}"#),
        );
        Environment::new(Source::Raw, services)
    }

    #[derive(Debug, Default)]
    struct Captured {
        payload: String,
    }

    impl UnmarshalService for Captured {
        type Error = BindingError;

        fn unmarshal_service(&mut self, raw: &RawValue) -> Result<(), Self::Error> {
            self.payload = raw.get().to_string();
            Ok(())
        }
    }

    #[derive(Debug)]
    enum AppError {
        Binding(BindingError),
        Rejected,
    }

    impl From<BindingError> for AppError {
        fn from(err: BindingError) -> Self {
            Self::Binding(err)
        }
    }

    struct Rejecting;

    impl UnmarshalService for Rejecting {
        type Error = AppError;

        fn unmarshal_service(&mut self, _raw: &RawValue) -> Result<(), Self::Error> {
            Err(AppError::Rejected)
        }
    }

    #[test]
    fn test_parse_sources() {
        assert_eq!("file".parse::<Source>().unwrap(), Source::File);
        assert_eq!("environment".parse::<Source>().unwrap(), Source::Environment);
        assert_eq!("raw".parse::<Source>().unwrap(), Source::Raw);
    }

    #[test]
    fn test_parse_invalid_source() {
        let result: Result<Source, BindingError> = "stdin".parse();

        if let Err(BindingError::InvalidSource { value }) = result {
            assert_eq!(value, "stdin");
        } else {
            panic!("Expected InvalidSource error");
        }
    }

    #[test]
    fn test_display_sources() {
        for source in [Source::File, Source::Environment, Source::Raw] {
            assert_eq!(source.to_string().parse::<Source>().unwrap(), source);
        }
    }

    #[test]
    fn test_source_predicates() {
        assert!(Source::File.is_file());
        assert!(!Source::File.is_raw());
        assert!(Source::Environment.is_environment());
        assert!(Source::Raw.is_raw());
    }

    #[test]
    fn test_source_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Source::Environment).unwrap(), r#""environment""#);
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let env = sample();
        assert!(env.get("portal-uaa").is_some());
        assert!(env.get("PORTAL-UAA").is_some());
        assert!(env.contains("Portal-Uaa"));
        assert!(!env.contains("portal"));
        assert_eq!(env.len(), 1);
        assert_eq!(env.names().collect::<Vec<_>>(), vec!["portal-uaa"]);
    }

    #[test]
    fn test_load_service_passes_verbatim_payload() {
        let env = sample();
        let mut target = Captured::default();
        env.load_service(&mut target, "Portal-UAA").unwrap();
        assert_eq!(
            target.payload,
            r#"{"name":"Portal-UAA","credentials":{"url":"https://uaa"}}"#
        );
    }

    #[test]
    fn test_load_service_not_found() {
        let env = sample();
        let mut target = Captured::default();
        let err = env.load_service(&mut target, "missing").unwrap_err();
        assert!(err.is_service_not_found());
        assert!(target.payload.is_empty());
    }

    #[test]
    fn test_load_service_passes_target_error_through() {
        let env = sample();
        let err = env.load_service(&mut Rejecting, "portal-uaa").unwrap_err();
        assert!(matches!(err, AppError::Rejected));

        let err = env.load_service(&mut Rejecting, "nope").unwrap_err();
        assert!(matches!(err, AppError::Binding(BindingError::ServiceNotFound { .. })));
    }

    #[test]
    fn test_service_returns_fresh_value() {
        let env = sample();
        let captured: Captured = env.service("portal-uaa").unwrap();
        assert!(captured.payload.contains("credentials"));
    }

    #[test]
    fn test_deserialize_service() {
        #[derive(Deserialize)]
        struct Uaa {
            name: String,
        }

        let env = sample();
        let uaa: Uaa = env.deserialize_service("portal-uaa").unwrap();
        assert_eq!(uaa.name, "Portal-UAA");

        let err = env.deserialize_service::<u32>("portal-uaa").unwrap_err();
        assert!(matches!(err, BindingError::Deserialize(_)));
    }
}
