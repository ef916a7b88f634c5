//! Static capability provider table.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Capability, CapabilityError};
use crate::routing::Middleware;

/// What resolving a capability produced.
#[derive(Clone)]
pub enum Installed {
    /// Appended to the application middleware by the package manager.
    Middleware(Middleware),
    #[cfg(feature = "session")]
    SessionStore(Arc<dyn crate::session::SessionStore>),
    #[cfg(feature = "bcrypt")]
    PasswordHasher(crate::security::password::PasswordHasher),
    #[cfg(feature = "jwt")]
    TokenCodec(crate::security::jwt::TokenCodec),
    #[cfg(feature = "upload")]
    Upload(crate::body::UploadHandler),
}

impl Installed {
    fn kind(&self) -> &'static str {
        match self {
            Installed::Middleware(_) => "middleware",
            #[cfg(feature = "session")]
            Installed::SessionStore(_) => "session-store",
            #[cfg(feature = "bcrypt")]
            Installed::PasswordHasher(_) => "password-hasher",
            #[cfg(feature = "jwt")]
            Installed::TokenCodec(_) => "token-codec",
            #[cfg(feature = "upload")]
            Installed::Upload(_) => "upload",
        }
    }
}

impl std::fmt::Debug for Installed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Installed::Middleware(m) => f.debug_tuple("Middleware").field(m).finish(),
            other => f.debug_tuple("Installed").field(&other.kind()).finish(),
        }
    }
}

/// Constructor for one capability. Receives the raw options and the
/// registry, so providers can resolve the capabilities they depend on.
pub type Provider =
    Arc<dyn Fn(&Value, &CapabilityRegistry) -> Result<Installed, CapabilityError> + Send + Sync>;

/// Capability → provider.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    providers: BTreeMap<Capability, Provider>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("available", &self.available())
            .finish()
    }
}

impl CapabilityRegistry {
    /// A registry with no providers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every capability compiled into this build. `mongo-session-store` is
    /// never built in; register it with [`provide`](Self::provide).
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::empty();

        #[cfg(feature = "session")]
        registry.provide(Capability::Session, |options, registry| {
            let config: crate::session::SessionConfig =
                parse_options(Capability::Session, options)?;
            let store = session_store(&config, registry)?;
            Ok(Installed::Middleware(crate::session::session(store, config)))
        });

        #[cfg(feature = "csrf")]
        registry.provide(Capability::Csrf, |options, _| {
            let config = parse_options(Capability::Csrf, options)?;
            Ok(Installed::Middleware(crate::security::csrf::csrf(config)))
        });

        #[cfg(feature = "cors")]
        registry.provide(Capability::Cors, |options, _| {
            let config = parse_options(Capability::Cors, options)?;
            crate::security::cors::cors(config).map(Installed::Middleware)
        });

        #[cfg(feature = "body-parser")]
        registry.provide(Capability::BodyParser, |options, _| {
            let config = parse_options(Capability::BodyParser, options)?;
            Ok(Installed::Middleware(crate::body::body_parser(config)))
        });

        #[cfg(feature = "rate-limit")]
        registry.provide(Capability::RateLimit, |options, _| {
            let config = parse_options(Capability::RateLimit, options)?;
            Ok(Installed::Middleware(crate::security::rate_limit::rate_limit(config)))
        });

        #[cfg(feature = "bcrypt")]
        registry.provide(Capability::Bcrypt, |options, _| {
            let config = parse_options(Capability::Bcrypt, options)?;
            Ok(Installed::PasswordHasher(
                crate::security::password::PasswordHasher::new(config)?,
            ))
        });

        #[cfg(feature = "jwt")]
        registry.provide(Capability::Jwt, |options, _| {
            let config = parse_options(Capability::Jwt, options)?;
            Ok(Installed::TokenCodec(crate::security::jwt::TokenCodec::new(config)?))
        });

        #[cfg(feature = "upload")]
        registry.provide(Capability::Upload, |options, _| {
            let config = parse_options(Capability::Upload, options)?;
            Ok(Installed::Upload(crate::body::UploadHandler::new(config)))
        });

        registry
    }

    /// Register (or replace) the provider for `capability`.
    pub fn provide<F>(&mut self, capability: Capability, provider: F) -> &mut Self
    where
        F: Fn(&Value, &CapabilityRegistry) -> Result<Installed, CapabilityError>
            + Send
            + Sync
            + 'static,
    {
        self.providers.insert(capability, Arc::new(provider));
        self
    }

    pub fn is_available(&self, capability: Capability) -> bool {
        self.providers.contains_key(&capability)
    }

    pub fn available(&self) -> Vec<Capability> {
        self.providers.keys().copied().collect()
    }

    /// Construct `capability` from `options`.
    pub fn resolve(
        &self,
        capability: Capability,
        options: &Value,
    ) -> Result<Installed, CapabilityError> {
        let provider = self
            .providers
            .get(&capability)
            .ok_or(CapabilityError::MissingDependency { capability })?;
        provider(options, self)
    }
}

/// Deserialize capability options; `null` means defaults.
pub(crate) fn parse_options<T>(
    capability: Capability,
    options: &Value,
) -> Result<T, CapabilityError>
where
    T: DeserializeOwned + Default,
{
    if options.is_null() {
        return Ok(T::default());
    }
    T::deserialize(options).map_err(|source| CapabilityError::InvalidOptions { capability, source })
}

#[cfg(feature = "session")]
fn session_store(
    config: &crate::session::SessionConfig,
    registry: &CapabilityRegistry,
) -> Result<Arc<dyn crate::session::SessionStore>, CapabilityError> {
    match config.store.as_str() {
        "memory" => Ok(Arc::new(crate::session::MemorySessionStore::new())),
        "mongo" => match registry.resolve(Capability::MongoSessionStore, &config.store_options)? {
            Installed::SessionStore(store) => Ok(store),
            _ => Err(CapabilityError::Mismatch {
                capability: Capability::MongoSessionStore,
            }),
        },
        other => Err(CapabilityError::InvalidConfig {
            capability: Capability::Session,
            reason: format!("unknown session store `{other}`"),
        }),
    }
}
