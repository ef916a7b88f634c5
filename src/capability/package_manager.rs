//! Installs capabilities on an application.

use serde::Serialize;
use serde_json::Value;

use super::{Capability, CapabilityError, CapabilityRegistry, Installed};
use crate::app::AppHandle;
use crate::config::CapabilityConfig;

/// Resolves capabilities and wires middleware capabilities into `app`.
#[derive(Debug)]
pub struct PackageManager {
    app: AppHandle,
    registry: CapabilityRegistry,
    installed: Vec<Capability>,
}

impl PackageManager {
    pub fn new(app: AppHandle, registry: CapabilityRegistry) -> Self {
        Self {
            app,
            registry,
            installed: Vec::new(),
        }
    }

    /// Package manager over every capability compiled into this build.
    pub fn with_defaults(app: AppHandle) -> Self {
        Self::new(app, CapabilityRegistry::with_defaults())
    }

    pub fn app(&self) -> &AppHandle {
        &self.app
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Capabilities installed so far, in installation order.
    pub fn installed(&self) -> &[Capability] {
        &self.installed
    }

    /// Resolve `capability` with `options`. Middleware is appended to the
    /// application chain; everything else is handed back to the caller.
    pub fn install(
        &mut self,
        capability: Capability,
        options: Value,
    ) -> Result<Installed, CapabilityError> {
        let installed = self.registry.resolve(capability, &options)?;

        if let Installed::Middleware(middleware) = &installed {
            self.app.use_middleware(middleware.clone());
        }
        self.installed.push(capability);

        tracing::info!(capability = %capability, "Installed capability");
        Ok(installed)
    }

    /// Install configured capabilities in ascending `order`, skipping
    /// disabled entries. Entries with equal order keep their listed order.
    pub fn install_all(
        &mut self,
        entries: &[CapabilityConfig],
    ) -> Result<Vec<Installed>, CapabilityError> {
        let mut enabled: Vec<&CapabilityConfig> = entries.iter().filter(|e| e.enabled).collect();
        enabled.sort_by_key(|e| e.order);

        let mut results = Vec::with_capacity(enabled.len());
        for entry in enabled {
            let capability: Capability = entry.name.parse()?;
            results.push(self.install(capability, entry.options.clone())?);
        }
        Ok(results)
    }

    #[cfg(feature = "session")]
    pub fn session(
        &mut self,
        config: crate::session::SessionConfig,
    ) -> Result<(), CapabilityError> {
        self.install_middleware(Capability::Session, &config)
    }

    #[cfg(feature = "cors")]
    pub fn cors(
        &mut self,
        config: crate::security::cors::CorsConfig,
    ) -> Result<(), CapabilityError> {
        self.install_middleware(Capability::Cors, &config)
    }

    #[cfg(feature = "csrf")]
    pub fn csrf(
        &mut self,
        config: crate::security::csrf::CsrfConfig,
    ) -> Result<(), CapabilityError> {
        self.install_middleware(Capability::Csrf, &config)
    }

    #[cfg(feature = "body-parser")]
    pub fn body_parser(
        &mut self,
        config: crate::body::BodyParserConfig,
    ) -> Result<(), CapabilityError> {
        self.install_middleware(Capability::BodyParser, &config)
    }

    #[cfg(feature = "rate-limit")]
    pub fn rate_limit(
        &mut self,
        config: crate::security::rate_limit::RateLimitConfig,
    ) -> Result<(), CapabilityError> {
        self.install_middleware(Capability::RateLimit, &config)
    }

    #[cfg(feature = "bcrypt")]
    pub fn bcrypt(
        &mut self,
        config: crate::security::password::BcryptConfig,
    ) -> Result<crate::security::password::PasswordHasher, CapabilityError> {
        match self.install(Capability::Bcrypt, to_options(Capability::Bcrypt, &config)?)? {
            Installed::PasswordHasher(hasher) => Ok(hasher),
            _ => Err(CapabilityError::Mismatch {
                capability: Capability::Bcrypt,
            }),
        }
    }

    #[cfg(feature = "jwt")]
    pub fn jwt(
        &mut self,
        config: crate::security::jwt::JwtConfig,
    ) -> Result<crate::security::jwt::TokenCodec, CapabilityError> {
        match self.install(Capability::Jwt, to_options(Capability::Jwt, &config)?)? {
            Installed::TokenCodec(codec) => Ok(codec),
            _ => Err(CapabilityError::Mismatch {
                capability: Capability::Jwt,
            }),
        }
    }

    #[cfg(feature = "upload")]
    pub fn upload(
        &mut self,
        config: crate::body::UploadConfig,
    ) -> Result<crate::body::UploadHandler, CapabilityError> {
        match self.install(Capability::Upload, to_options(Capability::Upload, &config)?)? {
            Installed::Upload(handler) => Ok(handler),
            _ => Err(CapabilityError::Mismatch {
                capability: Capability::Upload,
            }),
        }
    }

    #[allow(dead_code)]
    fn install_middleware<C: Serialize>(
        &mut self,
        capability: Capability,
        config: &C,
    ) -> Result<(), CapabilityError> {
        match self.install(capability, to_options(capability, config)?)? {
            Installed::Middleware(_) => Ok(()),
            _ => Err(CapabilityError::Mismatch { capability }),
        }
    }
}

#[allow(dead_code)]
fn to_options<C: Serialize>(capability: Capability, config: &C) -> Result<Value, CapabilityError> {
    serde_json::to_value(config)
        .map_err(|source| CapabilityError::InvalidOptions { capability, source })
}
