//! Scheme registration and path resolution.
//!
//! A registry maps scheme names to backends plus a default URL whose
//! components fill in whatever a caller's path omits. Registries are plain
//! values: hosts that want several independent namespaces simply build
//! several registries.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::backend::StorageBackend;
use crate::context::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::url::Url;

/// Registration behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterFlags {
    /// Replace an existing registration instead of failing.
    pub override_existing: bool,
    /// Parse paths under this scheme as local (no authority, the whole
    /// remainder is the path).
    pub local: bool,
}

struct SchemeEntry {
    default_url: Url,
    backend: Arc<dyn StorageBackend>,
    options: Context,
    local: bool,
}

/// Scheme table guarding backend dispatch.
#[derive(Default)]
pub struct SchemeRegistry {
    schemes: RwLock<HashMap<String, SchemeEntry>>,
}

impl SchemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `backend` under the scheme of `default_url`. The remaining
    /// components of `default_url` become fill-in defaults for every path
    /// resolved through this scheme, and `options` ride along to the
    /// backend on each operation.
    pub async fn register(
        &self,
        default_url: &str,
        backend: Arc<dyn StorageBackend>,
        options: Context,
        flags: RegisterFlags,
    ) -> Result<()> {
        let parsed = if flags.local {
            Url::parse_local(default_url)?
        } else {
            Url::parse(default_url)?
        };
        let Some(scheme) = parsed.scheme.clone() else {
            return Err(Error::warning(ErrorKind::InvalidArgument(format!(
                "'{default_url}' has no scheme to register"
            ))));
        };

        let mut schemes = self.schemes.write().await;
        if schemes.contains_key(&scheme) && !flags.override_existing {
            return Err(Error::warning(ErrorKind::AlreadyExists(scheme)));
        }
        schemes.insert(
            scheme,
            SchemeEntry {
                default_url: parsed,
                backend,
                options,
                local: flags.local,
            },
        );
        Ok(())
    }

    pub async fn unregister(&self, scheme: &str) -> Result<()> {
        let mut schemes = self.schemes.write().await;
        schemes
            .remove(scheme)
            .map(|_| ())
            .ok_or_else(|| Error::warning(ErrorKind::NotFound(scheme.to_string())))
    }

    /// Resolve `input` to its backend, the fully merged URL, and the
    /// registered option bag.
    pub async fn resolve(
        &self,
        input: &str,
    ) -> Result<(Arc<dyn StorageBackend>, Url, Context)> {
        let Some(scheme) = Url::scheme_of(input) else {
            return Err(Error::warning(ErrorKind::InvalidArgument(format!(
                "'{input}' has no scheme"
            ))));
        };

        let schemes = self.schemes.read().await;
        let entry = schemes.get(scheme).ok_or_else(|| {
            Error::warning(ErrorKind::InvalidArgument(format!(
                "scheme '{scheme}' is not registered"
            )))
        })?;

        let url = if entry.local {
            Url::parse_local(input)?
        } else {
            Url::parse(input)?
        };
        let merged = url.merge(&entry.default_url)?;
        Ok((Arc::clone(&entry.backend), merged, entry.options.clone()))
    }

    pub async fn is_registered(&self, scheme: &str) -> bool {
        self.schemes.read().await.contains_key(scheme)
    }

    /// Registered scheme names, sorted.
    pub async fn schemes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemes.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use pretty_assertions::assert_eq;

    fn backend() -> Arc<dyn StorageBackend> {
        Arc::new(MemoryBackend::new())
    }

    #[tokio::test]
    async fn register_requires_scheme() {
        let registry = SchemeRegistry::new();
        let err = registry
            .register("just-a-host/path", backend(), Context::new(), RegisterFlags::default())
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn duplicate_registration_needs_override() {
        let registry = SchemeRegistry::new();
        let flags = RegisterFlags::default();
        registry
            .register("mem://host", backend(), Context::new(), flags)
            .await
            .unwrap();
        let err = registry
            .register("mem://host", backend(), Context::new(), flags)
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::AlreadyExists(_)));

        registry
            .register(
                "mem://other",
                backend(),
                Context::new(),
                RegisterFlags {
                    override_existing: true,
                    ..flags
                },
            )
            .await
            .unwrap();
        assert_eq!(registry.schemes().await, ["mem"]);
    }

    #[tokio::test]
    async fn resolve_merges_defaults() {
        let registry = SchemeRegistry::new();
        let mut options = Context::new();
        options.set("depth", 2);
        registry
            .register("mem://defaulthost:99/?opt=1", backend(), options, RegisterFlags::default())
            .await
            .unwrap();

        let (_, url, ctx) = registry.resolve("mem://x/a/b.txt").await.unwrap();
        assert_eq!(url.host.as_deref(), Some("x"));
        assert_eq!(url.port, Some(99));
        assert_eq!(url.path(), "/a/b.txt");
        assert!(url.query.is_some());
        assert_eq!(ctx.get("depth"), Some(&serde_json::json!(2)));
    }

    #[tokio::test]
    async fn resolve_unknown_scheme_fails() {
        let registry = SchemeRegistry::new();
        let err = registry.resolve("nope://x/f").await.err().unwrap();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument(_)));
        let err = registry.resolve("/no/scheme").await.err().unwrap();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn unregister_round_trip() {
        let registry = SchemeRegistry::new();
        registry
            .register("mem://h", backend(), Context::new(), RegisterFlags::default())
            .await
            .unwrap();
        assert!(registry.is_registered("mem").await);
        registry.unregister("mem").await.unwrap();
        assert!(!registry.is_registered("mem").await);
        assert!(registry.unregister("mem").await.unwrap_err().is_not_found());
    }
}
