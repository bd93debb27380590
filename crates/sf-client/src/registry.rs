//! Named connection lookup.
//!
//! REST clients and bulk job handles can be given a connection directly, or
//! look one up by name (`SalesforceClient::named`). Registration and removal
//! are explicit; a [`RegistrationGuard`] removes its entry when dropped.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};
use tracing::debug;

use crate::error::{Error, ErrorKind, Result};
use crate::salesforce_client::SalesforceClient;

/// Name used when a caller does not pick one.
pub const DEFAULT_CONNECTION_NAME: &str = "default";

/// A thread-safe map from name to connection.
#[derive(Debug)]
pub struct ConnectionRegistry<C> {
    connections: RwLock<HashMap<String, C>>,
}

impl<C> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }
}

impl<C: Clone> ConnectionRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Fails if the name is taken.
    pub fn register(&self, name: impl Into<String>, connection: C) -> Result<()> {
        let name = name.into();
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if connections.contains_key(&name) {
            return Err(Error::new(ErrorKind::AlreadyRegistered(name)));
        }
        debug!(connection = %name, "Registering connection");
        connections.insert(name, connection);
        Ok(())
    }

    /// Register a connection for the lifetime of the returned guard.
    pub fn register_scoped(
        &self,
        name: impl Into<String>,
        connection: C,
    ) -> Result<RegistrationGuard<'_, C>> {
        let name = name.into();
        self.register(name.clone(), connection)?;
        Ok(RegistrationGuard {
            registry: self,
            name,
        })
    }

    /// Look up a connection; `None` selects [`DEFAULT_CONNECTION_NAME`].
    pub fn get(&self, name: Option<&str>) -> Result<C> {
        let name = name.unwrap_or(DEFAULT_CONNECTION_NAME);
        self.connections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::NotRegistered(name.to_string())))
    }

    /// Remove a connection, returning it if it was registered.
    pub fn unregister(&self, name: &str) -> Option<C> {
        let removed = self
            .connections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(name);
        if removed.is_some() {
            debug!(connection = %name, "Unregistered connection");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.connections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .connections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl ConnectionRegistry<SalesforceClient> {
    /// The process-wide registry of HTTPS connections.
    pub fn global() -> &'static ConnectionRegistry<SalesforceClient> {
        static GLOBAL: OnceLock<ConnectionRegistry<SalesforceClient>> = OnceLock::new();
        GLOBAL.get_or_init(ConnectionRegistry::new)
    }
}

/// Removes its registry entry on drop.
#[derive(Debug)]
pub struct RegistrationGuard<'a, C: Clone> {
    registry: &'a ConnectionRegistry<C>,
    name: String,
}

impl<C: Clone> RegistrationGuard<'_, C> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<C: Clone> Drop for RegistrationGuard<'_, C> {
    fn drop(&mut self) {
        self.registry.unregister(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_get_unregister() {
        let registry = ConnectionRegistry::new();
        registry.register(DEFAULT_CONNECTION_NAME, "prod").unwrap();
        registry.register("sandbox", "sbx").unwrap();

        assert_eq!(registry.get(None).unwrap(), "prod");
        assert_eq!(registry.get(Some("sandbox")).unwrap(), "sbx");
        assert_eq!(registry.names(), vec!["default", "sandbox"]);

        assert_eq!(registry.unregister("sandbox"), Some("sbx"));
        let err = registry.get(Some("sandbox")).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NotRegistered(ref n) if n == "sandbox"));
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let registry = ConnectionRegistry::new();
        registry.register("dev", 1).unwrap();
        let err = registry.register("dev", 2).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::AlreadyRegistered(_)));
        assert_eq!(registry.get(Some("dev")).unwrap(), 1);
    }

    #[test]
    fn test_guard_unregisters_on_drop() {
        let registry = ConnectionRegistry::new();
        {
            let guard = registry.register_scoped("scratch", 7).unwrap();
            assert_eq!(guard.name(), "scratch");
            assert!(registry.contains("scratch"));
        }
        assert!(!registry.contains("scratch"));
    }

    #[test]
    fn test_global_registry_holds_clients() {
        let client = SalesforceClient::new("https://na1.salesforce.com", "token").unwrap();
        let _guard = ConnectionRegistry::global()
            .register_scoped("registry-test", client)
            .unwrap();

        let found = ConnectionRegistry::global()
            .get(Some("registry-test"))
            .unwrap();
        assert_eq!(
            crate::Connection::instance_url(&found),
            "https://na1.salesforce.com"
        );
    }
}
