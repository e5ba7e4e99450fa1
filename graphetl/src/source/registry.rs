use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use graphetl_config::shared::SourceConfig;

use crate::error::{ErrorKind, EtlResult};
use crate::source::{SourceAdapter, SourceConnector};
use crate::bail;

/// Connectors keyed by the `source type` they serve, compared case-insensitively.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    connectors: HashMap<String, Arc<dyn SourceConnector>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `connector`, replacing any connector of the same kind.
    pub fn register<C>(&mut self, connector: C)
    where
        C: SourceConnector + 'static,
    {
        self.connectors
            .insert(connector.kind().to_ascii_lowercase(), Arc::new(connector));
    }

    pub fn with<C>(mut self, connector: C) -> Self
    where
        C: SourceConnector + 'static,
    {
        self.register(connector);
        self
    }

    /// Returns the registered kinds in sorted order.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.connectors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Connects to `source_name` through the connector of its kind.
    pub async fn connect(
        &self,
        source_name: &str,
        config: &SourceConfig,
    ) -> EtlResult<Arc<dyn SourceAdapter>> {
        let Some(connector) = self.connectors.get(&config.source_type.to_ascii_lowercase()) else {
            bail!(
                ErrorKind::UnsupportedSourceKind,
                "Source type is not supported",
                format!(
                    "source `{source_name}` has type `{}`, supported types are {:?}",
                    config.source_type,
                    self.kinds()
                )
            );
        };

        connector.connect(source_name, config).await
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::{MemorySource, MemorySourceConnector};

    #[tokio::test]
    async fn test_unregistered_kind_is_unsupported() {
        let registry = SourceRegistry::new().with(MemorySourceConnector::new());

        let err = registry
            .connect("crm", &SourceConfig::new("postgres"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::UnsupportedSourceKind);
        assert!(err.detail().unwrap().contains("`postgres`"));
    }

    #[tokio::test]
    async fn test_kind_lookup_ignores_case() {
        let registry = SourceRegistry::new().with(
            MemorySourceConnector::new().with_source("crm", MemorySource::new()),
        );

        let adapter = registry
            .connect("crm", &SourceConfig::new("Memory"))
            .await
            .unwrap();
        assert_eq!(adapter.source_name(), "crm");
        assert_eq!(registry.kinds(), vec!["memory"]);
    }
}
