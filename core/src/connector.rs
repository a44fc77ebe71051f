use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::source::Source;

/// Host lookups offered by a vendor. Implementations throttle every remote
/// call and turn vendor failures into `None`.
pub trait HostQuery {
    fn query_host(&mut self, host: &str) -> Option<Value>;
    fn query_host_search(&mut self, query: &str) -> Option<Value>;
}

/// A queryable vendor connection.
pub trait SourceConnector {
    fn source(&self) -> Source;

    fn short_name(&self) -> &'static str {
        self.source().as_str()
    }

    /// The host-query capability, if this connector offers it.
    fn as_host_query(&mut self) -> Option<&mut dyn HostQuery> {
        None
    }
}

type Factory = Box<dyn Fn() -> Result<Box<dyn SourceConnector>>>;

/// Maps source identifiers to connector constructors. Populated once at
/// startup and handed to whoever needs to build connections.
#[derive(Default)]
pub struct ConnectorRegistry {
    factories: BTreeMap<Source, Factory>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, source: Source, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Box<dyn SourceConnector>> + 'static,
    {
        self.factories.insert(source, Box::new(factory));
        self
    }

    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.factories.keys().copied()
    }

    pub fn contains(&self, source: Source) -> bool {
        self.factories.contains_key(&source)
    }

    pub fn build(&self, source: Source) -> Result<Box<dyn SourceConnector>> {
        let factory = self
            .factories
            .get(&source)
            .ok_or_else(|| Error::unsupported(format!("no connector registered for \"{source}\"")))?;
        factory()
    }

    pub fn build_by_name(&self, name: &str) -> Result<Box<dyn SourceConnector>> {
        self.build(name.parse()?)
    }

    /// Builds every registered connector, skipping (and logging) those that
    /// fail to initialize.
    pub fn build_all(&self) -> Vec<Box<dyn SourceConnector>> {
        self.sources()
            .filter_map(|source| match self.build(source) {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::error!(source = %source, error = %e, "connector initialization failed");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    impl SourceConnector for Bare {
        fn source(&self) -> Source {
            Source::Censys
        }
    }

    #[test]
    fn builds_registered_and_rejects_unknown() {
        let mut registry = ConnectorRegistry::new();
        registry.register(Source::Censys, || Ok(Box::new(Bare) as Box<dyn SourceConnector>));

        let mut conn = registry.build_by_name("censys").unwrap();
        assert_eq!(conn.short_name(), "censys");
        assert!(conn.as_host_query().is_none());

        assert!(matches!(registry.build(Source::Shodan), Err(Error::UnsupportedSource(_))));
        assert!(matches!(registry.build_by_name("totalvirus"), Err(Error::UnsupportedSource(_))));
    }

    #[test]
    fn build_all_skips_failing_factories() {
        let mut registry = ConnectorRegistry::new();
        registry
            .register(Source::Censys, || Ok(Box::new(Bare) as Box<dyn SourceConnector>))
            .register(Source::Shodan, || Err(Error::Configuration("missing api_key".into())));
        let built = registry.build_all();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].source(), Source::Censys);
    }
}
