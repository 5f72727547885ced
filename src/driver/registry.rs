use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

pub use crate::config::DriverConfig;

use super::csv::{CsvDestination, CsvSource};
use super::options::Options;
use super::types::DriverError;
use super::{Destination, Source};

/// Builds a source driver that is not compiled into this crate.
///
/// Implementations are registered under a name with
/// [`Registry::register_source`] and must honour the same contract as the
/// built-in drivers.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    async fn create(&self, options: &Options) -> Result<Arc<dyn Source>, DriverError>;
}

/// Builds a destination driver that is not compiled into this crate.
#[async_trait]
pub trait DestinationFactory: Send + Sync {
    async fn create(&self, options: &Options) -> Result<Arc<dyn Destination>, DriverError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Csv,
    #[cfg(feature = "mysql")]
    Mysql,
}

impl Builtin {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "csv" => Some(Builtin::Csv),
            #[cfg(feature = "mysql")]
            "mysql" => Some(Builtin::Mysql),
            _ => None,
        }
    }

    async fn create_source(self, options: &Options) -> Result<Arc<dyn Source>, DriverError> {
        match self {
            Builtin::Csv => Ok(Arc::new(CsvSource::open(options).await?)),
            #[cfg(feature = "mysql")]
            Builtin::Mysql => Ok(Arc::new(super::mysql::MysqlSource::connect(options).await?)),
        }
    }

    async fn create_destination(
        self,
        options: &Options,
    ) -> Result<Arc<dyn Destination>, DriverError> {
        match self {
            Builtin::Csv => Ok(Arc::new(CsvDestination::open(options).await?)),
            #[cfg(feature = "mysql")]
            Builtin::Mysql => Ok(Arc::new(
                super::mysql::MysqlDestination::connect(options).await?,
            )),
        }
    }
}

/// Resolves driver names to constructed drivers.
///
/// Built-in names always win over registered extensions.
#[derive(Clone, Default)]
pub struct Registry {
    sources: HashMap<String, Arc<dyn SourceFactory>>,
    destinations: HashMap<String, Arc<dyn DestinationFactory>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("destinations", &self.destinations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_source(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn SourceFactory>,
    ) -> &mut Self {
        self.sources.insert(name.into(), factory);
        self
    }

    pub fn register_destination(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn DestinationFactory>,
    ) -> &mut Self {
        self.destinations.insert(name.into(), factory);
        self
    }

    pub fn has_source(&self, name: &str) -> bool {
        Builtin::from_name(name).is_some() || self.sources.contains_key(name)
    }

    pub fn has_destination(&self, name: &str) -> bool {
        Builtin::from_name(name).is_some() || self.destinations.contains_key(name)
    }

    pub async fn create_source(
        &self,
        config: &DriverConfig,
    ) -> Result<Arc<dyn Source>, DriverError> {
        info!(driver = %config.driver, "starting a new source driver instance");
        if let Some(builtin) = Builtin::from_name(&config.driver) {
            return builtin.create_source(&config.options).await;
        }
        match self.sources.get(&config.driver) {
            Some(factory) => factory.create(&config.options).await,
            None => Err(DriverError::Configuration(format!(
                "no source driver found under the name `{}`",
                config.driver
            ))),
        }
    }

    pub async fn create_destination(
        &self,
        config: &DriverConfig,
    ) -> Result<Arc<dyn Destination>, DriverError> {
        info!(driver = %config.driver, "starting a new destination driver instance");
        if let Some(builtin) = Builtin::from_name(&config.driver) {
            return builtin.create_destination(&config.options).await;
        }
        match self.destinations.get(&config.driver) {
            Some(factory) => factory.create(&config.options).await,
            None => Err(DriverError::Configuration(format!(
                "no destination driver found under the name `{}`",
                config.driver
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ExtractionTask, LoadTask, ResultSet};

    struct EmptySource;

    #[async_trait]
    impl Source for EmptySource {
        async fn plan(&self) -> Result<Vec<ExtractionTask>, DriverError> {
            Ok(Vec::new())
        }

        async fn extract(&self, _task: &ExtractionTask) -> Result<ResultSet, DriverError> {
            Ok(Vec::new())
        }
    }

    struct EmptySourceFactory;

    #[async_trait]
    impl SourceFactory for EmptySourceFactory {
        async fn create(&self, _options: &Options) -> Result<Arc<dyn Source>, DriverError> {
            Ok(Arc::new(EmptySource))
        }
    }

    struct DiscardDestination;

    #[async_trait]
    impl Destination for DiscardDestination {
        async fn adapt(&self, rows: ResultSet) -> Result<LoadTask, DriverError> {
            Ok(LoadTask::new(rows))
        }

        async fn persist(&self, task: LoadTask) -> Result<usize, DriverError> {
            Ok(task.row_count())
        }
    }

    struct DiscardFactory;

    #[async_trait]
    impl DestinationFactory for DiscardFactory {
        async fn create(&self, _options: &Options) -> Result<Arc<dyn Destination>, DriverError> {
            Ok(Arc::new(DiscardDestination))
        }
    }

    fn driver(name: &str) -> DriverConfig {
        DriverConfig {
            driver: name.to_string(),
            options: Options::new(),
            pool: 1,
        }
    }

    #[tokio::test]
    async fn test_unknown_driver_is_configuration_error() {
        let registry = Registry::new();

        let err = registry.create_source(&driver("oracle")).await.err().unwrap();
        assert!(matches!(err, DriverError::Configuration(_)));
        assert!(err.to_string().contains("`oracle`"));

        let err = registry
            .create_destination(&driver("oracle"))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("no destination driver"));
    }

    #[tokio::test]
    async fn test_registered_extensions_resolve() {
        let mut registry = Registry::new();
        registry
            .register_source("empty", Arc::new(EmptySourceFactory))
            .register_destination("discard", Arc::new(DiscardFactory));

        assert!(registry.has_source("empty"));
        assert!(registry.has_destination("discard"));
        assert!(!registry.has_source("discard"));

        let source = registry.create_source(&driver("empty")).await.unwrap();
        assert!(source.plan().await.unwrap().is_empty());

        let destination = registry.create_destination(&driver("discard")).await.unwrap();
        let task = destination.adapt(vec![vec!["a".into()]]).await.unwrap();
        assert_eq!(destination.persist(task).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_builtin_csv_requires_path() {
        let registry = Registry::new();
        assert!(registry.has_source("csv"));

        let err = registry.create_source(&driver("csv")).await.err().unwrap();
        assert!(matches!(err, DriverError::Configuration(_)));
    }
}
