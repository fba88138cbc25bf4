// Holder of the currently active data source

use crate::pool::{DataSource, DataSourceId};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Shared cell holding the data source handed out to query code
///
/// Readers get a clone of the current `Arc`; replacement is a single
/// exchange under the write lock, so a reader sees either the old or the
/// new source and nothing in between.
pub struct DynamicDataSource {
    current: RwLock<Arc<dyn DataSource>>,
}

impl DynamicDataSource {
    pub fn new(initial: Arc<dyn DataSource>) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// The data source to use for the next operation
    pub fn current(&self) -> Arc<dyn DataSource> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn current_id(&self) -> DataSourceId {
        self.current().id()
    }

    /// Install `new_source` and return the one it replaced
    pub fn get_and_set(&self, new_source: Arc<dyn DataSource>) -> Arc<dyn DataSource> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, new_source)
    }
}

impl fmt::Debug for DynamicDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current();
        f.debug_struct("DynamicDataSource")
            .field("current_id", &current.id())
            .field("current_name", &current.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DataSourceError;
    use async_trait::async_trait;

    struct NamedSource {
        id: DataSourceId,
        name: &'static str,
    }

    impl NamedSource {
        fn arc(name: &'static str) -> Arc<dyn DataSource> {
            Arc::new(Self {
                id: DataSourceId::new(),
                name,
            })
        }
    }

    #[async_trait]
    impl DataSource for NamedSource {
        fn id(&self) -> DataSourceId {
            self.id
        }

        fn name(&self) -> &str {
            self.name
        }

        async fn health_check(&self) -> Result<(), DataSourceError> {
            Ok(())
        }
    }

    #[test]
    fn test_get_and_set_returns_previous() {
        let first = NamedSource::arc("first");
        let second = NamedSource::arc("second");
        let dynamic = DynamicDataSource::new(first.clone());

        assert_eq!(dynamic.current_id(), first.id());

        let previous = dynamic.get_and_set(second.clone());
        assert_eq!(previous.id(), first.id());
        assert_eq!(dynamic.current_id(), second.id());
        assert_eq!(dynamic.current().name(), "second");
    }

    #[test]
    fn test_concurrent_readers_only_see_installed_sources() {
        let sources: Vec<_> = ["a", "b", "c", "d"]
            .into_iter()
            .map(NamedSource::arc)
            .collect();
        let installed: Vec<_> = sources.iter().map(|s| s.id()).collect();
        let dynamic = Arc::new(DynamicDataSource::new(sources[0].clone()));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let dynamic = &dynamic;
                let installed = &installed;
                scope.spawn(move || {
                    for _ in 0..1_000 {
                        assert!(installed.contains(&dynamic.current_id()));
                    }
                });
            }
            for source in sources.iter().cycle().take(200) {
                dynamic.get_and_set(source.clone());
            }
        });
    }
}
