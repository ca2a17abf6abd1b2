//! Decides whether an identifier is a dimension or a metric.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::trace;

use crate::config::{ColumnCatalog, ColumnType, ConfigError};

/// Process-wide classifier over the bundled catalog.
static SHARED: Lazy<Result<Classifier, ConfigError>> =
    Lazy::new(|| ColumnCatalog::bundled().map(|catalog| Classifier::new(Arc::new(catalog))));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("no such dimension or metric: {0}")]
    NotFound(String),
    #[error("column catalog unavailable: {0}")]
    Catalog(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub column_type: ColumnType,
    pub data_type: String,
}

/// Memoizing lookup front-end for a [`ColumnCatalog`].
///
/// Misses are cached too, so an unknown identifier is looked up once.
#[derive(Debug)]
pub struct Classifier {
    catalog: Arc<ColumnCatalog>,
    cache: RwLock<HashMap<String, Option<Classification>>>,
}

impl Classifier {
    pub fn new(catalog: Arc<ColumnCatalog>) -> Self {
        Self {
            catalog,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared() -> Result<&'static Classifier, ClassificationError> {
        SHARED
            .as_ref()
            .map_err(|e| ClassificationError::Catalog(e.to_string()))
    }

    pub fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    pub fn classify(&self, identifier: &str) -> Result<Classification, ClassificationError> {
        let cached = self.cache.read().get(identifier).cloned();
        let entry = match cached {
            Some(entry) => {
                trace!(identifier, "classifier cache hit");
                entry
            }
            None => {
                trace!(identifier, "classifier cache miss");
                let entry = self.catalog.lookup(identifier).map(|column| Classification {
                    column_type: column.column_type,
                    data_type: column.data_type.clone(),
                });
                self.cache
                    .write()
                    .insert(identifier.to_string(), entry.clone());
                entry
            }
        };

        entry.ok_or_else(|| ClassificationError::NotFound(identifier.to_string()))
    }

    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }
}
