use crate::cache::SchemaCache;
use crate::cancel::guarded;
use crate::metrics::SCHEMA_CACHE_LOOKUPS;
use crate::traits::SearchBackend;
use solrsmart_core::{FieldCatalog, Result, UpstreamCall};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cache-or-fetch access to field catalogs.
///
/// Concurrent misses for one collection may each fetch; the last insert wins.
/// A failed fetch leaves any previous entry untouched.
#[derive(Clone)]
pub struct CatalogService {
    backend: Arc<dyn SearchBackend>,
    cache: SchemaCache,
}

impl CatalogService {
    pub fn new(backend: Arc<dyn SearchBackend>, cache: SchemaCache) -> Self {
        Self { backend, cache }
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    pub async fn field_catalog(
        &self,
        collection: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<FieldCatalog>> {
        if let Some(fc) = self.cache.get(collection) {
            SCHEMA_CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
            debug!(collection, "schema cache hit");
            return Ok(fc);
        }
        SCHEMA_CACHE_LOOKUPS.with_label_values(&["miss"]).inc();

        let unique_key = guarded(
            cancel,
            UpstreamCall::UniqueKey,
            self.backend.unique_key(collection),
        )
        .await?;
        let fields = guarded(cancel, UpstreamCall::Fields, self.backend.fields(collection)).await?;
        let metadata = match guarded(
            cancel,
            UpstreamCall::FieldMetadata,
            self.backend.field_metadata(collection),
        )
        .await
        {
            Ok(m) => Some(m),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!(collection, error = %e, "field metadata unavailable, continuing without descriptions");
                None
            }
        };

        let fc = Arc::new(FieldCatalog::new(unique_key, fields, metadata));
        self.cache.insert(collection, fc.clone());
        info!(
            collection,
            fields = fc.all.len(),
            unique_key = %fc.unique_key,
            "schema catalog refreshed"
        );
        Ok(fc)
    }
}
