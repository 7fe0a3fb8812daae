use core::sync::atomic::{AtomicU64, Ordering};
use std::{sync::Arc, time::Instant};

use anyhow::Context;
use emz_sku::{
    Allocation, CodeDeriver, Intake, Prefix, SequenceCounter, SequenceStore, SkuAllocator,
    backend::{Backend, MemoryBackend, PgBackend, RedbBackend},
};

use crate::server::{
    config::{ServerConfig, StoreConfig},
    http::error_code,
    telemetry::{increment_allocation_errors, increment_allocations, record_allocation_duration},
};

/// Everything both listeners need. Cloning is cheap; all clones share the
/// same backend.
#[derive(Clone)]
pub struct AppState {
    pub intake: Intake<MeteredStore<Backend>, Backend>,
}

impl AppState {
    pub fn new(backend: Backend, config: &ServerConfig) -> Self {
        let mut allocator = SkuAllocator::new(MeteredStore::new(backend.clone()))
            .with_deriver(CodeDeriver::new(config.rules.clone()));
        if let Some(timeout) = config.allocate_timeout {
            allocator = allocator.with_timeout(timeout);
        }
        Self {
            intake: Intake::new(allocator, backend),
        }
    }

    pub fn allocator(&self) -> &SkuAllocator<MeteredStore<Backend>> {
        self.intake.allocator()
    }

    pub fn backend(&self) -> &Backend {
        self.intake.items()
    }

    pub fn stats(&self) -> &AllocationStats {
        self.allocator().store().stats()
    }

    /// Allocates an item number without attaching it to an item. Shared by
    /// the HTTP and gRPC surfaces.
    pub async fn allocate(&self, brand: &str, model: &str) -> emz_sku::Result<Allocation> {
        let result = self.allocator().allocate(brand, model).await;
        match &result {
            Ok(allocation) => {
                tracing::info!(item_number = %allocation.item_number, "allocated item number");
            }
            Err(err) if !matches!(err, emz_sku::Error::Validation { .. }) => {
                tracing::warn!(%err, brand, model, "allocation failed");
            }
            Err(_) => {}
        }
        result
    }
}

/// Totals since startup, kept alongside the OpenTelemetry instruments.
#[derive(Debug, Default)]
pub struct AllocationStats {
    allocated: AtomicU64,
    failed: AtomicU64,
}

impl AllocationStats {
    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// A [`SequenceStore`] that records every allocation, whether it came from
/// the allocate endpoint, an item's first save or an explicit reset.
pub struct MeteredStore<S> {
    inner: S,
    stats: Arc<AllocationStats>,
}

impl<S: Clone> Clone for MeteredStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<S> MeteredStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            stats: Arc::default(),
        }
    }

    pub fn stats(&self) -> &AllocationStats {
        &self.stats
    }
}

/// Records the outcome of one store allocation. Dropped unfinished means
/// the call was cancelled, e.g. by the allocation timeout.
struct InFlight<'a> {
    stats: &'a AllocationStats,
    start: Instant,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn start(stats: &'a AllocationStats) -> Self {
        Self {
            stats,
            start: Instant::now(),
            finished: false,
        }
    }

    fn finish(mut self, result: &emz_sku::Result<u64>) {
        self.finished = true;
        match result {
            Ok(_) => {
                self.stats.allocated.fetch_add(1, Ordering::Relaxed);
                increment_allocations();
                record_allocation_duration(self.start.elapsed().as_secs_f64() * 1_000.0);
            }
            Err(err) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                increment_allocation_errors(error_code(err));
            }
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            increment_allocation_errors("cancelled");
        }
    }
}

impl<S: SequenceStore> SequenceStore for MeteredStore<S> {
    async fn allocate(&self, prefix: &Prefix) -> emz_sku::Result<u64> {
        let in_flight = InFlight::start(&self.stats);
        let result = self.inner.allocate(prefix).await;
        in_flight.finish(&result);
        result
    }

    async fn current(&self, prefix: &Prefix) -> emz_sku::Result<Option<u64>> {
        self.inner.current(prefix).await
    }

    async fn advance_to(&self, prefix: &Prefix, floor: u64) -> emz_sku::Result<u64> {
        self.inner.advance_to(prefix, floor).await
    }

    async fn counters(&self) -> emz_sku::Result<Vec<SequenceCounter>> {
        self.inner.counters().await
    }
}

/// Opens the configured store, creating tables where needed.
pub async fn connect(store: &StoreConfig) -> anyhow::Result<Backend> {
    let backend = match store {
        StoreConfig::Memory => {
            tracing::warn!("using the in-memory store; counters are lost on restart");
            MemoryBackend::new().into()
        }
        StoreConfig::Redb { path } => RedbBackend::open(path)
            .with_context(|| format!("failed to open redb database {}", path.display()))?
            .into(),
        StoreConfig::Postgres {
            url,
            max_connections,
            acquire_timeout,
        } => {
            let backend = PgBackend::connect(url, *max_connections, *acquire_timeout)
                .await
                .context("failed to connect to Postgres")?;
            backend
                .migrate()
                .await
                .context("failed to create Postgres tables")?;
            backend.into()
        }
    };
    Ok(backend)
}
