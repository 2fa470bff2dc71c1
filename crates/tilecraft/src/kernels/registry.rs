use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::{Benchmark, Copy2d, MatVec, TransposeNd};

type Catalog = BTreeMap<String, Arc<dyn Benchmark>>;

static CATALOG: OnceLock<RwLock<Catalog>> = OnceLock::new();

fn catalog() -> &'static RwLock<Catalog> {
    CATALOG.get_or_init(|| {
        let builtins: [Arc<dyn Benchmark>; 3] = [
            Arc::new(Copy2d::default()),
            Arc::new(MatVec::default()),
            Arc::new(TransposeNd::default()),
        ];
        RwLock::new(
            builtins
                .into_iter()
                .map(|benchmark| (benchmark.name().to_string(), benchmark))
                .collect(),
        )
    })
}

/// Adds a benchmark under its own name and returns the one it displaced.
///
/// A panic while the catalog was locked leaves every entry intact, so a
/// poisoned lock is read through.
pub fn register_benchmark(benchmark: Arc<dyn Benchmark>) -> Option<Arc<dyn Benchmark>> {
    let name = benchmark.name().to_string();
    tracing::debug!(benchmark = %name, "registering benchmark");
    catalog()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(name, benchmark)
}

pub fn get_benchmark(name: &str) -> Option<Arc<dyn Benchmark>> {
    catalog()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .map(Arc::clone)
}

/// Registered benchmark names, sorted.
pub fn list_benchmarks() -> Vec<String> {
    catalog()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect()
}
