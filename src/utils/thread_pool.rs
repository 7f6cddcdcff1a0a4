use rayon::ThreadPoolBuilder;
use std::sync::Arc;

/// Build a worker pool with `num_threads` named threads.
///
/// # Errors
///
/// Returns an error if the thread pool cannot be created
pub fn build_pool(num_threads: usize) -> anyhow::Result<Arc<rayon::ThreadPool>> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .thread_name(|i| format!("backupd-worker-{i}"))
        .build()?;
    Ok(Arc::new(pool))
}

/// Build the pool requested by the `[performance]` config table.
///
/// Returns `None` when parallel checks are disabled.
///
/// # Errors
///
/// Returns an error if the thread pool cannot be created
pub fn from_config(config: &crate::config::Config) -> anyhow::Result<Option<Arc<rayon::ThreadPool>>> {
    if !config.performance.parallel_checks {
        return Ok(None);
    }
    build_pool(config.performance.parallel_threads).map(Some)
}
