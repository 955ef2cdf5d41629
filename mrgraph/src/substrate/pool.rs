use crate::errors::JobError;
use once_cell::sync::OnceCell;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::{num::NonZeroUsize, sync::Arc, thread::available_parallelism};
use tracing::warn;

static POOL: OnceCell<Arc<ThreadPool>> = OnceCell::new();

fn default_num_threads() -> usize {
    match std::env::var("MRGRAPH_MAX_THREADS") {
        Ok(s) => match s.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                warn!("MRGRAPH_MAX_THREADS={s:?} is not a positive number, ignoring it");
                available_parallelism().map_or(1, NonZeroUsize::get)
            }
        },
        Err(_) => available_parallelism().map_or(1, NonZeroUsize::get),
    }
}

/// Shared pool sized from `MRGRAPH_MAX_THREADS`, or the number of cores.
pub fn global_pool() -> Result<Arc<ThreadPool>, JobError> {
    POOL.get_or_try_init(|| custom_pool(default_num_threads()))
        .cloned()
}

pub fn custom_pool(n_threads: usize) -> Result<Arc<ThreadPool>, JobError> {
    let pool = ThreadPoolBuilder::new().num_threads(n_threads).build()?;
    Ok(Arc::new(pool))
}
