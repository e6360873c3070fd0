//! Crate-local thread pool for recalculation.
//!
//! Evaluation batches run on a dedicated rayon pool instead of the global one
//! so embedding applications keep their own pool unaffected. The pool is
//! built on first use; if that fails, evaluation stays on the calling thread.

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
fn pool() -> Option<&'static rayon::ThreadPool> {
    use std::sync::OnceLock;

    static POOL: OnceLock<Option<rayon::ThreadPool>> = OnceLock::new();
    POOL.get_or_init(|| {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = std::env::var("RAYON_NUM_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            builder = builder.num_threads(threads);
        }
        match builder.build() {
            Ok(pool) => Some(pool),
            Err(err) => {
                log::warn!("recalc thread pool unavailable, evaluating sequentially: {err}");
                None
            }
        }
    })
    .as_ref()
}

/// Run `f` inside the recalculation pool when one is available.
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
pub fn install<R: Send>(f: impl FnOnce() -> R + Send) -> R {
    match pool() {
        Some(pool) => pool.install(f),
        None => f(),
    }
}

#[cfg(not(all(feature = "parallel", not(target_arch = "wasm32"))))]
pub fn install<R: Send>(f: impl FnOnce() -> R + Send) -> R {
    f()
}
