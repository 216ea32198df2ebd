//! Wave-based concurrency for detail enrichment.
//!
//! Items are split into consecutive slices of `width`. All members of a
//! slice run concurrently and the next slice starts only once every member
//! of the current one has finished, so at most `width` operations are ever
//! in flight.

use std::future::Future;

use futures::future::join_all;
use tracing::debug;

/// Number of waves needed for `len` items at `width` per wave
pub fn wave_count(len: usize, width: usize) -> usize {
    len.div_ceil(width.max(1))
}

/// Run `op` over `items` in waves of `width`, preserving input order in the output.
///
/// `op` receives each item's position in `items` along with the item. A
/// `width` of zero is treated as one.
pub async fn run_in_waves<T, R, F, Fut>(items: Vec<T>, width: usize, op: F) -> Vec<R>
where
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = R>,
{
    let width = width.max(1);
    let total = items.len();
    let waves = wave_count(total, width);
    let mut results = Vec::with_capacity(total);
    let mut items = items.into_iter().enumerate().peekable();

    let mut wave = 0;
    while items.peek().is_some() {
        wave += 1;
        let slice: Vec<_> = items.by_ref().take(width).collect();
        debug!("Starting wave {}/{} with {} items", wave, waves, slice.len());

        let settled = join_all(slice.into_iter().map(|(index, item)| op(index, item))).await;
        results.extend(settled);
    }

    results
}
