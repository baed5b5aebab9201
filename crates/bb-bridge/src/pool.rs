//! Worker pools that map a function over a block and deliver the results
//! in submission order.
//!
//! Pools are free to finish jobs in any order. Every result travels tagged
//! with its submission index and is released to the caller only once all
//! earlier indices have been delivered. A job that panics surfaces as a
//! [`BridgeError::WorkerPool`] at its own position in the sequence.

use crossbeam_channel::Receiver;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use tracing::debug;

use bb_types::{BridgeError, BridgeResult};

/// An executor exposing "apply a function over a sequence, return results
/// aligned to input order".
pub trait WorkerPool {
    /// Number of workers evaluating concurrently.
    fn workers(&self) -> usize;

    /// Apply `job` to every item and feed `(index, result)` to `sink` in
    /// submission order.
    ///
    /// Delivery stops at the first error, whether it comes from a worker or
    /// from `sink`. No result for a later index reaches `sink` after that.
    fn map_ordered<T, R, F, S>(&self, items: &[T], job: &F, sink: S) -> BridgeResult<()>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
        S: FnMut(usize, R) -> BridgeResult<()>;
}

// ---------------------------------------------------------------------------
// Inline
// ---------------------------------------------------------------------------

/// Runs every job on the calling thread, one after another.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlinePool;

impl WorkerPool for InlinePool {
    fn workers(&self) -> usize {
        1
    }

    fn map_ordered<T, R, F, S>(&self, items: &[T], job: &F, mut sink: S) -> BridgeResult<()>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
        S: FnMut(usize, R) -> BridgeResult<()>,
    {
        for (index, item) in items.iter().enumerate() {
            sink(index, job(item))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rayon
// ---------------------------------------------------------------------------

/// A fixed-size rayon thread pool owned by the bridge for the run.
pub struct RayonPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl RayonPool {
    pub fn new(workers: usize) -> BridgeResult<Self> {
        if workers == 0 {
            return Err(BridgeError::WorkerPool {
                message: "a pool needs at least one worker".to_string(),
            });
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("bb-rayon-{i}"))
            .build()
            .map_err(|e| BridgeError::WorkerPool {
                message: e.to_string(),
            })?;
        debug!(workers, "rayon worker pool started");
        Ok(Self { pool, workers })
    }
}

impl std::fmt::Debug for RayonPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RayonPool")
            .field("workers", &self.workers)
            .finish()
    }
}

impl WorkerPool for RayonPool {
    fn workers(&self) -> usize {
        self.workers
    }

    fn map_ordered<T, R, F, S>(&self, items: &[T], job: &F, sink: S) -> BridgeResult<()>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
        S: FnMut(usize, R) -> BridgeResult<()>,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        // The calling thread stays outside the pool and drains results while
        // the workers run, so a single-worker pool cannot deadlock.
        self.pool.in_place_scope(|scope| {
            for (index, item) in items.iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| job(item)));
                    let _ = tx.send((index, result));
                });
            }
            drop(tx);
            deliver_in_order(&rx, items.len(), sink)
        })
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Fixed set of worker threads pulling jobs off a shared queue.
///
/// Completion order is whatever the workers make of it, much like a process
/// or distributed pool. Threads live for one block only.
#[derive(Debug, Clone)]
pub struct ChannelPool {
    workers: usize,
}

impl ChannelPool {
    pub fn new(workers: usize) -> BridgeResult<Self> {
        if workers == 0 {
            return Err(BridgeError::WorkerPool {
                message: "a pool needs at least one worker".to_string(),
            });
        }
        Ok(Self { workers })
    }
}

impl WorkerPool for ChannelPool {
    fn workers(&self) -> usize {
        self.workers
    }

    fn map_ordered<T, R, F, S>(&self, items: &[T], job: &F, sink: S) -> BridgeResult<()>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
        S: FnMut(usize, R) -> BridgeResult<()>,
    {
        if items.is_empty() {
            return Ok(());
        }
        let workers = self.workers.min(items.len());

        thread::scope(|scope| {
            let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, &T)>();
            let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, thread::Result<R>)>();

            for (index, item) in items.iter().enumerate() {
                job_tx.send((index, item)).map_err(|_| BridgeError::WorkerPool {
                    message: "job queue closed before submission finished".to_string(),
                })?;
            }
            drop(job_tx);

            for worker in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                thread::Builder::new()
                    .name(format!("bb-channel-{worker}"))
                    .spawn_scoped(scope, move || {
                        for (index, item) in job_rx.iter() {
                            let result = panic::catch_unwind(AssertUnwindSafe(|| job(item)));
                            // Receiver gone: the block was aborted.
                            if result_tx.send((index, result)).is_err() {
                                break;
                            }
                        }
                    })
                    .map_err(|e| BridgeError::WorkerPool {
                        message: format!("failed to spawn worker {worker}: {e}"),
                    })?;
            }
            drop(result_tx);

            deliver_in_order(&result_rx, items.len(), sink)
        })
    }
}

// ---------------------------------------------------------------------------
// Ordered fan-in
// ---------------------------------------------------------------------------

/// Reassemble `(index, result)` pairs arriving in any order and release them
/// to `sink` strictly by index.
fn deliver_in_order<R, S>(
    results: &Receiver<(usize, thread::Result<R>)>,
    len: usize,
    mut sink: S,
) -> BridgeResult<()>
where
    S: FnMut(usize, R) -> BridgeResult<()>,
{
    let mut pending: BTreeMap<usize, thread::Result<R>> = BTreeMap::new();
    let mut next = 0;

    while next < len {
        let (index, result) = results.recv().map_err(|_| BridgeError::WorkerPool {
            message: format!("workers disconnected after {next} of {len} results"),
        })?;
        pending.insert(index, result);

        while let Some(result) = pending.remove(&next) {
            let value = result.map_err(|payload| BridgeError::WorkerPool {
                message: format!(
                    "worker panicked while evaluating point {next}: {}",
                    panic_message(payload.as_ref())
                ),
            })?;
            sink(next, value)?;
            next += 1;
        }
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Later items finish first, so completion order is reversed.
    fn staggered(item: &u64) -> u64 {
        thread::sleep(Duration::from_millis(20u64.saturating_sub(*item * 2)));
        item * 10
    }

    fn collect<P: WorkerPool>(pool: &P, items: &[u64]) -> BridgeResult<Vec<(usize, u64)>> {
        let mut seen = Vec::new();
        pool.map_ordered(items, &staggered, |index, value| {
            seen.push((index, value));
            Ok(())
        })?;
        Ok(seen)
    }

    fn expected(items: &[u64]) -> Vec<(usize, u64)> {
        items.iter().enumerate().map(|(i, v)| (i, v * 10)).collect()
    }

    #[test]
    fn inline_pool_preserves_order() {
        let items: Vec<u64> = (0..8).collect();
        assert_eq!(collect(&InlinePool, &items).unwrap(), expected(&items));
    }

    #[test]
    fn rayon_pool_preserves_submission_order() {
        let pool = RayonPool::new(4).unwrap();
        let items: Vec<u64> = (0..8).collect();
        assert_eq!(collect(&pool, &items).unwrap(), expected(&items));
    }

    #[test]
    fn channel_pool_preserves_submission_order() {
        let pool = ChannelPool::new(3).unwrap();
        let items: Vec<u64> = (0..8).collect();
        assert_eq!(collect(&pool, &items).unwrap(), expected(&items));
    }

    #[test]
    fn single_worker_and_single_item() {
        let rayon = RayonPool::new(1).unwrap();
        let channel = ChannelPool::new(1).unwrap();
        assert_eq!(collect(&rayon, &[5]).unwrap(), vec![(0, 50)]);
        assert_eq!(collect(&channel, &[5]).unwrap(), vec![(0, 50)]);
    }

    #[test]
    fn zero_workers_rejected() {
        assert!(matches!(RayonPool::new(0), Err(BridgeError::WorkerPool { .. })));
        assert!(matches!(ChannelPool::new(0), Err(BridgeError::WorkerPool { .. })));
    }

    #[test]
    fn worker_panic_surfaces_as_pool_failure() {
        let pool = ChannelPool::new(2).unwrap();
        let items: Vec<u64> = (0..4).collect();
        let mut delivered = Vec::new();
        let result = pool.map_ordered(
            &items,
            &|item: &u64| {
                if *item == 2 {
                    panic!("worker died");
                }
                *item
            },
            |index, _| {
                delivered.push(index);
                Ok(())
            },
        );

        match result {
            Err(BridgeError::WorkerPool { message }) => assert!(message.contains("worker died")),
            other => panic!("expected worker pool failure, got {other:?}"),
        }
        assert_eq!(delivered, vec![0, 1]);
    }

    #[test]
    fn sink_error_stops_delivery() {
        let pool = RayonPool::new(2).unwrap();
        let items: Vec<u64> = (0..6).collect();
        let mut delivered = Vec::new();
        let result = pool.map_ordered(&items, &staggered, |index, _| {
            if index == 3 {
                return Err(BridgeError::Recorder {
                    message: "sink closed".into(),
                });
            }
            delivered.push(index);
            Ok(())
        });

        assert!(matches!(result, Err(BridgeError::Recorder { .. })));
        assert_eq!(delivered, vec![0, 1, 2]);
    }
}
