// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Execution units for the narrow phase
//!
//! A unit receives an immutable snapshot of one cell's colliders and
//! answers with the overlapping pairs it found. Units share nothing with
//! the driving thread except the result channel.

use crate::entity::EntityId;
use crate::spatial_hash::{CellCoord, Rect};

/// Copy of a collider taken when its cell is dispatched
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColliderSnapshot {
    pub entity: EntityId,
    pub bounds: Rect,
}

/// Input of one execution unit
#[derive(Clone, Debug)]
pub struct CellJob {
    pub cell: CellCoord,
    pub colliders: Vec<ColliderSnapshot>,
}

/// Output of one execution unit; pairs are unordered and not canonical
#[derive(Clone, Debug, PartialEq)]
pub struct CellResult {
    pub cell: CellCoord,
    pub pairs: Vec<(EntityId, EntityId)>,
}

/// All-pairs AABB test within one cell
pub fn narrow_phase_cell(colliders: &[ColliderSnapshot]) -> Vec<(EntityId, EntityId)> {
    let mut pairs = Vec::new();
    for (i, a) in colliders.iter().enumerate() {
        for b in &colliders[i + 1..] {
            if a.entity != b.entity && a.bounds.intersects(&b.bounds) {
                pairs.push((a.entity, b.entity));
            }
        }
    }
    pairs
}

#[cfg(feature = "parallel")]
pub use pool::{PoolStats, WorkerPool};

#[cfg(feature = "parallel")]
mod pool {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use crossbeam::channel::{self, RecvTimeoutError};
    use rustc_hash::FxHashSet;
    use tracing::{debug, warn};

    #[cfg(feature = "profiling")]
    use tracing::info_span;

    use super::{narrow_phase_cell, CellJob, CellResult};
    use crate::entity::EntityId;
    use crate::error::{EcsError, Result};

    type UnitFn = dyn Fn(&CellJob) -> Vec<(EntityId, EntityId)> + Send + Sync;

    /// Running totals of a pool
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PoolStats {
        /// Cells handed to a unit
        pub dispatched: u64,
        /// Cells recomputed on the driving thread after a unit failed or
        /// missed its deadline
        pub fallbacks: u64,
        /// Runs that gave up on at least one unit
        pub timeouts: u64,
    }

    /// Fixed-size pool of execution units, built once and reused every tick
    pub struct WorkerPool {
        pool: rayon::ThreadPool,
        threads: usize,
        timeout: Duration,
        stats: PoolStats,
    }

    impl WorkerPool {
        pub fn new(threads: usize, timeout: Duration) -> Result<Self> {
            let threads = threads.max(1);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|index| format!("scatter-narrow-{index}"))
                .panic_handler(|_| warn!("execution unit panicked"))
                .build()
                .map_err(|err| EcsError::WorkerPoolError(err.to_string()))?;
            debug!(threads, ?timeout, "worker pool started");
            Ok(Self {
                pool,
                threads,
                timeout,
                stats: PoolStats::default(),
            })
        }

        pub fn threads(&self) -> usize {
            self.threads
        }

        pub fn timeout(&self) -> Duration {
            self.timeout
        }

        pub fn stats(&self) -> PoolStats {
            self.stats
        }

        /// Dispatch every job and block until each has an answer
        pub fn run(&mut self, jobs: Vec<CellJob>) -> Vec<CellResult> {
            self.run_with(jobs, Arc::new(|job: &CellJob| narrow_phase_cell(&job.colliders)))
        }

        /// Like `run`, with a caller-supplied unit body. Cells whose unit
        /// panics or misses the deadline are recomputed here with
        /// [`narrow_phase_cell`], so every job yields exactly one result.
        ///
        /// Once the deadline passes the run is cancelled: units of this run
        /// that have not started yet return without doing any work, so they
        /// do not hold up the next run. A unit already executing finishes
        /// and its answer is discarded.
        pub(crate) fn run_with(&mut self, jobs: Vec<CellJob>, unit: Arc<UnitFn>) -> Vec<CellResult> {
            if jobs.is_empty() {
                return Vec::new();
            }

            #[cfg(feature = "profiling")]
            let _span = info_span!("worker_pool.run", cells = jobs.len()).entered();

            let jobs: Vec<Arc<CellJob>> = jobs.into_iter().map(Arc::new).collect();
            let (tx, rx) = channel::unbounded::<CellResult>();
            let deadline = Instant::now() + self.timeout;
            let cancelled = Arc::new(AtomicBool::new(false));

            for job in &jobs {
                let job = Arc::clone(job);
                let unit = Arc::clone(&unit);
                let tx = tx.clone();
                let cancelled = Arc::clone(&cancelled);
                self.pool.spawn(move || {
                    if cancelled.load(Ordering::Acquire) {
                        return;
                    }
                    let pairs = unit(&job);
                    // Receiver is gone if the driving thread already gave up
                    let _ = tx.send(CellResult {
                        cell: job.cell,
                        pairs,
                    });
                });
            }
            drop(tx);
            self.stats.dispatched += jobs.len() as u64;

            let mut results = Vec::with_capacity(jobs.len());
            let mut answered = FxHashSet::default();
            while answered.len() < jobs.len() {
                match rx.recv_deadline(deadline) {
                    Ok(result) => {
                        if answered.insert(result.cell) {
                            results.push(result);
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        cancelled.store(true, Ordering::Release);
                        self.stats.timeouts += 1;
                        warn!(
                            missing = jobs.len() - answered.len(),
                            timeout = ?self.timeout,
                            "execution units missed the deadline"
                        );
                        break;
                    }
                    // Every sender dropped: the remaining units panicked
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            for job in &jobs {
                if answered.contains(&job.cell) {
                    continue;
                }
                warn!(cell = ?job.cell, colliders = job.colliders.len(), "recomputing cell on driving thread");
                self.stats.fallbacks += 1;
                results.push(CellResult {
                    cell: job.cell,
                    pairs: narrow_phase_cell(&job.colliders),
                });
            }
            results
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::parallel::ColliderSnapshot;
        use crate::spatial_hash::{CellCoord, Rect};
        use slotmap::SlotMap;

        fn jobs() -> Vec<CellJob> {
            let mut ids: SlotMap<EntityId, ()> = SlotMap::with_key();
            (0..6)
                .map(|i| {
                    let a = ids.insert(());
                    let b = ids.insert(());
                    CellJob {
                        cell: CellCoord::new(i, 0),
                        colliders: vec![
                            ColliderSnapshot {
                                entity: a,
                                bounds: Rect::new(0.0, 0.0, 10.0, 10.0),
                            },
                            ColliderSnapshot {
                                entity: b,
                                bounds: Rect::new(5.0, 5.0, 10.0, 10.0),
                            },
                        ],
                    }
                })
                .collect()
        }

        fn sorted(mut results: Vec<CellResult>) -> Vec<CellResult> {
            results.sort_by_key(|r| r.cell);
            results
        }

        #[test]
        fn test_every_cell_answers() {
            let mut pool = WorkerPool::new(2, Duration::from_secs(5)).unwrap();
            let results = sorted(pool.run(jobs()));
            assert_eq!(results.len(), 6);
            assert!(results.iter().all(|r| r.pairs.len() == 1));
            assert_eq!(pool.stats().dispatched, 6);
            assert_eq!(pool.stats().fallbacks, 0);
        }

        #[test]
        fn test_panicking_unit_falls_back() {
            let mut pool = WorkerPool::new(2, Duration::from_secs(5)).unwrap();
            let unit: Arc<UnitFn> = Arc::new(|job: &CellJob| {
                if job.cell.x % 2 == 0 {
                    panic!("unit failure");
                }
                narrow_phase_cell(&job.colliders)
            });

            let expected = sorted(pool.run(jobs()));
            let results = sorted(pool.run_with(jobs(), unit));
            assert_eq!(results.len(), expected.len());
            assert!(results.iter().all(|r| r.pairs.len() == 1));
            assert_eq!(pool.stats().fallbacks, 3);
        }

        #[test]
        fn test_slow_unit_falls_back() {
            let mut pool = WorkerPool::new(1, Duration::from_millis(20)).unwrap();
            let unit: Arc<UnitFn> = Arc::new(|job: &CellJob| {
                std::thread::sleep(Duration::from_millis(200));
                narrow_phase_cell(&job.colliders)
            });

            let results = pool.run_with(jobs(), unit);
            assert_eq!(results.len(), 6);
            assert!(results.iter().all(|r| r.pairs.len() == 1));
            assert!(pool.stats().fallbacks >= 5);
            assert_eq!(pool.stats().timeouts, 1);
        }

        #[test]
        fn test_fast_run_after_slow_run_does_not_fall_back() {
            let mut pool = WorkerPool::new(1, Duration::from_millis(100)).unwrap();
            let slow: Arc<UnitFn> = Arc::new(|job: &CellJob| {
                std::thread::sleep(Duration::from_millis(400));
                narrow_phase_cell(&job.colliders)
            });

            pool.run_with(jobs(), slow);
            let after_slow = pool.stats().fallbacks;
            assert!(after_slow >= 5);

            // Only the unit that had already started is still sleeping
            std::thread::sleep(Duration::from_millis(500));

            let results = sorted(pool.run(jobs()));
            assert_eq!(results.len(), 6);
            assert!(results.iter().all(|r| r.pairs.len() == 1));
            assert_eq!(pool.stats().fallbacks, after_slow);
            assert_eq!(pool.stats().timeouts, 1);
        }
    }
}
