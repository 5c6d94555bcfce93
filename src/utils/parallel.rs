use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use log::info;

use crate::Result;

/// A dedicated rayon pool; at most `threads` jobs run at once.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("audio-lint-{}", i))
            .build()?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `job` for every item and hands each result to `collect` on the
    /// calling thread. Results arrive in completion order.
    pub fn process_unordered<T, R, F, C>(&self, items: &[T], job: F, mut collect: C)
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Option<R> + Send + Sync,
        C: FnMut(R),
    {
        let (tx, rx) = mpsc::channel();
        let job = &job;
        self.pool.scope(move |scope| {
            for item in items {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    if let Some(result) = job(item) {
                        // The receiver outlives the scope, so this cannot fail.
                        let _ = tx.send(result);
                    }
                });
            }
        });
        for result in rx {
            collect(result);
        }
    }
}

/// Logs progress every 100 items and on the last one.
pub struct Progress {
    done: AtomicUsize,
    total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            done: AtomicUsize::new(0),
            total,
        }
    }

    pub fn tick(&self) -> usize {
        let processed = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        if processed % 100 == 0 || processed == self.total {
            info!(
                "Progress: {}/{} files ({:.1}%)",
                processed,
                self.total,
                (processed as f64 / self.total.max(1) as f64) * 100.0
            );
        }
        processed
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_result() {
        let pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.threads(), 3);

        let items: Vec<u32> = (0..50).collect();
        let mut seen = Vec::new();
        pool.process_unordered(&items, |n| (n % 5 != 0).then_some(n * 2), |r| seen.push(r));
        seen.sort_unstable();

        let expected: Vec<u32> = (0..50).filter(|n| n % 5 != 0).map(|n| n * 2).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn progress_counts_ticks() {
        let progress = Progress::new(2);
        assert_eq!(progress.tick(), 1);
        assert_eq!(progress.tick(), 2);
        assert_eq!(progress.done(), 2);
    }
}
