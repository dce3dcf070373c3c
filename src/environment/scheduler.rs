//! The environment's worker pool: a priority queue of builder jobs
//! drained by a small thread pool, with dedup and cooperative
//! cancellation.
//!
//! Grounded on the teacher's `compiler::scheduler::CompileScheduler`:
//! a `BinaryHeap` priority queue drained once into a `crossbeam_channel`
//! up front (rather than the teacher's shared mutex-guarded heap polled
//! by each worker), and a `DashSet` tracking in-flight job ids to dedup
//! concurrent claims on the same job. Scaled down from the teacher's
//! persistent background-thread design to a scoped pool that runs for
//! the duration of one `Environment::build` call, since this crate has
//! no hot-reload/background-compile concept to keep a scheduler alive
//! between builds.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex as StdMutex};

use crossbeam::channel;
use dashmap::DashSet;

use crate::builder::{BuildNode, BuilderId, Status};

/// What the scheduler needs from a job: drive it and read its status.
/// Deliberately narrower than [`BuildNode`] (no `outfilepath`), since
/// a [`crate::builder::TargetBuilder`] — the scheduler's only caller —
/// has no single output path of its own to expose.
pub trait Runnable: Send {
    fn status(&self) -> Status;
    fn build(&mut self, complete: bool) -> Status;
    fn cancel(&mut self);
}

impl<T: BuildNode + Send> Runnable for T {
    fn status(&self) -> Status {
        BuildNode::status(self)
    }

    fn build(&mut self, complete: bool) -> Status {
        BuildNode::build(self, complete)
    }

    fn cancel(&mut self) {
        BuildNode::cancel(self)
    }
}

struct Job {
    id: BuilderId,
    priority: i32,
    builder: Arc<StdMutex<Box<dyn Runnable>>>,
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
impl Eq for Job {}
impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        // lower priority value runs first (spec §4.5: "lower runs
        // first"), so reverse the natural BinaryHeap max-heap order
        other.priority.cmp(&self.priority)
    }
}

/// Drives a batch of builder jobs to completion using a bounded pool
/// of worker threads, honoring each job's declared priority and a
/// shared cancellation flag.
pub struct Scheduler {
    workers: usize,
    cancel: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(workers: usize, cancel: Arc<AtomicBool>) -> Self {
        Self { workers: workers.max(1), cancel }
    }

    /// Run every job to a terminal [`Status`], at most `self.workers`
    /// at a time, highest-priority (lowest number) first. Returns the
    /// aggregate status across all jobs (spec §4.6's worst-of
    /// reduction).
    pub fn run_to_completion(&self, jobs: Vec<(BuilderId, i32, Arc<StdMutex<Box<dyn Runnable>>>)>) -> Status {
        // Drain the priority heap into declared-priority order up
        // front, then hand work out over a crossbeam channel: workers
        // race to `recv` rather than contend on a shared heap mutex
        // per pop, matching how the teacher's scheduler hands tasks
        // to its worker threads.
        let heap_builders: Vec<_> = jobs.iter().map(|(_, _, builder)| builder.clone()).collect();
        let mut heap: BinaryHeap<Job> =
            jobs.into_iter().map(|(id, priority, builder)| Job { id, priority, builder }).collect();
        let (tx, rx) = channel::unbounded();
        while let Some(job) = heap.pop() {
            let _ = tx.send(job);
        }
        drop(tx);

        let in_flight: DashSet<BuilderId> = DashSet::new();
        let all_builders: Vec<_> = heap_builders.clone();

        std::thread::scope(|scope| {
            for _ in 0..self.workers {
                scope.spawn(|| {
                    while let Ok(job) = rx.recv() {
                        if self.cancel.load(AtomicOrdering::SeqCst) {
                            let mut builder = job.builder.lock().expect("builder mutex poisoned");
                            builder.cancel();
                            continue;
                        }
                        if !in_flight.insert(job.id) {
                            continue;
                        }
                        job.builder.lock().expect("builder mutex poisoned").build(true);
                        in_flight.remove(&job.id);
                    }
                });
            }
        });

        let statuses: Vec<_> = all_builders.iter().map(|b| b.lock().expect("builder mutex poisoned").status()).collect();
        Status::aggregate(statuses.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{AtomicBuilder, Kind, Parameter};
    use crate::decider::{ContentHashDecider, Decider, DecisionStore};
    use crate::path::TargetPath;
    use tempfile::TempDir;

    #[test]
    fn runs_all_jobs_to_completion() {
        let dir = TempDir::new().unwrap();
        let decider: Arc<dyn Decider> = Arc::new(ContentHashDecider::new(DecisionStore::open(dir.path()).unwrap()));

        let mut jobs = Vec::new();
        for i in 0..4 {
            let infile = dir.path().join(format!("in{i}.txt"));
            std::fs::write(&infile, format!("content {i}")).unwrap();
            let outfile = TargetPath::cache(dir.path(), format!("out{i}.txt"));
            let builder: Box<dyn Runnable> = Box::new(AtomicBuilder::new(
                Kind::Copy,
                vec![Parameter::input(&infile)],
                outfile,
                decider.clone(),
            ));
            jobs.push((BuilderId(i as usize), i, Arc::new(StdMutex::new(builder))));
        }

        let scheduler = Scheduler::new(2, Arc::new(AtomicBool::new(false)));
        let aggregate = scheduler.run_to_completion(jobs.clone());
        assert_eq!(aggregate, Status::Done);

        for (_, _, builder) in jobs {
            assert_eq!(builder.lock().unwrap().status(), Status::Done);
        }
    }
}
