//! Deciders (C3): whether a builder's output is fresh or a rebuild is
//! needed, and the scoped commit/discard decision guard.
//!
//! Grounded on `examples/original_source/tests/builders/deciders/
//! test_decider.py` and `test_md5decider.py`: a `Decision` is obtained
//! fresh from the decider for a given `(inputs, output, args)` triple,
//! caches the first verdict it computes, and only recomputes on an
//! explicit `reset`. Nothing is persisted until [`Decision::commit`] is
//! called, so a build that errors or panics before committing leaves
//! the decider reporting "build needed" next time, matching the
//! Python tests' "build is interrupted" scenarios.
//!
//! Storage pattern (blake3 hex digests keyed by output path, persisted
//! as JSON) is grounded on the teacher's `cache/index.rs` +
//! `cache/modified.rs`.

mod content_hash;
mod existence;
mod store;

pub use content_hash::ContentHashDecider;
pub use existence::ExistenceDecider;
pub use store::DecisionStore;

use std::cell::Cell;
use std::path::{Path, PathBuf};

/// A single parameter influencing a builder's fingerprint, beyond its
/// input/output paths: typically a `(name, value)` pair such as
/// `("scale", "0.5")`. Order-sensitive, same as input file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub name: String,
    pub value: String,
}

impl Arg {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// Strategy for judging whether a build is needed: compares recorded
/// state for `(inputs, output, args)` against the current state on
/// disk. `Send + Sync` so an `Arc<dyn Decider>` can be shared across
/// the environment's worker threads.
pub trait Decider: Send + Sync {
    /// True if `output` is fresh (no rebuild needed) given `inputs`
    /// and `args`. Implementations may consult and update persisted
    /// state as part of this check, but must not mark a new state
    /// "committed" until [`Decider::commit`] is called.
    fn is_fresh(&self, inputs: &[PathBuf], output: &Path, args: &[Arg]) -> bool;

    /// Persist the current state of `inputs`/`output` as the new
    /// baseline for future freshness checks. Called only after a
    /// build completes successfully.
    fn commit(&self, inputs: &[PathBuf], output: &Path, args: &[Arg]);

    /// Obtain a scoped decision for one build attempt. Each call
    /// returns a fresh, uncached `Decision`.
    fn decision(&self, inputs: Vec<PathBuf>, output: PathBuf, args: Vec<Arg>) -> Decision<'_> {
        Decision {
            decider: self,
            inputs,
            output,
            args,
            cached: Cell::new(None),
            committed: Cell::new(false),
        }
    }
}

/// A scoped build-needed verdict for one `(inputs, output, args)`
/// triple. The first call to [`Decision::build_needed`] computes and
/// caches the verdict; later calls return the cached value unless
/// `reset` is passed, matching the original decider tests exactly.
pub struct Decision<'d> {
    decider: &'d dyn Decider,
    inputs: Vec<PathBuf>,
    output: PathBuf,
    args: Vec<Arg>,
    cached: Cell<Option<bool>>,
    committed: Cell<bool>,
}

impl Decision<'_> {
    /// Whether a build is needed. `reset` forces recomputation against
    /// current disk state even if a verdict was already cached.
    pub fn build_needed(&self, reset: bool) -> bool {
        if reset || self.cached.get().is_none() {
            let fresh = self.decider.is_fresh(&self.inputs, &self.output, &self.args);
            self.cached.set(Some(!fresh));
        }
        self.cached.get().unwrap()
    }

    /// Record the current state as the new baseline. Call this after
    /// a build's outputs have been written successfully; skipping it
    /// (because the build errored) leaves the next decision reporting
    /// build-needed, per the "interrupted build" scenarios.
    pub fn commit(&self) {
        self.decider.commit(&self.inputs, &self.output, &self.args);
        self.committed.set(true);
        self.cached.set(Some(false));
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn was_committed(&self) -> bool {
        self.committed.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decider::existence::ExistenceDecider;
    use tempfile::TempDir;

    #[test]
    fn decision_caches_until_reset() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let out = dir.path().join("out.txt");
        std::fs::write(&a, "x").unwrap();

        let decider = ExistenceDecider::new();
        let decision = decider.decision(vec![a.clone()], out.clone(), vec![]);
        assert!(decision.build_needed(false));

        std::fs::write(&out, "y").unwrap();
        // still cached from before the output existed
        assert!(decision.build_needed(false));
        // reset forces recomputation against current disk state
        assert!(!decision.build_needed(true));
    }

    #[test]
    fn fresh_decision_recomputes() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let out = dir.path().join("out.txt");
        std::fs::write(&a, "x").unwrap();
        std::fs::write(&out, "y").unwrap();

        let decider = ExistenceDecider::new();
        let decision = decider.decision(vec![a.clone()], out.clone(), vec![]);
        assert!(!decision.build_needed(false));
    }
}
