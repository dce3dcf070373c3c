//! The simplest decider: fresh only if every input and the output
//! exist on disk. No content comparison at all.
//!
//! Grounded on `test_decider.py`'s docstring: "the base decider only
//! checks that files exist." No persisted state is needed since
//! existence is read directly off the filesystem each time.

use std::path::{Path, PathBuf};

use super::{Arg, Decider};

#[derive(Debug, Default)]
pub struct ExistenceDecider;

impl ExistenceDecider {
    pub fn new() -> Self {
        Self
    }
}

impl Decider for ExistenceDecider {
    fn is_fresh(&self, inputs: &[PathBuf], output: &Path, _args: &[Arg]) -> bool {
        output.exists() && inputs.iter().all(|p| p.exists())
    }

    fn commit(&self, _inputs: &[PathBuf], _output: &Path, _args: &[Arg]) {
        // nothing to persist: freshness is always read live from disk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fresh_only_when_all_paths_exist() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        let decider = ExistenceDecider::new();

        assert!(!decider.is_fresh(&[input.clone()], &output, &[]));

        std::fs::write(&input, "x").unwrap();
        std::fs::write(&output, "y").unwrap();
        assert!(decider.is_fresh(&[input.clone()], &output, &[]));

        std::fs::remove_file(&input).unwrap();
        assert!(!decider.is_fresh(&[input], &output, &[]));
    }
}
