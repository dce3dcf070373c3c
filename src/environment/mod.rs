//! Environment (C9): per-project lifecycle binding the path model,
//! decider store, builder registry, and document tree together.
//!
//! Grounded on spec.md §4.9 and, for the worker pool, on
//! `environment::scheduler` (itself grounded on the teacher's
//! `compiler::scheduler::CompileScheduler`). Cancellation follows the
//! teacher's `core::state` pattern: a process-wide `AtomicBool` set by
//! a `ctrlc` handler, polled between builder steps.

pub mod scheduler;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use crate::builder::{BuilderId, Status, TargetBuilder};
use crate::decider::{ContentHashDecider, Decider, DecisionStore};

use scheduler::{Runnable, Scheduler};

fn shutdown_flag() -> &'static Arc<AtomicBool> {
    static FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();
    FLAG.get_or_init(|| Arc::new(AtomicBool::new(false)))
}

/// Install a `ctrlc` handler that flips the process-wide shutdown
/// flag. Safe to call more than once; only the first call installs
/// the handler.
pub fn setup_shutdown_handler() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let flag = shutdown_flag().clone();
        let _ = ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        });
    });
}

pub fn is_shutdown() -> bool {
    shutdown_flag().load(Ordering::SeqCst)
}

/// Derive a deterministic cache root for a project: a dotted
/// directory inside the project root, kept out of the way of the
/// source tree proper. Mirrors the teacher's `.tola/cache` convention,
/// renamed to this crate's own cache directory name.
pub fn derive_cache_root(project_root: &Path) -> PathBuf {
    project_root.join(".disseminate").join("cache")
}

/// One project's lifecycle: caches, target roots, and (via
/// `builders`) the live tree of per-target root builders for the
/// currently loaded document.
pub struct Environment {
    project_root: PathBuf,
    target_root: PathBuf,
    cache_root: PathBuf,
    root_document: Option<PathBuf>,
    decider: Arc<dyn Decider>,
    builders: Vec<Arc<StdMutex<TargetBuilder>>>,
    cancel: Arc<AtomicBool>,
}

impl Environment {
    pub fn new(project_root: impl Into<PathBuf>, target_root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let project_root = project_root.into();
        let target_root = target_root.into();
        let cache_root = derive_cache_root(&project_root);
        std::fs::create_dir_all(&cache_root)?;
        let decider: Arc<dyn Decider> = Arc::new(ContentHashDecider::new(DecisionStore::open(&cache_root)?));
        Ok(Self {
            project_root,
            target_root,
            cache_root,
            root_document: None,
            decider,
            builders: Vec::new(),
            cancel: shutdown_flag().clone(),
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn decider(&self) -> Arc<dyn Decider> {
        self.decider.clone()
    }

    pub fn set_root_document(&mut self, path: PathBuf) {
        self.root_document = Some(path);
    }

    pub fn root_document(&self) -> Option<&Path> {
        self.root_document.as_deref()
    }

    pub fn register_target(&mut self, builder: TargetBuilder) -> BuilderId {
        let id = BuilderId(self.builders.len());
        self.builders.push(Arc::new(StdMutex::new(builder)));
        id
    }

    /// Drive every registered target builder to completion (or one
    /// step each, if `complete` is false), via the worker pool.
    pub fn build(&self, complete: bool) -> Status {
        if !complete {
            let mut worst = Status::Done;
            for b in &self.builders {
                let s = b.lock().expect("target builder mutex poisoned").build(false);
                worst = Status::aggregate([worst, s].iter());
            }
            return worst;
        }

        let jobs: Vec<_> = self
            .builders
            .iter()
            .enumerate()
            .map(|(i, b)| (BuilderId(i), 0i32, target_as_buildnode(b.clone())))
            .collect();
        let scheduler = Scheduler::new(num_workers(), self.cancel.clone());
        scheduler.run_to_completion(jobs);

        let statuses: Vec<_> = self
            .builders
            .iter()
            .map(|b| b.lock().expect("target builder mutex poisoned").status())
            .collect();
        Status::aggregate(statuses.iter())
    }

    pub fn build_needed(&self) -> bool {
        self.builders
            .iter()
            .any(|b| !matches!(b.lock().expect("target builder mutex poisoned").status(), Status::Done))
    }
}

fn num_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).min(8)
}

/// Adapt a `TargetBuilder` behind a shared mutex into the scheduler's
/// `Runnable` job type. `TargetBuilder` has no single outfilepath of
/// its own (it fans out over several sub-builders), which is exactly
/// why the scheduler's job trait doesn't ask for one.
fn target_as_buildnode(target: Arc<StdMutex<TargetBuilder>>) -> Arc<StdMutex<Box<dyn Runnable>>> {
    Arc::new(StdMutex::new(Box::new(TargetBuilderAdapter(target)) as Box<dyn Runnable>))
}

struct TargetBuilderAdapter(Arc<StdMutex<TargetBuilder>>);

impl Runnable for TargetBuilderAdapter {
    fn status(&self) -> Status {
        self.0.lock().expect("target builder mutex poisoned").status()
    }

    fn build(&mut self, complete: bool) -> Status {
        self.0.lock().expect("target builder mutex poisoned").build(complete)
    }

    fn cancel(&mut self) {
        // Cancellation is driven by the scheduler's shared flag, which
        // `build()` already checks; per-target explicit cancel isn't
        // separately exposed.
    }
}

/// Walk `root_path` for document files (by extension) that declare no
/// `include`-parent, and return one [`Environment`] per root found.
///
/// Since parsing the markup header is the only document-tree insight
/// available to the core (the AST itself is out of scope), discovery
/// here is purely: does this file's extension match `doc_extensions`,
/// and does some other document's header list it under `include`?
/// Anything not listed as an include target is a root.
pub fn create_environments(
    root_path: &Path,
    target_root: &Path,
    doc_extensions: &[&str],
) -> std::io::Result<Vec<Environment>> {
    use crate::render::parse_header;

    let mut candidates = Vec::new();
    collect_documents(root_path, doc_extensions, &mut candidates)?;

    let mut included = std::collections::HashSet::new();
    let mut headers = Vec::new();
    for path in &candidates {
        let text = std::fs::read_to_string(path).unwrap_or_default();
        let header = parse_header(&text);
        for inc in &header.include {
            included.insert(root_path.join(inc));
        }
        headers.push((path.clone(), header));
    }

    let mut envs = Vec::new();
    for (path, _header) in headers {
        if included.contains(&path) {
            continue;
        }
        let mut env = Environment::new(root_path, target_root)?;
        env.set_root_document(path);
        envs.push(env);
    }
    Ok(envs)
}

fn collect_documents(dir: &Path, doc_extensions: &[&str], out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().and_then(|n| n.to_str()).map(|n| n.starts_with('.')) == Some(true) {
                continue;
            }
            collect_documents(&path, doc_extensions, out)?;
        } else if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if doc_extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                out.push(path);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn new_environment_provisions_cache_root() {
        let dir = TempDir::new().unwrap();
        let env = Environment::new(dir.path(), dir.path().join("target")).unwrap();
        assert!(env.cache_root().exists());
    }

    #[test]
    fn empty_environment_build_needed_is_false() {
        let dir = TempDir::new().unwrap();
        let env = Environment::new(dir.path(), dir.path().join("target")).unwrap();
        assert!(!env.build_needed());
    }

    #[test]
    fn create_environments_finds_one_root_per_undeclared_include() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.dis"), "---\ntargets: html\n---\nbody").unwrap();
        let envs = create_environments(dir.path(), &dir.path().join("target"), &["dis"]).unwrap();
        assert_eq!(envs.len(), 1);
    }

    #[test]
    fn create_environments_excludes_included_documents() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("index.dis"),
            "---\ntargets: html\ninclude:\n  chapter.dis\n---\nbody",
        )
        .unwrap();
        std::fs::write(dir.path().join("chapter.dis"), "chapter text").unwrap();

        let envs = create_environments(dir.path(), &dir.path().join("target"), &["dis"]).unwrap();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].root_document(), Some(dir.path().join("index.dis")).as_deref());
    }
}
