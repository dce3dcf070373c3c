//! Scanners (C4): discover a file's dependencies by scanning its
//! content for references and resolving each one against the
//! filesystem.
//!
//! Grounded on `examples/original_source/src/disseminate/dependencies.py`
//! (`Dependencies.add_html`, the `_re_link`/`_re_attrs` regexes and the
//! directory walk-up lookup loop) and its test,
//! `examples/original_source/tests/builders/scanners/test_html_scanner.py`.

mod generic;
mod html;
mod latex;

pub use generic::GenericScanner;
pub use html::HtmlScanner;
pub use latex::LatexScanner;

use std::path::{Path, PathBuf};

use crate::error::BuildError;

/// A scanner finds the set of files a source file references, in the
/// order they appear in the content.
pub trait Scanner {
    /// Extract the raw reference strings from `content` (e.g. an
    /// `href` value, a `\includegraphics` argument), in document order.
    fn references(&self, content: &str) -> Vec<String>;

    /// Scan `content` (the file at `from_dir`'s sibling) and resolve
    /// each reference to an absolute path, walking up from `from_dir`
    /// toward `project_root`. Returns `MissingDependency` for the
    /// first reference that can't be resolved anywhere in that walk.
    fn scan(
        &self,
        content: &str,
        from_dir: &Path,
        project_root: &Path,
    ) -> Result<Vec<PathBuf>, BuildError> {
        let mut found = Vec::new();
        for reference in self.references(content) {
            found.push(resolve(&reference, from_dir, project_root)?);
        }
        Ok(found)
    }
}

/// Walk up from `from_dir` toward (and including) `project_root`,
/// looking for `reference` (with any leading `/` stripped) at each
/// level. The first hit wins; `from_dir` itself is tried first.
fn resolve(reference: &str, from_dir: &Path, project_root: &Path) -> Result<PathBuf, BuildError> {
    let cleaned = reference.trim_start_matches('/');
    let mut search_dir = from_dir.to_path_buf();

    loop {
        let candidate = search_dir.join(cleaned);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if search_dir == project_root || search_dir.parent().is_none() {
            break;
        }
        match search_dir.parent() {
            Some(parent) => search_dir = parent.to_path_buf(),
            None => break,
        }
        // don't walk past the project root
        if !search_dir.starts_with(project_root) {
            break;
        }
    }

    Err(BuildError::MissingDependency(reference.to_string(), from_dir.to_path_buf()))
}
