//! Path model (C1): structured source/target paths.
//!
//! Grounded on `examples/original_source/src/disseminate/utils/paths.py`
//! (`SourcePath`/`TargetPath`, the `get_url` double-slash collapse) and
//! the teacher's own source/URL pairing in `address/space.rs`. Unlike
//! the Python original (which subclasses `pathlib.Path` via a mixin),
//! this crate models each as a plain value struct wrapping `PathBuf` —
//! idiomatic Rust has no equivalent to subclassing a stdlib path type,
//! and the spec only requires the operations below, not `Path` itself.

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use std::sync::OnceLock;

fn dbl_slash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Match '//' but not preceded by ':' (so a URL scheme like `https://`
    // is left alone). Mirrors the original's `re_dbl_slash`.
    RE.get_or_init(|| Regex::new(r"(?:[^:])//").unwrap())
}

fn collapse_dbl_slash(s: &str) -> String {
    // regex above consumes the character before `//` to implement the
    // negative lookbehind (Rust's `regex` crate has no lookbehind), so
    // replace iteratively until no match remains.
    let mut s = s.to_string();
    loop {
        let re = dbl_slash_re();
        let Some(m) = re.find(&s) else { break };
        let replaced = format!("{}/", &m.as_str()[..1]);
        s.replace_range(m.range(), &replaced);
    }
    s
}

/// A path for a file in the source directory, carrying the project
/// root it's relative to.
///
/// Invariant: `project_root` is absolute, `sub_path` is relative, and
/// `project_root.join(sub_path)` is the real filesystem location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourcePath {
    project_root: PathBuf,
    sub_path: PathBuf,
}

impl SourcePath {
    /// Construct a new `SourcePath`. `sub_path`'s `..` components are
    /// normalized away (lexically) so the invariant in §4.1 holds.
    pub fn new(project_root: impl Into<PathBuf>, sub_path: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            sub_path: normalize_relative(&sub_path.into()),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn sub_path(&self) -> &Path {
        &self.sub_path
    }

    /// The real filesystem location: `project_root / sub_path`.
    pub fn full_path(&self) -> PathBuf {
        self.project_root.join(&self.sub_path)
    }

    /// `join(extra)` preserves the project root and extends `sub_path`.
    pub fn join(&self, extra: impl AsRef<Path>) -> Self {
        Self::new(self.project_root.clone(), self.sub_path.join(extra))
    }

    /// Same project root, replaced extension.
    pub fn with_suffix(&self, ext: &str) -> Self {
        Self::new(self.project_root.clone(), replace_extension(&self.sub_path, ext))
    }

    pub fn extension(&self) -> Option<&str> {
        self.sub_path.extension().and_then(|e| e.to_str())
    }

    pub fn exists(&self) -> bool {
        self.full_path().exists()
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_path().display())
    }
}

impl AsRef<Path> for SourcePath {
    fn as_ref(&self) -> &Path {
        // Callers that need the real filesystem path should prefer
        // `full_path()`; `AsRef<Path>` exposes `sub_path` for APIs that
        // only care about relative identity (e.g. hashing inputs by
        // parameter list membership already uses `full_path` directly).
        &self.sub_path
    }
}

/// A path for a file in a target directory, carrying the target root,
/// target kind, and sub-path.
///
/// `target_kind` is `html`, `tex`, `pdf`, `xhtml`, `epub`, or empty for
/// cache-only outputs. Rendered location: `target_root/target_kind/sub_path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetPath {
    target_root: PathBuf,
    target_kind: String,
    sub_path: PathBuf,
}

impl TargetPath {
    pub fn new(
        target_root: impl Into<PathBuf>,
        target_kind: impl Into<String>,
        sub_path: impl Into<PathBuf>,
    ) -> Self {
        let kind = target_kind.into();
        let kind = kind.trim_start_matches('.').to_string();
        Self {
            target_root: target_root.into(),
            target_kind: kind,
            sub_path: normalize_relative(&sub_path.into()),
        }
    }

    /// Construct a cache-only target path (empty target kind).
    pub fn cache(target_root: impl Into<PathBuf>, sub_path: impl Into<PathBuf>) -> Self {
        Self::new(target_root, "", sub_path)
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    pub fn target_kind(&self) -> &str {
        &self.target_kind
    }

    pub fn sub_path(&self) -> &Path {
        &self.sub_path
    }

    /// Rendered filesystem location: `target_root / target_kind / sub_path`.
    pub fn full_path(&self) -> PathBuf {
        if self.target_kind.is_empty() {
            self.target_root.join(&self.sub_path)
        } else {
            self.target_root.join(&self.target_kind).join(&self.sub_path)
        }
    }

    pub fn join(&self, extra: impl AsRef<Path>) -> Self {
        Self::new(
            self.target_root.clone(),
            self.target_kind.clone(),
            self.sub_path.join(extra),
        )
    }

    pub fn with_suffix(&self, ext: &str) -> Self {
        Self::new(
            self.target_root.clone(),
            self.target_kind.clone(),
            replace_extension(&self.sub_path, ext),
        )
    }

    pub fn extension(&self) -> Option<&str> {
        self.sub_path.extension().and_then(|e| e.to_str())
    }

    pub fn exists(&self) -> bool {
        self.full_path().exists()
    }

    /// Web URL projection: `/{target_kind}/{sub_path}`, double slashes
    /// collapsed except right after a URL scheme.
    pub fn url(&self, base: &str) -> String {
        let sub = self.sub_path.to_string_lossy().replace('\\', "/");
        let raw = if self.target_kind.is_empty() {
            format!("{base}/{sub}")
        } else {
            format!("{base}/{}/{sub}", self.target_kind)
        };
        let collapsed = collapse_dbl_slash(&raw);
        collapsed.trim_end_matches('/').to_string()
    }
}

impl fmt::Display for TargetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_path().display())
    }
}

/// Lexically remove `..`/`.` components and any leading root, so a
/// `SourcePath`/`TargetPath` sub-path can never escape its root.
fn normalize_relative(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in p.components() {
        use std::path::Component;
        match comp {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}

fn replace_extension(p: &Path, ext: &str) -> PathBuf {
    let mut out = p.to_path_buf();
    out.set_extension(ext.trim_start_matches('.'));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_path_full_path() {
        let p = SourcePath::new("/project", "sub/file.txt");
        assert_eq!(p.full_path(), PathBuf::from("/project/sub/file.txt"));
    }

    #[test]
    fn source_path_normalizes_dotdot() {
        let p = SourcePath::new("/project", "sub/../../escape.txt");
        // the `..` components are resolved lexically and can't escape
        // past the root of the relative path itself
        assert_eq!(p.sub_path(), Path::new("escape.txt"));
    }

    #[test]
    fn source_path_join_preserves_root() {
        let p = SourcePath::new("/project", "dir");
        let joined = p.join("file.txt");
        assert_eq!(joined.project_root(), Path::new("/project"));
        assert_eq!(joined.full_path(), PathBuf::from("/project/dir/file.txt"));
    }

    #[test]
    fn source_path_with_suffix() {
        let p = SourcePath::new("/project", "a/b.tex");
        assert_eq!(p.with_suffix("pdf").sub_path(), Path::new("a/b.pdf"));
    }

    #[test]
    fn target_path_full_path_with_kind() {
        let p = TargetPath::new("/out", "html", "posts/a.html");
        assert_eq!(p.full_path(), PathBuf::from("/out/html/posts/a.html"));
    }

    #[test]
    fn target_path_cache_has_no_kind_segment() {
        let p = TargetPath::cache("/cache", "abc123.svg");
        assert_eq!(p.full_path(), PathBuf::from("/cache/abc123.svg"));
        assert_eq!(p.target_kind(), "");
    }

    #[test]
    fn target_path_url_default_pattern() {
        let p = TargetPath::new("/out", "html", "media/css/default.css");
        assert_eq!(p.url(""), "/html/media/css/default.css");
    }

    #[test]
    fn target_path_url_collapses_double_slash() {
        let p = TargetPath::new("/out", "html", "/media/img.png");
        assert_eq!(p.url(""), "/html/media/img.png");
    }

    #[test]
    fn target_path_url_preserves_scheme_slashes() {
        let p = TargetPath::new("/out", "html", "page");
        assert_eq!(p.url("https://example.com"), "https://example.com/html/page");
    }

    #[test]
    fn target_kind_strips_leading_dot() {
        let p = TargetPath::new("/out", ".html", "a");
        assert_eq!(p.target_kind(), "html");
    }
}
