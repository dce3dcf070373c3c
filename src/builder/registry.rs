//! Builder registry (C7): `(in_ext, out_ext, document_target?)` ->
//! ordered candidate builder classes, with availability gating.
//!
//! Grounded on `examples/original_source/tests/builders/
//! test_builder_find_builder_cls.py` (exact resolution precedence and
//! the Latexmk -> Pdflatex fallback) and the teacher's process-wide
//! `which`-backed availability cache pattern.

use std::sync::OnceLock;

use dashmap::DashMap;

use crate::config::ToolPaths;
use crate::error::BuildError;

use super::Kind;

/// One resolvable candidate: a builder class name, its external tool
/// (if any), and the extensions it bridges.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub class_name: &'static str,
    pub in_ext: &'static str,
    pub out_ext: &'static str,
    pub tool: Option<&'static str>,
}

fn rules() -> &'static [Candidate] {
    static RULES: OnceLock<Vec<Candidate>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            Candidate { class_name: "Latexmk", in_ext: "tex", out_ext: "pdf", tool: Some("latexmk") },
            Candidate { class_name: "Pdflatex", in_ext: "tex", out_ext: "pdf", tool: Some("pdflatex") },
            Candidate { class_name: "Pdf2Svg", in_ext: "pdf", out_ext: "svg", tool: Some("pdf2svg") },
            Candidate { class_name: "Pdfcrop", in_ext: "pdf", out_ext: "pdf", tool: Some("pdfcrop") },
            Candidate { class_name: "ScaleSvg", in_ext: "svg", out_ext: "svg", tool: Some("rsvg-convert") },
            Candidate { class_name: "Tif2Png", in_ext: "tif", out_ext: "png", tool: Some("convert") },
            Candidate { class_name: "Tif2Png", in_ext: "tiff", out_ext: "png", tool: Some("convert") },
            Candidate { class_name: "Asy2Pdf", in_ext: "asy", out_ext: "pdf", tool: Some("asy") },
            Candidate { class_name: "Asy2Svg", in_ext: "asy", out_ext: "svg", tool: Some("asy") },
            Candidate { class_name: "Copy", in_ext: "*", out_ext: "*", tool: None },
        ]
    })
}

/// Process-wide availability cache, keyed by external tool name, so
/// repeated resolutions don't repeatedly shell out to `which`.
pub(crate) fn availability_cache() -> &'static DashMap<String, bool> {
    static CACHE: OnceLock<DashMap<String, bool>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

pub struct BuilderRegistry;

impl BuilderRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Whether `tool` is on `PATH`, cached process-wide.
    pub fn tool_available(tool: &str) -> bool {
        if let Some(hit) = availability_cache().get(tool) {
            return *hit;
        }
        let available = which::which(tool).is_ok();
        availability_cache().insert(tool.to_string(), available);
        available
    }

    /// Clear the cached availability verdicts. Exposed for tests that
    /// simulate a tool becoming (un)available, per spec §4.7's
    /// "clear-on-demand hook".
    pub fn clear_availability_cache() {
        availability_cache().clear();
    }

    /// Resolve `(in_ext, out_ext)` to the first available candidate,
    /// in declared preference order. `out_ext = "*"` matches any rule
    /// whose `in_ext` matches, ignoring `out_ext`. `tools` resolves a
    /// candidate's canonical tool name to a project's configured
    /// override before checking `PATH` availability.
    pub fn find(&self, in_ext: &str, out_ext: &str, tools: &ToolPaths) -> Result<Candidate, BuildError> {
        let in_ext = in_ext.trim_start_matches('.');
        let out_ext = out_ext.trim_start_matches('.');

        let exact: Vec<&Candidate> = rules()
            .iter()
            .filter(|c| ext_matches(c.in_ext, in_ext) && ext_matches(c.out_ext, out_ext))
            .collect();
        let candidates = if !exact.is_empty() {
            exact
        } else {
            rules().iter().filter(|c| c.in_ext == "*" && c.out_ext == "*").collect()
        };

        for c in &candidates {
            if c.tool.map(|t| Self::tool_available(tools.resolve(t))).unwrap_or(true) {
                return Ok((*c).clone());
            }
        }
        Err(BuildError::NoBuilder(format!("{in_ext} -> {out_ext}")))
    }

    /// Resolve a candidate for a document target rather than an
    /// explicit output extension (spec §4.7 point 2): used when the
    /// caller knows what kind of document it's producing but not the
    /// literal output extension (e.g. an `.html` target consuming a
    /// `.pdf` figure needs it converted to `.svg`, not copied).
    pub fn find_for_target(&self, in_ext: &str, target: &str, tools: &ToolPaths) -> Result<Candidate, BuildError> {
        let out_ext = match target.trim_start_matches('.') {
            "html" | "xhtml" | "epub" => "svg",
            "tex" | "pdf" => "pdf",
            _ => "*",
        };
        self.find(in_ext, out_ext, tools)
    }

    pub fn kind_for(class_name: &str) -> Option<Kind> {
        match class_name {
            "Copy" => Some(Kind::Copy),
            "Pdf2Svg" => Some(Kind::Pdf2Svg),
            "Tif2Png" => Some(Kind::Tif2Png),
            "Asy2Pdf" => Some(Kind::Asy2Pdf),
            "Asy2Svg" => Some(Kind::Asy2Svg),
            "Latexmk" => Some(Kind::Latexmk),
            "Pdflatex" => Some(Kind::Pdflatex),
            // Pdfcrop/ScaleSvg carry parameters (margins/scale) that
            // the registry alone can't supply; callers construct
            // those `Kind`s directly once they know the arguments.
            _ => None,
        }
    }
}

impl Default for BuilderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn ext_matches(rule: &str, actual: &str) -> bool {
    rule == "*" || rule.eq_ignore_ascii_case(actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins_over_wildcard() {
        let reg = BuilderRegistry::new();
        let found = reg.find("pdf", "svg", &ToolPaths::default()).unwrap();
        assert_eq!(found.class_name, "Pdf2Svg");
    }

    #[test]
    fn unknown_pair_falls_back_to_copy() {
        let reg = BuilderRegistry::new();
        let found = reg.find("css", "css", &ToolPaths::default()).unwrap();
        assert_eq!(found.class_name, "Copy");
    }

    #[test]
    fn latexmk_preferred_over_pdflatex_when_both_available() {
        BuilderRegistry::clear_availability_cache();
        availability_cache().insert("latexmk".to_string(), true);
        availability_cache().insert("pdflatex".to_string(), true);
        let reg = BuilderRegistry::new();
        assert_eq!(reg.find("tex", "pdf", &ToolPaths::default()).unwrap().class_name, "Latexmk");
    }

    #[test]
    fn falls_back_to_pdflatex_when_latexmk_unavailable() {
        BuilderRegistry::clear_availability_cache();
        availability_cache().insert("latexmk".to_string(), false);
        availability_cache().insert("pdflatex".to_string(), true);
        let reg = BuilderRegistry::new();
        assert_eq!(reg.find("tex", "pdf", &ToolPaths::default()).unwrap().class_name, "Pdflatex");
    }

    #[test]
    fn restoring_availability_restores_original_choice() {
        BuilderRegistry::clear_availability_cache();
        availability_cache().insert("latexmk".to_string(), false);
        availability_cache().insert("pdflatex".to_string(), true);
        let reg = BuilderRegistry::new();
        assert_eq!(reg.find("tex", "pdf", &ToolPaths::default()).unwrap().class_name, "Pdflatex");

        availability_cache().insert("latexmk".to_string(), true);
        assert_eq!(reg.find("tex", "pdf", &ToolPaths::default()).unwrap().class_name, "Latexmk");
    }

    #[test]
    fn no_builder_when_nothing_available() {
        BuilderRegistry::clear_availability_cache();
        availability_cache().insert("pdf2svg".to_string(), false);
        let reg = BuilderRegistry::new();
        let err = reg.find("pdf", "svg", &ToolPaths::default()).unwrap_err();
        assert!(matches!(err, BuildError::NoBuilder(_)));
    }

    #[test]
    fn override_path_is_what_availability_is_checked_against() {
        BuilderRegistry::clear_availability_cache();
        availability_cache().insert("/opt/tex/latexmk".to_string(), true);
        let tools = ToolPaths { latexmk: Some("/opt/tex/latexmk".to_string()), ..ToolPaths::default() };
        let reg = BuilderRegistry::new();
        assert_eq!(reg.find("tex", "pdf", &tools).unwrap().class_name, "Latexmk");
    }
}
