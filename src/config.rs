//! Project configuration.
//!
//! Grounded on the teacher's `config/types/handle.rs` global-config
//! pattern, simplified to a plain loaded struct: this crate has no
//! watch-mode hot-reload to justify the teacher's `arc-swap`-backed
//! atomic config swap. Loading the `.toml` file itself reuses the
//! teacher's own `toml` dependency.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "disseminate.toml";

/// External tool overrides: lets a project point at a non-`PATH`
/// binary (or a rename) for any of the converter table's tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub pdfcrop: Option<String>,
    pub pdf2svg: Option<String>,
    pub rsvg_convert: Option<String>,
    pub latexmk: Option<String>,
    pub pdflatex: Option<String>,
    pub asy: Option<String>,
}

impl ToolPaths {
    /// Resolve a canonical tool name (as used by the builder registry
    /// and `Kind::tool_name`) to its configured override, or back to
    /// the canonical name itself when no override is set.
    pub fn resolve<'a>(&'a self, canonical: &'a str) -> &'a str {
        let configured = match canonical {
            "pdfcrop" => self.pdfcrop.as_deref(),
            "pdf2svg" => self.pdf2svg.as_deref(),
            "rsvg-convert" => self.rsvg_convert.as_deref(),
            "latexmk" => self.latexmk.as_deref(),
            "pdflatex" => self.pdflatex.as_deref(),
            "asy" => self.asy.as_deref(),
            _ => None,
        };
        configured.unwrap_or(canonical)
    }
}

/// A project's configuration: where its source, target, and cache
/// trees live, which targets it declares by default, and any tool
/// path overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub project_root: PathBuf,
    pub target_root: PathBuf,
    pub cache_root: Option<PathBuf>,
    pub default_targets: Vec<String>,
    pub tools: ToolPaths,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            target_root: PathBuf::from("public"),
            cache_root: None,
            default_targets: vec!["html".to_string()],
            tools: ToolPaths::default(),
        }
    }
}

impl ProjectConfig {
    /// Load `disseminate.toml` from `project_root` if present,
    /// falling back to defaults (with `project_root` filled in) when
    /// it's absent.
    pub fn load(project_root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let project_root = project_root.into();
        let config_path = project_root.join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            let text = std::fs::read_to_string(&config_path)?;
            toml::from_str(&text)?
        } else {
            Self::default()
        };
        config.project_root = project_root;
        Ok(config)
    }

    pub fn cache_root(&self) -> PathBuf {
        self.cache_root.clone().unwrap_or_else(|| crate::environment::derive_cache_root(&self.project_root))
    }

    pub fn config_path(&self) -> PathBuf {
        self.project_root.join(CONFIG_FILE)
    }
}

pub fn default_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.default_targets, vec!["html".to_string()]);
        assert_eq!(config.project_root, dir.path());
    }

    #[test]
    fn loads_overrides_from_toml() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("disseminate.toml"),
            "default_targets = [\"html\", \"pdf\"]\ntarget_root = \"out\"\n\n[tools]\nlatexmk = \"/usr/local/bin/latexmk\"\n",
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.default_targets, vec!["html".to_string(), "pdf".to_string()]);
        assert_eq!(config.target_root, PathBuf::from("out"));
        assert_eq!(config.tools.latexmk.as_deref(), Some("/usr/local/bin/latexmk"));
    }

    #[test]
    fn tool_paths_resolve_falls_back_to_canonical_name() {
        let tools = ToolPaths::default();
        assert_eq!(tools.resolve("pdfcrop"), "pdfcrop");
    }

    #[test]
    fn tool_paths_resolve_prefers_override() {
        let tools = ToolPaths { latexmk: Some("/opt/tex/latexmk".to_string()), ..ToolPaths::default() };
        assert_eq!(tools.resolve("latexmk"), "/opt/tex/latexmk");
        assert_eq!(tools.resolve("pdflatex"), "pdflatex");
    }
}
