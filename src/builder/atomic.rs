//! Atomic builders (C5): one transformation each, the concrete table
//! from spec.md §4.5.
//!
//! Grounded on `examples/original_source/tests/builders/test_copy.py`
//! for the exact status-string/timing contract, and on the Design
//! Notes' own instruction to replace the original's class-per-builder
//! dispatch with "a tagged variant of builder kinds plus a capability
//! interface" — `Kind` is that tagged variant; `AtomicBuilder` is the
//! shared capability implementation all kinds share.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::decider::{Arg, Decider};
use crate::error::BuildError;
use crate::exec::Cmd;
use crate::hash::{hash_items, HashItem};
use crate::path::TargetPath;

use super::{BuildNode, Parameter, Status};

/// The tool-specific behavior of one concrete atomic builder. Each
/// variant corresponds to a row of spec.md's builder table.
pub enum Kind {
    /// `* -> *`, no external tool. Same-file is a no-op.
    Copy,
    /// `.pdf -> .pdf` via `pdfcrop`. Margins as 1 or 4 percentages.
    Pdfcrop { margins: Vec<f64> },
    /// `.pdf -> .svg` via `pdf2svg`.
    Pdf2Svg,
    /// `.svg -> .svg` via `rsvg-convert`.
    ScaleSvg { scale: f64 },
    /// `.tif/.tiff -> .png` via ImageMagick's `convert`. Degrades to
    /// `Copy` when in-ext already equals out-ext.
    Tif2Png,
    /// `.asy -> .pdf` via `asy`.
    Asy2Pdf,
    /// `.asy -> .svg` via `asy`.
    Asy2Svg,
    /// `.tex -> .pdf` via `latexmk`.
    Latexmk,
    /// `.tex -> .pdf` via `pdflatex`, the fallback when `latexmk` is
    /// unavailable.
    Pdflatex,
    /// Writes in-memory content to a deterministically named cache
    /// file (named from the content hash plus extension).
    SaveTempFile { content: Vec<u8> },
    /// In-process template render. `render` is injected by the
    /// caller (the markup/template layer is an external collaborator,
    /// spec §1); this builder never implements a template language.
    JinjaRender { render: Arc<dyn Fn(&str, &str) -> String + Send + Sync> },
}

impl Kind {
    /// The external tool this kind shells out to, if any. Used by the
    /// registry for availability gating (C7).
    pub fn tool_name(&self) -> Option<&'static str> {
        match self {
            Kind::Copy | Kind::SaveTempFile { .. } | Kind::JinjaRender { .. } => None,
            Kind::Pdfcrop { .. } => Some("pdfcrop"),
            Kind::Pdf2Svg => Some("pdf2svg"),
            Kind::ScaleSvg { .. } => Some("rsvg-convert"),
            Kind::Tif2Png => Some("convert"),
            Kind::Asy2Pdf | Kind::Asy2Svg => Some("asy"),
            Kind::Latexmk => Some("latexmk"),
            Kind::Pdflatex => Some("pdflatex"),
        }
    }

    fn execute(&self, input: Option<&Path>, output: &Path, tool_override: Option<&str>) -> Result<(), BuildError> {
        let program = |canonical: &'static str| tool_override.unwrap_or(canonical);
        if let Some(tool) = self.tool_name() {
            let resolved = program(tool);
            let from = input.map(|p| p.display().to_string()).unwrap_or_default();
            crate::log!(resolved; "{from} -> {}", output.display());
        }
        match self {
            Kind::Copy => {
                let input = input.ok_or_else(|| BuildError::MissingInput(output.to_path_buf()))?;
                if same_file(input, output) {
                    return Ok(());
                }
                std::fs::copy(input, output).map_err(|e| BuildError::BuildFailure {
                    tool: "copy".to_string(),
                    status: "io error".to_string(),
                    stderr: e.to_string(),
                })?;
                Ok(())
            }
            Kind::Pdfcrop { margins } => {
                let input = input.ok_or_else(|| BuildError::MissingInput(output.to_path_buf()))?;
                let margin_arg = margins.iter().map(|m| format!("{m}")).collect::<Vec<_>>().join(" ");
                Cmd::new(program("pdfcrop"))
                    .args(["--margins", &margin_arg])
                    .arg(input)
                    .arg(output)
                    .run()?;
                Ok(())
            }
            Kind::Pdf2Svg => {
                let input = input.ok_or_else(|| BuildError::MissingInput(output.to_path_buf()))?;
                Cmd::new(program("pdf2svg")).arg(input).arg(output).run()?;
                Ok(())
            }
            Kind::ScaleSvg { scale } => {
                let input = input.ok_or_else(|| BuildError::MissingInput(output.to_path_buf()))?;
                Cmd::new(program("rsvg-convert"))
                    .args(["-z", &scale.to_string()])
                    .arg("-o")
                    .arg(output)
                    .arg(input)
                    .run()?;
                Ok(())
            }
            Kind::Tif2Png => {
                let input = input.ok_or_else(|| BuildError::MissingInput(output.to_path_buf()))?;
                Cmd::new(program("convert")).arg(input).arg(output).run()?;
                Ok(())
            }
            Kind::Asy2Pdf => {
                let input = input.ok_or_else(|| BuildError::MissingInput(output.to_path_buf()))?;
                Cmd::new(program("asy")).args(["-f", "pdf", "-o"]).arg(output).arg(input).run()?;
                Ok(())
            }
            Kind::Asy2Svg => {
                let input = input.ok_or_else(|| BuildError::MissingInput(output.to_path_buf()))?;
                Cmd::new(program("asy")).args(["-f", "svg", "-o"]).arg(output).arg(input).run()?;
                Ok(())
            }
            Kind::Latexmk => {
                let input = input.ok_or_else(|| BuildError::MissingInput(output.to_path_buf()))?;
                let dir = output.parent().unwrap_or_else(|| Path::new("."));
                Cmd::new(program("latexmk")).args(["-pdf", "-interaction=nonstopmode"]).arg(input).cwd(dir).run()?;
                Ok(())
            }
            Kind::Pdflatex => {
                let input = input.ok_or_else(|| BuildError::MissingInput(output.to_path_buf()))?;
                let dir = output.parent().unwrap_or_else(|| Path::new("."));
                Cmd::new(program("pdflatex")).args(["-interaction=nonstopmode"]).arg(input).cwd(dir).run()?;
                Ok(())
            }
            Kind::SaveTempFile { content } => {
                if let Ok(existing) = std::fs::read(output) {
                    if existing != *content {
                        return Err(BuildError::DuplicateOutput(output.to_path_buf()));
                    }
                    return Ok(());
                }
                std::fs::write(output, content).map_err(|e| BuildError::BuildFailure {
                    tool: "save-temp-file".to_string(),
                    status: "io error".to_string(),
                    stderr: e.to_string(),
                })?;
                Ok(())
            }
            Kind::JinjaRender { render } => {
                let input = input.ok_or_else(|| BuildError::MissingInput(output.to_path_buf()))?;
                let template = std::fs::read_to_string(input).map_err(|_| BuildError::MissingInput(input.to_path_buf()))?;
                let rendered = render(&template, &output.to_string_lossy());
                std::fs::write(output, rendered).map_err(|e| BuildError::BuildFailure {
                    tool: "jinja-render".to_string(),
                    status: "io error".to_string(),
                    stderr: e.to_string(),
                })?;
                Ok(())
            }
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// The shared state/behavior every concrete atomic builder reduces
/// to: parameters, a derived or supplied output path, a decider, and
/// a tool-specific [`Kind`].
pub struct AtomicBuilder {
    kind: Kind,
    parameters: Vec<Parameter>,
    outfilepath: TargetPath,
    decider: Arc<dyn Decider>,
    result: Option<Status>,
    tool_override: Option<String>,
}

impl AtomicBuilder {
    pub fn new(
        kind: Kind,
        parameters: Vec<Parameter>,
        outfilepath: TargetPath,
        decider: Arc<dyn Decider>,
    ) -> Self {
        Self { kind, parameters, outfilepath, decider, result: None, tool_override: None }
    }

    /// Override the external tool this builder shells out to (a
    /// project's `[tools]` config entry), replacing `Kind::tool_name`'s
    /// canonical binary name. No effect on kinds with no external tool.
    pub fn with_tool_override(mut self, path: impl Into<String>) -> Self {
        self.tool_override = Some(path.into());
        self
    }

    /// Derive a cache-root output path from the content hash of
    /// `parameters`, per spec §4.5: "derive it by `cache_root /
    /// <hash(parameters)> . <out_ext>`".
    pub fn derive_outfilepath(cache_root: &Path, parameters: &[Parameter], out_ext: &str) -> TargetPath {
        let mut items: Vec<HashItem<'_>> = Vec::new();
        let text_params: Vec<String> = parameters
            .iter()
            .map(|p| match p {
                Parameter::Input(path) => path.to_string_lossy().into_owned(),
                Parameter::Arg(a) => format!("{}={}", a.name, a.value),
            })
            .collect();
        for t in &text_params {
            items.push(HashItem::Text(t));
        }
        let digest = hash_items(&items).expect("hashing text-only items cannot fail");
        TargetPath::cache(cache_root, format!("{}.{}", digest.to_hex(), out_ext.trim_start_matches('.')))
    }

    fn input_paths(&self) -> Vec<PathBuf> {
        self.parameters.iter().filter_map(Parameter::as_input).cloned().collect()
    }

    fn single_input(&self) -> Option<PathBuf> {
        self.input_paths().into_iter().next()
    }

    fn args(&self) -> Vec<Arg> {
        self.parameters.iter().filter_map(Parameter::as_arg).cloned().collect()
    }

    fn inputs_exist(&self) -> bool {
        self.input_paths().iter().all(|p| p.exists())
    }

    fn is_copy_noop(&self) -> bool {
        matches!(self.kind, Kind::Copy)
            && self.single_input().as_deref() == Some(self.outfilepath.full_path().as_path())
    }
}

impl BuildNode for AtomicBuilder {
    fn status(&self) -> Status {
        if let Some(terminal) = &self.result {
            return terminal.clone();
        }
        if self.is_copy_noop() {
            return Status::Done;
        }
        if !self.inputs_exist() {
            return Status::MissingParameters;
        }
        let inputs = self.input_paths();
        let output = self.outfilepath.full_path();
        let args = self.args();
        let decision = self.decider.decision(inputs, output, args);
        if decision.build_needed(false) {
            Status::Ready
        } else {
            Status::Done
        }
    }

    fn build(&mut self, complete: bool) -> Status {
        let current = self.status();
        if current.is_terminal() {
            return current;
        }
        // current == Ready here: inputs exist and a build is needed
        if !complete {
            return Status::Building;
        }

        if let Some(output_parent) = self.outfilepath.full_path().parent() {
            if let Err(e) = std::fs::create_dir_all(output_parent) {
                self.result = Some(Status::Failed(e.to_string()));
                return self.result.clone().unwrap();
            }
        }

        let input = self.single_input();
        let output = self.outfilepath.full_path();
        match self.kind.execute(input.as_deref(), &output, self.tool_override.as_deref()) {
            Ok(()) => {
                let inputs = self.input_paths();
                let args = self.args();
                let decision = self.decider.decision(inputs, output, args);
                decision.build_needed(true); // force one last recompute
                decision.commit();
                self.result = Some(Status::Done);
            }
            Err(e) => {
                self.result = Some(Status::Failed(e.full_message()));
            }
        }
        self.result.clone().unwrap()
    }

    fn outfilepath(&self) -> &TargetPath {
        &self.outfilepath
    }

    fn cancel(&mut self) {
        if !self.status().is_terminal() {
            self.result = Some(Status::Cancelled);
        }
    }
}
