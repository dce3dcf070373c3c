//! Target builder (C8): the per-document-target root builder.
//!
//! Grounded on spec.md §4.8 and, structurally, on the teacher's
//! `compiler::scheduler` notion of a target's parallel media fan-out
//! feeding a sequential compiled-target tail. Composes: a parallel
//! media-copy sub-builder, a `JinjaRender` sub-builder, and — for
//! compiled targets — a sequential pipeline turning the rendered
//! artifact into its final form.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ToolPaths;
use crate::decider::{Arg, Decider};
use crate::error::BuildError;
use crate::path::TargetPath;

use super::registry::BuilderRegistry;
use super::{AtomicBuilder, BuildNode, Kind, Parameter, ParallelBuilder, SequentialBuilder, Status};

/// `true` for targets whose rendered artifact needs a further
/// compilation step (tex -> pdf); `false` for targets that are
/// published as-is once rendered (html, xhtml).
fn is_compiled_target(target: &str) -> bool {
    matches!(target, "pdf" | "epub")
}

pub struct TargetBuilder {
    target: String,
    target_root: PathBuf,
    cache_root: PathBuf,
    media: ParallelBuilder,
    render: Box<dyn BuildNode + Send>,
    compile: Option<SequentialBuilder>,
    decider: Arc<dyn Decider>,
    registry: BuilderRegistry,
    tools: ToolPaths,
}

impl TargetBuilder {
    /// `render` materializes a document's template; its output is the
    /// rendered `.html`/`.tex`/`.xhtml` artifact this target builder
    /// publishes (or feeds into a compile step). `tools` carries a
    /// project's `[tools]` overrides through to every atomic builder
    /// this target installs.
    pub fn new(
        target: impl Into<String>,
        target_root: impl Into<PathBuf>,
        cache_root: impl Into<PathBuf>,
        render: Box<dyn BuildNode + Send>,
        decider: Arc<dyn Decider>,
        tools: ToolPaths,
    ) -> Self {
        Self {
            target: target.into(),
            target_root: target_root.into(),
            cache_root: cache_root.into(),
            media: ParallelBuilder::new(Vec::new()),
            render,
            compile: None,
            decider,
            registry: BuilderRegistry::new(),
            tools,
        }
    }

    /// Apply this target's configured tool override (if any) for a
    /// kind's canonical tool name, so the builder shells out to the
    /// project's configured path instead of the bare canonical name.
    fn with_overrides(&self, tool_name: Option<&'static str>, builder: AtomicBuilder) -> AtomicBuilder {
        match tool_name {
            Some(name) => builder.with_tool_override(self.tools.resolve(name).to_string()),
            None => builder,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Register a media dependency (e.g. a stylesheet or figure found
    /// by a scanner) for the target's media directory. Resolves a
    /// builder class via the registry and installs it into the
    /// parallel media sub-builder. Mirrors C6's `add_build`.
    ///
    /// A PDF figure feeding an `svg`-bearing target (spec.md's E6
    /// scenario) goes through [`TargetBuilder::add_figure`]'s full
    /// crop->convert->scale pipeline instead of a single-step
    /// conversion, using identity crop/scale parameters — callers that
    /// know the actual `crop`/`scale` values should call `add_figure`
    /// directly.
    pub fn add_build(&mut self, infilepath: PathBuf, out_name: &str) -> Result<(), BuildError> {
        let in_ext = infilepath.extension().and_then(|e| e.to_str()).unwrap_or("");
        let candidate = self.registry.find_for_target(in_ext, &self.target, &self.tools)?;

        if in_ext.eq_ignore_ascii_case("pdf") && candidate.out_ext == "svg" {
            return self.add_figure(infilepath, out_name, vec![0.0], 1.0);
        }

        let out_ext = candidate.out_ext;
        let kind = BuilderRegistry::kind_for(candidate.class_name)
            .ok_or_else(|| BuildError::NoBuilder(candidate.class_name.to_string()))?;
        let tool_name = kind.tool_name();

        let outfilepath = TargetPath::new(
            self.target_root.clone(),
            self.target.clone(),
            PathBuf::from("media").join(format!("{out_name}.{out_ext}")),
        );
        let builder = AtomicBuilder::new(kind, vec![Parameter::input(infilepath)], outfilepath, self.decider.clone());
        let builder = self.with_overrides(tool_name, builder);
        self.media.push(Box::new(builder));
        Ok(())
    }

    /// Register a PDF figure through the full crop->convert->scale
    /// pipeline (spec.md's E1/E6 scenario): `pdfcrop` trims margins,
    /// `pdf2svg` converts, `rsvg-convert` applies the final scale. The
    /// pipeline carries its own top-level gate over `(infilepath,
    /// crop, scale)`, so deleting the cropped/unscaled intermediates
    /// doesn't force a rerun once the scaled SVG itself is fresh.
    pub fn add_figure(
        &mut self,
        infilepath: PathBuf,
        out_name: &str,
        crop: Vec<f64>,
        scale: f64,
    ) -> Result<(), BuildError> {
        let cropped = TargetPath::cache(&self.cache_root, format!("{out_name}-cropped.pdf"));
        let converted = TargetPath::cache(&self.cache_root, format!("{out_name}-converted.svg"));
        let scaled = TargetPath::new(
            self.target_root.clone(),
            self.target.clone(),
            PathBuf::from("media").join(format!("{out_name}.svg")),
        );

        let step1 = Box::new(self.with_overrides(
            Some("pdfcrop"),
            AtomicBuilder::new(
                Kind::Pdfcrop { margins: crop.clone() },
                vec![Parameter::input(&infilepath)],
                cropped.clone(),
                self.decider.clone(),
            ),
        ));
        let step2 = Box::new(self.with_overrides(
            Some("pdf2svg"),
            AtomicBuilder::new(Kind::Pdf2Svg, vec![Parameter::input(cropped.full_path())], converted.clone(), self.decider.clone()),
        ));
        let step3 = Box::new(self.with_overrides(
            Some("rsvg-convert"),
            AtomicBuilder::new(Kind::ScaleSvg { scale }, vec![Parameter::input(converted.full_path())], scaled, self.decider.clone()),
        ));

        let mut args: Vec<Arg> =
            crop.iter().enumerate().map(|(i, m)| Arg::new(format!("crop{i}"), m.to_string())).collect();
        args.push(Arg::new("scale", scale.to_string()));

        let pipeline = SequentialBuilder::with_gate(
            vec![step1, step2, step3],
            self.decider.clone(),
            vec![infilepath],
            args,
        );
        self.media.push(Box::new(pipeline));
        Ok(())
    }

    /// Install the sequential compile step (e.g. Latexmk) once the
    /// render step's output path is known. Only meaningful for
    /// compiled targets.
    pub fn set_compile(&mut self, compile: SequentialBuilder) {
        self.compile = Some(compile);
    }

    /// Resolve and install the compile step from the render step's own
    /// output (spec §4.8 point 3: tex -> pdf via the registry's
    /// Latexmk/Pdflatex fallback). A no-op for targets that publish
    /// their rendered artifact as-is.
    pub fn compile_from_render(&mut self) -> Result<(), BuildError> {
        if !is_compiled_target(&self.target) {
            return Ok(());
        }
        if self.target == "epub" {
            // xhtml+media -> epub needs OPF assembly and zip packaging,
            // which no registry rule implements; surfacing the registry's
            // own wildcard Copy fallback here would silently ship a
            // renamed xhtml file as a ".epub", so refuse explicitly
            // instead.
            return Err(BuildError::NoBuilder("epub packaging".to_string()));
        }
        let rendered = self.render.outfilepath().clone();
        let in_ext = rendered.extension().unwrap_or("tex");
        let candidate = self.registry.find(in_ext, "pdf", &self.tools)?;
        if candidate.class_name == "Copy" {
            return Err(BuildError::NoBuilder(format!("{in_ext} -> pdf")));
        }
        let kind = BuilderRegistry::kind_for(candidate.class_name)
            .ok_or_else(|| BuildError::NoBuilder(candidate.class_name.to_string()))?;
        let tool_name = kind.tool_name();

        let outfilepath = rendered.with_suffix("pdf");
        let step = AtomicBuilder::new(kind, vec![Parameter::input(rendered.full_path())], outfilepath, self.decider.clone());
        let step = Box::new(self.with_overrides(tool_name, step));
        self.compile = Some(SequentialBuilder::new(vec![step]));
        Ok(())
    }

    pub fn status(&self) -> Status {
        let mut statuses = vec![self.media.status(), self.render.status()];
        if let Some(compile) = &self.compile {
            statuses.push(compile.status());
        }
        Status::aggregate(statuses.iter())
    }

    pub fn build(&mut self, complete: bool) -> Status {
        self.media.build(complete);
        self.render.build(complete);
        if is_compiled_target(&self.target) {
            if let Some(compile) = &mut self.compile {
                compile.build(complete);
            }
        }
        self.status()
    }

    pub fn cache_root(&self) -> &std::path::Path {
        &self.cache_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decider::{ContentHashDecider, DecisionStore};
    use tempfile::TempDir;

    fn make_target(dir: &TempDir) -> TargetBuilder {
        let decider: Arc<dyn Decider> = Arc::new(ContentHashDecider::new(DecisionStore::open(dir.path()).unwrap()));
        let template = dir.path().join("template.html");
        std::fs::write(&template, "<html></html>").unwrap();
        let render_out = TargetPath::new(dir.path(), "html", "index.html");
        let render = Box::new(AtomicBuilder::new(
            Kind::Copy,
            vec![Parameter::input(&template)],
            render_out,
            decider.clone(),
        ));
        TargetBuilder::new("html", dir.path(), dir.path().join("cache"), render, decider, ToolPaths::default())
    }

    #[test]
    fn add_build_installs_a_media_copy() {
        let dir = TempDir::new().unwrap();
        let mut target = make_target(&dir);
        let css = dir.path().join("style.css");
        std::fs::write(&css, "body{}").unwrap();

        target.add_build(css, "style").unwrap();
        assert_eq!(target.media.children().len(), 1);
    }

    #[test]
    fn build_drives_media_and_render_to_done() {
        let dir = TempDir::new().unwrap();
        let mut target = make_target(&dir);
        let css = dir.path().join("style.css");
        std::fs::write(&css, "body{}").unwrap();
        target.add_build(css, "style").unwrap();

        assert_eq!(target.build(true), Status::Done);
    }

    #[test]
    fn add_figure_installs_a_gated_pipeline() {
        let dir = TempDir::new().unwrap();
        let mut target = make_target(&dir);
        let pdf = dir.path().join("diagram.pdf");
        std::fs::write(&pdf, "pdf-bytes").unwrap();

        target.add_figure(pdf, "diagram", vec![0.0, 0.0, 0.0, 0.0], 1.5).unwrap();
        assert_eq!(target.media.children().len(), 1);
    }

    #[test]
    fn compile_from_render_installs_latexmk_step_for_pdf_target() {
        super::registry::BuilderRegistry::clear_availability_cache();
        super::registry::availability_cache().insert("latexmk".to_string(), true);

        let dir = TempDir::new().unwrap();
        let decider: Arc<dyn Decider> = Arc::new(ContentHashDecider::new(DecisionStore::open(dir.path()).unwrap()));
        let template = dir.path().join("template.tex");
        std::fs::write(&template, "\\documentclass{article}").unwrap();
        let render_out = TargetPath::new(dir.path(), "pdf", "index.tex");
        let render = Box::new(AtomicBuilder::new(
            Kind::Copy,
            vec![Parameter::input(&template)],
            render_out,
            decider.clone(),
        ));
        let mut target = TargetBuilder::new("pdf", dir.path(), dir.path().join("cache"), render, decider, ToolPaths::default());

        target.compile_from_render().unwrap();
        assert!(target.compile.is_some());
    }

    #[test]
    fn compile_from_render_is_noop_for_uncompiled_targets() {
        let dir = TempDir::new().unwrap();
        let mut target = make_target(&dir);
        target.compile_from_render().unwrap();
        assert!(target.compile.is_none());
    }

    #[test]
    fn compile_from_render_rejects_epub() {
        let dir = TempDir::new().unwrap();
        let decider: Arc<dyn Decider> = Arc::new(ContentHashDecider::new(DecisionStore::open(dir.path()).unwrap()));
        let template = dir.path().join("template.xhtml");
        std::fs::write(&template, "<html></html>").unwrap();
        let render_out = TargetPath::new(dir.path(), "epub", "index.xhtml");
        let render = Box::new(AtomicBuilder::new(
            Kind::Copy,
            vec![Parameter::input(&template)],
            render_out,
            decider.clone(),
        ));
        let mut target = TargetBuilder::new("epub", dir.path(), dir.path().join("cache"), render, decider, ToolPaths::default());

        assert!(target.compile_from_render().is_err());
        assert!(target.compile.is_none());
    }
}
