//! CLI entry point: a thin three-subcommand surface over the build
//! engine, per spec.md §6. Only `render` is wired to a working
//! pipeline end to end — `init` and `preview` name features that live
//! entirely in the external collaborators (starter-project packaging,
//! the HTTP preview server) this crate does not implement, so they
//! exit non-zero with a message rather than silently no-op.
//!
//! Grounded on the teacher's `main.rs`/`cli::args` clap-derive shape,
//! trimmed from its many subcommands down to these three.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use disseminate::builder::{AtomicBuilder, BuildNode, Kind, Parameter, SequentialBuilder, TargetBuilder};
use disseminate::config::ProjectConfig;
use disseminate::environment::Environment;
use disseminate::hash::ContentHash;
use disseminate::path::TargetPath;
use disseminate::render::{document_body, parse_header, trivial_template};
use disseminate::{debug, log};

#[derive(Parser)]
#[command(name = "disseminate", version, about = "multi-target document build engine")]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build all declared targets for one source file.
    Render {
        #[arg(short = 'i', long = "input")]
        input: PathBuf,
    },
    /// Clone a starter project. Not implemented by this crate: starter
    /// packaging lives in the external collaborator that owns project
    /// scaffolding.
    Init {
        starter: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        info: bool,
    },
    /// Start the HTTP preview server over an environment. Not
    /// implemented by this crate: the preview server is an external
    /// collaborator (spec.md §1).
    Preview,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    disseminate::logger::set_verbose(cli.verbose);
    disseminate::environment::setup_shutdown_handler();

    let result = match cli.command {
        Command::Render { input } => render(&input),
        Command::Init { .. } => {
            log!("init"; "starter-project scaffolding is not implemented by this crate");
            return ExitCode::FAILURE;
        }
        Command::Preview => {
            log!("preview"; "the HTTP preview server is not implemented by this crate");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log!("render"; "{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn render(input: &PathBuf) -> anyhow::Result<()> {
    let input = input.canonicalize().map_err(|e| anyhow::anyhow!("cannot read `{}`: {e}", input.display()))?;
    let project_root =
        input.parent().map(|p| p.to_path_buf()).ok_or_else(|| anyhow::anyhow!("input file has no parent directory"))?;

    let config = ProjectConfig::load(&project_root)?;
    debug!("render"; "loaded config for {}", project_root.display());

    let text = std::fs::read_to_string(&input)?;
    let header = parse_header(&text);
    let targets = if header.targets.is_empty() { config.default_targets.clone() } else { header.targets.clone() };

    let mut env = Environment::new(&project_root, &config.target_root)?;
    let decider = env.decider();
    let body = document_body(&text);
    let body_hash = ContentHash::from_bytes(body.as_bytes());

    let stem = input.file_stem().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("out"));

    for target in &targets {
        log!("render"; "building target `{target}` for {}", input.display());

        // Materialize the document body into the cache so `JinjaRender`
        // (which reads its input from a file, per its execute arm) has
        // something to read; the markup/template layer that would
        // otherwise supply a real template file is an external
        // collaborator, so this uses the trivial built-in template.
        let body_cache = TargetPath::cache(env.cache_root(), format!("{}.body", body_hash.to_hex()));
        let save_body: Box<dyn BuildNode + Send> = Box::new(AtomicBuilder::new(
            Kind::SaveTempFile { content: body.as_bytes().to_vec() },
            vec![],
            body_cache.clone(),
            decider.clone(),
        ));

        let render_out = TargetPath::new(env.target_root(), target.clone(), stem.with_extension(rendered_extension(target)));
        let render_step: Box<dyn BuildNode + Send> = Box::new(AtomicBuilder::new(
            Kind::JinjaRender { render: trivial_template(target) },
            vec![Parameter::input(body_cache.full_path())],
            render_out,
            decider.clone(),
        ));
        let render_builder: Box<dyn BuildNode + Send> = Box::new(SequentialBuilder::new(vec![save_body, render_step]));

        let mut target_builder = TargetBuilder::new(
            target.clone(),
            env.target_root(),
            env.cache_root(),
            render_builder,
            decider.clone(),
            config.tools.clone(),
        );

        for include in &header.include {
            let candidate = project_root.join(include);
            if candidate.is_file() {
                let name = include.trim_end_matches(|c: char| c != '.').trim_end_matches('.');
                target_builder.add_build(candidate, name)?;
            }
        }

        target_builder.compile_from_render()?;
        env.register_target(target_builder);
    }

    let status = env.build(true);
    log!("render"; "all targets finished: {status}");
    if !matches!(status, disseminate::builder::Status::Done) {
        anyhow::bail!("build failed: {status}");
    }

    Ok(())
}

/// The file extension a target's render step produces before any
/// further compile step: `pdf`/`epub` targets render an intermediate
/// markup artifact (`tex`/`xhtml`) that the compile step then turns
/// into the final form; other targets publish what they render as-is.
fn rendered_extension(target: &str) -> &'static str {
    match target {
        "pdf" => "tex",
        "epub" => "xhtml",
        "xhtml" => "xhtml",
        _ => "html",
    }
}
