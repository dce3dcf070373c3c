//! External interfaces (§6): the render/file request shapes the core
//! consumes from the markup layer, and document header parsing.
//!
//! Grounded on spec.md §6 and, for the header's shape, on the
//! original project's `---`-delimited front matter convention
//! (`examples/original_source/templates/init_project.py` starter
//! documents use the same `targets`/`template`/`include` keys).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::path::TargetPath;

/// A request to render one document target: template, target kind,
/// and the already-rendered body content (from the markup/AST layer,
/// an external collaborator).
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub target: String,
    pub template: String,
    pub body: String,
}

/// A request to transform one input artifact (e.g. a figure) into its
/// target form.
#[derive(Debug, Clone)]
pub struct FileRequest {
    pub target: String,
    pub infilepaths: Vec<PathBuf>,
    pub outfilepath: Option<TargetPath>,
}

/// The subset of a document's `---`-delimited header this crate
/// understands. Unrecognized keys are preserved verbatim in `extra`
/// for the markup layer to reinterpret.
#[derive(Debug, Clone, Default)]
pub struct Header {
    pub targets: Vec<String>,
    pub template: String,
    pub include: Vec<String>,
    pub extra: BTreeMap<String, String>,
}

const DEFAULT_TEMPLATE: &str = "default/template";

/// Split `content` on its leading `---`-delimited header (if any) and
/// parse the recognized keys. A document with no header, or a header
/// missing a key, gets that key's documented default.
pub fn parse_header(content: &str) -> Header {
    let Some(body) = content.strip_prefix("---\n").or_else(|| content.strip_prefix("---\r\n")) else {
        return Header { template: DEFAULT_TEMPLATE.to_string(), ..Header::default() };
    };
    let Some(end) = find_header_end(body) else {
        return Header { template: DEFAULT_TEMPLATE.to_string(), ..Header::default() };
    };

    let header_text = &body[..end];
    let mut header = Header { template: DEFAULT_TEMPLATE.to_string(), ..Header::default() };

    let mut lines = header_text.lines().peekable();
    while let Some(line) = lines.next() {
        let Some((key, value)) = line.split_once(':') else { continue };
        let key = key.trim();
        let value = value.trim();

        match key {
            "targets" => {
                header.targets = value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
            }
            "template" => {
                if !value.is_empty() {
                    header.template = value.to_string();
                }
            }
            "include" => {
                if !value.is_empty() {
                    header.include.push(value.to_string());
                }
                while let Some(next) = lines.peek() {
                    if next.starts_with([' ', '\t']) && !next.trim().is_empty() {
                        header.include.push(next.trim().to_string());
                        lines.next();
                    } else {
                        break;
                    }
                }
            }
            other if !other.is_empty() => {
                header.extra.insert(other.to_string(), value.to_string());
            }
            _ => {}
        }
    }
    header
}

/// Find the index (within `body`) of the closing `---` line, so the
/// header can be sliced out from the rest of the document.
fn find_header_end(body: &str) -> Option<usize> {
    let mut offset = 0;
    for line in body.lines() {
        if line.trim_end() == "---" {
            return Some(offset);
        }
        offset += line.len() + 1;
    }
    None
}

/// The document text with its `---`-delimited header (if any) removed,
/// i.e. the in-memory body a `RenderRequest` carries. Mirrors
/// `parse_header`'s own header-detection so the two agree on where the
/// header ends.
pub fn document_body(content: &str) -> &str {
    let Some(after_open) =
        content.strip_prefix("---\n").or_else(|| content.strip_prefix("---\r\n"))
    else {
        return content;
    };
    let Some(end) = find_header_end(after_open) else { return content };
    let closing = "---";
    after_open[end..].strip_prefix(closing).map(|s| s.trim_start_matches(['\r', '\n'])).unwrap_or(content)
}

/// A trivial, built-in stand-in for the real template engine (an
/// external collaborator per spec.md §1): wraps a document's rendered
/// body in the minimal markup its target format needs. Not a template
/// language — there is no substitution syntax, no layout inheritance,
/// just the smallest valid wrapper per target family so `render`
/// produces a openable artifact without a real template.
pub fn trivial_template(target: &str) -> Arc<dyn Fn(&str, &str) -> String + Send + Sync> {
    let target = target.to_string();
    Arc::new(move |body, _output_path| match target.as_str() {
        "tex" | "pdf" => format!("\\documentclass{{article}}\n\\begin{{document}}\n{body}\n\\end{{document}}\n"),
        "xhtml" | "epub" => format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\"><body>{body}</body></html>\n"
        ),
        _ => format!("<!DOCTYPE html>\n<html><body>{body}</body></html>\n"),
    })
}
