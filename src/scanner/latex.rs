//! LaTeX dependency scanner: `\includegraphics` and `\input`.
//!
//! Grounded on the same walk-up resolution model as `HtmlScanner`, but
//! for the LaTeX target's own reference forms (used by `Latexmk`
//! inputs discovered via `compiler::Asy2Pdf`/figure includes).

use std::sync::OnceLock;

use regex::Regex;

use super::Scanner;

fn command_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\\(includegraphics|input)\s*(?:\[[^\]]*\])?\s*\{([^}]+)\}").unwrap()
    })
}

pub struct LatexScanner;

impl LatexScanner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LatexScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for LatexScanner {
    fn references(&self, content: &str) -> Vec<String> {
        command_re()
            .captures_iter(content)
            .map(|c| c.get(2).unwrap().as_str().trim().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_includegraphics() {
        let tex = r"\includegraphics[width=0.5\textwidth]{figures/plot.pdf}";
        assert_eq!(LatexScanner::new().references(tex), vec!["figures/plot.pdf"]);
    }

    #[test]
    fn finds_input() {
        let tex = r"\input{chapters/intro.tex}";
        assert_eq!(LatexScanner::new().references(tex), vec!["chapters/intro.tex"]);
    }

    #[test]
    fn finds_both_in_order() {
        let tex = r"\input{a.tex}\includegraphics{b.pdf}";
        assert_eq!(LatexScanner::new().references(tex), vec!["a.tex", "b.pdf"]);
    }
}
