//! External command execution for atomic builders.
//!
//! Grounded on `utils/exec.rs`'s `Cmd` builder, trimmed down: no PTY
//! support and no stdin piping, since none of the converter table
//! (pdfcrop, pdf2svg, rsvg-convert, tif2png, asy, latexmk) needs
//! either — they're all run with plain argv and read their input from
//! a file path.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::BuildError;

/// Command builder for external converter invocation.
#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
}

impl Cmd {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self { program: program.as_ref().to_owned(), ..Default::default() }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_owned());
        }
        self
    }

    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Run the command to completion. A non-zero exit status is
    /// reported as [`BuildError::BuildFailure`] with captured stderr;
    /// a failure to even spawn the process is reported the same way,
    /// with the spawn error's message standing in for stderr.
    pub fn run(self) -> Result<Vec<u8>, BuildError> {
        let tool = self.program_name();
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let output = command.output().map_err(|e| BuildError::BuildFailure {
            tool: tool.clone(),
            status: "could not start process".to_string(),
            stderr: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(BuildError::BuildFailure {
                tool,
                status: output
                    .status
                    .code()
                    .map(|c| format!("exit code {c}"))
                    .unwrap_or_else(|| "unknown exit status".to_string()),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_command_returns_stdout() {
        let out = Cmd::new("printf").arg("hello").run().unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn nonzero_exit_is_build_failure() {
        let err = Cmd::new("sh").args(["-c", "exit 3"]).run().unwrap_err();
        match err {
            BuildError::BuildFailure { status, .. } => assert!(status.contains('3')),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_build_failure() {
        let err = Cmd::new("definitely-not-a-real-binary-xyz").run().unwrap_err();
        assert!(matches!(err, BuildError::BuildFailure { .. }));
    }
}
