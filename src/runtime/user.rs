//! Confirmation prompts for destructive operations.

use anyhow::Result;

use super::RealRuntime;

use std::io::{self, BufRead, Write};

/// Prompt on `output` and read the answer from `input`; only "y"/"yes"
/// (any case) confirms.
pub(crate) fn confirm_with_io<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    write!(output, "{} [y/N]: ", prompt)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

impl RealRuntime {
    pub(crate) fn confirm_impl(&self, prompt: &str) -> Result<bool> {
        let stdin = io::stdin();
        let mut stderr = io::stderr();
        let mut stdin_lock = stdin.lock();
        // Prompts go to stderr
        confirm_with_io(prompt, &mut stdin_lock, &mut stderr)
    }
}
