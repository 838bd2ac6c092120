//! Credential prompting.
//!
//! The auth task asks a [`Prompt`] for the phone number, login code and
//! password.  Prompts may block for as long as the user takes; the auth task
//! runs them on tokio's blocking pool so update delivery is never held up.

use std::io::{self, BufRead, Write};

/// Source of interactively entered credentials.
pub trait Prompt: Send + Sync + 'static {
    /// Show `label` and return the entered line, without the line terminator.
    fn prompt_string(&self, label: &str) -> io::Result<String>;
}

/// Reads credentials from the terminal.
#[derive(Default, Clone, Copy)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn prompt_string(&self, label: &str) -> io::Result<String> {
        let mut out = io::stdout().lock();
        out.write_all(label.as_bytes())?;
        out.flush()?;
        drop(out);

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl<F> Prompt for F
where
    F: Fn(&str) -> io::Result<String> + Send + Sync + 'static,
{
    fn prompt_string(&self, label: &str) -> io::Result<String> {
        self(label)
    }
}
