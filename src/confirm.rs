use console::{style, Term};
use tracing::warn;

/// What is about to be written, shown to whoever decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSync {
	pub records: usize,
	pub batches: usize,
	pub sample: Option<String>,
}

/// Yes/no decision taken once before any catalog write.
pub trait ConfirmationGate {
	fn confirm(&self, pending: &PendingSync) -> bool;
}

/// A decision made up front (`--yes`, tests).
impl ConfirmationGate for bool {
	fn confirm(&self, _pending: &PendingSync) -> bool {
		*self
	}
}

/// Asks on the terminal. Only `y` or `yes` proceeds.
pub struct TerminalPrompt {
	term: Term,
}

impl TerminalPrompt {
	pub fn new() -> Self {
		TerminalPrompt { term: Term::stderr() }
	}
}

impl Default for TerminalPrompt {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfirmationGate for TerminalPrompt {
	fn confirm(&self, pending: &PendingSync) -> bool {
		if let Some(sample) = &pending.sample {
			let _ = self.term.write_line(&format!("e.g. {}", style(sample).dim()));
		}
		let question = format!(
			"Upload {} records in {} batches to the catalog? (y/n): ",
			style(pending.records).bold(),
			pending.batches
		);
		if self.term.write_str(&question).is_err() {
			return false;
		}
		match self.term.read_line() {
			Ok(answer) => is_affirmative(&answer),
			Err(e) => {
				warn!(error = %e, "could not read confirmation, treating as no");
				false
			}
		}
	}
}

fn is_affirmative(answer: &str) -> bool {
	matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
