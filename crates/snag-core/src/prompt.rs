//! Bounded yes/no prompt for the finalization decision.
//!
//! Invalid answers are re-asked, up to a fixed number of attempts; after that
//! the caller gets a typed error instead of another question.

use std::io::{self, BufRead, Write};

use crate::corruption::Decision;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("no valid answer after {attempts} attempt(s)")]
    InvalidInput { attempts: u32 },
    #[error("input closed before an answer was given")]
    Closed,
    #[error("prompt i/o: {0}")]
    Io(#[from] io::Error),
}

/// Parses one answer line: `y`/`yes` accept, `n`/`no` decline, case-insensitive.
pub fn parse_decision(answer: &str) -> Option<Decision> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(Decision::Accept),
        "n" | "no" => Some(Decision::Decline),
        _ => None,
    }
}

/// Writes `question` and reads answers from `input` until one parses or
/// `max_attempts` answers have been rejected.
pub fn ask_decision<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    max_attempts: u32,
) -> Result<Decision, PromptError> {
    let max_attempts = max_attempts.max(1);
    let mut line = String::new();
    for attempt in 1..=max_attempts {
        write!(output, "{question} (y/n): ")?;
        output.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(PromptError::Closed);
        }
        if let Some(decision) = parse_decision(&line) {
            return Ok(decision);
        }
        tracing::debug!(attempt, answer = %line.trim(), "unrecognized answer");
        if attempt < max_attempts {
            writeln!(output, "Please answer 'y' or 'n'.")?;
        }
    }
    Err(PromptError::InvalidInput {
        attempts: max_attempts,
    })
}
