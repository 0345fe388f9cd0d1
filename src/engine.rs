//! The admission driver.
//!
//! Reads update triples from the input stream until EOF, admits each in
//! receipt order, and aggregates the verdict. A single rejection rejects the
//! entire push, so the driver short-circuits: no commit beyond the first
//! rejecting one is verified, and diagnostics for update `i` always precede
//! those for update `i + 1`.

use std::io::{BufRead, Write};

use gix_object::Find;

use crate::policy::{Admission, PolicyContext};
use crate::protocol::RefUpdate;
use crate::signature::SignatureBackend;
use crate::Error;

/// Final verdict over an entire push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

impl Verdict {
    /// The process exit code signalling this verdict to the host.
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Accept => 0,
            Verdict::Reject => 1,
        }
    }
}

/// Admit every update on `input`, one `<old> <new> <ref>` triple per line.
///
/// Blank lines are ignored; any other malformed line is a fatal error before
/// further updates are considered.
pub fn run<F: Find, B: SignatureBackend>(
    ctx: &PolicyContext<'_, F, B>,
    input: impl BufRead,
    out: &mut dyn Write,
) -> Result<Verdict, Error> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let update = RefUpdate::parse(&line)?;
        if ctx.admit(&update, out)? == Admission::Reject {
            return Ok(Verdict::Reject);
        }
    }
    Ok(Verdict::Accept)
}
