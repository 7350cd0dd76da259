//! Line-oriented front end: prompt, tokenize, dispatch, render.

mod commands;
mod parser;

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use fat32::{BlockDevice, Session};
use log::{debug, warn};

use commands::{execute, CommandError, Flow};
use parser::parse_command;

pub const CLOSING_MESSAGE: &str = "Safely closing program.";

/// Runs the prompt loop until `exit` or end of input. Command failures are
/// printed and the loop carries on; only a broken input or output stream
/// ends it early.
pub fn run<D, R, W>(session: &mut Session<D>, mut input: R, mut out: W) -> Result<()>
where
    D: BlockDevice,
    R: BufRead,
    W: Write,
{
    let mut line = String::new();
    loop {
        write!(out, "{}{}>", session.image_name(), session.current_path())?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line).context("reading command line")? == 0 {
            writeln!(out)?;
            break;
        }

        let command = match parse_command(line.trim()) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                writeln!(out, "Error: {err}")?;
                continue;
            }
        };
        debug!("command {command:?}");

        match execute(session, command, &mut out) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => break,
            Err(CommandError::Fat(err)) => {
                if err.kind() == fat32::ErrorKind::Corrupt {
                    warn!("volume inconsistency: {err}");
                }
                writeln!(out, "Error: {err}")?;
            }
            Err(CommandError::Output(err)) => return Err(err).context("writing shell output"),
        }
    }

    writeln!(out, "{CLOSING_MESSAGE}")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests;
