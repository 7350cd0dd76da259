use fat32::AccessMode;
use thiserror::Error;

use super::commands::ShellCommand;

#[derive(Debug, Error, PartialEq, Eq)]
pub(super) enum ParseError {
    #[error("{0}")]
    Usage(&'static str),
    #[error("Invalid flag '{0}' used. Must be -r, -w, -rw, or -wr.")]
    BadFlag(String),
    #[error("{what} must be a non-negative integer, got '{value}'.")]
    BadNumber { what: &'static str, value: String },
    #[error("Unterminated quote.")]
    UnterminatedQuote,
    #[error("Command '{0}' not implemented or recognized.")]
    UnknownCommand(String),
}

/// Splits on whitespace. Double quotes group a run of text, spaces
/// included, into one token; the quotes themselves are dropped.
pub(super) fn tokenize(line: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quoted {
        return Err(ParseError::UnterminatedQuote);
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_number(raw: &str, what: &'static str) -> Result<u64, ParseError> {
    raw.parse::<u64>().map_err(|_| ParseError::BadNumber {
        what,
        value: raw.to_string(),
    })
}

/// `Ok(None)` for a blank line. Arguments beyond what a command takes are
/// ignored, except for `write`, which joins them back into one payload.
pub(super) fn parse_command(line: &str) -> Result<Option<ShellCommand>, ParseError> {
    let tokens = tokenize(line)?;
    let Some((command, args)) = tokens.split_first() else {
        return Ok(None);
    };
    let arg = |index: usize, usage: &'static str| {
        args.get(index).cloned().ok_or(ParseError::Usage(usage))
    };

    let parsed = match command.as_str() {
        "exit" => ShellCommand::Exit,
        "info" => ShellCommand::Info,
        "ls" => ShellCommand::Ls,
        "lsof" => ShellCommand::Lsof,
        "cd" => ShellCommand::Cd {
            dir: arg(0, "'cd' command requires a directory name.")?,
        },
        "creat" => ShellCommand::Creat {
            file: arg(0, "'creat' command requires a file name.")?,
        },
        "mkdir" => ShellCommand::Mkdir {
            dir: arg(0, "'mkdir' command requires a directory name.")?,
        },
        "open" => {
            const USAGE: &str = "'open' command requires a file name and access mode.";
            let file = arg(0, USAGE)?;
            let flag = arg(1, USAGE)?;
            let mode = AccessMode::from_flag(&flag).ok_or(ParseError::BadFlag(flag))?;
            ShellCommand::Open { file, mode }
        }
        "close" => ShellCommand::Close {
            file: arg(0, "Missing file name for 'close'.")?,
        },
        "lseek" => {
            const USAGE: &str = "'lseek' command requires a file name and offset.";
            ShellCommand::Lseek {
                file: arg(0, USAGE)?,
                offset: parse_number(&arg(1, USAGE)?, "Offset")?,
            }
        }
        "read" => {
            const USAGE: &str = "'read' command requires a file name and size.";
            ShellCommand::Read {
                file: arg(0, USAGE)?,
                size: parse_number(&arg(1, USAGE)?, "Size")?,
            }
        }
        "size" => ShellCommand::Size {
            file: arg(0, "'size' command requires a file name.")?,
        },
        "write" => {
            const USAGE: &str = "'write' command requires a file name and a string.";
            let file = arg(0, USAGE)?;
            if args.len() < 2 {
                return Err(ParseError::Usage(USAGE));
            }
            ShellCommand::Write {
                file,
                data: args[1..].join(" "),
            }
        }
        "rm" => ShellCommand::Rm {
            file: arg(0, "'rm' command requires a file name.")?,
        },
        "rmdir" => ShellCommand::Rmdir {
            dir: arg(0, "'rmdir' command requires a directory name.")?,
        },
        "mv" => {
            const USAGE: &str = "'mv' command requires a source and a destination.";
            ShellCommand::Mv {
                src: arg(0, USAGE)?,
                dst: arg(1, USAGE)?,
            }
        }
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(Some(parsed))
}
