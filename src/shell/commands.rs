use std::io::Write;

use fat32::{AccessMode, BlockDevice, FatError, Session};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum ShellCommand {
    Info,
    Ls,
    Cd { dir: String },
    Creat { file: String },
    Mkdir { dir: String },
    Open { file: String, mode: AccessMode },
    Close { file: String },
    Lsof,
    Lseek { file: String, offset: u64 },
    Read { file: String, size: u64 },
    Size { file: String },
    Write { file: String, data: String },
    Rm { file: String },
    Rmdir { dir: String },
    Mv { src: String, dst: String },
    Exit,
}

#[derive(Debug, PartialEq, Eq)]
pub(super) enum Flow {
    Continue,
    Exit,
}

/// Engine failures are reported to the user; only output failures propagate.
#[derive(Debug, thiserror::Error)]
pub(super) enum CommandError {
    #[error(transparent)]
    Fat(#[from] FatError),
    #[error("writing shell output failed: {0}")]
    Output(#[from] std::io::Error),
}

pub(super) fn execute<D: BlockDevice, W: Write>(
    session: &mut Session<D>,
    command: ShellCommand,
    out: &mut W,
) -> Result<Flow, CommandError> {
    match command {
        ShellCommand::Exit => return Ok(Flow::Exit),
        ShellCommand::Info => {
            let info = session.info();
            writeln!(out, "Bytes Per Sector: {}", info.bytes_per_sector)?;
            writeln!(out, "Sectors Per Cluster: {}", info.sectors_per_cluster)?;
            writeln!(out, "Total clusters in Data Region: {}", info.total_data_clusters)?;
            writeln!(out, "# of entries in one FAT: {}", info.fat_entries)?;
            writeln!(out, "Size of Image (bytes): {}", info.image_size)?;
            writeln!(out, "Root Cluster: {}", info.root_cluster)?;
        }
        ShellCommand::Ls => {
            for entry in session.list_directory()? {
                write!(out, "{}  ", entry.name)?;
            }
            writeln!(out)?;
        }
        ShellCommand::Cd { dir } => session.change_directory(&dir)?,
        ShellCommand::Creat { file } => session.create_file(&file)?,
        ShellCommand::Mkdir { dir } => session.create_directory(&dir)?,
        ShellCommand::Open { file, mode } => {
            session.open(&file, mode)?;
            writeln!(out, "opened {file}")?;
        }
        ShellCommand::Close { file } => {
            session.close(&file)?;
            writeln!(out, "closed {file}")?;
        }
        ShellCommand::Lsof => render_open_files(session, out)?,
        ShellCommand::Lseek { file, offset } => session.seek(&file, offset)?,
        ShellCommand::Read { file, size } => {
            let outcome = session.read(&file, size)?;
            if outcome.at_eof() {
                writeln!(out, "End of file reached. Read 0 bytes.")?;
            } else {
                if outcome.clamped {
                    writeln!(out, "Warning: Reading only {} bytes until EOF.", outcome.data.len())?;
                }
                writeln!(out, "{}", String::from_utf8_lossy(&outcome.data))?;
            }
        }
        ShellCommand::Size { file } => {
            let size = session.size(&file)?;
            writeln!(out, "{size}")?;
        }
        ShellCommand::Write { file, data } => {
            session.write(&file, data.as_bytes())?;
        }
        ShellCommand::Rm { file } => session.remove_file(&file)?,
        ShellCommand::Rmdir { dir } => session.remove_directory(&dir)?,
        ShellCommand::Mv { src, dst } => session.rename(&src, &dst)?,
    }
    Ok(Flow::Continue)
}

fn render_open_files<D: BlockDevice, W: Write>(
    session: &Session<D>,
    out: &mut W,
) -> std::io::Result<()> {
    writeln!(out, "INDEX  NAME          MODE    OFFSET     PATH")?;
    let mut count = 0usize;
    for file in session.list_open_files() {
        count += 1;
        writeln!(
            out,
            "{:<5}  {:<12}  {:<6}  {:<9}  {}{}",
            file.index,
            file.name.as_str(),
            file.mode.label(),
            file.offset,
            session.image_name(),
            file.path
        )?;
    }
    if count == 0 {
        writeln!(out, "No files currently open")?;
    }
    Ok(())
}
