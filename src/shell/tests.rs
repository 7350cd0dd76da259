use std::io::Cursor;

use fat32::{format_volume, AccessMode, FormatOptions, Session};

use super::{
    commands::ShellCommand,
    parser::{parse_command, tokenize, ParseError},
    run, CLOSING_MESSAGE,
};

fn session() -> Session<Cursor<Vec<u8>>> {
    let mut image = Cursor::new(Vec::new());
    format_volume(&mut image, &FormatOptions::with_total_sectors(1024)).unwrap();
    Session::mount(image, "disk.img").unwrap()
}

fn transcript(script: &str) -> String {
    let mut session = session();
    let mut out = Vec::new();
    run(&mut session, script.as_bytes(), &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn tokenizer_keeps_quoted_spaces() {
    assert_eq!(
        tokenize(r#"write NOTE.TXT "hello  there" tail"#).unwrap(),
        ["write", "NOTE.TXT", "hello  there", "tail"]
    );
    assert_eq!(tokenize("   ").unwrap(), Vec::<String>::new());
    assert_eq!(tokenize(r#"write A """#).unwrap(), ["write", "A", ""]);
    assert_eq!(tokenize(r#"write A "open"#), Err(ParseError::UnterminatedQuote));
}

#[test]
fn parses_open_with_mode_flag() {
    let cmd = parse_command("open HI.TXT -rw").unwrap();
    match cmd {
        Some(ShellCommand::Open { file, mode }) => {
            assert_eq!(file, "HI.TXT");
            assert_eq!(mode, AccessMode::ReadWrite);
        }
        _ => panic!("unexpected command"),
    }
    assert_eq!(
        parse_command("open HI.TXT rw"),
        Err(ParseError::BadFlag("rw".to_string()))
    );
}

#[test]
fn parses_numeric_arguments() {
    match parse_command("lseek A 12").unwrap() {
        Some(ShellCommand::Lseek { file, offset }) => {
            assert_eq!(file, "A");
            assert_eq!(offset, 12);
        }
        _ => panic!("unexpected command"),
    }
    match parse_command("read A 5").unwrap() {
        Some(ShellCommand::Read { size, .. }) => assert_eq!(size, 5),
        _ => panic!("unexpected command"),
    }
    assert!(matches!(
        parse_command("read A -5"),
        Err(ParseError::BadNumber { what: "Size", .. })
    ));
}

#[test]
fn parses_write_payload_from_remaining_tokens() {
    match parse_command("write A hello world").unwrap() {
        Some(ShellCommand::Write { file, data }) => {
            assert_eq!(file, "A");
            assert_eq!(data, "hello world");
        }
        _ => panic!("unexpected command"),
    }
}

#[test]
fn missing_arguments_are_usage_errors() {
    for line in ["cd", "creat", "mkdir", "open A", "close", "lseek A", "read", "write A", "mv A"] {
        assert!(
            matches!(parse_command(line), Err(ParseError::Usage(_))),
            "{line:?} should need more arguments"
        );
    }
    assert_eq!(parse_command(""), Ok(None));
    assert_eq!(
        parse_command("format"),
        Err(ParseError::UnknownCommand("format".to_string()))
    );
}

#[test]
fn prompt_follows_current_directory() {
    let out = transcript("mkdir docs\ncd DOCS\ncd ..\nexit\n");
    assert!(out.starts_with("disk.img/>disk.img/>disk.img/DOCS/>disk.img/>"));
    assert!(out.ends_with(&format!("{CLOSING_MESSAGE}\n")));
}

#[test]
fn info_prints_geometry() {
    let out = transcript("info\n");
    assert!(out.contains("Bytes Per Sector: 512\n"));
    assert!(out.contains("Sectors Per Cluster: 1\n"));
    assert!(out.contains("Total clusters in Data Region: 976\n"));
    assert!(out.contains("# of entries in one FAT: 1024\n"));
    assert!(out.contains("Size of Image (bytes): 524288\n"));
    assert!(out.contains("Root Cluster: 2\n"));
}

#[test]
fn ls_lists_entries_in_scan_order() {
    let out = transcript("creat b.txt\nmkdir sub\ncreat a\nls\n");
    assert!(out.contains("B.TXT  SUB  A  \n"));
}

#[test]
fn write_then_read_back_through_the_shell() {
    let script = "creat hi.txt\n\
                  open HI.TXT -rw\n\
                  write HI.TXT \"HELLO there\"\n\
                  lseek HI.TXT 0\n\
                  read HI.TXT 5\n\
                  read HI.TXT 100\n\
                  read HI.TXT 1\n\
                  size HI.TXT\n\
                  lsof\n\
                  close HI.TXT\n\
                  lsof\n";
    let out = transcript(script);
    assert!(out.contains("opened HI.TXT\n"));
    assert!(out.contains(">HELLO\n"));
    assert!(out.contains("Warning: Reading only 6 bytes until EOF.\n there\n"));
    assert!(out.contains("End of file reached. Read 0 bytes.\n"));
    assert!(out.contains(">11\n"));
    assert!(out.contains("INDEX  NAME          MODE    OFFSET     PATH\n"));
    assert!(out.contains("0      HI.TXT        rw      11         disk.img/\n"));
    assert!(out.contains("closed HI.TXT\n"));
    assert!(out.contains("No files currently open\n"));
}

#[test]
fn errors_are_reported_and_loop_continues() {
    let out = transcript("cd nowhere\nopen A -x\nread A 3\nbogus\ncreat A\ncreat A\nls\n");
    assert!(out.contains("Error: 'nowhere' not found\n"));
    assert!(out.contains("Error: Invalid flag '-x' used. Must be -r, -w, -rw, or -wr.\n"));
    assert!(out.contains("Error: 'A' is not open\n"));
    assert!(out.contains("Error: Command 'bogus' not implemented or recognized.\n"));
    assert!(out.contains("Error: 'A' already exists\n"));
    assert!(out.contains("A  \n"));
}

#[test]
fn end_of_input_exits_cleanly() {
    let out = transcript("creat A");
    assert!(out.ends_with(&format!(">\n{CLOSING_MESSAGE}\n")));
}

#[test]
fn mutation_commands_round_trip() {
    let out = transcript(
        "creat a.txt\nmkdir d\nmv A.TXT b.txt\nmv B.TXT D\ncd D\nls\nrm B.TXT\ncd ..\nrmdir D\nls\n",
    );
    assert!(out.contains(".  ..  B.TXT  \n"));
    assert!(!out.contains("Error"));
    let last_ls = out.rsplit("disk.img/>").nth(1).unwrap_or_default();
    assert_eq!(last_ls, "\n");
}
