//! Text channels: the current log filename and the command block.
//!
//! Both occupy a fixed 512-byte region holding a NUL-terminated string. The
//! bytes after the terminator are padding and are skipped so the cursor ends
//! at the end of the region.

use std::fmt;

use super::{table_width, Decodable, FieldSpec};
use crate::error::DecodeError;
use crate::IPC::cursor::Cursor;

/// Size of a text region, terminator included.
pub const MAX_TEXT_LEN: usize = 512;

fn read_text_region(cursor: &mut Cursor<'_>) -> Result<String, DecodeError> {
    let start = cursor.position();
    let text = cursor.read_cstr(MAX_TEXT_LEN)?;
    let used = cursor.position() - start;
    cursor.skip(MAX_TEXT_LEN - used)?;
    Ok(text)
}

/// Name of the file the GPS logger is currently writing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilename {
    pub name: String,
}

impl Decodable for LogFilename {
    const CHANNEL: &'static str = "GPS_Filename";
    const RECORD: &'static str = "LogFilename";
    const PAYLOAD_SIZE: usize = MAX_TEXT_LEN;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::text("name", MAX_TEXT_LEN)];

    fn decode(&mut self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError> {
        self.name = read_text_region(cursor)?;
        Ok(())
    }
}

const _: () = assert!(table_width(LogFilename::FIELDS) == LogFilename::PAYLOAD_SIZE);

impl fmt::Display for LogFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str("log file: (none)")
        } else {
            write!(f, "log file: {}", self.name)
        }
    }
}

/// A command sent to the GPS logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Empty block: nothing pending.
    Idle,
    /// `CF <file>`: start logging to a new file.
    ChangeFilename(String),
    /// `GF`: publish the current filename.
    GetFilename,
    Unknown(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Self::Idle;
        }
        match text.split_once(char::is_whitespace) {
            Some(("CF", file)) if !file.trim().is_empty() => {
                Self::ChangeFilename(file.trim().to_string())
            }
            None if text == "GF" => Self::GetFilename,
            _ => Self::Unknown(text.to_string()),
        }
    }
}

/// Raw command text plus its parsed form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandBlock {
    pub text: String,
}

impl CommandBlock {
    pub fn command(&self) -> Command {
        Command::parse(&self.text)
    }
}

impl Decodable for CommandBlock {
    const CHANNEL: &'static str = "GPS_Commands";
    const RECORD: &'static str = "CommandBlock";
    const PAYLOAD_SIZE: usize = MAX_TEXT_LEN;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::text("text", MAX_TEXT_LEN)];

    fn decode(&mut self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError> {
        self.text = read_text_region(cursor)?;
        Ok(())
    }
}

const _: () = assert!(table_width(CommandBlock::FIELDS) == CommandBlock::PAYLOAD_SIZE);

impl fmt::Display for CommandBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command() {
            Command::Idle => f.write_str("command: idle"),
            Command::ChangeFilename(file) => write!(f, "command: change filename to {file}"),
            Command::GetFilename => f.write_str("command: get filename"),
            Command::Unknown(raw) => write!(f, "command: unrecognised {raw:?}"),
        }
    }
}
