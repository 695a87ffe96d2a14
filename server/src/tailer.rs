//! Non-blocking reader over the game server's append-only log.
//!
//! On startup [`LogTailer::recover_start`] walks backwards from the end of
//! the file in fixed windows until it finds the newest InitGame line, so the
//! match can be classified when the bot attaches mid-game. Tailing then
//! starts after the last complete line, so a line still being written when
//! the bot attaches is read in full once its newline arrives. [`LogTailer::next_line`] only ever yields
//! complete, newline-terminated lines; a trailing partial line stays
//! buffered until its newline arrives.

use log::{debug, warn};
use shared::event::{category, Category};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Bytes read per step of the backward InitGame search
pub const RECOVERY_WINDOW: u64 = 768;
/// Upper bound of a single forward read
const READ_CHUNK: u64 = 64 * 1024;

pub struct LogTailer {
    path: PathBuf,
    file: File,
    /// Offset of the next byte to read
    position: u64,
    /// Bytes after the last newline seen so far
    partial: Vec<u8>,
    ready: VecDeque<String>,
}

impl LogTailer {
    /// Opens the log with the cursor at the start of the file
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            file,
            position: 0,
            partial: Vec::new(),
            ready: VecDeque::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Finds the newest InitGame line and moves the cursor past the last
    /// complete line.
    ///
    /// A line split across two windows is reassembled from the bytes carried
    /// over from the later window. Returns `None` if the file holds no
    /// complete InitGame line.
    pub fn recover_start(&mut self) -> io::Result<Option<String>> {
        let len = self.file.metadata()?.len();
        let mut end = len;
        let mut carry: Vec<u8> = Vec::new();
        let mut found = None;

        while end > 0 {
            let start = end.saturating_sub(RECOVERY_WINDOW);
            let mut chunk = vec![0u8; (end - start) as usize];
            self.file.seek(SeekFrom::Start(start))?;
            self.file.read_exact(&mut chunk)?;
            chunk.extend_from_slice(&carry);

            // bytes before the first newline may continue an earlier line
            let first_line = if start == 0 {
                0
            } else {
                match chunk.iter().position(|&b| b == b'\n') {
                    Some(index) => index + 1,
                    None => {
                        carry = chunk;
                        end = start;
                        continue;
                    }
                }
            };

            // the last segment is either empty or an unterminated line
            found = chunk[first_line..]
                .split(|&b| b == b'\n')
                .rev()
                .skip(1)
                .map(|line| String::from_utf8_lossy(line).trim_end_matches('\r').to_string())
                .find(|line| category(line) == Some(Category::InitGame));
            if found.is_some() {
                break;
            }

            carry = chunk[..first_line].to_vec();
            end = start;
        }

        self.position = self.last_line_end(len)?;
        self.partial.clear();
        self.ready.clear();
        debug!(
            "Recovered {} at offset {}: {}",
            self.path.display(),
            self.position,
            if found.is_some() { "InitGame found" } else { "no InitGame" }
        );
        Ok(found)
    }

    /// Offset just after the last newline before `len`, 0 if there is none
    fn last_line_end(&mut self, len: u64) -> io::Result<u64> {
        let mut end = len;
        while end > 0 {
            let start = end.saturating_sub(RECOVERY_WINDOW);
            let mut chunk = vec![0u8; (end - start) as usize];
            self.file.seek(SeekFrom::Start(start))?;
            self.file.read_exact(&mut chunk)?;
            if let Some(index) = chunk.iter().rposition(|&b| b == b'\n') {
                return Ok(start + index as u64 + 1);
            }
            end = start;
        }
        Ok(0)
    }

    /// Next complete line, or `None` if nothing new has been written.
    ///
    /// When the file is shorter than the cursor it was truncated in place:
    /// the cursor rewinds to the start and the partial buffer is dropped.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        if let Some(line) = self.ready.pop_front() {
            return Ok(Some(line));
        }

        let len = self.file.metadata()?.len();
        if len < self.position {
            warn!(
                "{} shrank from {} to {} bytes, reading from the start",
                self.path.display(),
                self.position,
                len
            );
            self.position = 0;
            self.partial.clear();
        }
        if len == self.position {
            return Ok(None);
        }

        let want = (len - self.position).min(READ_CHUNK) as usize;
        let mut buffer = vec![0u8; want];
        self.file.seek(SeekFrom::Start(self.position))?;
        let read = self.file.read(&mut buffer)?;
        buffer.truncate(read);
        self.position += read as u64;
        self.partial.extend_from_slice(&buffer);

        while let Some(index) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=index).collect();
            let text = String::from_utf8_lossy(&line[..index]);
            self.ready.push_back(text.trim_end_matches('\r').to_string());
        }
        Ok(self.ready.pop_front())
    }
}
