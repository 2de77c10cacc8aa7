// Read specifiers and sequential table readers.
//
//   ark[,opts]:PATH   text archive: `KEY` line, object lines, blank line
//   scp[,opts]:PATH   script: `KEY PATH` lines, one object file per PATH
//   PATH              a single object
//
// PATH `-` is standard input. Only text-mode objects are read; a binary
// archive entry (`KEY \0B...`) or object file (`\0B...`) is rejected.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};

use latsearch_fst::FstError;

use crate::CliError;

/// Marker in front of binary-mode objects.
const BINARY_MARKER: &[u8] = b"\0B";

/// Options accepted after `ark,` / `scp,`. They only matter for random
/// access or binary input, so they are checked and otherwise ignored.
const KNOWN_OPTIONS: &[&str] = &["o", "no", "s", "ns", "cs", "ncs", "p", "t", "b", "bg"];

/// Where a table (or single object) comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rspecifier {
    Archive(String),
    Script(String),
    File(String),
}

impl Rspecifier {
    pub fn parse(spec: &str) -> Result<Self, CliError> {
        let spec = spec.trim();
        let table = ["ark", "scp"]
            .into_iter()
            .find(|kind| {
                spec.starts_with(&format!("{kind}:")) || spec.starts_with(&format!("{kind},"))
            });
        let Some(kind) = table else {
            if spec.is_empty() {
                return Err(CliError::Rspecifier("empty rspecifier".to_string()));
            }
            if spec.ends_with('|') {
                return Err(CliError::Rspecifier(format!("{spec}: pipes are not supported")));
            }
            return Ok(Rspecifier::File(spec.to_string()));
        };

        let Some((prefix, path)) = spec.split_once(':') else {
            return Err(CliError::Rspecifier(format!("{spec}: missing ':'")));
        };
        for opt in prefix.split(',').skip(1) {
            if !KNOWN_OPTIONS.contains(&opt) {
                return Err(CliError::Rspecifier(format!("{spec}: unknown option {opt:?}")));
            }
        }
        if path.is_empty() {
            return Err(CliError::Rspecifier(format!("{spec}: missing path")));
        }
        Ok(match kind {
            "ark" => Rspecifier::Archive(path.to_string()),
            _ => Rspecifier::Script(path.to_string()),
        })
    }

    pub fn is_table(&self) -> bool {
        !matches!(self, Rspecifier::File(_))
    }

    pub fn path(&self) -> &str {
        match self {
            Rspecifier::Archive(p) | Rspecifier::Script(p) | Rspecifier::File(p) => p,
        }
    }
}

/// One keyed object of a table: its text lines and where they start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub key: String,
    pub lines: Vec<String>,
    /// Line number of `lines[0]` in its file.
    pub first_line: usize,
}

impl TableEntry {
    pub fn line_strs(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}

/// Open `path` for buffered reading; `-` is standard input.
pub fn open_input(path: &str) -> Result<Box<dyn BufRead>, CliError> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).map_err(|source| CliError::Io {
        path: path.to_string(),
        source,
    })?;
    Ok(Box::new(BufReader::new(file)))
}

/// Read a whole single-object file as text lines.
pub fn read_object(path: &str) -> Result<Vec<String>, CliError> {
    let mut bytes = Vec::new();
    open_input(path)?
        .read_to_end(&mut bytes)
        .map_err(|source| CliError::Io {
            path: path.to_string(),
            source,
        })?;
    if bytes.starts_with(BINARY_MARKER) {
        return Err(CliError::UnsupportedBinary(path.to_string()));
    }
    let text = String::from_utf8(bytes).map_err(|_| not_utf8(path, 1))?;
    Ok(text.lines().map(str::to_string).collect())
}

fn not_utf8(path: &str, line: usize) -> CliError {
    CliError::Parse {
        what: path.to_string(),
        source: FstError::Parse {
            line,
            message: "invalid UTF-8".to_string(),
        },
    }
}

/// Sequential reader over a text archive.
pub struct ArchiveReader<R> {
    input: R,
    path: String,
    line_no: usize,
}

impl<R: BufRead> ArchiveReader<R> {
    pub fn new(input: R, path: impl Into<String>) -> Self {
        ArchiveReader {
            input,
            path: path.into(),
            line_no: 0,
        }
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>, CliError> {
        let mut buf = Vec::new();
        let n = self
            .input
            .read_until(b'\n', &mut buf)
            .map_err(|source| CliError::Io {
                path: self.path.clone(),
                source,
            })?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        Ok(Some(buf))
    }

    fn text(&self, bytes: Vec<u8>) -> Result<String, CliError> {
        String::from_utf8(bytes).map_err(|_| not_utf8(&self.path, self.line_no))
    }

    fn read_entry(&mut self) -> Result<Option<TableEntry>, CliError> {
        let header = loop {
            match self.read_line()? {
                None => return Ok(None),
                Some(line) if is_blank(&line) => continue,
                Some(line) => break line,
            }
        };

        let start = header.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(0);
        let key_len = header[start..]
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .unwrap_or(header.len() - start);
        let rest = &header[start + key_len..];
        let key = self.text(header[start..start + key_len].to_vec())?;
        if rest.windows(BINARY_MARKER.len()).any(|w| w == BINARY_MARKER) {
            return Err(CliError::UnsupportedBinary(format!("{} (key {key})", self.path)));
        }

        let first_line = self.line_no + 1;
        let mut lines = Vec::new();
        while let Some(line) = self.read_line()? {
            if is_blank(&line) {
                break;
            }
            lines.push(self.text(line)?);
        }
        Ok(Some(TableEntry {
            key,
            lines,
            first_line,
        }))
    }
}

impl<R: BufRead> Iterator for ArchiveReader<R> {
    type Item = Result<TableEntry, CliError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_entry().transpose()
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}

/// Sequential reader over a script file of `KEY PATH` lines.
pub struct ScriptReader<R> {
    input: R,
    path: String,
    line_no: usize,
}

impl<R: BufRead> ScriptReader<R> {
    pub fn new(input: R, path: impl Into<String>) -> Self {
        ScriptReader {
            input,
            path: path.into(),
            line_no: 0,
        }
    }

    fn read_entry(&mut self) -> Result<Option<TableEntry>, CliError> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.input.read_line(&mut line).map_err(|source| CliError::Io {
                path: self.path.clone(),
                source,
            })?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if !line.trim().is_empty() {
                break;
            }
        }

        let trimmed = line.trim();
        let Some((key, object_path)) = trimmed.split_once(char::is_whitespace) else {
            return Err(CliError::Rspecifier(format!(
                "{}:{}: expected `KEY PATH`, got {trimmed:?}",
                self.path, self.line_no
            )));
        };
        Ok(Some(TableEntry {
            key: key.to_string(),
            lines: read_object(object_path.trim())?,
            first_line: 1,
        }))
    }
}

impl<R: BufRead> Iterator for ScriptReader<R> {
    type Item = Result<TableEntry, CliError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_entry().transpose()
    }
}

/// Sequential reader over any rspecifier. A single file reads as a
/// one-entry table keyed by its path.
pub enum TableReader {
    Archive(ArchiveReader<Box<dyn BufRead>>),
    Script(ScriptReader<Box<dyn BufRead>>),
    Single(Option<String>),
}

impl TableReader {
    pub fn open(spec: &Rspecifier) -> Result<Self, CliError> {
        Ok(match spec {
            Rspecifier::Archive(path) => {
                TableReader::Archive(ArchiveReader::new(open_input(path)?, path.as_str()))
            }
            Rspecifier::Script(path) => {
                TableReader::Script(ScriptReader::new(open_input(path)?, path.as_str()))
            }
            Rspecifier::File(path) => TableReader::Single(Some(path.clone())),
        })
    }
}

impl Iterator for TableReader {
    type Item = Result<TableEntry, CliError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            TableReader::Archive(reader) => reader.next(),
            TableReader::Script(reader) => reader.next(),
            TableReader::Single(path) => {
                let path = path.take()?;
                Some(read_object(&path).map(|lines| TableEntry {
                    key: path,
                    lines,
                    first_line: 1,
                }))
            }
        }
    }
}
