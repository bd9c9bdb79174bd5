//! Fast-import Stream Parsing Module
//!
//! Contains the pull-based `StreamParser` that turns a byte source into a
//! lazy sequence of `Command` values. The parser reads one line at a time
//! with a single line of push-back, so it never holds more than the payload
//! of the command being parsed.

use super::commands::{
    Command, DataRef, FileChange, FileMode, Mark, ObjectRef, PersonStamp, Property, StampDate,
};
use crate::errors::{FastImportError, FastImportResult, ParseError, ParseErrorKind};
use crate::utils::unquote_c_string;
use crate::{ParserConfig, ResourceTracker};
use bytes::Bytes;
use phf::phf_map;
use std::io::{BufRead, Read};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Blob,
    Commit,
    Reset,
    Tag,
    Checkpoint,
    Progress,
    Feature,
    Option,
    Done,
}

static KEYWORDS: phf::Map<&'static str, Keyword> = phf_map! {
    "blob" => Keyword::Blob,
    "commit" => Keyword::Commit,
    "reset" => Keyword::Reset,
    "tag" => Keyword::Tag,
    "checkpoint" => Keyword::Checkpoint,
    "progress" => Keyword::Progress,
    "feature" => Keyword::Feature,
    "option" => Keyword::Option,
    "done" => Keyword::Done,
};

// git-fast-export writes short and zero-padded forms as well
static FILE_MODES: phf::Map<&'static str, FileMode> = phf_map! {
    "644" => FileMode::Normal,
    "100644" => FileMode::Normal,
    "0100644" => FileMode::Normal,
    "755" => FileMode::Executable,
    "100755" => FileMode::Executable,
    "0100755" => FileMode::Executable,
    "120000" => FileMode::Symlink,
    "0120000" => FileMode::Symlink,
    "160000" => FileMode::Gitlink,
    "0160000" => FileMode::Gitlink,
    "040000" => FileMode::Directory,
    "0040000" => FileMode::Directory,
};

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Split `keyword rest` at the first space
fn split_keyword(line: &[u8]) -> (&[u8], Option<&[u8]>) {
    match line.iter().position(|&b| b == b' ') {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

/// Lazy, forward-only parser over a fast-import byte stream
pub struct StreamParser<R> {
    input: R,
    line: usize,
    pushed_back: Option<Vec<u8>>,
    config: ParserConfig,
    tracker: ResourceTracker,
    done_announced: bool,
    finished: bool,
}

impl<R: BufRead> StreamParser<R> {
    pub fn new(input: R) -> Self {
        Self::with_config(input, ParserConfig::default())
    }

    pub fn with_config(input: R, config: ParserConfig) -> Self {
        Self {
            input,
            line: 0,
            pushed_back: None,
            config,
            tracker: ResourceTracker::new(),
            done_announced: false,
            finished: false,
        }
    }

    /// Number of the last line consumed (1-based)
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    /// Errors point at the line under inspection, which may be pushed back
    fn error(&self, kind: ParseErrorKind) -> FastImportError {
        let line = match self.pushed_back {
            Some(_) => self.line + 1,
            None => self.line,
        };
        ParseError::new(line, kind).into()
    }

    fn missing(&self, command: &str, section: &str) -> FastImportError {
        self.error(ParseErrorKind::MissingSection {
            command: command.to_string(),
            section: section.to_string(),
        })
    }

    fn bad_format(&self, command: &str, section: &str, text: &[u8]) -> FastImportError {
        self.error(ParseErrorKind::BadFormat {
            command: command.to_string(),
            section: section.to_string(),
            text: lossy(text),
        })
    }

    fn io_error(&self, err: &std::io::Error) -> FastImportError {
        FastImportError::io(format!("reading line {}", self.line + 1), err)
    }

    // ========== LINE LEVEL ==========

    /// Next line without its LF, or `None` at end of input
    fn next_line(&mut self) -> FastImportResult<Option<Vec<u8>>> {
        if let Some(line) = self.pushed_back.take() {
            self.line += 1;
            return Ok(Some(line));
        }
        let mut buf = Vec::new();
        let read = self
            .input
            .read_until(b'\n', &mut buf)
            .map_err(|e| self.io_error(&e))?;
        if read == 0 {
            return Ok(None);
        }
        self.line += 1;
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        Ok(Some(buf))
    }

    fn push_line(&mut self, line: Vec<u8>) {
        debug_assert!(self.pushed_back.is_none(), "only one line of lookahead");
        self.line -= 1;
        self.pushed_back = Some(line);
    }

    /// Rest of the next line if it starts with `prefix`, otherwise the line
    /// is pushed back
    fn optional_section(&mut self, prefix: &[u8]) -> FastImportResult<Option<Vec<u8>>> {
        match self.next_line()? {
            Some(line) if line.starts_with(prefix) => Ok(Some(line[prefix.len()..].to_vec())),
            Some(line) => {
                self.push_line(line);
                Ok(None)
            },
            None => Ok(None),
        }
    }

    /// Swallow the LF that may follow a payload
    fn skip_optional_lf(&mut self) -> FastImportResult<()> {
        let starts_with_lf = match self.input.fill_buf() {
            Ok(next) => next.first() == Some(&b'\n'),
            Err(e) => return Err(self.io_error(&e)),
        };
        if starts_with_lf {
            self.input.consume(1);
            self.line += 1;
        }
        Ok(())
    }

    fn read_exact_payload(&mut self, size: usize) -> FastImportResult<Vec<u8>> {
        debug_assert!(self.pushed_back.is_none());
        self.config.check_payload_size(size, self.line)?;
        let mut buf = Vec::with_capacity(size.min(64 * 1024));
        let found = self
            .input
            .by_ref()
            .take(size as u64)
            .read_to_end(&mut buf)
            .map_err(|e| self.io_error(&e))?;
        self.line += buf.iter().filter(|&&b| b == b'\n').count();
        if found != size {
            return Err(self.error(ParseErrorKind::MissingBytes {
                expected: size,
                found,
            }));
        }
        Ok(buf)
    }

    fn read_delimited_payload(&mut self, delimiter: &[u8]) -> FastImportResult<Vec<u8>> {
        debug_assert!(self.pushed_back.is_none());
        let mut data = Vec::new();
        loop {
            let mut line = Vec::new();
            let read = self
                .input
                .read_until(b'\n', &mut line)
                .map_err(|e| self.io_error(&e))?;
            if read == 0 {
                return Err(self.error(ParseErrorKind::MissingTerminator {
                    terminator: lossy(delimiter),
                }));
            }
            self.line += 1;
            if line.strip_suffix(b"\n").unwrap_or(&line[..]) == delimiter {
                return Ok(data);
            }
            data.extend_from_slice(&line);
            self.config.check_payload_size(data.len(), self.line)?;
        }
    }

    /// Parse a required `data` section
    fn expect_data(&mut self, command: &str, section: &str) -> FastImportResult<Bytes> {
        let line = match self.next_line()? {
            Some(line) => line,
            None => return Err(self.missing(command, section)),
        };
        let spec = match line.strip_prefix(b"data ") {
            Some(spec) => spec,
            None => return Err(self.missing(command, section)),
        };
        let payload = if let Some(delimiter) = spec.strip_prefix(b"<<") {
            if delimiter.is_empty() {
                return Err(self.bad_format(command, section, &line));
            }
            self.read_delimited_payload(delimiter)?
        } else {
            let size = self.parse_number::<usize>("data length", spec)?;
            let payload = self.read_exact_payload(size)?;
            self.skip_optional_lf()?;
            payload
        };
        self.tracker.track_payload(payload.len());
        Ok(Bytes::from(payload))
    }

    // ========== FIELD LEVEL ==========

    fn parse_number<T: std::str::FromStr>(&self, field: &str, text: &[u8]) -> FastImportResult<T> {
        std::str::from_utf8(text)
            .ok()
            .and_then(|s| s.parse::<T>().ok())
            .ok_or_else(|| {
                self.error(ParseErrorKind::InvalidNumber {
                    field: field.to_string(),
                    text: lossy(text),
                })
            })
    }

    fn parse_mark(&self, text: &[u8]) -> FastImportResult<Mark> {
        match text.strip_prefix(b":") {
            Some(id) if !id.is_empty() && !id.contains(&b' ') => {
                Ok(Mark(Bytes::copy_from_slice(id)))
            },
            _ => Err(self.error(ParseErrorKind::InvalidMark { text: lossy(text) })),
        }
    }

    fn parse_object_ref(&self, command: &str, section: &str, text: &[u8]) -> FastImportResult<ObjectRef> {
        if text.starts_with(b":") {
            Ok(ObjectRef::Mark(self.parse_mark(text)?))
        } else if text.is_empty() {
            Err(self.bad_format(command, section, text))
        } else {
            Ok(ObjectRef::Name(Bytes::copy_from_slice(text)))
        }
    }

    fn optional_mark(&mut self) -> FastImportResult<Option<Mark>> {
        match self.next_line()? {
            Some(line) if line.starts_with(b"mark") => {
                let text = line.strip_prefix(b"mark ").unwrap_or(&line[4..]);
                Ok(Some(self.parse_mark(text)?))
            },
            Some(line) => {
                self.push_line(line);
                Ok(None)
            },
            None => Ok(None),
        }
    }

    /// Parse `name <email> seconds tz`; a tagger may stop after the email
    fn parse_person(&self, command: &str, section: &str, text: &[u8]) -> FastImportResult<PersonStamp> {
        let bad = || self.bad_format(command, section, text);
        let lt = text.iter().position(|&b| b == b'<').ok_or_else(bad)?;
        let gt = lt + text[lt..].iter().position(|&b| b == b'>').ok_or_else(bad)?;

        let mut name = &text[..lt];
        while let Some(stripped) = name.strip_suffix(b" ") {
            name = stripped;
        }
        let email = &text[lt + 1..gt];

        let rest = &text[gt + 1..];
        let date = if rest.is_empty() && section == "tagger" {
            None
        } else {
            Some(self.parse_date(section, rest).ok_or_else(bad)??)
        };

        Ok(PersonStamp {
            name: Bytes::copy_from_slice(name),
            email: Bytes::copy_from_slice(email),
            date,
        })
    }

    /// ` seconds tz` after the email; `None` when the layout is wrong
    fn parse_date(&self, section: &str, text: &[u8]) -> Option<FastImportResult<StampDate>> {
        let when = text.strip_prefix(b" ")?;
        let (seconds, timezone) = match split_keyword(when) {
            (seconds, Some(timezone)) => (seconds, timezone),
            _ => return None,
        };
        let tz_valid = timezone.len() > 1
            && (timezone[0] == b'+' || timezone[0] == b'-')
            && timezone[1..].iter().all(u8::is_ascii_digit);
        if !tz_valid {
            return None;
        }
        Some(
            self.parse_number::<i64>(&format!("{} timestamp", section), seconds)
                .map(|timestamp| StampDate {
                    timestamp,
                    timezone: Bytes::copy_from_slice(timezone),
                }),
        )
    }

    fn optional_person(&mut self, command: &str, section: &str) -> FastImportResult<Option<PersonStamp>> {
        let prefix = format!("{} ", section);
        match self.optional_section(prefix.as_bytes())? {
            Some(rest) => Ok(Some(self.parse_person(command, section, &rest)?)),
            None => Ok(None),
        }
    }

    fn parse_path(&self, command: &str, text: &[u8]) -> FastImportResult<Bytes> {
        let path = if let Some(quoted) = text.strip_prefix(b"\"") {
            let inner = quoted
                .strip_suffix(b"\"")
                .ok_or_else(|| self.bad_format(command, "path", text))?;
            unquote_c_string(inner).ok_or_else(|| self.bad_format(command, "path", text))?
        } else {
            text.to_vec()
        };
        if path.first() == Some(&b'/') {
            return Err(self.error(ParseErrorKind::InvalidPath {
                path: lossy(&path),
                reason: "paths must be relative".to_string(),
            }));
        }
        Ok(Bytes::from(path))
    }

    /// Parse `src dst` where `src` is quoted if it contains a space
    fn parse_path_pair(&self, command: &str, text: &[u8]) -> FastImportResult<(Bytes, Bytes)> {
        let split_at = if text.starts_with(b"\"") {
            let mut i = 1;
            let mut closing = None;
            while i < text.len() {
                match text[i] {
                    b'\\' => i += 2,
                    b'"' => {
                        closing = Some(i);
                        break;
                    },
                    _ => i += 1,
                }
            }
            closing.map(|end| end + 1)
        } else {
            text.iter().position(|&b| b == b' ')
        };
        match split_at {
            Some(pos) if text.get(pos) == Some(&b' ') => {
                let src = self.parse_path(command, &text[..pos])?;
                let dst = self.parse_path(command, &text[pos + 1..])?;
                Ok((src, dst))
            },
            _ => Err(self.bad_format(command, "path", text)),
        }
    }

    fn parse_property(&mut self, text: &[u8]) -> FastImportResult<Property> {
        let mut parts = text.splitn(3, |&b| b == b' ');
        let name = Bytes::copy_from_slice(parts.next().unwrap_or_default());
        let size = match parts.next() {
            Some(size) => self.parse_number::<usize>("property length", size)?,
            None => return Ok(Property { name, value: None }),
        };
        let mut value = parts.next().unwrap_or_default().to_vec();
        if value.len() > size {
            return Err(self.bad_format("commit", "property", text));
        }
        if value.len() < size {
            // the line break belongs to the value
            value.push(b'\n');
            let rest = self.read_exact_payload(size - value.len())?;
            value.extend_from_slice(&rest);
            self.skip_optional_lf()?;
        }
        Ok(Property {
            name,
            value: Some(Bytes::from(value)),
        })
    }

    // ========== COMMAND LEVEL ==========

    fn parse_blob(&mut self) -> FastImportResult<Command> {
        let mark = self.optional_mark()?;
        let data = self.expect_data("blob", "data")?;
        Ok(Command::Blob { mark, data })
    }

    fn parse_commit(&mut self, reference: Bytes) -> FastImportResult<Command> {
        let mark = self.optional_mark()?;
        let author = self.optional_person("commit", "author")?;
        let mut more_authors = Vec::new();
        if author.is_some() {
            while let Some(extra) = self.optional_person("commit", "author")? {
                more_authors.push(extra);
            }
        }
        let committer = self.optional_person("commit", "committer")?;
        let message = self.expect_data("commit", "message")?;

        let from = match self.optional_section(b"from ")? {
            Some(rest) => Some(self.parse_object_ref("commit", "from", &rest)?),
            None => None,
        };

        let mut merges = Vec::new();
        while let Some(rest) = self.optional_section(b"merge ")? {
            // git-fast-export may put several parents on one merge line
            for token in rest.split(|&b| b == b' ').filter(|t| !t.is_empty()) {
                merges.push(self.parse_object_ref("commit", "merge", token)?);
            }
        }

        let mut properties = Vec::new();
        while let Some(rest) = self.optional_section(b"property ")? {
            properties.push(self.parse_property(&rest)?);
        }

        let file_changes = self.parse_file_changes()?;

        Ok(Command::Commit {
            reference,
            mark,
            author,
            more_authors,
            committer,
            message,
            from,
            merges,
            properties,
            file_changes,
        })
    }

    fn parse_file_modify(&mut self, text: &[u8]) -> FastImportResult<FileChange> {
        let mut parts = text.splitn(3, |&b| b == b' ');
        let (mode_text, dataref_text, path_text) = match (parts.next(), parts.next(), parts.next()) {
            (Some(mode), Some(dataref), Some(path)) => (mode, dataref, path),
            _ => return Err(self.bad_format("filemodify", "M", text)),
        };

        let mode = std::str::from_utf8(mode_text)
            .ok()
            .and_then(|m| FILE_MODES.get(m))
            .copied()
            .ok_or_else(|| self.bad_format("filemodify", "mode", mode_text))?;
        let path = self.parse_path("filemodify", path_text)?;

        let dataref = if dataref_text == b"inline" {
            DataRef::Inline(self.expect_data("filemodify", "data")?)
        } else if dataref_text.starts_with(b":") {
            DataRef::Mark(self.parse_mark(dataref_text)?)
        } else if dataref_text.is_empty() {
            return Err(self.bad_format("filemodify", "dataref", text));
        } else {
            DataRef::Object(Bytes::copy_from_slice(dataref_text))
        };

        Ok(FileChange::Modify {
            path,
            mode,
            dataref,
        })
    }

    /// File changes run until a blank line or the first line that is not one
    fn parse_file_changes(&mut self) -> FastImportResult<Vec<FileChange>> {
        let mut changes = Vec::new();
        while let Some(line) = self.next_line()? {
            if line.is_empty() {
                // optional LF closing the commit
                break;
            }
            if line.starts_with(b"#") {
                continue;
            }
            let change = if let Some(rest) = line.strip_prefix(b"M ") {
                self.parse_file_modify(rest)?
            } else if let Some(rest) = line.strip_prefix(b"D ") {
                FileChange::Delete {
                    path: self.parse_path("filedelete", rest)?,
                }
            } else if let Some(rest) = line.strip_prefix(b"R ") {
                let (src, dst) = self.parse_path_pair("filerename", rest)?;
                FileChange::Rename { src, dst }
            } else if let Some(rest) = line.strip_prefix(b"C ") {
                let (src, dst) = self.parse_path_pair("filecopy", rest)?;
                FileChange::Copy { src, dst }
            } else if line == b"deleteall" {
                FileChange::DeleteAll
            } else {
                self.push_line(line);
                break;
            };
            changes.push(change);
        }
        Ok(changes)
    }

    fn parse_reset(&mut self, reference: Bytes) -> FastImportResult<Command> {
        let from = match self.optional_section(b"from ")? {
            Some(rest) => Some(self.parse_object_ref("reset", "from", &rest)?),
            None => None,
        };
        Ok(Command::Reset { reference, from })
    }

    fn parse_tag(&mut self, name: Bytes) -> FastImportResult<Command> {
        let from = match self.optional_section(b"from ")? {
            Some(rest) => self.parse_object_ref("tag", "from", &rest)?,
            None => return Err(self.missing("tag", "from")),
        };
        let tagger = self.optional_person("tag", "tagger")?;
        let message = self.expect_data("tag", "message")?;
        Ok(Command::Tag {
            name,
            from,
            tagger,
            message,
        })
    }

    fn parse_feature(&mut self, text: &[u8]) -> Command {
        let (name, value) = match text.iter().position(|&b| b == b'=') {
            Some(pos) => (&text[..pos], Some(Bytes::copy_from_slice(&text[pos + 1..]))),
            None => (text, None),
        };
        if name == b"done" {
            self.done_announced = true;
        }
        Command::Feature {
            name: Bytes::copy_from_slice(name),
            value,
        }
    }

    fn required_argument(&self, command: &str, section: &str, rest: Option<&[u8]>) -> FastImportResult<Bytes> {
        match rest {
            Some(arg) if !arg.is_empty() => Ok(Bytes::copy_from_slice(arg)),
            _ => Err(self.missing(command, section)),
        }
    }

    /// Parse the next top-level command, `None` at end of stream
    pub fn next_command(&mut self) -> FastImportResult<Option<Command>> {
        loop {
            let line = match self.next_line()? {
                Some(line) => line,
                None => {
                    if self.done_announced || self.config.require_done {
                        return Err(self.error(ParseErrorKind::PrematureEndOfStream));
                    }
                    return Ok(None);
                },
            };
            if line.is_empty() {
                continue;
            }

            self.tracker.track_command(&self.config, self.line)?;

            if let Some(text) = line.strip_prefix(b"#") {
                return Ok(Some(Command::Comment {
                    text: Bytes::copy_from_slice(text),
                }));
            }

            let (keyword_text, rest) = split_keyword(&line);
            let keyword = std::str::from_utf8(keyword_text)
                .ok()
                .and_then(|k| KEYWORDS.get(k))
                .copied()
                .ok_or_else(|| {
                    self.error(ParseErrorKind::InvalidCommand {
                        command: lossy(&line),
                    })
                })?;
            tracing::trace!(line = self.line, ?keyword, "parsing command");

            let command = match keyword {
                Keyword::Blob => self.parse_blob()?,
                Keyword::Commit => {
                    let reference = self.required_argument("commit", "ref", rest)?;
                    self.parse_commit(reference)?
                },
                Keyword::Reset => {
                    let reference = self.required_argument("reset", "ref", rest)?;
                    self.parse_reset(reference)?
                },
                Keyword::Tag => {
                    let name = self.required_argument("tag", "name", rest)?;
                    self.parse_tag(name)?
                },
                Keyword::Checkpoint => Command::Checkpoint,
                Keyword::Progress => Command::Progress {
                    text: Bytes::copy_from_slice(rest.unwrap_or_default()),
                },
                Keyword::Feature => {
                    let text = self.required_argument("feature", "name", rest)?;
                    self.parse_feature(&text)
                },
                Keyword::Option => Command::Option {
                    value: self.required_argument("option", "value", rest)?,
                },
                Keyword::Done => {
                    // nothing after `done` is read
                    self.finished = true;
                    Command::Done
                },
            };
            return Ok(Some(command));
        }
    }
}

impl<R: BufRead> Iterator for StreamParser<R> {
    type Item = FastImportResult<Command>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_command() {
            Ok(Some(command)) => Some(Ok(command)),
            Ok(None) => {
                self.finished = true;
                None
            },
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            },
        }
    }
}
