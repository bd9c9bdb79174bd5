//! Fast-import Command Serialization Module
//!
//! Writes `Command` values back to the wire format. Output always uses
//! exact-length `data` blocks, canonical six-digit file modes and C-style
//! quoting only for paths that would not survive unquoted.

use super::commands::{
    Command, DataRef, FileChange, FileMode, Mark, ObjectRef, PersonStamp, Property,
};
use crate::traits::FastImportWriter;
use crate::utils::{needs_quoting, quote_c_string};
use bytes::{BufMut, BytesMut};

impl FileMode {
    /// Canonical octal form used on output
    pub fn as_octal(&self) -> &'static str {
        match self {
            FileMode::Normal => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Gitlink => "160000",
            FileMode::Directory => "040000",
        }
    }
}

fn put_line(buffer: &mut BytesMut, parts: &[&[u8]]) {
    for part in parts {
        buffer.put_slice(part);
    }
    buffer.put_u8(b'\n');
}

fn put_data(buffer: &mut BytesMut, data: &[u8]) {
    buffer.put_slice(format!("data {}\n", data.len()).as_bytes());
    buffer.put_slice(data);
    buffer.put_u8(b'\n');
}

fn put_path(buffer: &mut BytesMut, path: &[u8], space_sensitive: bool) {
    if needs_quoting(path, space_sensitive) {
        buffer.put_slice(&quote_c_string(path));
    } else {
        buffer.put_slice(path);
    }
}

fn put_person(buffer: &mut BytesMut, section: &str, person: &PersonStamp) {
    buffer.put_slice(section.as_bytes());
    buffer.put_u8(b' ');
    person.write_to(buffer);
    buffer.put_u8(b'\n');
}

impl FastImportWriter for Mark {
    fn write_to(&self, buffer: &mut BytesMut) {
        buffer.put_u8(b':');
        buffer.put_slice(&self.0);
    }
}

impl FastImportWriter for ObjectRef {
    fn write_to(&self, buffer: &mut BytesMut) {
        match self {
            ObjectRef::Mark(mark) => mark.write_to(buffer),
            ObjectRef::Name(name) => buffer.put_slice(name),
        }
    }
}

impl FastImportWriter for PersonStamp {
    fn write_to(&self, buffer: &mut BytesMut) {
        if !self.name.is_empty() {
            buffer.put_slice(&self.name);
            buffer.put_u8(b' ');
        }
        buffer.put_u8(b'<');
        buffer.put_slice(&self.email);
        buffer.put_u8(b'>');
        if let Some(date) = &self.date {
            buffer.put_slice(format!(" {} ", date.timestamp).as_bytes());
            buffer.put_slice(&date.timezone);
        }
    }
}

impl FastImportWriter for Property {
    fn write_to(&self, buffer: &mut BytesMut) {
        buffer.put_slice(b"property ");
        buffer.put_slice(&self.name);
        if let Some(value) = &self.value {
            buffer.put_slice(format!(" {} ", value.len()).as_bytes());
            buffer.put_slice(value);
        }
        buffer.put_u8(b'\n');
    }
}

impl FastImportWriter for FileChange {
    fn write_to(&self, buffer: &mut BytesMut) {
        match self {
            FileChange::Modify {
                path,
                mode,
                dataref,
            } => {
                buffer.put_slice(b"M ");
                buffer.put_slice(mode.as_octal().as_bytes());
                buffer.put_u8(b' ');
                match dataref {
                    DataRef::Mark(mark) => mark.write_to(buffer),
                    DataRef::Inline(_) => buffer.put_slice(b"inline"),
                    DataRef::Object(id) => buffer.put_slice(id),
                }
                buffer.put_u8(b' ');
                put_path(buffer, path, false);
                buffer.put_u8(b'\n');
                if let DataRef::Inline(data) = dataref {
                    put_data(buffer, data);
                }
            },
            FileChange::Delete { path } => {
                buffer.put_slice(b"D ");
                put_path(buffer, path, false);
                buffer.put_u8(b'\n');
            },
            FileChange::Copy { src, dst } | FileChange::Rename { src, dst } => {
                let op: &[u8] = if matches!(self, FileChange::Copy { .. }) { b"C " } else { b"R " };
                buffer.put_slice(op);
                put_path(buffer, src, true);
                buffer.put_u8(b' ');
                put_path(buffer, dst, false);
                buffer.put_u8(b'\n');
            },
            FileChange::DeleteAll => buffer.put_slice(b"deleteall\n"),
        }
    }
}

impl FastImportWriter for Command {
    fn write_to(&self, buffer: &mut BytesMut) {
        match self {
            Command::Blob { mark, data } => {
                buffer.put_slice(b"blob\n");
                if let Some(mark) = mark {
                    buffer.put_slice(b"mark ");
                    mark.write_to(buffer);
                    buffer.put_u8(b'\n');
                }
                put_data(buffer, data);
            },
            Command::Commit {
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
            } => {
                put_line(buffer, &[b"commit ", &reference[..]]);
                if let Some(mark) = mark {
                    buffer.put_slice(b"mark ");
                    mark.write_to(buffer);
                    buffer.put_u8(b'\n');
                }
                for person in author.iter().chain(more_authors) {
                    put_person(buffer, "author", person);
                }
                if let Some(committer) = committer {
                    put_person(buffer, "committer", committer);
                }
                put_data(buffer, message);
                if let Some(from) = from {
                    buffer.put_slice(b"from ");
                    from.write_to(buffer);
                    buffer.put_u8(b'\n');
                }
                for merge in merges {
                    buffer.put_slice(b"merge ");
                    merge.write_to(buffer);
                    buffer.put_u8(b'\n');
                }
                for property in properties {
                    property.write_to(buffer);
                }
                for change in file_changes {
                    change.write_to(buffer);
                }
                buffer.put_u8(b'\n');
            },
            Command::Reset { reference, from } => {
                put_line(buffer, &[b"reset ", &reference[..]]);
                if let Some(from) = from {
                    buffer.put_slice(b"from ");
                    from.write_to(buffer);
                    buffer.put_u8(b'\n');
                }
                buffer.put_u8(b'\n');
            },
            Command::Tag {
                name,
                from,
                tagger,
                message,
            } => {
                put_line(buffer, &[b"tag ", &name[..]]);
                buffer.put_slice(b"from ");
                from.write_to(buffer);
                buffer.put_u8(b'\n');
                if let Some(tagger) = tagger {
                    put_person(buffer, "tagger", tagger);
                }
                put_data(buffer, message);
            },
            Command::Checkpoint => buffer.put_slice(b"checkpoint\n"),
            Command::Progress { text } => put_line(buffer, &[b"progress ", &text[..]]),
            Command::Feature { name, value } => match value {
                Some(value) => put_line(buffer, &[b"feature ", &name[..], b"=", &value[..]]),
                None => put_line(buffer, &[b"feature ", &name[..]]),
            },
            Command::Option { value } => put_line(buffer, &[b"option ", &value[..]]),
            Command::Comment { text } => put_line(buffer, &[b"#", &text[..]]),
            Command::Done => buffer.put_slice(b"done\n"),
        }
    }
}
