//! Fast-import Command Definitions
//!
//! Contains the `Command` enum covering every top-level fast-import command
//! and the `FileChange` enum for the file operations inside a commit. All
//! byte-oriented fields (paths, messages, identities) are kept as raw
//! `Bytes` and never decoded.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Stream-local identifier written as `:<id>` on the wire
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Hash)]
pub struct Mark(pub Bytes);

impl Mark {
    pub fn new(id: impl Into<Bytes>) -> Self {
        Mark(id.into())
    }

    pub fn id(&self) -> &[u8] {
        &self.0
    }
}

/// Target of a `from`, `merge` or tag `from` line
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Hash)]
pub enum ObjectRef {
    Mark(Mark),
    /// A ref name or object id, kept verbatim
    Name(Bytes),
}

impl ObjectRef {
    pub fn mark(id: impl Into<Bytes>) -> Self {
        ObjectRef::Mark(Mark::new(id))
    }

    pub fn as_mark(&self) -> Option<&Mark> {
        match self {
            ObjectRef::Mark(mark) => Some(mark),
            ObjectRef::Name(_) => None,
        }
    }
}

/// Source of the content of a modified file
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Hash)]
pub enum DataRef {
    Mark(Mark),
    /// Content given right after the `M` line
    Inline(Bytes),
    /// Object id, kept verbatim
    Object(Bytes),
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
pub enum FileMode {
    Normal,
    Executable,
    Symlink,
    Gitlink,
    Directory,
}

/// Who and when, as found on `author`, `committer` and `tagger` lines
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Hash)]
pub struct PersonStamp {
    pub name: Bytes,
    pub email: Bytes,
    /// Always present on commits; a tagger may omit it
    pub date: Option<StampDate>,
}

impl PersonStamp {
    pub fn new(name: impl Into<Bytes>, email: impl Into<Bytes>, timestamp: i64, timezone: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            date: Some(StampDate {
                timestamp,
                timezone: timezone.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Hash)]
pub struct StampDate {
    /// Seconds since the epoch
    pub timestamp: i64,
    /// Raw offset as written, e.g. `+0100`
    pub timezone: Bytes,
}

/// A `property` line of the commit-properties feature
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Hash)]
pub struct Property {
    pub name: Bytes,
    pub value: Option<Bytes>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Hash)]
pub enum FileChange {
    Modify {
        path: Bytes,
        mode: FileMode,
        dataref: DataRef,
    },
    Delete {
        path: Bytes,
    },
    Copy {
        src: Bytes,
        dst: Bytes,
    },
    Rename {
        src: Bytes,
        dst: Bytes,
    },
    DeleteAll,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Hash)]
pub enum Command {
    Blob {
        mark: Option<Mark>,
        data: Bytes,
    },
    Commit {
        /// Branch the commit is made on
        reference: Bytes,
        mark: Option<Mark>,
        author: Option<PersonStamp>,
        more_authors: Vec<PersonStamp>,
        committer: Option<PersonStamp>,
        message: Bytes,
        from: Option<ObjectRef>,
        merges: Vec<ObjectRef>,
        properties: Vec<Property>,
        file_changes: Vec<FileChange>,
    },
    Reset {
        reference: Bytes,
        from: Option<ObjectRef>,
    },
    Tag {
        name: Bytes,
        from: ObjectRef,
        tagger: Option<PersonStamp>,
        message: Bytes,
    },
    Checkpoint,
    Progress {
        text: Bytes,
    },
    Feature {
        name: Bytes,
        value: Option<Bytes>,
    },
    Option {
        value: Bytes,
    },
    Comment {
        text: Bytes,
    },
    /// Explicit end of stream
    Done,
}

impl Command {
    /// Wire keyword of the command, used for logging
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::Blob { .. } => "blob",
            Command::Commit { .. } => "commit",
            Command::Reset { .. } => "reset",
            Command::Tag { .. } => "tag",
            Command::Checkpoint => "checkpoint",
            Command::Progress { .. } => "progress",
            Command::Feature { .. } => "feature",
            Command::Option { .. } => "option",
            Command::Comment { .. } => "#",
            Command::Done => "done",
        }
    }

    /// Mark defined by this command, if any
    pub fn mark(&self) -> Option<&Mark> {
        match self {
            Command::Blob { mark, .. } | Command::Commit { mark, .. } => mark.as_ref(),
            _ => None,
        }
    }
}
