//! Fast-import stream builders
//!
//! Fluent builders for assembling command streams in tests, plus a few
//! canned histories shared by the integration tests.

use bytes::{Bytes, BytesMut};
use fast_import_filter::{
    Command, DataRef, FastImportWriter, FileChange, FileMode, Mark, ObjectRef, PersonStamp,
};

const BASE_TIMESTAMP: i64 = 1_700_000_000;

/// Main builder for a command stream. Commits get increasing committer
/// timestamps so every one of them is distinct.
#[derive(Debug, Default)]
pub struct StreamBuilder {
    commands: Vec<Command>,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blob(mut self, mark: &str, content: &str) -> Self {
        self.commands.push(Command::Blob {
            mark: Some(Mark::new(mark.to_string())),
            data: Bytes::from(content.to_string()),
        });
        self
    }

    /// Add a commit on `reference`, configured through `f`
    pub fn commit<F>(mut self, reference: &str, f: F) -> Self
    where
        F: FnOnce(CommitBuilder) -> CommitBuilder,
    {
        let tick = self.commands.len() as i64;
        let builder = CommitBuilder::new(reference, BASE_TIMESTAMP + tick);
        self.commands.push(f(builder).build());
        self
    }

    pub fn reset(mut self, reference: &str, from: Option<&str>) -> Self {
        self.commands.push(Command::Reset {
            reference: Bytes::from(reference.to_string()),
            from: from.map(object_ref),
        });
        self
    }

    pub fn tag(mut self, name: &str, from: &str, message: &str) -> Self {
        self.commands.push(Command::Tag {
            name: Bytes::from(name.to_string()),
            from: object_ref(from),
            tagger: Some(person("Tagger", BASE_TIMESTAMP)),
            message: Bytes::from(message.to_string()),
        });
        self
    }

    pub fn progress(mut self, text: &str) -> Self {
        self.commands.push(Command::Progress {
            text: Bytes::from(text.to_string()),
        });
        self
    }

    /// `text` is written right after the `#`
    pub fn comment(mut self, text: &str) -> Self {
        self.commands.push(Command::Comment {
            text: Bytes::from(text.to_string()),
        });
        self
    }

    pub fn done(mut self) -> Self {
        self.commands.push(Command::Done);
        self
    }

    pub fn build(self) -> Vec<Command> {
        self.commands
    }

    /// Serialize to the wire format
    pub fn build_bytes(self) -> Vec<u8> {
        let mut buffer = BytesMut::new();
        for command in &self.commands {
            command.write_to(&mut buffer);
        }
        buffer.to_vec()
    }
}

/// Builder for a single commit
#[derive(Debug)]
pub struct CommitBuilder {
    reference: Bytes,
    mark: Option<Mark>,
    committer: PersonStamp,
    message: Bytes,
    from: Option<ObjectRef>,
    merges: Vec<ObjectRef>,
    file_changes: Vec<FileChange>,
}

impl CommitBuilder {
    fn new(reference: &str, timestamp: i64) -> Self {
        Self {
            reference: Bytes::from(reference.to_string()),
            mark: None,
            committer: person("Dev", timestamp),
            message: Bytes::from_static(b"change\n"),
            from: None,
            merges: Vec::new(),
            file_changes: Vec::new(),
        }
    }

    pub fn mark(mut self, mark: &str) -> Self {
        self.mark = Some(Mark::new(mark.to_string()));
        self
    }

    pub fn message(mut self, message: &str) -> Self {
        self.message = Bytes::from(format!("{}\n", message));
        self
    }

    /// `:n` is a mark, anything else a ref name
    pub fn from(mut self, target: &str) -> Self {
        self.from = Some(object_ref(target));
        self
    }

    pub fn merge(mut self, target: &str) -> Self {
        self.merges.push(object_ref(target));
        self
    }

    /// Set `path` to the blob with mark `blob`
    pub fn modify(mut self, path: &str, blob: &str) -> Self {
        self.file_changes.push(FileChange::Modify {
            path: Bytes::from(path.to_string()),
            mode: FileMode::Normal,
            dataref: DataRef::Mark(Mark::new(blob.to_string())),
        });
        self
    }

    pub fn inline(mut self, path: &str, content: &str) -> Self {
        self.file_changes.push(FileChange::Modify {
            path: Bytes::from(path.to_string()),
            mode: FileMode::Normal,
            dataref: DataRef::Inline(Bytes::from(content.to_string())),
        });
        self
    }

    pub fn delete(mut self, path: &str) -> Self {
        self.file_changes.push(FileChange::Delete {
            path: Bytes::from(path.to_string()),
        });
        self
    }

    pub fn rename(mut self, src: &str, dst: &str) -> Self {
        self.file_changes.push(FileChange::Rename {
            src: Bytes::from(src.to_string()),
            dst: Bytes::from(dst.to_string()),
        });
        self
    }

    fn build(self) -> Command {
        Command::Commit {
            reference: self.reference,
            mark: self.mark,
            author: None,
            more_authors: Vec::new(),
            committer: Some(self.committer),
            message: self.message,
            from: self.from,
            merges: self.merges,
            properties: Vec::new(),
            file_changes: self.file_changes,
        }
    }
}

fn person(name: &str, timestamp: i64) -> PersonStamp {
    PersonStamp::new(
        name.to_string(),
        format!("{}@example.com", name.to_lowercase()),
        timestamp,
        "+0000",
    )
}

fn object_ref(target: &str) -> ObjectRef {
    match target.strip_prefix(':') {
        Some(id) => ObjectRef::mark(id.to_string()),
        None => ObjectRef::Name(Bytes::from(target.to_string())),
    }
}

/// Canned histories
pub struct HistoryGenerators;

impl HistoryGenerators {
    /// Four commits on master. `:11` and `:13` touch `lib/`, `:12` only
    /// touches `doc/`, `:14` renames within `lib/`. Tagged `v1` at `:12`.
    pub fn library_split() -> StreamBuilder {
        StreamBuilder::new()
            .blob("1", "pub fn a() {}\n")
            .blob("2", "# Notes\n")
            .blob("3", "pub fn b() {}\n")
            .commit("refs/heads/master", |c| {
                c.mark("11").message("initial").modify("lib/a.rs", "1").modify("README", "2")
            })
            .commit("refs/heads/master", |c| c.mark("12").from(":11").message("docs").modify("doc/notes.md", "2"))
            .commit("refs/heads/master", |c| c.mark("13").from(":12").message("add b").modify("lib/b.rs", "3"))
            .commit("refs/heads/master", |c| {
                c.mark("14").from(":13").message("rename").rename("lib/b.rs", "lib/c.rs")
            })
            .tag("v1", ":12", "docs release\n")
    }

    /// A feature branch forked from master and merged back
    pub fn merged_feature() -> StreamBuilder {
        StreamBuilder::new()
            .blob("1", "base\n")
            .blob("2", "feature\n")
            .blob("3", "docs\n")
            .commit("refs/heads/master", |c| c.mark("10").message("base").modify("lib/base", "1"))
            .commit("refs/heads/feature", |c| {
                c.mark("20").from(":10").message("feature work").modify("lib/feature", "2")
            })
            .commit("refs/heads/master", |c| c.mark("11").from(":10").message("docs only").modify("doc/x", "3"))
            .commit("refs/heads/master", |c| c.mark("12").from(":11").merge(":20").message("merge feature"))
    }
}
