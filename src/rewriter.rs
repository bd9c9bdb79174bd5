//! History Rewriting Module
//!
//! A single forward pass over the parsed commands that applies a
//! `PathFilter` to every commit and repairs the commit graph so no emitted
//! command refers to a commit that was not emitted.
//!
//! All state lives in `RewriteContext`: where every seen mark ended up, the
//! last emitted commit of every branch, and the branches whose logical head
//! moved away from that tip because commits on them were squashed.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use bytes::Bytes;
use serde::Serialize;

use crate::errors::FastImportResult;
use crate::filter_config::FilterConfig;
use crate::path_filter::PathFilter;
use crate::stream::{Command, Mark, ObjectRef};

/// What became of a mark
#[derive(Debug, Clone, PartialEq, Eq)]
enum Substitution {
    /// The defining command is in the output under the same mark
    Emitted,
    /// The commit was squashed, references go to its resolved parent
    Squashed(Option<ObjectRef>),
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteSummary {
    pub commands_read: usize,
    pub commands_emitted: usize,
    pub commits_emitted: usize,
    pub commits_squashed: usize,
    pub file_changes_dropped: usize,
    pub merges_collapsed: usize,
    pub tags_dropped: usize,
}

impl fmt::Display for RewriteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} commands read, {} emitted; {} commits kept, {} squashed; \
             {} file changes dropped, {} merge parents collapsed, {} tags dropped",
            self.commands_read,
            self.commands_emitted,
            self.commits_emitted,
            self.commits_squashed,
            self.file_changes_dropped,
            self.merges_collapsed,
            self.tags_dropped
        )
    }
}

/// State carried from one command to the next
#[derive(Debug, Default)]
pub struct RewriteContext {
    substitutions: HashMap<Mark, Substitution>,
    /// Branches with a commit in the output, and its mark when known
    branch_tips: HashMap<Bytes, Option<Mark>>,
    /// Logical parent for the next commit of a branch, present only when it
    /// differs from the branch tip
    branch_heads: HashMap<Bytes, Option<ObjectRef>>,
    summary: RewriteSummary,
}

impl RewriteContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nearest emitted object a reference stands for, `None` when nothing
    /// it descends from was emitted or the mark was never defined
    pub fn resolve(&self, target: &ObjectRef) -> Option<ObjectRef> {
        let mut current = target.clone();
        // a chain can visit every mark at most once
        for _ in 0..=self.substitutions.len() {
            let mark = match &current {
                ObjectRef::Name(_) => return Some(current),
                ObjectRef::Mark(mark) => mark,
            };
            match self.substitutions.get(mark) {
                Some(Substitution::Emitted) => return Some(current),
                Some(Substitution::Squashed(Some(next))) => current = next.clone(),
                Some(Substitution::Squashed(None)) | None => return None,
            }
        }
        None
    }

    /// Mark of the last emitted commit on `reference`
    pub fn branch_tip(&self, reference: &[u8]) -> Option<&Mark> {
        self.branch_tips.get(reference).and_then(Option::as_ref)
    }

    pub fn summary(&self) -> &RewriteSummary {
        &self.summary
    }

    fn tip_ref(&self, reference: &[u8]) -> Option<ObjectRef> {
        self.branch_tip(reference).cloned().map(ObjectRef::Mark)
    }

    fn record_head(&mut self, reference: &Bytes, head: Option<ObjectRef>) {
        let at_tip = match (&head, self.branch_tips.get(reference)) {
            (Some(ObjectRef::Mark(mark)), Some(Some(tip))) => mark == tip,
            (None, None) => true,
            _ => false,
        };
        if at_tip {
            self.branch_heads.remove(reference);
        } else {
            self.branch_heads.insert(reference.clone(), head);
        }
    }

    fn advance_tip(&mut self, reference: &Bytes, mark: Option<Mark>) {
        self.branch_tips.insert(reference.clone(), mark);
        self.branch_heads.remove(reference);
    }

    fn move_branch(&mut self, reference: &Bytes, target: Option<&ObjectRef>) {
        match target {
            Some(target) => self.advance_tip(reference, target.as_mark().cloned()),
            None => {
                self.branch_tips.remove(reference);
                self.branch_heads.remove(reference);
            },
        }
    }
}

/// Applies a path filter to a command stream and keeps its history consistent
#[derive(Debug)]
pub struct HistoryRewriter {
    filter: PathFilter,
    squash_empty_commits: bool,
    context: RewriteContext,
}

impl HistoryRewriter {
    pub fn new(filter: PathFilter, squash_empty_commits: bool) -> Self {
        Self {
            filter,
            squash_empty_commits,
            context: RewriteContext::new(),
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(config.path_filter(), config.squash_empty_commits)
    }

    pub fn context(&self) -> &RewriteContext {
        &self.context
    }

    pub fn summary(&self) -> &RewriteSummary {
        &self.context.summary
    }

    pub fn into_summary(self) -> RewriteSummary {
        self.context.summary
    }

    /// Lazily rewrite a stream of parse results, stopping at the first error
    pub fn rewrite_all<I>(self, commands: I) -> RewrittenCommands<I::IntoIter>
    where
        I: IntoIterator<Item = FastImportResult<Command>>,
    {
        RewrittenCommands {
            rewriter: self,
            input: commands.into_iter(),
            pending: VecDeque::new(),
            failed: false,
        }
    }

    /// Decide the fate of one command. The result holds zero, one or (when
    /// a branch has to be cut loose first) two commands.
    pub fn rewrite(&mut self, command: Command) -> Vec<Command> {
        self.context.summary.commands_read += 1;
        let output = match command {
            Command::Commit { .. } => self.rewrite_commit(command),
            Command::Reset { reference, from } => {
                let resolved = from.as_ref().and_then(|target| self.context.resolve(target));
                if from.is_some() && resolved.is_none() {
                    tracing::debug!(
                        reference = %String::from_utf8_lossy(&reference),
                        "reset base was filtered out, resetting to nothing"
                    );
                }
                self.context.move_branch(&reference, resolved.as_ref());
                vec![Command::Reset {
                    reference,
                    from: resolved,
                }]
            },
            Command::Tag {
                name,
                from,
                tagger,
                message,
            } => match self.context.resolve(&from) {
                Some(target) => vec![Command::Tag {
                    name,
                    from: target,
                    tagger,
                    message,
                }],
                None => {
                    tracing::debug!(
                        tag = %String::from_utf8_lossy(&name),
                        "dropping tag whose target was filtered out"
                    );
                    self.context.summary.tags_dropped += 1;
                    vec![]
                },
            },
            Command::Blob { ref mark, .. } => {
                if let Some(mark) = mark {
                    self.context.substitutions.insert(mark.clone(), Substitution::Emitted);
                }
                vec![command]
            },
            Command::Checkpoint
            | Command::Progress { .. }
            | Command::Feature { .. }
            | Command::Option { .. }
            | Command::Comment { .. }
            | Command::Done => vec![command],
        };
        self.context.summary.commands_emitted += output.len();
        output
    }

    fn rewrite_commit(&mut self, mut command: Command) -> Vec<Command> {
        let Command::Commit {
            reference,
            mark,
            from,
            merges,
            file_changes,
            ..
        } = &mut command
        else {
            return vec![command];
        };

        if !self.filter.is_identity() {
            let total = file_changes.len();
            *file_changes = file_changes
                .iter()
                .filter_map(|change| self.filter.filter_file_change(change))
                .collect();
            self.context.summary.file_changes_dropped += total - file_changes.len();
        }

        // without a `from` line git continues the branch from its current tip
        let diverged = from.is_none() && self.context.branch_heads.contains_key(&reference[..]);
        let follows_tip = from.is_none() && !diverged && self.context.branch_tips.contains_key(&reference[..]);
        let mut parent = match from.as_ref() {
            Some(target) => self.context.resolve(target),
            None if diverged => self.context.branch_heads.get(&reference[..]).cloned().flatten(),
            None => self.context.tip_ref(reference),
        };

        let mut kept_merges: Vec<ObjectRef> = Vec::with_capacity(merges.len());
        for merge in merges.iter() {
            match self.context.resolve(merge) {
                Some(target) if Some(&target) != parent.as_ref() && !kept_merges.contains(&target) => {
                    kept_merges.push(target)
                },
                _ => self.context.summary.merges_collapsed += 1,
            }
        }
        // a surviving merge parent keeps the commit even without changes
        let empty = file_changes.is_empty() && kept_merges.is_empty();
        if parent.is_none() && !follows_tip && !kept_merges.is_empty() {
            // first surviving merge parent becomes the main parent
            parent = Some(kept_merges.remove(0));
        }
        *merges = kept_merges;

        if empty && self.squash_empty_commits {
            tracing::debug!(
                reference = %String::from_utf8_lossy(reference),
                mark = ?mark.as_ref().map(|m| String::from_utf8_lossy(m.id()).into_owned()),
                "squashing empty commit"
            );
            if let Some(mark) = mark.as_ref() {
                self.context
                    .substitutions
                    .insert(mark.clone(), Substitution::Squashed(parent.clone()));
            }
            if !follows_tip {
                self.context.record_head(reference, parent);
            }
            self.context.summary.commits_squashed += 1;
            return vec![];
        }

        let mut output = Vec::with_capacity(2);
        *from = if follows_tip { None } else { parent };
        if from.is_none() && !follows_tip && self.context.branch_tips.contains_key(&reference[..]) {
            tracing::debug!(
                reference = %String::from_utf8_lossy(reference),
                "ancestry filtered out, detaching branch before commit"
            );
            output.push(Command::Reset {
                reference: reference.clone(),
                from: None,
            });
        } else if diverged {
            tracing::debug!(
                reference = %String::from_utf8_lossy(reference),
                "reparenting commit past squashed commits"
            );
        }

        if let Some(mark) = mark.as_ref() {
            self.context.substitutions.insert(mark.clone(), Substitution::Emitted);
        }
        self.context.advance_tip(reference, mark.clone());
        self.context.summary.commits_emitted += 1;

        output.push(command);
        output
    }
}

/// Iterator adapter produced by `HistoryRewriter::rewrite_all`
pub struct RewrittenCommands<I> {
    rewriter: HistoryRewriter,
    input: I,
    pending: VecDeque<Command>,
    failed: bool,
}

impl<I> RewrittenCommands<I> {
    pub fn summary(&self) -> &RewriteSummary {
        self.rewriter.summary()
    }

    pub fn into_summary(self) -> RewriteSummary {
        self.rewriter.into_summary()
    }
}

impl<I> Iterator for RewrittenCommands<I>
where
    I: Iterator<Item = FastImportResult<Command>>,
{
    type Item = FastImportResult<Command>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(command) = self.pending.pop_front() {
                return Some(Ok(command));
            }
            if self.failed {
                return None;
            }
            match self.input.next()? {
                Ok(command) => self.pending.extend(self.rewriter.rewrite(command)),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                },
            }
        }
    }
}
