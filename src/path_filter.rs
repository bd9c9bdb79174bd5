use crate::stream::FileChange;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One include or exclude entry
///
/// A directory entry matches itself and everything below it, a file entry
/// only the literal path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathSpec {
    pub path: String,
    #[serde(default)]
    pub directory: bool,
}

impl PathSpec {
    pub fn directory(path: &str) -> Self {
        Self {
            path: path.trim_end_matches('/').to_string(),
            directory: true,
        }
    }

    pub fn file(path: &str) -> Self {
        Self {
            path: path.to_string(),
            directory: false,
        }
    }

    /// `lib/` is a directory, `lib/a.txt` a file
    pub fn parse(text: &str) -> Self {
        if text.is_empty() || text.ends_with('/') {
            Self::directory(text)
        } else {
            Self::file(text)
        }
    }

    /// A trailing slash marks a directory even without the flag
    fn normalized(self) -> Self {
        if self.directory || self.path.ends_with('/') {
            Self::directory(&self.path)
        } else {
            self
        }
    }

    pub fn matches(&self, path: &[u8]) -> bool {
        let own = self.path.as_bytes();
        if !self.directory {
            return path == own;
        }
        own.is_empty()
            || path == own
            || (path.starts_with(own) && path.get(own.len()) == Some(&b'/'))
    }

    /// Directory this entry contributes to the new root
    fn anchor(&self) -> &[u8] {
        let own = self.path.as_bytes();
        if self.directory {
            return own;
        }
        match own.iter().rposition(|&b| b == b'/') {
            Some(pos) => &own[..pos],
            None => &[],
        }
    }
}

/// Deepest directory shared by every anchor, compared component-wise
fn common_directory<'a>(anchors: impl Iterator<Item = &'a [u8]>) -> Vec<u8> {
    let mut common: Option<Vec<&[u8]>> = None;
    for anchor in anchors {
        let components: Vec<&[u8]> = anchor
            .split(|&b| b == b'/')
            .filter(|c| !c.is_empty())
            .collect();
        common = Some(match common {
            None => components,
            Some(prefix) => prefix
                .into_iter()
                .zip(components)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    common.unwrap_or_default().join(&b'/')
}

/// Decides which paths survive and where they end up
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<PathSpec>,
    exclude: Vec<PathSpec>,
    new_root: Vec<u8>,
}

impl PathFilter {
    pub fn new(
        include: impl IntoIterator<Item = PathSpec>,
        exclude: impl IntoIterator<Item = PathSpec>,
    ) -> Self {
        let include: Vec<PathSpec> = include.into_iter().map(PathSpec::normalized).collect();
        let exclude: Vec<PathSpec> = exclude.into_iter().map(PathSpec::normalized).collect();
        let new_root = common_directory(include.iter().map(PathSpec::anchor));
        Self {
            include,
            exclude,
            new_root,
        }
    }

    /// Prefix stripped from kept paths, empty when nothing is rerooted
    pub fn new_root(&self) -> &[u8] {
        &self.new_root
    }

    /// True when every path is kept unchanged
    pub fn is_identity(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn is_kept(&self, path: &[u8]) -> bool {
        if self.exclude.iter().any(|spec| spec.matches(path)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|spec| spec.matches(path))
    }

    fn reroot(&self, path: &Bytes) -> Bytes {
        let root = self.new_root.as_slice();
        if root.is_empty() || !path.starts_with(root) {
            return path.clone();
        }
        match path.get(root.len()) {
            None => Bytes::new(),
            Some(b'/') => path.slice(root.len() + 1..),
            Some(_) => path.clone(),
        }
    }

    /// Rerooted path if kept, `None` if dropped
    pub fn classify(&self, path: &Bytes) -> Option<Bytes> {
        if self.is_kept(path) {
            Some(self.reroot(path))
        } else {
            None
        }
    }

    /// Apply the filter to one file change. Copies and renames need both
    /// endpoints kept.
    pub fn filter_file_change(&self, change: &FileChange) -> Option<FileChange> {
        match change {
            FileChange::Modify {
                path,
                mode,
                dataref,
            } => Some(FileChange::Modify {
                path: self.classify(path)?,
                mode: *mode,
                dataref: dataref.clone(),
            }),
            FileChange::Delete { path } => Some(FileChange::Delete {
                path: self.classify(path)?,
            }),
            FileChange::Copy { src, dst } => Some(FileChange::Copy {
                src: self.classify(src)?,
                dst: self.classify(dst)?,
            }),
            FileChange::Rename { src, dst } => Some(FileChange::Rename {
                src: self.classify(src)?,
                dst: self.classify(dst)?,
            }),
            FileChange::DeleteAll => Some(FileChange::DeleteAll),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{DataRef, FileMode, Mark};
    use proptest::prelude::*;

    fn b(path: &str) -> Bytes {
        Bytes::from(path.to_string())
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let filter = PathFilter::new(
            vec![PathSpec::parse("lib/")],
            vec![PathSpec::parse("lib/secret.txt")],
        );
        assert_eq!(filter.classify(&b("lib/secret.txt")), None);
        assert_eq!(filter.classify(&b("lib/public.txt")), Some(b("public.txt")));
    }

    #[test]
    fn test_reroot_single_directory() {
        let filter = PathFilter::new(vec![PathSpec::parse("lib/xxx/")], vec![]);
        assert_eq!(filter.new_root(), b"lib/xxx");
        assert_eq!(filter.classify(&b("lib/xxx/foo.txt")), Some(b("foo.txt")));
        assert_eq!(filter.classify(&b("lib/xxx/sub/bar.txt")), Some(b("sub/bar.txt")));
        assert_eq!(filter.classify(&b("lib/other.txt")), None);
    }

    #[test]
    fn test_reroot_to_empty_path() {
        let filter = PathFilter::new(vec![PathSpec::parse("lib/xxx/")], vec![]);
        assert_eq!(filter.classify(&b("lib/xxx")), Some(Bytes::new()));
    }

    #[test]
    fn test_directory_needs_component_boundary() {
        let filter = PathFilter::new(vec![PathSpec::parse("lib/")], vec![]);
        assert!(filter.is_kept(b"lib/a"));
        assert!(!filter.is_kept(b"library/a"));
        assert!(!filter.is_kept(b"li"));
    }

    #[test]
    fn test_file_entry_matches_only_itself() {
        let filter = PathFilter::new(vec![PathSpec::parse("doc/readme.md")], vec![]);
        assert!(filter.is_kept(b"doc/readme.md"));
        assert!(!filter.is_kept(b"doc/readme.md.orig"));
        assert!(!filter.is_kept(b"doc/readme.md/x"));
        assert_eq!(filter.classify(&b("doc/readme.md")), Some(b("readme.md")));
    }

    #[test]
    fn test_mixed_entries_use_containing_directory() {
        let filter = PathFilter::new(
            vec![PathSpec::parse("lib/a/"), PathSpec::parse("lib/b/c.txt")],
            vec![],
        );
        assert_eq!(filter.new_root(), b"lib");
        assert_eq!(filter.classify(&b("lib/a/x")), Some(b("a/x")));
        assert_eq!(filter.classify(&b("lib/b/c.txt")), Some(b("b/c.txt")));
    }

    #[test]
    fn test_common_root_is_component_wise() {
        let filter = PathFilter::new(vec![PathSpec::parse("lib/abc/"), PathSpec::parse("lib/abd/")], vec![]);
        assert_eq!(filter.new_root(), b"lib");
    }

    #[test]
    fn test_top_level_file_means_no_reroot() {
        let filter = PathFilter::new(vec![PathSpec::parse("lib/x/"), PathSpec::parse("README")], vec![]);
        assert_eq!(filter.new_root(), b"");
        assert_eq!(filter.classify(&b("lib/x/a")), Some(b("lib/x/a")));
    }

    #[test]
    fn test_no_include_keeps_everything() {
        let filter = PathFilter::new(vec![], vec![PathSpec::parse("secret/")]);
        assert!(!filter.is_identity());
        assert_eq!(filter.classify(&b("src/main.rs")), Some(b("src/main.rs")));
        assert_eq!(filter.classify(&b("secret/key")), None);
        assert!(PathFilter::default().is_identity());
    }

    #[test]
    fn test_deserialized_directory_is_normalized() {
        let spec: PathSpec = serde_json::from_str(r#"{"path": "lib/", "directory": true}"#).unwrap();
        let filter = PathFilter::new(vec![spec], vec![]);
        assert_eq!(filter.classify(&b("lib/a")), Some(b("a")));
    }

    #[test]
    fn test_trailing_slash_implies_directory() {
        let spec: PathSpec = serde_json::from_str(r#"{"path": "lib/"}"#).unwrap();
        assert!(!spec.directory);
        let filter = PathFilter::new(vec![spec], vec![]);
        assert_eq!(filter.new_root(), b"lib");
        assert_eq!(filter.classify(&b("lib/a")), Some(b("a")));
        assert_eq!(filter.classify(&b("lib/sub/b")), Some(b("sub/b")));
    }

    #[test]
    fn test_rename_needs_both_endpoints() {
        let filter = PathFilter::new(vec![PathSpec::parse("lib/")], vec![]);
        let inside = FileChange::Rename {
            src: b("lib/a"),
            dst: b("lib/b"),
        };
        assert_eq!(
            filter.filter_file_change(&inside),
            Some(FileChange::Rename {
                src: b("a"),
                dst: b("b"),
            })
        );
        let leaving = FileChange::Rename {
            src: b("lib/a"),
            dst: b("other/a"),
        };
        assert_eq!(filter.filter_file_change(&leaving), None);
        let entering = FileChange::Copy {
            src: b("other/a"),
            dst: b("lib/a"),
        };
        assert_eq!(filter.filter_file_change(&entering), None);
    }

    #[test]
    fn test_deleteall_always_survives() {
        let filter = PathFilter::new(vec![PathSpec::parse("lib/")], vec![PathSpec::parse("")]);
        assert_eq!(filter.filter_file_change(&FileChange::DeleteAll), Some(FileChange::DeleteAll));
        let modify = FileChange::Modify {
            path: b("lib/a"),
            mode: FileMode::Normal,
            dataref: DataRef::Mark(Mark::new("1")),
        };
        assert_eq!(filter.filter_file_change(&modify), None);
    }

    proptest! {
        #[test]
        fn test_excluded_directory_never_kept(
            dir in "[a-z]{1,8}",
            rest in "[a-z/]{0,16}",
        ) {
            let filter = PathFilter::new(
                vec![PathSpec::directory(&dir)],
                vec![PathSpec::directory(&dir)],
            );
            let path = format!("{}/{}", dir, rest);
            prop_assert!(!filter.is_kept(path.as_bytes()));
        }

        #[test]
        fn test_reroot_never_leaves_leading_slash(
            root in "[a-z]{1,4}(/[a-z]{1,4}){0,2}",
            rest in "[a-z]{1,4}(/[a-z]{1,4}){0,2}",
        ) {
            let filter = PathFilter::new(vec![PathSpec::directory(&root)], vec![]);
            let path = Bytes::from(format!("{}/{}", root, rest));
            let kept = filter.classify(&path);
            prop_assert_eq!(kept, Some(Bytes::from(rest)));
        }
    }
}
