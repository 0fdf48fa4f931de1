//! Path utilities for changelog trees
//!
//! Inclusion references are written with forward slashes regardless of the
//! platform, and resolve either against the including changelog or against
//! the classpath root. Frozen changelogs are named by substituting the
//! version for the [`VERSION_TOKEN`] in the filename.

use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};

/// The part of a filename that is replaced with the version when the file is
/// frozen.
///
/// Every changelog that should be frozen must contain this token somewhere in
/// its path; without it the frozen path would equal the original one.
pub const VERSION_TOKEN: &str = "latest";

/// Resolves an inclusion reference to the path of the included changelog.
///
/// Backslashes in `reference` are treated as separators. If
/// `relative_to_owner` is `true` the reference is resolved against the
/// directory containing `owner`, otherwise against `classpath_root`. The result
/// is [normalized](normalize).
#[must_use]
pub fn resolve_reference(
    owner: &Path,
    reference: &str,
    relative_to_owner: bool,
    classpath_root: &Path,
) -> PathBuf {
    let reference = reference.replace('\\', "/");
    let resolved = if relative_to_owner {
        owner
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(reference)
    } else {
        // classpath resources are addressed from the root even with a leading slash
        classpath_root.join(reference.trim_start_matches('/'))
    };
    normalize(&resolved)
}

/// Derives the version-qualified path of a changelog by replacing every
/// occurrence of [`VERSION_TOKEN`] with `version`.
#[must_use]
pub fn versioned_filename(path: &Path, version: &str) -> PathBuf {
    PathBuf::from(path.to_string_lossy().replace(VERSION_TOKEN, version))
}

/// Converts platform path separators to `/`.
///
/// Used whenever a path is written into a changelog.
#[must_use]
pub fn to_portable_separator(path: &Path) -> String {
    let path = path.to_string_lossy();
    if MAIN_SEPARATOR == '/' {
        path.into_owned()
    } else {
        path.replace(MAIN_SEPARATOR, "/")
    }
}

/// Lexically normalizes a path.
///
/// `.` components are removed and `..` components cancel the preceding normal
/// component. The filesystem is not consulted, so symbolic links are not
/// resolved.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                Some(Component::ParentDir | Component::CurDir) | None => {
                    normalized.push("..");
                }
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Expresses `target` relative to the directory `base`.
///
/// Both paths are normalized first. If no relative path exists (one path is
/// absolute and the other is not, or `base` climbs above its own root)
/// `target` is returned unchanged.
#[must_use]
pub fn relative_to(base: &Path, target: &Path) -> PathBuf {
    let base = normalize(base);
    let target = normalize(target);

    if base.has_root() != target.has_root() {
        return target;
    }

    let mut base_components = base.components().peekable();
    let mut target_components = target.components().peekable();
    while let (Some(b), Some(t)) = (base_components.peek(), target_components.peek()) {
        if b != t {
            break;
        }
        base_components.next();
        target_components.next();
    }

    let mut relative = PathBuf::new();
    for component in base_components {
        if !matches!(component, Component::Normal(_)) {
            return target;
        }
        relative.push("..");
    }
    relative.extend(target_components);
    relative
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn resolve_relative_to_owner() {
        let resolved = resolve_reference(
            Path::new("dir/master.xml"),
            "subdir/include.xml",
            true,
            Path::new("root"),
        );
        assert_eq!(resolved, PathBuf::from("dir/subdir/include.xml"));
    }

    #[test]
    fn resolve_relative_to_classpath_root() {
        let resolved = resolve_reference(
            Path::new("dir/master.xml"),
            "subdir/include.xml",
            false,
            Path::new("root"),
        );
        assert_eq!(resolved, PathBuf::from("root/subdir/include.xml"));
    }

    #[test]
    fn resolve_classpath_reference_with_leading_slash() {
        let resolved = resolve_reference(
            Path::new("dir/master.xml"),
            "/subdir/include.xml",
            false,
            Path::new("root"),
        );
        assert_eq!(resolved, PathBuf::from("root/subdir/include.xml"));
    }

    #[test_case(true; "relative to owner")]
    #[test_case(false; "relative to classpath root")]
    fn backslashes_resolve_like_forward_slashes(relative: bool) {
        let owner = Path::new("dir/master.xml");
        let root = Path::new("root");
        assert_eq!(
            resolve_reference(owner, "subdir\\nested\\include.xml", relative, root),
            resolve_reference(owner, "subdir/nested/include.xml", relative, root),
        );
    }

    #[test]
    fn resolve_owner_without_directory() {
        let resolved = resolve_reference(Path::new("master.xml"), "a.xml", true, Path::new("root"));
        assert_eq!(resolved, PathBuf::from("a.xml"));
    }

    #[test]
    fn resolve_folds_parent_components() {
        let resolved = resolve_reference(
            Path::new("dir/sub/master.xml"),
            "../other/./include.xml",
            true,
            Path::new("root"),
        );
        assert_eq!(resolved, PathBuf::from("dir/other/include.xml"));
    }

    #[test]
    fn versioned_filename_replaces_every_token() {
        let path = Path::new("abc/latest/def/file-latest-blah.xml");
        assert_eq!(
            versioned_filename(path, "VERSION"),
            PathBuf::from("abc/VERSION/def/file-VERSION-blah.xml")
        );
    }

    #[test]
    fn versioned_filename_without_token_is_unchanged() {
        let path = Path::new("abc/file.xml");
        assert_eq!(versioned_filename(path, "1.0"), path);
    }

    #[test]
    fn portable_separator_uses_forward_slashes() {
        let path = Path::new("abc").join("def").join("ghi.xml");
        assert_eq!(to_portable_separator(&path), "abc/def/ghi.xml");
    }

    #[test_case("a/./b/../c", "a/c"; "current and parent")]
    #[test_case("../a/b", "../a/b"; "leading parent kept")]
    #[test_case("/a/../../b", "/b"; "cannot climb above root")]
    #[test_case("a/b/..", "a"; "trailing parent")]
    fn normalize_is_lexical(input: &str, expected: &str) {
        assert_eq!(normalize(Path::new(input)), PathBuf::from(expected));
    }

    #[test_case("dir", "dir/sub/a_1.0.xml", "sub/a_1.0.xml"; "descendant")]
    #[test_case("dir/master", "dir/other/a.xml", "../other/a.xml"; "sibling directory")]
    #[test_case("", "a.xml", "a.xml"; "empty base")]
    #[test_case("/abs", "rel/a.xml", "rel/a.xml"; "mixed absolute and relative")]
    #[test_case("../up", "a.xml", "a.xml"; "base above its root")]
    fn relative_paths(base: &str, target: &str, expected: &str) {
        assert_eq!(
            relative_to(Path::new(base), Path::new(target)),
            PathBuf::from(expected)
        );
    }
}
