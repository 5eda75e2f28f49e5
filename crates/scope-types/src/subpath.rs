use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Canonical separator used inside every [`Subpath`].
pub const SEPARATOR: char = '/';

/// A module location relative to the project root.
///
/// Subpaths are stored with [`SEPARATOR`] between components no matter which
/// separator the host operating system uses, so registry state saved on one
/// platform looks the same on another. Conversion to a host path happens only
/// at the filesystem boundary via [`Subpath::to_path`].
///
/// A `Subpath` is never empty, never absolute, and never contains `.` or `..`
/// components.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subpath(String);

impl Subpath {
    /// Parse a subpath spelled with either `/` or `\`.
    ///
    /// # Examples
    ///
    /// ```
    /// use scope_types::Subpath;
    ///
    /// let a = Subpath::parse("pkg/mod.py").unwrap();
    /// let b = Subpath::parse("pkg\\mod.py").unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(a.as_str(), "pkg/mod.py");
    /// assert!(Subpath::parse("../outside.py").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if has_drive_prefix(s) {
            return Err(TypeError::AbsoluteSubpath(s.to_string()));
        }
        if s.starts_with(['/', '\\']) {
            return Err(TypeError::AbsoluteSubpath(s.to_string()));
        }
        Self::from_components(s.split(['/', '\\']))
            .map_err(|e| with_original(e, s))
    }

    /// Parse a subpath spelled with an arbitrary single separator character.
    ///
    /// Only `separator` splits components; `/` and `\` are ordinary
    /// characters unless one of them is the separator.
    pub fn parse_with_separator(s: &str, separator: char) -> Result<Self, TypeError> {
        if s.starts_with(separator) {
            return Err(TypeError::AbsoluteSubpath(s.to_string()));
        }
        Self::from_components(s.split(separator)).map_err(|e| with_original(e, s))
    }

    /// Build a subpath from individual components.
    ///
    /// Empty and `.` components are dropped; `..` removes the previous
    /// component and fails if there is nothing left to remove.
    pub fn from_components<I, S>(components: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts: Vec<String> = Vec::new();
        for component in components {
            match component.as_ref() {
                "" | "." => {}
                ".." => {
                    if parts.pop().is_none() {
                        return Err(TypeError::EscapesRoot(String::from("..")));
                    }
                }
                other => parts.push(other.to_string()),
            }
        }
        if parts.is_empty() {
            return Err(TypeError::EmptySubpath);
        }
        Ok(Self(parts.join(&SEPARATOR.to_string())))
    }

    /// Resolve a filesystem path against a project root.
    ///
    /// Absolute paths must live under `root`; relative paths are taken as
    /// relative to `root` already.
    pub fn from_path(root: &Path, path: &Path) -> Result<Self, TypeError> {
        let relative = if path.is_absolute() {
            path.strip_prefix(root)
                .map_err(|_| TypeError::OutsideProject {
                    path: path.display().to_string(),
                    root: root.display().to_string(),
                })?
        } else {
            path
        };
        let s = relative
            .to_str()
            .ok_or_else(|| TypeError::NonUtf8Path(relative.to_string_lossy().into_owned()))?;
        Self::parse(s)
    }

    /// The canonical `/`-separated form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// Host-native path for this subpath under `root`.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(self.components());
        path
    }

    /// Spell the subpath with a different separator.
    pub fn to_string_with_separator(&self, separator: char) -> String {
        self.components()
            .collect::<Vec<_>>()
            .join(&separator.to_string())
    }

    /// The last component.
    pub fn file_name(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
    }

    /// The last component without its extension.
    pub fn file_stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(dot) => &name[..dot],
        }
    }

    /// Dotted import name of the module.
    ///
    /// `pkg/mod.py` becomes `pkg.mod`; a package initializer
    /// `pkg/__init__.py` becomes `pkg`.
    pub fn locator(&self) -> String {
        let mut parts: Vec<&str> = self.components().collect();
        if let Some(last) = parts.last_mut() {
            *last = last.strip_suffix(".py").unwrap_or(last);
        }
        if parts.len() > 1 && parts.last() == Some(&"__init__") {
            parts.pop();
        }
        parts.join(".")
    }

    /// Returns `true` if this subpath lives inside the directory `dir`.
    pub fn starts_with_dir(&self, dir: &Subpath) -> bool {
        self.0
            .strip_prefix(dir.as_str())
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }

    /// Append components to this subpath.
    pub fn join(&self, tail: &str) -> Result<Self, TypeError> {
        Self::parse(&format!("{}{SEPARATOR}{tail}", self.0))
    }
}

fn has_drive_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn with_original(err: TypeError, original: &str) -> TypeError {
    match err {
        TypeError::EscapesRoot(_) => TypeError::EscapesRoot(original.to_string()),
        other => other,
    }
}

impl fmt::Debug for Subpath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subpath({})", self.0)
    }
}

impl fmt::Display for Subpath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Subpath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Subpath {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Subpath> for String {
    fn from(subpath: Subpath) -> Self {
        subpath.0
    }
}

impl AsRef<str> for Subpath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_keeps_forward_slashes() {
        let sp = Subpath::parse("pkg/sub/mod.py").unwrap();
        assert_eq!(sp.as_str(), "pkg/sub/mod.py");
        assert_eq!(sp.components().count(), 3);
    }

    #[test]
    fn parse_normalizes_backslashes() {
        let sp = Subpath::parse("pkg\\sub\\mod.py").unwrap();
        assert_eq!(sp.as_str(), "pkg/sub/mod.py");
    }

    #[test]
    fn parse_drops_dot_and_empty_components() {
        let sp = Subpath::parse("./pkg//mod.py").unwrap();
        assert_eq!(sp.as_str(), "pkg/mod.py");
    }

    #[test]
    fn parse_resolves_parent_inside_root() {
        let sp = Subpath::parse("pkg/../other/mod.py").unwrap();
        assert_eq!(sp.as_str(), "other/mod.py");
    }

    #[test]
    fn parse_rejects_escape() {
        let err = Subpath::parse("../mod.py").unwrap_err();
        assert_eq!(err, TypeError::EscapesRoot("../mod.py".into()));
    }

    #[test]
    fn parse_rejects_absolute() {
        assert!(matches!(
            Subpath::parse("/etc/passwd"),
            Err(TypeError::AbsoluteSubpath(_))
        ));
        assert!(matches!(
            Subpath::parse("C:\\mod.py"),
            Err(TypeError::AbsoluteSubpath(_))
        ));
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!(Subpath::parse(""), Err(TypeError::EmptySubpath));
        assert_eq!(Subpath::parse("./."), Err(TypeError::EmptySubpath));
    }

    #[test]
    fn custom_separator() {
        let sp = Subpath::parse_with_separator("pkg#mod.py", '#').unwrap();
        assert_eq!(sp, Subpath::parse("pkg/mod.py").unwrap());
        assert_eq!(sp.to_string_with_separator('#'), "pkg#mod.py");
    }

    #[test]
    fn from_path_strips_root() {
        let root = Path::new("/project");
        let sp = Subpath::from_path(root, Path::new("/project/pkg/mod.py")).unwrap();
        assert_eq!(sp.as_str(), "pkg/mod.py");
    }

    #[test]
    fn from_path_accepts_relative() {
        let root = Path::new("/project");
        let sp = Subpath::from_path(root, Path::new("module.py")).unwrap();
        assert_eq!(sp.as_str(), "module.py");
    }

    #[test]
    fn from_path_rejects_foreign_absolute() {
        let root = Path::new("/project");
        let err = Subpath::from_path(root, Path::new("/elsewhere/mod.py")).unwrap_err();
        assert!(matches!(err, TypeError::OutsideProject { .. }));
    }

    #[test]
    fn to_path_uses_host_separator() {
        let sp = Subpath::parse("pkg/mod.py").unwrap();
        let path = sp.to_path(Path::new("root"));
        assert_eq!(path, Path::new("root").join("pkg").join("mod.py"));
    }

    #[test]
    fn locator_and_stem() {
        let sp = Subpath::parse("pkg/mod.py").unwrap();
        assert_eq!(sp.locator(), "pkg.mod");
        assert_eq!(sp.file_stem(), "mod");
        assert_eq!(sp.file_name(), "mod.py");

        let init = Subpath::parse("pkg/__init__.py").unwrap();
        assert_eq!(init.locator(), "pkg");

        let top = Subpath::parse("module.py").unwrap();
        assert_eq!(top.locator(), "module");
    }

    #[test]
    fn starts_with_dir_is_component_aware() {
        let tests = Subpath::parse("tests").unwrap();
        assert!(Subpath::parse("tests/test_mod.py").unwrap().starts_with_dir(&tests));
        assert!(!Subpath::parse("tests_extra/x.py").unwrap().starts_with_dir(&tests));
        assert!(!tests.starts_with_dir(&tests));
    }

    #[test]
    fn join_appends() {
        let dir = Subpath::parse("tests").unwrap();
        assert_eq!(dir.join("test_module.py").unwrap().as_str(), "tests/test_module.py");
    }

    #[test]
    fn serde_roundtrip_and_validation() {
        let sp = Subpath::parse("pkg/mod.py").unwrap();
        let json = serde_json::to_string(&sp).unwrap();
        assert_eq!(json, "\"pkg/mod.py\"");
        let parsed: Subpath = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sp);
        assert!(serde_json::from_str::<Subpath>("\"../x\"").is_err());
    }

    fn arb_component() -> impl Strategy<Value = String> {
        "[a-z_][a-z0-9_]{0,8}(\\.py)?"
    }

    proptest! {
        /// Registration keys do not depend on which separator spelled them.
        #[test]
        fn separator_independent(
            parts in proptest::collection::vec(arb_component(), 1..5),
            sep in prop::sample::select(vec!['#', '\\', ':', '|']),
        ) {
            let slashed = parts.join("/");
            let custom = parts.join(&sep.to_string());
            let a = Subpath::parse(&slashed).unwrap();
            let b = Subpath::parse_with_separator(&custom, sep).unwrap();
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.to_string_with_separator(sep), custom);
        }
    }
}
