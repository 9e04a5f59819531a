//! References to LESS sources and their resolution.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Every import target is turned into an absolute [`Uri`] before it is
//! loaded. Four shapes are recognized:
//!
//! ```text
//! file:///abs/path/theme.less     local file
//! package:path/theme.less         named asset package
//! https://cdn.example/theme.less  network (any other scheme)
//! theme.less, /abs/theme.less     bare path, resolved against a base
//! ```
//!
//! Resolution deliberately gives `file:///` and named-package targets
//! precedence over whatever scheme the base has, and lets an absolute
//! path stay inside the package of a named-package base.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// `name:path` where the path does not start with a slash.
static ASSET_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([a-z_][a-z0-9_]*):([^/].*)$").unwrap());

/// Any RFC 3986 scheme prefix.
static URI_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):").unwrap());

const FILE_PREFIX: &str = "file://";

/// An absolute, scheme-qualified reference to a LESS source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uri(String);

/// The scheme family a [`Uri`] (or raw import target) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriKind<'a> {
    /// `file://...`; `path` is everything after the `file://` prefix.
    File { path: &'a str },
    /// `package:path`, served by an [`AssetProvider`](crate::AssetProvider).
    Asset { package: &'a str, path: &'a str },
    /// Any other `scheme:...` reference.
    Network { scheme: &'a str },
    /// No scheme: a bare relative or absolute path.
    Relative,
}

impl UriKind<'_> {
    /// Classify a raw reference string.
    pub fn of(s: &str) -> UriKind<'_> {
        if let Some(caps) = ASSET_SPEC.captures(s) {
            let package = caps.get(1).map_or("", |m| m.as_str());
            let path = caps.get(2).map_or("", |m| m.as_str());
            return UriKind::Asset { package, path };
        }
        if let Some(path) = s.strip_prefix(FILE_PREFIX) {
            return UriKind::File { path };
        }
        if let Some(caps) = URI_SCHEME.captures(s) {
            let scheme = caps.get(1).map_or("", |m| m.as_str());
            return UriKind::Network { scheme };
        }
        UriKind::Relative
    }
}

impl Uri {
    /// Wrap a string that is already an absolute reference.
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Build a `file://` reference for an absolute filesystem path.
    pub fn from_file_path(path: &Path) -> Self {
        Self(format!("{}{}", FILE_PREFIX, path.display()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn kind(&self) -> UriKind<'_> {
        UriKind::of(&self.0)
    }

    /// True for `file:///...` references (local, with an empty host).
    pub fn is_local_file(&self) -> bool {
        self.0.starts_with("file:///")
    }

    /// The filesystem path of a `file://` reference.
    ///
    /// The path is taken verbatim: references are built from paths without
    /// escaping, so `%XX` sequences are part of the file name. `None` for
    /// other schemes and for a host other than `localhost`.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        let UriKind::File { path } = self.kind() else {
            return None;
        };
        let (authority, path) = split_authority(path);
        match authority {
            "" | "localhost" => Some(PathBuf::from(path)),
            _ => None,
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Uri {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Uri {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Whether `s` is a named-package reference (`package:path`).
pub fn is_asset_spec(s: &str) -> bool {
    matches!(UriKind::of(s), UriKind::Asset { .. })
}

/// Turns an import target into an absolute reference.
pub trait Resolver: Send + Sync {
    /// Resolve `target` against `base` (the reference of the importing source).
    fn resolve(&self, target: &str, base: Option<&Uri>) -> Uri;
}

impl<F> Resolver for F
where
    F: Fn(&str, Option<&Uri>) -> Uri + Send + Sync,
{
    fn resolve(&self, target: &str, base: Option<&Uri>) -> Uri {
        self(target, base)
    }
}

/// The standard resolution rules.
///
/// Bare paths without a base are made absolute against the current
/// working directory, or against a fixed directory set with
/// [`DefaultResolver::with_cwd`].
#[derive(Debug, Clone, Default)]
pub struct DefaultResolver {
    cwd: Option<PathBuf>,
}

impl DefaultResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
        }
    }

    fn cwd(&self) -> PathBuf {
        match &self.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        }
    }
}

impl Resolver for DefaultResolver {
    fn resolve(&self, target: &str, base: Option<&Uri>) -> Uri {
        resolve_uri(target, base, || self.cwd())
    }
}

/// Resolve `target` against `base`.
///
/// `cwd` is only consulted when there is no base and the target is a
/// bare relative path.
///
/// # Example
///
/// ```
/// use lessc::{Uri, resolve_uri};
///
/// let base = Uri::new("pkg:styles/main.less");
/// assert_eq!(resolve_uri("/vars", Some(&base), || "/".into()).as_str(), "pkg:vars");
/// assert_eq!(resolve_uri("mixins", Some(&base), || "/".into()).as_str(), "pkg:styles/mixins");
/// ```
pub fn resolve_uri(target: &str, base: Option<&Uri>, cwd: impl FnOnce() -> PathBuf) -> Uri {
    if target.starts_with('/') {
        return match base {
            None => Uri(format!("{}{}", FILE_PREFIX, target)),
            Some(base) if base.is_local_file() => Uri(format!("{}{}", FILE_PREFIX, target)),
            Some(base) => match base.kind() {
                UriKind::Asset { package, .. } if !target.starts_with("//") => {
                    Uri(format!("{}:{}", package, &target[1..]))
                }
                _ => Uri(join(base.as_str(), target)),
            },
        };
    }

    match UriKind::of(target) {
        UriKind::File { .. } if target.starts_with("file:///") => return Uri::new(target),
        UriKind::Asset { .. } => return Uri::new(target),
        _ => {}
    }

    let Some(base) = base else {
        return match UriKind::of(target) {
            UriKind::Relative => {
                let absolute = normalize_path(&cwd().join(target));
                Uri::from_file_path(&absolute)
            }
            _ => Uri::new(target),
        };
    };

    match base.kind() {
        UriKind::Asset { package, path } => {
            Uri(format!("{}:{}", package, join(path, target)))
        }
        UriKind::File { .. } | UriKind::Network { .. } | UriKind::Relative => {
            Uri(join(base.as_str(), target))
        }
    }
}

/// RFC 3986 reference resolution of `target` against `base`.
///
/// `file://` and scheme-less bases are merged lexically, so the reference
/// text is kept as written (no escaping, no case folding). Targets with a
/// scheme of their own are returned unchanged. Other absolute bases go
/// through [`Url::join`]; one that cannot anchor relative references
/// (an opaque path) leaves the target unchanged.
fn join(base: &str, target: &str) -> String {
    if URI_SCHEME.is_match(target) {
        return target.to_string();
    }
    if let Some(rest) = base.strip_prefix(FILE_PREFIX) {
        let (authority, path) = split_authority(rest);
        if let Some(network_path) = target.strip_prefix("//") {
            return format!("file://{}", network_path);
        }
        let path = if path.is_empty() { "/" } else { path };
        return format!("{}{}{}", FILE_PREFIX, authority, merge_relative(path, target));
    }
    match Url::parse(base) {
        Ok(base_url) => match base_url.join(target) {
            Ok(joined) => joined.to_string(),
            Err(_) => target.to_string(),
        },
        Err(_) => merge_relative(base, target),
    }
}

/// Split the part after `file://` into authority and absolute path.
fn split_authority(rest: &str) -> (&str, &str) {
    match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    }
}

/// Merge two scheme-less paths: drop the last segment of `base`, append
/// `target`, then remove dot segments. `..` never climbs above the start.
fn merge_relative(base: &str, target: &str) -> String {
    if target.is_empty() {
        return base.to_string();
    }
    if target.starts_with('/') {
        return remove_dot_segments(target);
    }
    let dir = match base.rfind('/') {
        Some(idx) => &base[..=idx],
        None => "",
    };
    remove_dot_segments(&format!("{}{}", dir, target))
}

fn remove_dot_segments(path: &str) -> String {
    let absolute = path.starts_with('/');
    let trailing_slash = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    let mut out = segments.join("/");
    if absolute {
        out.insert(0, '/');
    }
    if trailing_slash && !segments.is_empty() {
        out.push('/');
    }
    out
}

/// Lexically normalize a path: drop `.` and resolve `..` without touching
/// the filesystem.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}
