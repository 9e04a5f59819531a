//! `@import` inlining.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! LESS imports are expanded before the source is handed to the external
//! compiler, so that imports can use references the compiler knows nothing
//! about (named asset packages in particular). The expansion is a textual
//! rewrite driven by a single regex:
//!
//! ```text
//! @import "colors";              -> content of colors.less, inlined
//! @import (optional) "extra";    -> inlined, or nothing if it can't be loaded
//! @import "print.css";           -> left in place for the compiler
//! @import (less) "reset.css";    -> inlined as LESS
//! // @import "disabled";         -> removed
//! ```
//!
//! Every resolved reference is imported at most once per compilation, no
//! matter which file imports it. This also makes import cycles terminate.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::LesscError;
use crate::loader::Loader;
use crate::uri::{Resolver, Uri};

/// Matches `@import (options) "target";` with either quote style.
///
/// The target ends at the first matching quote and may not span lines. A
/// directive such as `@import "a" + "b";` therefore does not match at all
/// and is left for the compiler, rather than being read as the single
/// target `a" + "b`.
static IMPORT_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"@import\s*(?:\((?P<options>[^)]*)\))?\s*(?:"(?P<dq>[^"\n]*)"|'(?P<sq>[^'\n]*)')\s*;"#,
    )
    .unwrap()
});

/// Import options that would need real LESS semantics to honor.
const UNSUPPORTED_OPTIONS: &[&str] = &["reference", "inline", "multiple"];

/// References already imported during one compilation.
#[derive(Debug, Clone, Default)]
pub struct ImportState {
    imported: HashSet<Uri>,
}

impl ImportState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, uri: &Uri) -> bool {
        self.imported.contains(uri)
    }

    /// Record `uri`; returns `false` if it was already recorded.
    pub fn insert(&mut self, uri: Uri) -> bool {
        self.imported.insert(uri)
    }

    pub fn len(&self) -> usize {
        self.imported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imported.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Uri> {
        self.imported.iter()
    }
}

/// Parsed option list of one `@import` directive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub css: bool,
    pub less: bool,
    pub optional: bool,
}

impl ImportOptions {
    /// Parse a comma-separated option list. An absent or empty list means `once`.
    ///
    /// Unknown tokens are ignored; `reference`, `inline` and `multiple`
    /// are rejected.
    pub fn parse(options: Option<&str>) -> Result<Self, LesscError> {
        let raw = match options {
            Some(s) if !s.is_empty() => s,
            _ => "once",
        };
        let mut parsed = ImportOptions::default();
        for token in raw.split(',') {
            let token = token.trim().to_lowercase();
            if UNSUPPORTED_OPTIONS.contains(&token.as_str()) {
                return Err(LesscError::Unsupported(format!(
                    "import option {:?} is not supported",
                    token
                )));
            }
            match token.as_str() {
                "css" => parsed.css = true,
                "less" => parsed.less = true,
                "optional" => parsed.optional = true,
                _ => {}
            }
        }
        Ok(parsed)
    }
}

/// Heuristic check for an import that sits behind a `//` line comment.
///
/// Only the text between the previous newline and the directive is
/// inspected, so a `//` inside an earlier string literal on the same line
/// (`url("https://...")`) also counts as a comment.
pub fn is_commented_out(source: &str, start: usize) -> bool {
    let line_start = source[..start].rfind('\n').map_or(0, |idx| idx + 1);
    source[line_start..start].contains("//")
}

/// Whether the last path segment of `target` carries an extension.
fn has_extension(target: &str) -> bool {
    let name = target.rsplit('/').next().unwrap_or(target);
    name.trim_start_matches('.').contains('.')
}

/// Decode loaded or caller-provided bytes as LESS source text.
///
/// A leading byte-order mark is dropped.
pub(crate) fn decode_source(bytes: Vec<u8>) -> Result<String, std::string::FromUtf8Error> {
    let text = String::from_utf8(bytes)?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// Expands `@import` directives through a [`Resolver`] and [`Loader`].
pub struct Inliner<'a> {
    resolver: &'a dyn Resolver,
    loader: &'a dyn Loader,
    default_extension: &'a str,
}

impl<'a> Inliner<'a> {
    pub fn new(resolver: &'a dyn Resolver, loader: &'a dyn Loader) -> Self {
        Self {
            resolver,
            loader,
            default_extension: "less",
        }
    }

    /// Extension appended to import targets that have none (without the dot).
    pub fn with_default_extension(mut self, extension: &'a str) -> Self {
        self.default_extension = extension;
        self
    }

    /// Inline every import in `source`.
    ///
    /// `uri` is the reference `source` was loaded from (`None` for
    /// in-memory text); relative import targets are resolved against it.
    pub fn inline(
        &self,
        uri: Option<&Uri>,
        source: &str,
        state: &mut ImportState,
    ) -> Result<String, LesscError> {
        let mut output = String::with_capacity(source.len());
        let mut last = 0;

        for caps in IMPORT_DIRECTIVE.captures_iter(source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            output.push_str(&source[last..whole.start()]);
            last = whole.end();

            if is_commented_out(source, whole.start()) {
                tracing::debug!(directive = whole.as_str(), "dropping commented-out import");
                continue;
            }

            let replacement = self.expand(uri, &caps, state)?;
            output.push_str(&replacement);
        }

        output.push_str(&source[last..]);
        Ok(output)
    }

    fn expand(
        &self,
        uri: Option<&Uri>,
        caps: &Captures<'_>,
        state: &mut ImportState,
    ) -> Result<String, LesscError> {
        let directive = caps.get(0).map_or("", |m| m.as_str());
        let options = ImportOptions::parse(caps.name("options").map(|m| m.as_str()))?;

        let raw_target = caps
            .name("dq")
            .or_else(|| caps.name("sq"))
            .map_or("", |m| m.as_str());
        let target = if has_extension(raw_target) {
            raw_target.to_string()
        } else {
            format!("{}.{}", raw_target, self.default_extension)
        };

        if options.css || (target.ends_with(".css") && !options.less) {
            tracing::debug!(target = %target, "passing CSS import through");
            return Ok(directive.to_string());
        }

        let resolved = self.resolver.resolve(&target, uri);
        if state.contains(&resolved) {
            tracing::debug!(uri = %resolved, "skipping already imported source");
            return Ok(String::new());
        }
        state.insert(resolved.clone());

        let bytes = match self.loader.load(&resolved) {
            Ok(bytes) => bytes,
            Err(e) if options.optional && e.is_recoverable() => {
                tracing::debug!(uri = %resolved, error = %e, "optional import not loaded");
                return Ok(String::new());
            }
            Err(e) if !e.is_recoverable() => return Err(LesscError::Unsupported(e.to_string())),
            Err(e) => {
                return Err(LesscError::Asset {
                    uri: resolved,
                    source: e,
                });
            }
        };

        let content = decode_source(bytes).map_err(|_| {
            LesscError::InvalidInput(format!("{} is not valid UTF-8 text", resolved))
        })?;

        tracing::debug!(uri = %resolved, "inlining import");
        self.inline(Some(&resolved), &content, state)
    }
}
