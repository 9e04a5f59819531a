//! Compiler configuration.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Every field has a default, so an empty configuration gives the stock
//! behavior: run `lessc -x -` (or whatever `$LESSC` names) and append
//! `.less` to extension-less import targets.
//!
//! Hosts can keep the settings in their own TOML files, either at the top
//! level or under a `[lessc]` table:
//!
//! ```toml
//! [lessc]
//! executable = "/opt/node/bin/lessc"
//! base-uri = "site:styles/"
//! ```

use serde::{Deserialize, Serialize};

use crate::error::LesscError;

/// Default compiler executable.
pub const DEFAULT_EXECUTABLE: &str = "lessc";

/// Environment variable that overrides the compiler executable.
pub const DEFAULT_ENV_VAR: &str = "LESSC";

/// Settings for the preprocessor and the external compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompilerConfig {
    /// Compiler executable used when the environment override is unset.
    pub executable: String,

    /// Arguments passed to the compiler: compressed/extended mode and
    /// "read from standard input".
    pub args: Vec<String>,

    /// Environment variable consulted for an executable override.
    pub env_var: String,

    /// Base reference for [`Compiler::compile_uri`](crate::Compiler::compile_uri).
    pub base_uri: Option<String>,

    /// Extension (without the dot) appended to import targets that have none.
    pub default_extension: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
            args: vec!["-x".to_string(), "-".to_string()],
            env_var: DEFAULT_ENV_VAR.to_string(),
            base_uri: None,
            default_extension: "less".to_string(),
        }
    }
}

impl CompilerConfig {
    /// Parse configuration from TOML.
    ///
    /// A `[lessc]` table takes precedence; otherwise the top-level keys are used.
    pub fn from_toml_str(content: &str) -> Result<Self, LesscError> {
        let table: toml::Table = content
            .parse()
            .map_err(|e: toml::de::Error| LesscError::Config(e.to_string()))?;

        let value = match table.get("lessc") {
            Some(section @ toml::Value::Table(_)) => section.clone(),
            Some(_) => {
                return Err(LesscError::Config(
                    "`lessc` must be a table".to_string(),
                ));
            }
            None => toml::Value::Table(table),
        };

        value
            .try_into()
            .map_err(|e: toml::de::Error| LesscError::Config(e.to_string()))
    }
}
