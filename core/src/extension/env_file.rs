//! `.env` file loader.
//!
//! The file holds one `NAME=value` pair per line; blank lines and lines
//! starting with `#` are ignored. Its location is taken from the
//! `--envFile=<path>` argument, else from a non-empty `ENV_FILE` variable,
//! else the extension's default path (`.env`).
//!
//! File values never shadow variables the environment already defines, and
//! are looked up with the same keys as
//! [`EnvironmentVariables`](super::EnvironmentVariables).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::arguments::ENV_FILE_ARGUMENT;
use super::environment::load_variables;
use super::provider::{EnvProvider, Overlay};
use super::{ExtensionStage, OptionsExtension};
use crate::builder::OptionsBuilder;
use crate::error::Result;

/// Default file name.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Variable that selects the file when no argument does.
pub const ENV_FILE_VARIABLE: &str = "ENV_FILE";

const ORIGIN: &str = "environment variable file";

/// Loads option values from an environment file.
#[derive(Debug, Clone)]
pub struct EnvironmentFile {
    default_path: PathBuf,
}

impl EnvironmentFile {
    pub fn new() -> Self {
        Self::at(DEFAULT_ENV_FILE)
    }

    /// Uses `path` when neither the arguments nor `ENV_FILE` name a file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            default_path: path.into(),
        }
    }

    /// File selected for `args` and `env`.
    pub fn resolve_path(&self, args: &[String], env: &dyn EnvProvider) -> PathBuf {
        if let Some(path) = args.iter().find_map(|arg| arg.strip_prefix(ENV_FILE_ARGUMENT)) {
            return PathBuf::from(path);
        }
        match env.var(ENV_FILE_VARIABLE) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => self.default_path.clone(),
        }
    }
}

impl Default for EnvironmentFile {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionsExtension for EnvironmentFile {
    fn id(&self) -> &str {
        "EnvironmentFile"
    }

    fn stage(&self) -> ExtensionStage {
        ExtensionStage::File
    }

    fn extend(&self, builder: &mut OptionsBuilder) -> Result<()> {
        let env = Arc::clone(builder.environment());
        let path = self.resolve_path(builder.args(), env.as_ref());
        if !path.exists() {
            debug!(path = %path.display(), "environment file not found, skipping");
            return Ok(());
        }

        let overlay = Overlay::new(env.as_ref(), read_env_file(&path, env.as_ref()));
        let shown = path.display().to_string();
        load_variables(builder, &overlay, ORIGIN, &|name| format!("{name} (file: {shown})"))
    }
}

/// Parses `path`, keeping only variables `env` does not define. An
/// unreadable file yields no values.
pub fn read_env_file(path: &Path, env: &dyn EnvProvider) -> HashMap<String, String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read environment file");
            return HashMap::new();
        }
    };

    let mut vars = HashMap::new();
    for line in content.lines() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, value)) = line.split_once('=').filter(|(name, _)| !name.is_empty()) else {
            warn!(line = %line, "invalid line in environment file, expected NAME=value");
            continue;
        };
        let name = name.trim();
        if env.var(name).is_some() || vars.contains_key(name) {
            continue;
        }
        debug!(name = %name, path = %path.display(), "variable read from environment file");
        vars.insert(name.to_string(), value.to_string());
    }
    vars
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::extension::provider::Environment;

    #[test]
    fn test_path_resolution_order() {
        let ext = EnvironmentFile::new();
        let env = Environment::with_vars([("ENV_FILE", "from-env")]);
        let args = vec!["--envFile=from-arg".to_string()];

        assert_eq!(ext.resolve_path(&args, &env), PathBuf::from("from-arg"));
        assert_eq!(ext.resolve_path(&[], &env), PathBuf::from("from-env"));

        let empty = Environment::with_vars([("ENV_FILE", "")]);
        assert_eq!(ext.resolve_path(&[], &empty), PathBuf::from(".env"));
        assert_eq!(
            EnvironmentFile::at("conf/app.env").resolve_path(&[], &Environment::isolated()),
            PathBuf::from("conf/app.env")
        );
    }

    #[test]
    fn test_parse_skips_comments_and_defined_variables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file).unwrap();
        writeln!(file, " HOST = db.local ").unwrap();
        writeln!(file, "=orphan").unwrap();
        writeln!(file, "no separator").unwrap();
        writeln!(file, "DEFINED=from-file").unwrap();
        writeln!(file, "URL=jdbc:mysql://h/db?a=b").unwrap();

        let env = Environment::with_vars([("DEFINED", "real")]);
        let vars = read_env_file(file.path(), &env);

        assert_eq!(vars.get("HOST").map(String::as_str), Some(" db.local "));
        assert_eq!(vars.get("URL").map(String::as_str), Some("jdbc:mysql://h/db?a=b"));
        assert!(!vars.contains_key("DEFINED"));
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn test_unreadable_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(dir.path(), &Environment::isolated());
        assert!(vars.is_empty());
    }
}
