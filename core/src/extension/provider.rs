//! Environment variable access.
//!
//! Loaders never read the process environment directly; they go through an
//! [`EnvProvider`]. [`Environment`] layers an override store on top of the
//! real environment so tests and embedding applications can inject values or
//! hide real variables.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// Key-value lookup of environment variables.
pub trait EnvProvider: fmt::Debug + Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// Process environment plus a mutex-guarded override store.
///
/// An override of `None` hides a variable that the process environment
/// defines.
///
/// # Examples
///
/// ```
/// use option_schema_core::{EnvProvider, Environment};
///
/// let env = Environment::isolated();
/// env.set_var("HOST", "localhost");
/// assert_eq!(env.var("HOST").as_deref(), Some("localhost"));
///
/// env.unset_var("HOST");
/// assert_eq!(env.var("HOST"), None);
/// ```
#[derive(Debug)]
pub struct Environment {
    overrides: Mutex<HashMap<String, Option<String>>>,
    inherit: bool,
}

impl Environment {
    /// Backed by the process environment.
    pub fn new() -> Self {
        Self {
            overrides: Mutex::new(HashMap::new()),
            inherit: true,
        }
    }

    /// Sees only its own overrides.
    pub fn isolated() -> Self {
        Self {
            overrides: Mutex::new(HashMap::new()),
            inherit: false,
        }
    }

    /// An isolated environment seeded with `vars`.
    pub fn with_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env = Self::isolated();
        for (name, value) in vars {
            env.set_var(name, value);
        }
        env
    }

    /// The process-wide instance used when no environment is injected.
    pub fn global() -> Arc<Environment> {
        static GLOBAL: OnceLock<Arc<Environment>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Environment::new())))
    }

    fn overrides(&self) -> MutexGuard<'_, HashMap<String, Option<String>>> {
        self.overrides.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_var(&self, name: impl Into<String>, value: impl Into<String>) {
        self.overrides().insert(name.into(), Some(value.into()));
    }

    /// Hides `name`, returning the previous override.
    pub fn unset_var(&self, name: impl Into<String>) -> Option<String> {
        self.overrides().insert(name.into(), None).flatten()
    }

    /// Sets `name` only when it resolves to nothing; returns whether it did.
    pub fn set_var_if_missing(&self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        let mut overrides = self.overrides();
        let defined = match overrides.get(&name) {
            Some(value) => value.is_some(),
            None => self.inherit && std::env::var(&name).is_ok(),
        };
        if defined {
            return false;
        }
        overrides.insert(name, Some(value.into()));
        true
    }

    /// Drops every override.
    pub fn clear(&self) {
        self.overrides().clear();
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvProvider for Environment {
    fn var(&self, name: &str) -> Option<String> {
        if let Some(value) = self.overrides().get(name) {
            return value.clone();
        }
        if self.inherit {
            std::env::var(name).ok()
        } else {
            None
        }
    }
}

/// Values read from a file, consulted only for names the base provider lacks.
#[derive(Debug)]
pub(crate) struct Overlay<'a> {
    base: &'a dyn EnvProvider,
    file: HashMap<String, String>,
}

impl<'a> Overlay<'a> {
    pub(crate) fn new(base: &'a dyn EnvProvider, file: HashMap<String, String>) -> Self {
        Self { base, file }
    }
}

impl EnvProvider for Overlay<'_> {
    fn var(&self, name: &str) -> Option<String> {
        self.base.var(name).or_else(|| self.file.get(name).cloned())
    }
}
