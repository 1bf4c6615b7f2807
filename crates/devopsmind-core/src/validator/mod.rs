//! Validator resolution and execution.
//!
//! A challenge's validator is chosen from its metadata or from conventional
//! files in the challenge directory, then run with the process working
//! directory switched to the player's workspace. Whatever happens inside,
//! the caller gets a [`ValidationOutcome`] back and the working directory is
//! restored.

pub mod builtin;
pub mod command;

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

pub use command::{CommandValidator, PythonValidator};

pub type Context = serde_json::Map<String, serde_json::Value>;

pub const MISSING_MESSAGE: &str = "Validator missing";

// ---------------------------------------------------------------------------
// Selection / outcome
// ---------------------------------------------------------------------------

/// How a challenge names its validator in metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorSpec {
    /// A validator compiled into this crate, by name.
    Builtin(String),
    /// An argv executed with the challenge directory as the base for
    /// relative script paths.
    Command(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub success: bool,
    pub message: String,
}

impl ValidationOutcome {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    pub fn fault(fault: impl fmt::Display) -> Self {
        Self::fail(format!("Validator threw an exception: {fault}"))
    }
}

// ---------------------------------------------------------------------------
// Validator trait
// ---------------------------------------------------------------------------

/// A unit that judges the current working directory.
pub trait Validator {
    fn evaluate(&self, ctx: &Context) -> ValidationOutcome;

    /// Short label for logs and `describe`.
    fn describe(&self) -> String;
}

/// Stands in when no validator could be resolved.
#[derive(Debug, Clone)]
pub struct MissingValidator {
    detail: Option<String>,
}

impl Validator for MissingValidator {
    fn evaluate(&self, _ctx: &Context) -> ValidationOutcome {
        match &self.detail {
            Some(d) => ValidationOutcome::fail(format!("{MISSING_MESSAGE}: {d}")),
            None => ValidationOutcome::fail(MISSING_MESSAGE),
        }
    }

    fn describe(&self) -> String {
        "missing".to_string()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve the validator for a challenge directory.
///
/// Metadata builtin → metadata command → executable `validate` →
/// `validate.sh` → `validator.py` → missing.
pub fn load_validator(challenge_dir: &Path, spec: Option<&ValidatorSpec>) -> Box<dyn Validator> {
    let dir = challenge_dir
        .canonicalize()
        .unwrap_or_else(|_| challenge_dir.to_path_buf());

    match spec {
        Some(ValidatorSpec::Builtin(name)) => {
            return match builtin::lookup(name) {
                Some(v) => v,
                None => {
                    warn!("unknown builtin validator '{name}' in {}", dir.display());
                    Box::new(MissingValidator {
                        detail: Some(format!("unknown builtin '{name}'")),
                    })
                }
            };
        }
        Some(ValidatorSpec::Command(argv)) => {
            return match CommandValidator::from_argv(argv, &dir) {
                Some(v) => Box::new(v),
                None => Box::new(MissingValidator {
                    detail: Some("empty command".to_string()),
                }),
            };
        }
        None => {}
    }

    let executable = dir.join("validate");
    if is_executable(&executable) {
        return Box::new(CommandValidator::new(executable, Vec::new(), &dir));
    }
    let script = dir.join("validate.sh");
    if script.is_file() {
        return Box::new(CommandValidator::new(
            PathBuf::from("sh"),
            vec![script.to_string_lossy().into_owned()],
            &dir,
        ));
    }
    let python = dir.join("validator.py");
    if python.is_file() {
        return Box::new(PythonValidator::new(python));
    }

    debug!(dir = %dir.display(), "no validator found");
    Box::new(MissingValidator { detail: None })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Serializes working-directory switches across threads.
static CWD_LOCK: Mutex<()> = Mutex::new(());

/// Switches the process working directory and restores it on drop.
struct CwdGuard {
    previous: PathBuf,
}

impl CwdGuard {
    fn enter(dir: &Path) -> std::io::Result<Self> {
        let previous = std::env::current_dir()?;
        std::env::set_current_dir(dir)?;
        Ok(Self { previous })
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            warn!("failed to restore working directory {}: {e}", self.previous.display());
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

/// Run `validator` inside `workspace`.
///
/// The context reaches the validator exactly as the caller built it.
/// Failing to enter the workspace, or a panic inside the validator, yields a
/// failed outcome rather than an error.
pub fn run(validator: &dyn Validator, workspace: &Path, context: &Context) -> ValidationOutcome {
    let workspace = workspace
        .canonicalize()
        .unwrap_or_else(|_| workspace.to_path_buf());

    let _lock = CWD_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let _guard = match CwdGuard::enter(&workspace) {
        Ok(g) => g,
        Err(e) => return ValidationOutcome::fault(format!("{}: {e}", workspace.display())),
    };

    debug!(validator = %validator.describe(), workspace = %workspace.display(), "running validator");
    match panic::catch_unwind(AssertUnwindSafe(|| validator.evaluate(context))) {
        Ok(outcome) => outcome,
        Err(payload) => ValidationOutcome::fault(panic_message(payload.as_ref())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_validator_outcome() {
        let dir = TempDir::new().unwrap();
        let v = load_validator(dir.path(), None);
        assert_eq!(v.describe(), "missing");
        let outcome = v.evaluate(&Context::new());
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Validator missing");
    }

    #[test]
    fn unknown_builtin_is_missing() {
        let dir = TempDir::new().unwrap();
        let spec = ValidatorSpec::Builtin("does-not-exist".to_string());
        let outcome = load_validator(dir.path(), Some(&spec)).evaluate(&Context::new());
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Validator missing"));
    }

    #[test]
    fn resolution_prefers_metadata_then_conventional_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("validator.py"), "def validate(): return True, 'ok'\n")
            .unwrap();
        assert_eq!(load_validator(dir.path(), None).describe(), "python validator.py");

        std::fs::write(dir.path().join("validate.sh"), "exit 0\n").unwrap();
        assert!(load_validator(dir.path(), None).describe().starts_with("sh "));

        let spec = ValidatorSpec::Builtin("log-filter".to_string());
        assert_eq!(load_validator(dir.path(), Some(&spec)).describe(), "builtin log-filter");
    }

    #[test]
    fn spec_deserializes_from_yaml() {
        let b: ValidatorSpec = serde_yaml::from_str("builtin: cpu-alert\n").unwrap();
        assert_eq!(b, ValidatorSpec::Builtin("cpu-alert".to_string()));
        let c: ValidatorSpec = serde_yaml::from_str("command: [sh, check.sh]\n").unwrap();
        assert_eq!(
            c,
            ValidatorSpec::Command(vec!["sh".to_string(), "check.sh".to_string()])
        );
    }

    #[test]
    fn fault_message_format() {
        let o = ValidationOutcome::fault("boom");
        assert!(!o.success);
        assert_eq!(o.message, "Validator threw an exception: boom");
    }

    #[test]
    fn panic_payloads_are_readable() {
        let p: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(p.as_ref()), "static");
        let p: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(p.as_ref()), "owned");
        let p: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(p.as_ref()), "panic");
    }
}
