//! External-process validators.
//!
//! # Protocol
//! - The validation context is written to stdin as one JSON object.
//! - If the last non-empty stdout line is `{"ok": bool, "message": string}`,
//!   that is the result.
//! - Otherwise the exit status decides; the message is the trimmed stdout,
//!   or stderr when stdout is empty.
//!
//! Python validators (`validator.py` exposing `validate()` or
//! `validate(context)`) run through a small shim that speaks this protocol.

use super::{Context, ValidationOutcome, Validator};
use serde::Deserialize;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Set for every validator subprocess.
pub const CHALLENGE_DIR_ENV: &str = "DEVOPSMIND_CHALLENGE_DIR";

// ---------------------------------------------------------------------------
// Python runtime detection
// ---------------------------------------------------------------------------

/// Detect the Python interpreter, `python3` before `python`.
pub fn detect_python() -> Option<&'static str> {
    ["python3", "python"]
        .into_iter()
        .find(|name| which::which(name).is_ok())
}

const PYTHON_SHIM: &str = r#"
import importlib.util, inspect, json, os, sys

def emit(ok, message):
    print(json.dumps({"ok": bool(ok), "message": str(message)}))

path = sys.argv[1]
raw = sys.stdin.read()
try:
    ctx = json.loads(raw) if raw.strip() else {}
except ValueError:
    ctx = {}
sys.path.insert(0, os.path.dirname(path))
try:
    spec = importlib.util.spec_from_file_location("challenge_validator", path)
    module = importlib.util.module_from_spec(spec)
    spec.loader.exec_module(module)
    fn = getattr(module, "validate", None)
    if fn is None:
        emit(False, "Validator missing")
        sys.exit(0)
    try:
        arity = len(inspect.signature(fn).parameters)
    except (TypeError, ValueError):
        arity = 0
    result = fn(ctx) if arity >= 1 else fn()
except Exception as e:
    emit(False, "Validator threw an exception: %s" % e)
    sys.exit(0)
if isinstance(result, (tuple, list)):
    emit(result[0] if result else False, result[1] if len(result) > 1 else "")
else:
    emit(result, "")
"#;

// ---------------------------------------------------------------------------
// Output interpretation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ReportedOutcome {
    ok: bool,
    #[serde(default)]
    message: String,
}

/// Turn a finished validator process into an outcome.
pub fn interpret_output(output: &Output) -> ValidationOutcome {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if let Some(reported) = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .and_then(|l| serde_json::from_str::<ReportedOutcome>(l.trim()).ok())
    {
        return ValidationOutcome {
            success: reported.ok,
            message: reported.message,
        };
    }

    let message = match (stdout.trim(), stderr.trim()) {
        ("", "") if output.status.success() => "Validation passed".to_string(),
        ("", "") => match output.status.code() {
            Some(code) => format!("Validation failed (exit code {code})"),
            None => "Validation failed (terminated by signal)".to_string(),
        },
        ("", err) => err.to_string(),
        (out, _) => out.to_string(),
    };
    ValidationOutcome {
        success: output.status.success(),
        message,
    }
}

/// Spawn `cmd`, feed the context on stdin and collect the outcome.
fn run_process(mut cmd: Command, ctx: &Context) -> ValidationOutcome {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => return ValidationOutcome::fault(format!("failed to start validator: {e}")),
    };

    if let Some(mut stdin) = child.stdin.take() {
        let payload = serde_json::Value::Object(ctx.clone()).to_string();
        if let Err(e) = stdin.write_all(payload.as_bytes()) {
            // Validators that ignore stdin may exit before reading it.
            if e.kind() != ErrorKind::BrokenPipe {
                return ValidationOutcome::fault(format!("failed to write context: {e}"));
            }
        }
    }

    match child.wait_with_output() {
        Ok(output) => interpret_output(&output),
        Err(e) => ValidationOutcome::fault(e),
    }
}

// ---------------------------------------------------------------------------
// CommandValidator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CommandValidator {
    program: PathBuf,
    args: Vec<String>,
    challenge_dir: PathBuf,
}

impl CommandValidator {
    pub fn new(program: PathBuf, args: Vec<String>, challenge_dir: &Path) -> Self {
        Self {
            program,
            args,
            challenge_dir: challenge_dir.to_path_buf(),
        }
    }

    /// Build from a metadata argv. Elements naming a file inside the
    /// challenge directory are made absolute, everything else passes through.
    pub fn from_argv(argv: &[String], challenge_dir: &Path) -> Option<Self> {
        let resolve = |arg: &String| {
            let candidate = challenge_dir.join(arg);
            if candidate.is_file() {
                candidate.to_string_lossy().into_owned()
            } else {
                arg.clone()
            }
        };
        let (program, rest) = argv.split_first()?;
        Some(Self::new(
            PathBuf::from(resolve(program)),
            rest.iter().map(resolve).collect(),
            challenge_dir,
        ))
    }
}

impl Validator for CommandValidator {
    fn evaluate(&self, ctx: &Context) -> ValidationOutcome {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).env(CHALLENGE_DIR_ENV, &self.challenge_dir);
        debug!(program = %self.program.display(), "spawning command validator");
        run_process(cmd, ctx)
    }

    fn describe(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

// ---------------------------------------------------------------------------
// PythonValidator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PythonValidator {
    script: PathBuf,
}

impl PythonValidator {
    pub fn new(script: PathBuf) -> Self {
        Self { script }
    }
}

impl Validator for PythonValidator {
    fn evaluate(&self, ctx: &Context) -> ValidationOutcome {
        let Some(python) = detect_python() else {
            return ValidationOutcome::fault("no python interpreter found (install python3)");
        };
        let mut cmd = Command::new(python);
        cmd.arg("-c").arg(PYTHON_SHIM).arg(&self.script);
        if let Some(dir) = self.script.parent() {
            cmd.env(CHALLENGE_DIR_ENV, dir);
        }
        debug!(python, script = %self.script.display(), "spawning python validator");
        run_process(cmd, ctx)
    }

    fn describe(&self) -> String {
        let name = self
            .script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("python {name}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
