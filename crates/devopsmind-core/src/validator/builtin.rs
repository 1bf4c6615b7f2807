//! Validators compiled into the engine, selected with
//! `validator: {builtin: <name>}` in challenge metadata.
//!
//! Each check inspects the current directory, which the runner has already
//! switched to the workspace. The context is never consulted for paths.

use super::command::detect_python;
use super::{Context, ValidationOutcome, Validator};
use super::ValidationOutcome as V;
use std::io;
use std::path::Path;
use std::process::Command;

type Check = fn(&Path) -> io::Result<ValidationOutcome>;

#[derive(Clone, Copy)]
pub struct Builtin {
    name: &'static str,
    check: Check,
}

impl Validator for Builtin {
    fn evaluate(&self, _ctx: &Context) -> ValidationOutcome {
        self.check_in(Path::new("."))
    }

    fn describe(&self) -> String {
        format!("builtin {}", self.name)
    }
}

impl Builtin {
    fn check_in(&self, dir: &Path) -> ValidationOutcome {
        (self.check)(dir).unwrap_or_else(ValidationOutcome::fault)
    }
}

const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "git-squash-merge",
        check: git_squash_merge,
    },
    Builtin {
        name: "git-rebase-branch",
        check: git_rebase_branch,
    },
    Builtin {
        name: "log-filter",
        check: log_filter,
    },
    Builtin {
        name: "metrics-average",
        check: metrics_average,
    },
    Builtin {
        name: "cpu-alert",
        check: cpu_alert,
    },
];

pub fn lookup(name: &str) -> Option<Box<dyn Validator>> {
    BUILTINS
        .iter()
        .find(|b| b.name.eq_ignore_ascii_case(name.trim()))
        .map(|b| Box::new(*b) as Box<dyn Validator>)
}

// ---------------------------------------------------------------------------
// Process helpers
// ---------------------------------------------------------------------------

struct Captured {
    ok: bool,
    /// stdout on success, stdout + stderr on failure.
    text: String,
}

fn capture(cmd: &mut Command) -> io::Result<Captured> {
    let out = cmd.output()?;
    let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
    if out.status.success() {
        return Ok(Captured {
            ok: true,
            text: stdout,
        });
    }
    let stderr = String::from_utf8_lossy(&out.stderr);
    Ok(Captured {
        ok: false,
        text: format!("{stdout}{stderr}").trim().to_string(),
    })
}

fn git(dir: &Path, args: &[&str]) -> io::Result<Captured> {
    capture(Command::new("git").args(args).current_dir(dir))
}

fn python(dir: &Path, script: &str) -> io::Result<Captured> {
    let interpreter = detect_python().unwrap_or("python3");
    let out = Command::new(interpreter)
        .arg(script)
        .current_dir(dir)
        .output()?;
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(Captured {
        ok: out.status.success(),
        text: text.trim().to_string(),
    })
}

const LOGIN_CONTENT: &str = "login implemented";

// ---------------------------------------------------------------------------
// git
// ---------------------------------------------------------------------------

fn git_squash_merge(dir: &Path) -> io::Result<ValidationOutcome> {
    if !dir.join(".git").is_dir() {
        return Ok(V::fail(".git not found."));
    }
    if !git(dir, &["rev-parse", "--verify", "main"])?.ok {
        return Ok(V::fail("Branch 'main' does not exist."));
    }

    let login = git(dir, &["show", "main:login.txt"])?;
    if !login.ok {
        return Ok(V::fail(
            "login.txt not present on main. Make sure you squash-merged feature/login into main.",
        ));
    }
    if login.text.trim() != LOGIN_CONTENT {
        return Ok(V::fail(
            "login.txt content on main must be exactly: login implemented",
        ));
    }

    let log = git(dir, &["log", "main", "--pretty=%H %s"])?;
    if !log.ok {
        return Ok(V::fail(format!("Failed to read git log: {}", log.text)));
    }
    let has_message = log.text.lines().any(|line| {
        line.split_once(' ')
            .is_some_and(|(_, subject)| subject.contains("Add auth feature"))
    });
    if !has_message {
        return Ok(V::fail(
            "No commit message on main contains the required substring: 'Add auth feature'",
        ));
    }

    let revs = git(dir, &["rev-list", "--parents", "main"])?;
    if !revs.ok {
        return Ok(V::fail(format!("Failed to list commits: {}", revs.text)));
    }
    // commit hash followed by more than one parent
    if revs
        .text
        .lines()
        .any(|line| line.split_whitespace().count() > 2)
    {
        return Ok(V::fail(
            "Found a merge commit on main. The history must not contain merge commits introduced by this operation.",
        ));
    }

    Ok(V::pass(
        "Squash-merge validated: main contains login.txt, message present, and no merge commits.",
    ))
}

fn git_rebase_branch(dir: &Path) -> io::Result<ValidationOutcome> {
    if !dir.join(".git").is_dir() {
        return Ok(V::fail(".git not found."));
    }
    let branch = git(dir, &["branch", "--list", "feature/login"])?;
    if !branch.ok || branch.text.trim().is_empty() {
        return Ok(V::fail(
            "Branch 'feature/login' not found. Create it with: git checkout -b feature/login",
        ));
    }

    let login_path = dir.join("login.txt");
    if !login_path.is_file() {
        return Ok(V::fail("login.txt missing in working directory."));
    }
    if std::fs::read_to_string(&login_path)?.trim() != LOGIN_CONTENT {
        return Ok(V::fail(
            "login.txt content must be exactly: login implemented",
        ));
    }

    let tip = git(dir, &["rev-parse", "feature/login"])?;
    if !tip.ok {
        return Ok(V::fail("Failed to resolve feature/login tip."));
    }
    let tip = tip.text.trim().to_string();

    let parents = git(dir, &["rev-list", "--parents", "-n", "1", &tip])?;
    if !parents.ok || parents.text.split_whitespace().count() != 2 {
        return Ok(V::fail(
            "The tip of feature/login appears to be a merge commit (expected single parent). Rebase onto main instead of merging.",
        ));
    }

    let blob = git(dir, &["show", &format!("{tip}:login.txt")])?;
    if !blob.ok {
        return Ok(V::fail(
            "Tip commit of feature/login does not contain login.txt. Make sure you committed the file on the feature branch.",
        ));
    }
    if blob.text.trim() != LOGIN_CONTENT {
        return Ok(V::fail(
            "login.txt content in commit doesn't match expected content.",
        ));
    }

    Ok(V::pass("Feature branch and rebase look correct."))
}

// ---------------------------------------------------------------------------
// observability
// ---------------------------------------------------------------------------

fn log_filter(dir: &Path) -> io::Result<ValidationOutcome> {
    let app = dir.join("app.log");
    let errors = dir.join("errors.log");
    if !app.is_file() {
        return Ok(V::fail("app.log missing (provided by challenge)."));
    }
    if !errors.is_file() {
        return Ok(V::fail("errors.log missing."));
    }

    let app = std::fs::read_to_string(app)?;
    let errors = std::fs::read_to_string(errors)?;
    let expected: Vec<&str> = app
        .split_inclusive('\n')
        .filter(|l| l.contains("ERROR"))
        .collect();
    let actual: Vec<&str> = errors.split_inclusive('\n').collect();

    if expected == actual {
        Ok(V::pass("Correct log filtering!"))
    } else {
        Ok(V::fail(
            "errors.log does not match the expected ERROR lines.",
        ))
    }
}

fn metrics_average(dir: &Path) -> io::Result<ValidationOutcome> {
    if !dir.join("metrics.txt").is_file() {
        return Ok(V::fail("metrics.txt missing (provided by challenge)."));
    }
    if !dir.join("metrics.py").is_file() {
        return Ok(V::fail("metrics.py missing."));
    }
    std::fs::write(
        dir.join("metrics.txt"),
        "latency_ms=100\nlatency_ms=200\nlatency_ms=300\n",
    )?;

    let run = python(dir, "metrics.py")?;
    if !run.ok {
        return Ok(V::fail(format!("Script crashed: {}", run.text)));
    }
    let Ok(value) = run.text.parse::<f64>() else {
        return Ok(V::fail(format!(
            "Output must be numeric only, got: {:?}",
            run.text
        )));
    };

    let expected = (100.0 + 200.0 + 300.0) / 3.0;
    if (value - expected).abs() < 0.001 {
        Ok(V::pass("Average latency computed correctly!"))
    } else {
        Ok(V::fail(format!("Expected {expected:?}, got {value:?}")))
    }
}

fn cpu_alert(dir: &Path) -> io::Result<ValidationOutcome> {
    if !dir.join("alert.py").is_file() {
        return Ok(V::fail("alert.py missing."));
    }
    std::fs::write(dir.join("cpu.txt"), "cpu=20\ncpu=30\ncpu=90\n")?;

    let run = python(dir, "alert.py")?;
    if !run.ok {
        return Ok(V::fail(format!("Script crashed: {}", run.text)));
    }
    if run.text == "ALERT" {
        Ok(V::pass("Alert engine works correctly for high CPU!"))
    } else {
        Ok(V::fail(format!("Expected ALERT, got {}", run.text)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
