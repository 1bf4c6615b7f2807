use crate::output::print_json;
use anyhow::Context;
use devopsmind_core::config::Config;
use devopsmind_core::paths::Layout;
use devopsmind_core::registry::{stack_display_name, Challenge, Registry};
use devopsmind_core::store;
use devopsmind_core::validator;
use std::path::{Path, PathBuf};

/// Requirement documents, in lookup order.
const DESCRIPTION_FILES: &[&str] = &["description.md", "DESCRIPTION.md", "README.md"];

fn find_challenge(layout: &Layout, id: &str) -> anyhow::Result<Challenge> {
    let config = Config::load(layout).context("failed to load config")?;
    Registry::from_layout(layout, &config)
        .find(id)
        .with_context(|| format!("unknown challenge '{}'", id.trim()))
}

/// First description document in any of `dirs`.
fn description_file(dirs: &[&Path]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|d| DESCRIPTION_FILES.iter().map(move |f| d.join(f)))
        .find(|p| p.is_file())
}

// ---------------------------------------------------------------------------
// hint
// ---------------------------------------------------------------------------

pub fn hint(layout: &Layout, id: &str, json: bool) -> anyhow::Result<()> {
    let ch = find_challenge(layout, id)?;
    if json {
        print_json(&serde_json::json!({ "id": ch.id, "hint": ch.hint }))
    } else {
        println!("Hint for {}: {}", ch.id, ch.hint);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// describe
// ---------------------------------------------------------------------------

pub fn run(layout: &Layout, id: &str, json: bool) -> anyhow::Result<()> {
    let ch = find_challenge(layout, id)?;
    let workspace = layout.workspace_dir(&ch.id);
    let source = store::resolve_source(layout, &ch);
    let doc = description_file(&[source.as_path(), ch.source_path.as_path()]);
    let body = match &doc {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => None,
    };
    let validator = validator::load_validator(&ch.source_path, ch.validator.as_ref()).describe();

    if json {
        return print_json(&serde_json::json!({
            "challenge": ch,
            "workspace": workspace.display().to_string(),
            "source": source.display().to_string(),
            "validator": validator,
            "description": body,
        }));
    }

    println!("{} ({})", ch.title, ch.id);
    println!("Stack:      {}", stack_display_name(&ch.stack));
    println!("Difficulty: {}", ch.difficulty);
    println!("XP:         {}", ch.xp);
    if !ch.tags.is_empty() {
        let tags: Vec<&str> = ch.tags.iter().map(String::as_str).collect();
        println!("Tags:       {}", tags.join(", "));
    }
    println!("Validator:  {validator}");
    println!("Workspace:  {}", workspace.display());
    println!();
    match body {
        Some(text) => println!("{}", text.trim_end()),
        None => println!("No description available for this challenge."),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn description_prefers_first_dir_then_file_order() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        std::fs::write(b.join("description.md"), "b").unwrap();
        std::fs::write(a.join("README.md"), "a").unwrap();

        assert_eq!(description_file(&[a.as_path(), b.as_path()]), Some(a.join("README.md")));
        std::fs::write(a.join("description.md"), "a").unwrap();
        assert_eq!(description_file(&[a.as_path(), b.as_path()]), Some(a.join("description.md")));
        assert_eq!(description_file(&[dir.path().join("none").as_path()]), None);
    }
}
