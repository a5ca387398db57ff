//! System prompt assembly.
//!
//! The prompt is rebuilt at the start of every turn: identity documents are
//! read fresh from the workspace so edits land immediately, while skill
//! files are cached behind an mtime snapshot because there can be many of
//! them.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

const CAPABILITIES: &str = "\
You are a capable AI agent with access to tools. Use them when they help:
run shell commands, read and write files in your workspace, search the web,
and keep notes about the user. Think before acting, report what you did,
and keep replies concise.";

/// Identity documents, read fresh on every build. Order matters: soul
/// before identity before user notes before operating instructions.
const IDENTITY_FILES: [&str; 4] = ["SOUL.md", "IDENTITY.md", "USER.md", "AGENT.md"];

pub struct PromptAssembler {
    workspace: PathBuf,
    skills: SkillCache,
}

impl PromptAssembler {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        Self {
            skills: SkillCache::new(workspace.join("skills")),
            workspace,
        }
    }

    /// Build the system prompt for one turn.
    pub fn build(&mut self) -> String {
        let mut sections = vec![CAPABILITIES.to_string()];

        let identity: Vec<String> = IDENTITY_FILES
            .iter()
            .filter_map(|name| {
                let path = self.workspace.join(name);
                std::fs::read_to_string(&path)
                    .ok()
                    .map(|text| text.trim().to_string())
                    .filter(|text| !text.is_empty())
            })
            .collect();
        if !identity.is_empty() {
            sections.push(format!("# Identity\n\n{}", identity.join("\n\n---\n\n")));
        }

        if let Some(skills) = self.skills.section() {
            sections.push(format!("# Available Skills\n\n{skills}"));
        }

        sections.join("\n\n")
    }
}

/// Caches the rendered skills section behind a (path, mtime) snapshot of
/// `workspace/skills/*/SKILL.md`. Any change, addition, or removal rebuilds
/// the whole section.
struct SkillCache {
    dir: PathBuf,
    snapshot: Vec<(PathBuf, SystemTime)>,
    rendered: Option<String>,
}

impl SkillCache {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            snapshot: Vec::new(),
            rendered: None,
        }
    }

    fn scan(&self) -> Vec<(PathBuf, SystemTime)> {
        let Ok(reader) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut entries: Vec<(PathBuf, SystemTime)> = reader
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path().join("SKILL.md"))
            .filter_map(|path| {
                let mtime = std::fs::metadata(&path).ok()?.modified().ok()?;
                Some((path, mtime))
            })
            .collect();
        entries.sort();
        entries
    }

    fn section(&mut self) -> Option<String> {
        let snapshot = self.scan();
        if snapshot != self.snapshot || self.rendered.is_none() {
            debug!(skills = snapshot.len(), "Rebuilding skills section");
            self.rendered = render_skills(&snapshot);
            self.snapshot = snapshot;
        }
        self.rendered.clone()
    }
}

fn render_skills(snapshot: &[(PathBuf, SystemTime)]) -> Option<String> {
    let mut parts = Vec::new();
    for (path, _) in snapshot {
        match std::fs::read_to_string(path) {
            Ok(text) if !text.trim().is_empty() => parts.push(text.trim().to_string()),
            Ok(_) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable skill file");
            }
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n---\n\n"))
    }
}

/// Seed the workspace with default identity files on first run. Existing
/// files are never touched.
pub fn ensure_identity_files(workspace: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(workspace)?;
    let defaults: [(&str, &str); 4] = [
        (
            "SOUL.md",
            "# Soul\n\nBe genuinely helpful, direct, and honest. Admit what you don't know.\n",
        ),
        (
            "IDENTITY.md",
            "# Identity\n\nYou are Pincer, a personal assistant agent.\n",
        ),
        ("USER.md", "# User\n\n(nothing recorded yet)\n"),
        (
            "AGENT.md",
            "# Operating Notes\n\nPrefer workspace-relative paths. Ask before destructive actions.\n",
        ),
    ];
    for (name, content) in defaults {
        let path = workspace.join(name);
        if !path.exists() {
            std::fs::write(&path, content)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_without_workspace_is_just_capabilities() {
        let mut assembler = PromptAssembler::new("/nonexistent/workspace");
        let prompt = assembler.build();
        assert!(prompt.contains("capable AI agent"));
        assert!(!prompt.contains("# Identity"));
        assert!(!prompt.contains("# Available Skills"));
    }

    #[test]
    fn identity_files_read_fresh_each_build() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("SOUL.md"), "Be kind.").unwrap();

        let mut assembler = PromptAssembler::new(dir.path());
        assert!(assembler.build().contains("Be kind."));

        std::fs::write(dir.path().join("SOUL.md"), "Be bold.").unwrap();
        let prompt = assembler.build();
        assert!(prompt.contains("Be bold."));
        assert!(!prompt.contains("Be kind."));
    }

    #[test]
    fn identity_documents_joined_with_dividers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("SOUL.md"), "soul text").unwrap();
        std::fs::write(dir.path().join("AGENT.md"), "agent text").unwrap();

        let mut assembler = PromptAssembler::new(dir.path());
        let prompt = assembler.build();
        assert!(prompt.contains("soul text\n\n---\n\nagent text"));
    }

    #[test]
    fn skills_cached_until_changed() {
        let dir = tempfile::tempdir().unwrap();
        let skill_dir = dir.path().join("skills").join("weather");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), "# Weather skill").unwrap();

        let mut assembler = PromptAssembler::new(dir.path());
        assert!(assembler.build().contains("# Weather skill"));

        // Removal is noticed on the next build
        std::fs::remove_file(skill_dir.join("SKILL.md")).unwrap();
        assert!(!assembler.build().contains("# Weather skill"));
    }

    #[test]
    fn seeding_creates_but_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("ws");
        ensure_identity_files(&workspace).unwrap();
        assert!(workspace.join("SOUL.md").exists());

        std::fs::write(workspace.join("SOUL.md"), "custom soul").unwrap();
        ensure_identity_files(&workspace).unwrap();
        let text = std::fs::read_to_string(workspace.join("SOUL.md")).unwrap();
        assert_eq!(text, "custom soul");
    }
}
