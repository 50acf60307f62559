// src/template/mod.rs — Task templates stored as YAML files
//
// A template names the seed prompt, the requirements and the fixed Q&A
// evaluation set for a session. Files live at `<root>/<name>.yaml`, where
// `name` may carry one sub-directory (`user/summaries`).

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::infra::errors::PromptLoopError;

const EXTENSION: &str = "yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

impl QaPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub requirements: String,
    /// Target word count for optimized prompts.
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub qa: Vec<QaPair>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            requirements: String::new(),
            count: None,
            qa: vec![QaPair::new("", "")],
        }
    }
}

impl Template {
    /// A session needs at least one example, and every example a question.
    pub fn validate(&self, name: &str) -> Result<(), PromptLoopError> {
        if self.qa.is_empty() {
            return Err(template_error(name, "qa must contain at least one example"));
        }
        if let Some(i) = self.qa.iter().position(|qa| qa.question.trim().is_empty()) {
            return Err(template_error(
                name,
                format!("qa[{i}] has an empty question"),
            ));
        }
        Ok(())
    }

    /// Copy with surrounding whitespace removed from every Q&A field.
    fn trimmed(&self) -> Self {
        Self {
            qa: self
                .qa
                .iter()
                .map(|qa| QaPair::new(qa.question.trim(), qa.answer.trim()))
                .collect(),
            ..self.clone()
        }
    }
}

fn template_error(name: &str, message: impl Into<String>) -> PromptLoopError {
    PromptLoopError::Template {
        name: name.to_string(),
        message: message.into(),
    }
}

/// Reads and writes templates under a settings directory.
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a template name to its file. Names are relative, at most two
    /// segments deep, and may not climb out of the root.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, PromptLoopError> {
        let trimmed = name.trim();
        let rel = Path::new(trimmed);
        let segments = rel.components().count();
        let clean = rel.components().all(|c| matches!(c, Component::Normal(_)));
        if trimmed.is_empty() || !clean || segments > 2 {
            return Err(template_error(name, "invalid template name"));
        }
        Ok(self.root.join(format!("{trimmed}.{EXTENSION}")))
    }

    /// Sorted names of every template, including one level of sub-directories.
    pub fn list(&self) -> Result<Vec<String>, PromptLoopError> {
        let mut names = Vec::new();
        if !self.root.is_dir() {
            return Ok(names);
        }

        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_dir() {
                let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                for sub in std::fs::read_dir(&path)? {
                    if let Some(stem) = template_stem(&sub?.path()) {
                        names.push(format!("{dir_name}/{stem}"));
                    }
                }
            } else if let Some(stem) = template_stem(&path) {
                names.push(stem);
            }
        }

        names.sort();
        Ok(names)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn load(&self, name: &str) -> Result<Template, PromptLoopError> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(template_error(
                name,
                format!("not found at {}", path.display()),
            ));
        }
        let content = std::fs::read_to_string(&path)?;
        serde_yml::from_str(&content).map_err(|e| template_error(name, e.to_string()))
    }

    /// Load `name`, or an empty template when the file does not exist yet.
    pub fn load_or_default(&self, name: &str) -> Result<Template, PromptLoopError> {
        if self.path_for(name)?.is_file() {
            self.load(name)
        } else {
            Ok(Template::default())
        }
    }

    pub fn save(&self, name: &str, template: &Template) -> Result<PathBuf, PromptLoopError> {
        let path = self.path_for(name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yml::to_string(&template.trimmed())
            .map_err(|e| template_error(name, e.to_string()))?;
        std::fs::write(&path, yaml)?;
        tracing::debug!("Saved template '{}' to {}", name, path.display());
        Ok(path)
    }
}

fn template_stem(path: &Path) -> Option<String> {
    if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Template {
        Template {
            prompt: "Answer the arithmetic question.".into(),
            requirements: "Reply with a single number.".into(),
            count: Some(50),
            qa: vec![QaPair::new("2+2?", "4"), QaPair::new("3*3?", "9")],
        }
    }

    // ─── Validation ─────────────────────────────────────────────

    #[test]
    fn test_validate_ok() {
        assert!(sample().validate("math").is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_qa() {
        let t = Template {
            qa: vec![],
            ..sample()
        };
        let err = t.validate("math").unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn test_validate_rejects_blank_question() {
        let t = Template {
            qa: vec![QaPair::new("ok?", "yes"), QaPair::new("   ", "x")],
            ..sample()
        };
        let err = t.validate("math").unwrap_err();
        assert!(err.to_string().contains("qa[1]"));
    }

    #[test]
    fn test_default_template_fails_validation() {
        assert!(Template::default().validate("new").is_err());
    }

    // ─── Names ──────────────────────────────────────────────────

    #[test]
    fn test_path_for_rejects_escapes() {
        let store = TemplateStore::new("/tmp/settings");
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("/abs").is_err());
        assert!(store.path_for("a/b/c").is_err());
        assert!(store.path_for("").is_err());
        assert_eq!(
            store.path_for("user/poem").unwrap(),
            PathBuf::from("/tmp/settings/user/poem.yaml")
        );
    }

    // ─── Store ──────────────────────────────────────────────────

    #[test]
    fn test_save_then_load_trims_qa() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::new(dir.path());
        let mut t = sample();
        t.qa[0] = QaPair::new("  2+2?\n", " 4 ");
        store.save("math", &t).unwrap();

        let loaded = store.load("math").unwrap();
        assert_eq!(loaded.qa[0], QaPair::new("2+2?", "4"));
        assert_eq!(loaded.count, Some(50));
        assert_eq!(loaded.prompt, t.prompt);
    }

    #[test]
    fn test_load_missing_is_error() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::new(dir.path());
        let err = store.load("nope").unwrap_err();
        assert!(matches!(err, PromptLoopError::Template { ref name, .. } if name == "nope"));
    }

    #[test]
    fn test_load_or_default() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::new(dir.path());
        let t = store.load_or_default("fresh").unwrap();
        assert_eq!(t, Template::default());
        assert_eq!(t.qa.len(), 1);
    }

    #[test]
    fn test_load_yaml_with_null_count() {
        let dir = TempDir::new().unwrap();
        let yaml = "prompt: p\nrequirements: r\ncount: null\nqa:\n  - question: q\n    answer: a\n";
        std::fs::write(dir.path().join("t.yaml"), yaml).unwrap();
        let t = TemplateStore::new(dir.path()).load("t").unwrap();
        assert_eq!(t.count, None);
        assert_eq!(t.qa, vec![QaPair::new("q", "a")]);
    }

    #[test]
    fn test_list_includes_subdirs_sorted() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::new(dir.path());
        store.save("zeta", &sample()).unwrap();
        store.save("alpha", &sample()).unwrap();
        store.save("user/custom", &sample()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.list().unwrap(), vec!["alpha", "user/custom", "zeta"]);
        assert!(store.exists("user/custom"));
        assert!(!store.exists("user/other"));
    }

    #[test]
    fn test_list_missing_root_is_empty() {
        let store = TemplateStore::new("/nonexistent/promptloop/settings");
        assert!(store.list().unwrap().is_empty());
    }
}
