// Versioned prompt configuration loaded from YAML.
//
// Layout: `<prompts_dir>/<task>/v<major.minor.patch>-<language>.yaml`, e.g.
// `prompts/gap_analysis/v1.2.0-zh-TW.yaml`. Each file carries `version`,
// `metadata`, `llm_config` and `prompts.{system,user}`. The user prompt is a
// template with `{identifier}` placeholders.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::language::Language;

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid");
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt not configured: task={task}, language={language}, version={version}")]
    NotFound {
        task: PromptTask,
        language: Language,
        version: String,
    },

    #[error("No prompt versions found: task={task}, language={language}")]
    NoVersions { task: PromptTask, language: Language },

    #[error("Failed to read prompt file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse prompt file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Missing required variable in prompt: {0}")]
    MissingVariable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptTask {
    GapAnalysis,
    KeywordExtraction,
}

impl PromptTask {
    pub fn dir_name(&self) -> &'static str {
        match self {
            PromptTask::GapAnalysis => "gap_analysis",
            PromptTask::KeywordExtraction => "keyword_extraction",
        }
    }
}

impl fmt::Display for PromptTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// File model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptMetadata {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "active".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_tokens() -> u32 {
    1000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompts {
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub version: String,
    #[serde(default)]
    pub metadata: PromptMetadata,
    #[serde(default)]
    pub llm_config: LlmConfig,
    pub prompts: Prompts,
}

impl PromptConfig {
    pub fn system_prompt(&self) -> &str {
        &self.prompts.system
    }

    /// Fills the user template. Every placeholder must have a value.
    pub fn format_user_prompt(&self, variables: &HashMap<&str, String>) -> Result<String, PromptError> {
        render_template(&self.prompts.user, variables)
    }
}

pub fn render_template(template: &str, variables: &HashMap<&str, String>) -> Result<String, PromptError> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = variables
            .get(name.as_str())
            .ok_or_else(|| PromptError::MissingVariable(name.as_str().to_string()))?;
        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(value);
        last = whole.end();
    }

    rendered.push_str(&template[last..]);
    Ok(rendered)
}

// ────────────────────────────────────────────────────────────────────────────
// Provider
// ────────────────────────────────────────────────────────────────────────────

/// Source of prompt configurations. `version: None` selects the highest version.
pub trait PromptProvider: Send + Sync {
    fn prompt_config(
        &self,
        task: PromptTask,
        language: Language,
        version: Option<&str>,
    ) -> Result<Arc<PromptConfig>, PromptError>;
}

/// Reads prompt files from disk on first use and caches the parsed result.
pub struct YamlPromptProvider {
    root: PathBuf,
    cache: Mutex<HashMap<PathBuf, Arc<PromptConfig>>>,
}

impl YamlPromptProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!("Prompt provider reading from {}", root.display());
        Self {
            root,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn file_path(&self, task: PromptTask, language: Language, version: &str) -> PathBuf {
        let version = version.trim_start_matches('v');
        self.root
            .join(task.dir_name())
            .join(format!("v{version}-{}.yaml", language.tag()))
    }

    /// Available versions for `(task, language)`, highest first.
    pub fn list_versions(&self, task: PromptTask, language: Language) -> Result<Vec<String>, PromptError> {
        let dir = self.root.join(task.dir_name());
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(PromptError::Io { path: dir, source }),
        };

        let suffix = format!("-{}.yaml", language.tag());
        let mut versions: Vec<(Vec<u32>, String)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| {
                let version = name.strip_prefix('v')?.strip_suffix(&suffix)?.to_string();
                Some((parse_semver(&version)?, version))
            })
            .collect();

        versions.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(versions.into_iter().map(|(_, v)| v).collect())
    }

    fn load(&self, path: &Path) -> Result<Arc<PromptConfig>, PromptError> {
        if let Some(config) = self.cache.lock().get(path) {
            return Ok(config.clone());
        }

        let content = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: PromptConfig =
            serde_yaml::from_str(&content).map_err(|source| PromptError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Arc::new(config);

        info!(
            "Loaded prompt config {} (version {})",
            path.display(),
            config.version
        );
        self.cache.lock().insert(path.to_path_buf(), config.clone());
        Ok(config)
    }
}

impl PromptProvider for YamlPromptProvider {
    fn prompt_config(
        &self,
        task: PromptTask,
        language: Language,
        version: Option<&str>,
    ) -> Result<Arc<PromptConfig>, PromptError> {
        let version = match version {
            Some(v) if v != "latest" => v.to_string(),
            _ => self
                .list_versions(task, language)?
                .into_iter()
                .next()
                .ok_or(PromptError::NoVersions { task, language })?,
        };

        let path = self.file_path(task, language, &version);
        if parse_semver(version.trim_start_matches('v')).is_none() || !path.exists() {
            return Err(PromptError::NotFound {
                task,
                language,
                version,
            });
        }
        self.load(&path)
    }
}

fn parse_semver(version: &str) -> Option<Vec<u32>> {
    version.split('.').map(|part| part.parse().ok()).collect()
}
