//! Note (startup script) API (global)

use crate::error::Result;
use crate::search::{FindCondition, Searchable};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Script flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoteClass {
    #[default]
    #[serde(rename = "shell")]
    Shell,
    #[serde(rename = "yaml_cloud_config")]
    YamlCloudConfig,
}

impl NoteClass {
    pub const ALL: [&'static str; 2] = ["shell", "yaml_cloud_config"];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteClass::Shell => "shell",
            NoteClass::YamlCloudConfig => "yaml_cloud_config",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "shell" => Some(NoteClass::Shell),
            "yaml_cloud_config" => Some(NoteClass::YamlCloudConfig),
            _ => None,
        }
    }
}

impl std::fmt::Display for NoteClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Note record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Tags", default)]
    pub tags: Vec<String>,

    /// Empty when no icon is set
    #[serde(rename = "IconID", default)]
    pub icon_id: String,

    #[serde(rename = "Class")]
    pub class: NoteClass,

    #[serde(rename = "Content")]
    pub content: String,

    /// Derived by the API from `@sacloud-desc` lines in the content
    #[serde(rename = "Description", default)]
    pub description: String,
}

impl Searchable for Note {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteRequest {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Tags")]
    pub tags: Vec<String>,

    #[serde(rename = "IconID")]
    pub icon_id: String,

    #[serde(rename = "Class")]
    pub class: NoteClass,

    #[serde(rename = "Content")]
    pub content: String,
}

/// Description the API derives from a script body
///
/// Lines of the form `# @sacloud-desc <text>` are joined with newlines.
pub fn description_from_content(content: &str) -> String {
    content
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix("# @sacloud-desc"))
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
pub trait NoteApi: Send + Sync {
    async fn find(&self, condition: &FindCondition) -> Result<Vec<Note>>;

    async fn create(&self, request: NoteRequest) -> Result<Note>;

    async fn read(&self, id: &str) -> Result<Note>;

    async fn update(&self, id: &str, request: NoteRequest) -> Result<Note>;

    async fn delete(&self, id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_from_content() {
        let script = r#"#!/bin/bash
# @sacloud-name "docker-setup"
# @sacloud-once
# @sacloud-desc Installs Docker and Docker Compose

set -e
"#;
        assert_eq!(
            description_from_content(script),
            "Installs Docker and Docker Compose"
        );
        assert_eq!(description_from_content("echo hello"), "");
    }

    #[test]
    fn test_class_round_trip_names() {
        for name in NoteClass::ALL {
            assert_eq!(NoteClass::parse(name).map(|c| c.as_str()), Some(name));
        }
        assert_eq!(NoteClass::parse("powershell"), None);
    }
}
