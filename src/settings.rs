use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

const CONFIG_ENV: &str = "SERVICE_HOURS_CONFIG";
const BASE_URL_ENV: &str = "SERVICE_HOURS_BASE_URL";

/// Where the record store lives. Loaded from an optional JSON file, then
/// overridden from the environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub base_url: String,
    pub records_path: String,
    /// Query parameter carrying the owner id on history fetches.
    pub owner_param: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".into(),
            records_path: "/records".into(),
            owner_param: "owner".into(),
        }
    }
}

impl Settings {
    /// Reads `path` when it exists; a missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.filter(|p| p.exists()) else {
            return Ok(Self::default());
        };

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    /// `SERVICE_HOURS_CONFIG` names the file, `SERVICE_HOURS_BASE_URL` wins
    /// over whatever the file says.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV).map(std::path::PathBuf::from);
        let settings = Self::load(path.as_deref())?;
        Ok(settings.with_base_url_override(std::env::var(BASE_URL_ENV).ok()))
    }

    pub fn with_base_url_override(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        self
    }

    pub fn records_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.records_path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(dir.path().join("absent.json").as_path())).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"baseUrl": "https://school.example/api/"}"#).unwrap();

        let settings = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(settings.base_url, "https://school.example/api/");
        assert_eq!(settings.owner_param, "owner");
        assert_eq!(settings.records_url(), "https://school.example/api/records");
    }

    #[test]
    fn unparsable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Settings::load(Some(path.as_path())).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings"));
    }

    #[test]
    fn base_url_override_ignores_blank_values() {
        let settings = Settings::default().with_base_url_override(Some("  ".into()));
        assert_eq!(settings.base_url, Settings::default().base_url);

        let settings = Settings::default().with_base_url_override(Some("http://h:1".into()));
        assert_eq!(settings.records_url(), "http://h:1/records");
    }
}
