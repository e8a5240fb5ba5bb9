//! Optional `config.toml` with defaults for output and logging.

use clap::ValueEnum;
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576; // 1 MiB

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub pretty: Option<bool>,
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    pub level: Option<String>,
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluationConfig {
    pub dependency_info: Option<bool>,
}

/// Load the config from `config_file`, or the user config dir if None.
///
/// Never fails: problems come back as warnings alongside the defaults.
pub fn load_config(config_file: Option<&Path>) -> (Config, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();
    let Some(path) = config_file.map(Path::to_path_buf).or_else(user_config_path) else {
        return (Config::default(), warnings);
    };

    if !path.exists() {
        if config_file.is_some() {
            warnings.push(format!("Config file not found: {}", path.display()));
        }
        return (Config::default(), warnings);
    }

    let config = match std::fs::metadata(&path) {
        Ok(meta) if meta.len() > MAX_CONFIG_FILE_BYTES => {
            warnings.push(format!(
                "Refusing to read {}: file too large ({} bytes, max {})",
                path.display(),
                meta.len(),
                MAX_CONFIG_FILE_BYTES
            ));
            None
        }
        Ok(_) => match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<Config>(&content) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    warnings.push(format!("Failed to parse {}: {}", path.display(), err));
                    None
                }
            },
            Err(err) => {
                warnings.push(format!("Failed to read {}: {}", path.display(), err));
                None
            }
        },
        Err(err) => {
            warnings.push(format!(
                "Failed to read metadata for {}: {}",
                path.display(),
                err
            ));
            None
        }
    };

    (config.unwrap_or_default(), warnings)
}

fn user_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "gridcalc")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "gridcalc_config_{}_{}_{:?}.toml",
            name,
            std::process::id(),
            std::thread::current().id(),
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_full_config() {
        let path = temp_config(
            "full",
            "[output]\npretty = true\nformat = \"csv\"\n\n[log]\nlevel = \"info\"\n\n[evaluation]\ndependency_info = true\n",
        );
        let (config, warnings) = load_config(Some(&path));
        let _ = std::fs::remove_file(&path);
        assert!(warnings.is_empty(), "{:?}", warnings);
        assert_eq!(config.output.pretty, Some(true));
        assert_eq!(config.output.format, Some(OutputFormat::Csv));
        assert_eq!(config.log.level.as_deref(), Some("info"));
        assert_eq!(config.evaluation.dependency_info, Some(true));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let path = temp_config("partial", "[output]\npretty = false\n");
        let (config, warnings) = load_config(Some(&path));
        let _ = std::fs::remove_file(&path);
        assert!(warnings.is_empty());
        assert_eq!(config.output.format, None);
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_unknown_field_is_warning() {
        let path = temp_config("unknown", "[output]\ncolour = true\n");
        let (config, warnings) = load_config(Some(&path));
        let _ = std::fs::remove_file(&path);
        assert_eq!(config, Config::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Failed to parse"));
    }

    #[test]
    fn test_missing_explicit_file_is_warning() {
        let path = std::env::temp_dir().join("gridcalc_config_does_not_exist.toml");
        let (config, warnings) = load_config(Some(&path));
        assert_eq!(config, Config::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Config file not found"));
    }

    #[test]
    fn test_oversized_file_is_refused() {
        let path = temp_config("large", &"#".repeat(MAX_CONFIG_FILE_BYTES as usize + 1));
        let (config, warnings) = load_config(Some(&path));
        let _ = std::fs::remove_file(&path);
        assert_eq!(config, Config::default());
        assert!(warnings[0].starts_with("Refusing to read"));
    }
}
