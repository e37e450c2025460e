use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::constants::*;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub geocoder_url: String,
    pub user_agent: String,
    pub language: String,
    pub request_timeout_secs: u64,
    pub min_request_interval_ms: u64,
    pub geocode_attempts: u32,
    pub retry_delay_ms: u64,
    pub unknown_ttl_secs: u64,
    pub persist_cache: bool,
    pub font_path: Option<String>,
    pub max_width: u32,
    pub output_dir_name: String,
    pub port: u16,
    pub auto_open_browser: bool,
    pub last_folder: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            user_agent: format!("phototag/{}", env!("CARGO_PKG_VERSION")),
            language: "en".to_string(),
            request_timeout_secs: 10,
            min_request_interval_ms: 1000,
            geocode_attempts: 2,
            retry_delay_ms: 2000,
            unknown_ttl_secs: 600,
            persist_cache: false,
            font_path: None,
            max_width: MAX_OUTPUT_WIDTH,
            output_dir_name: DEFAULT_OUTPUT_DIR.to_string(),
            port: DEFAULT_PORT,
            auto_open_browser: false,
            last_folder: None,
        }
    }
}

fn parse_into<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, slot: &mut T) {
    if let Some(raw) = map.get(key) {
        match raw.parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => warn!("Ignoring invalid value for {}: {:?}", key, raw),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim_matches('"');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl Settings {
    /// Loads `config_path`, or defaults when it does not exist.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Settings::default());
        }

        let file = File::open(config_path).context("Failed to open config file")?;
        let mut content = String::new();
        for line in BufReader::new(file).lines() {
            let line = line.context("Failed to read line from config")?;
            content.push_str(&line);
            content.push('\n');
        }
        Ok(Self::parse(&content))
    }

    /// Parses `key = value` lines. Comments start with `#`; unknown keys and
    /// invalid values are ignored.
    pub fn parse(content: &str) -> Self {
        let mut config_map = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') || line.is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                config_map.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        let mut settings = Settings::default();
        let text_keys: [(&str, &mut String); 4] = [
            ("geocoder_url", &mut settings.geocoder_url),
            ("user_agent", &mut settings.user_agent),
            ("language", &mut settings.language),
            ("output_dir_name", &mut settings.output_dir_name),
        ];
        for (key, slot) in text_keys {
            if let Some(value) = config_map.get(key).and_then(|v| non_empty(v)) {
                *slot = value;
            }
        }

        parse_into(&config_map, "request_timeout_secs", &mut settings.request_timeout_secs);
        parse_into(&config_map, "min_request_interval_ms", &mut settings.min_request_interval_ms);
        parse_into(&config_map, "geocode_attempts", &mut settings.geocode_attempts);
        parse_into(&config_map, "retry_delay_ms", &mut settings.retry_delay_ms);
        parse_into(&config_map, "unknown_ttl_secs", &mut settings.unknown_ttl_secs);
        parse_into(&config_map, "persist_cache", &mut settings.persist_cache);
        parse_into(&config_map, "max_width", &mut settings.max_width);
        parse_into(&config_map, "port", &mut settings.port);
        parse_into(&config_map, "auto_open_browser", &mut settings.auto_open_browser);

        if let Some(font_path) = config_map.get("font_path") {
            settings.font_path = non_empty(font_path);
        }
        if let Some(last_folder) = config_map.get("last_folder") {
            settings.last_folder = non_empty(last_folder);
        }

        settings
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Creating config directory")?;
        }
        std::fs::write(config_path, self.to_ini()).context("Failed to write to config file")?;
        Ok(())
    }

    fn to_ini(&self) -> String {
        let mut content = String::new();
        content.push_str("# PhotoTag Configuration File\n");
        content.push_str(&format!("geocoder_url = \"{}\"\n", self.geocoder_url));
        content.push_str(&format!("user_agent = \"{}\"\n", self.user_agent));
        content.push_str(&format!("language = {}\n", self.language));
        content.push_str(&format!("request_timeout_secs = {}\n", self.request_timeout_secs));
        content.push_str(&format!("min_request_interval_ms = {}\n", self.min_request_interval_ms));
        content.push_str(&format!("geocode_attempts = {}\n", self.geocode_attempts));
        content.push_str(&format!("retry_delay_ms = {}\n", self.retry_delay_ms));
        content.push_str(&format!("unknown_ttl_secs = {}\n", self.unknown_ttl_secs));
        content.push_str(&format!("persist_cache = {}\n", self.persist_cache));
        if let Some(ref font_path) = self.font_path {
            content.push_str(&format!("font_path = \"{}\"\n", font_path));
        }
        content.push_str(&format!("max_width = {}\n", self.max_width));
        content.push_str(&format!("output_dir_name = {}\n", self.output_dir_name));
        content.push_str(&format!("port = {}\n", self.port));
        content.push_str(&format!("auto_open_browser = {}\n", self.auto_open_browser));
        if let Some(ref last_folder) = self.last_folder {
            content.push_str(&format!("last_folder = \"{}\"\n", last_folder));
        }
        content
    }

    pub fn update_last_folder<P: AsRef<Path>>(&mut self, folder_path: P) {
        self.last_folder = folder_path.as_ref().to_str().map(|s| s.to_string());
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn unknown_ttl(&self) -> Duration {
        Duration::from_secs(self.unknown_ttl_secs)
    }

    pub fn font_path(&self) -> Option<PathBuf> {
        self.font_path.as_ref().map(PathBuf::from)
    }

    pub fn config_path() -> PathBuf {
        crate::utils::get_config_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("phototag.ini")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn parses_known_keys_and_ignores_the_rest() {
        let settings = Settings::parse(
            "# comment\n\
             port = 8080\n\
             max_width = 1280\n\
             persist_cache = true\n\
             font_path = \"/fonts/Inter.ttf\"\n\
             geocode_attempts = lots\n\
             mystery = 42\n",
        );
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.max_width, 1280);
        assert!(settings.persist_cache);
        assert_eq!(settings.font_path.as_deref(), Some("/fonts/Inter.ttf"));
        assert_eq!(settings.geocode_attempts, Settings::default().geocode_attempts);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("phototag.ini");

        let mut settings = Settings {
            port: 6001,
            language: "de".to_string(),
            persist_cache: true,
            ..Default::default()
        };
        settings.update_last_folder("/photos/2024");
        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }
}
