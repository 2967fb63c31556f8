//! INI-backed configuration source.

use crate::domain::error::ScanError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct IniConfig {
    ini: Ini,
}

impl IniConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScanError> {
        let mut ini = Ini::new();
        ini.load(path.as_ref())
            .map_err(|reason| ScanError::ConfigParse {
                file: path.as_ref().display().to_string(),
                reason,
            })?;
        Ok(Self { ini })
    }

    pub fn from_string(content: &str) -> Result<Self, ScanError> {
        let mut ini = Ini::new();
        ini.read(content.to_string())
            .map_err(|reason| ScanError::ConfigParse {
                file: "<inline>".into(),
                reason,
            })?;
        Ok(Self { ini })
    }

    /// All getters fall back to defaults, so an absent file behaves as an
    /// empty one.
    pub fn empty() -> Self {
        Self { ini: Ini::new() }
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for IniConfig {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.ini.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.ini.getint(section, key).ok().flatten().unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.ini
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.ini
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}
