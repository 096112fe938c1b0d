use std::{io, path::Path};

use serde::{Deserialize, Serialize};
use terranova_scene::TileKey;

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid tile layer settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArcGisService {
    ChinaOnlineCommunity,
    WorldImagery,
}

/// Where tile images come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider")]
pub enum ImagerySettings {
    ArcGis {
        service: ArcGisService,
    },
    Google,
    /// Custom URLs. Each one may use the bare `level`, `row` and `col` tokens
    /// or `{level}`, `{row}` and `{col}` placeholders; one is picked at random
    /// per request.
    Template {
        urls: Vec<String>,
        #[serde(default = "default_format")]
        format: String,
    },
}

fn default_format() -> String {
    "jpg".to_string()
}

impl Default for ImagerySettings {
    fn default() -> Self {
        ImagerySettings::ArcGis {
            service: ArcGisService::WorldImagery,
        }
    }
}

impl ImagerySettings {
    /// File extension used to decode the fetched bytes.
    pub fn format(&self) -> &str {
        match self {
            ImagerySettings::Template { format, .. } => format,
            _ => "jpg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLayerSettings {
    pub imagery: ImagerySettings,
    pub cache_capacity: usize,
    /// Minimum on-screen footprint in square pixels.
    pub area_threshold: f64,
    pub max_walk_steps: u32,
    /// Keep walking past invisible tiles instead of stopping at the first one.
    pub exhaustive_search: bool,
    pub minimum_level: u32,
    pub maximum_level: u32,
    pub max_active_requests: usize,
    pub retry_limit: u32,
    pub retry_delay_ms: u64,
    /// Upper bound for one fetch attempt, connection included.
    pub request_timeout_ms: u64,
}

impl Default for TileLayerSettings {
    fn default() -> Self {
        Self {
            imagery: ImagerySettings::default(),
            cache_capacity: 128,
            area_threshold: 500.0,
            max_walk_steps: 10,
            exhaustive_search: false,
            minimum_level: 0,
            maximum_level: 19,
            max_active_requests: 6,
            retry_limit: 10,
            retry_delay_ms: 300,
            request_timeout_ms: 10_000,
        }
    }
}

impl TileLayerSettings {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: TileLayerSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.cache_capacity == 0 {
            return Err(SettingsError::Invalid("cache_capacity must be positive".into()));
        }
        if self.minimum_level > self.maximum_level {
            return Err(SettingsError::Invalid(format!(
                "minimum_level {} is above maximum_level {}",
                self.minimum_level, self.maximum_level
            )));
        }
        if self.maximum_level > TileKey::MAX_LEVEL {
            return Err(SettingsError::Invalid(format!(
                "maximum_level {} is deeper than {}",
                self.maximum_level,
                TileKey::MAX_LEVEL
            )));
        }
        if !(self.area_threshold > 0.0) {
            return Err(SettingsError::Invalid("area_threshold must be positive".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(SettingsError::Invalid("request_timeout_ms must be positive".into()));
        }
        if let ImagerySettings::Template { urls, .. } = &self.imagery {
            if urls.is_empty() {
                return Err(SettingsError::Invalid("imagery template has no urls".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = TileLayerSettings::default();
        assert_eq!(settings.cache_capacity, 128);
        assert_eq!(settings.area_threshold, 500.0);
        assert_eq!(settings.max_walk_steps, 10);
        assert_eq!(settings.retry_limit, 10);
        assert_eq!(settings.retry_delay_ms, 300);
        assert_eq!(settings.request_timeout_ms, 10_000);
        assert!(!settings.exhaustive_search);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = TileLayerSettings::from_json_str(
            r#"{ "cache_capacity": 16, "imagery": { "provider": "Google" } }"#,
        )
        .unwrap();
        assert_eq!(settings.cache_capacity, 16);
        assert_eq!(settings.imagery, ImagerySettings::Google);
        assert_eq!(settings.maximum_level, 19);
    }

    #[test]
    fn template_imagery() {
        let settings = TileLayerSettings::from_json_str(
            r#"{ "imagery": { "provider": "Template", "urls": ["https://tiles/{level}/{col}/{row}.png"], "format": "png" } }"#,
        )
        .unwrap();
        assert_eq!(settings.imagery.format(), "png");
        let settings = TileLayerSettings::from_json_str(
            r#"{ "imagery": { "provider": "ArcGis", "service": "ChinaOnlineCommunity" } }"#,
        )
        .unwrap();
        assert_eq!(settings.imagery.format(), "jpg");
    }

    #[test]
    fn rejects_invalid() {
        for json in [
            r#"{ "cache_capacity": 0 }"#,
            r#"{ "minimum_level": 5, "maximum_level": 4 }"#,
            r#"{ "maximum_level": 31 }"#,
            r#"{ "area_threshold": -1.0 }"#,
            r#"{ "request_timeout_ms": 0 }"#,
            r#"{ "imagery": { "provider": "Template", "urls": [] } }"#,
        ] {
            assert!(
                matches!(TileLayerSettings::from_json_str(json), Err(SettingsError::Invalid(_))),
                "{json}"
            );
        }
        assert!(matches!(
            TileLayerSettings::from_json_str("{ not json"),
            Err(SettingsError::Json(_))
        ));
        assert!(matches!(
            TileLayerSettings::from_path("/nonexistent/terranova.json"),
            Err(SettingsError::Io(_))
        ));
    }
}
