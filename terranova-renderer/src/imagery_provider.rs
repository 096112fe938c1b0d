use std::collections::HashMap;

use new_string_template::template::Template;
use rand::seq::SliceRandom;
use terranova_scene::TileKey;

use crate::settings::{ArcGisService, ImagerySettings};

const CHINA_ONLINE_COMMUNITY: &str =
    "https://map.geoq.cn/ArcGIS/rest/services/ChinaOnlineCommunity/MapServer/tile/level/row/col";
const WORLD_IMAGERY: &str =
    "https://server.arcgisonline.com/arcgis/rest/services/World_Imagery/MapServer/tile/level/row/col";
const GOOGLE_HOSTS: [&str; 4] = ["khms0", "khms1", "khms2", "khms3"];

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("imagery provider has no url templates")]
    NoTemplates,
    #[error("failed to render url template '{template}': {reason}")]
    Render { template: String, reason: String },
}

/// A tile URL with either bare `level`/`row`/`col` words or
/// `{level}`/`{row}`/`{col}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn render(&self, key: &TileKey) -> Result<String, TemplateError> {
        if !self.0.contains('{') {
            return Ok(replace_tokens(&self.0, key));
        }
        let values: HashMap<&str, String> = HashMap::from([
            ("level", key.level.to_string()),
            ("row", key.row.to_string()),
            ("col", key.col.to_string()),
        ]);
        Template::new(self.0.as_str())
            .render(&values)
            .map_err(|e| TemplateError::Render {
                template: self.0.clone(),
                reason: e.to_string(),
            })
    }
}

// Only whole words are substituted, so hosts and paths containing "col" survive.
fn replace_tokens(template: &str, key: &TileKey) -> String {
    fn flush(word: &mut String, out: &mut String, key: &TileKey) {
        match word.as_str() {
            "level" => out.push_str(&key.level.to_string()),
            "row" => out.push_str(&key.row.to_string()),
            "col" => out.push_str(&key.col.to_string()),
            _ => out.push_str(word),
        }
        word.clear();
    }

    let mut out = String::with_capacity(template.len() + 8);
    let mut word = String::new();
    for ch in template.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            word.push(ch);
        } else {
            flush(&mut word, &mut out, key);
            out.push(ch);
        }
    }
    flush(&mut word, &mut out, key);
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageryProvider {
    templates: Vec<UrlTemplate>,
    format: String,
}

impl Default for ImageryProvider {
    fn default() -> Self {
        ImageryProvider::from_settings(&ImagerySettings::default())
    }
}

impl ImageryProvider {
    pub fn new(templates: Vec<UrlTemplate>, format: impl Into<String>) -> Self {
        Self {
            templates,
            format: format.into(),
        }
    }

    pub fn from_settings(settings: &ImagerySettings) -> Self {
        let templates = match settings {
            ImagerySettings::ArcGis {
                service: ArcGisService::ChinaOnlineCommunity,
            } => vec![UrlTemplate::new(CHINA_ONLINE_COMMUNITY)],
            ImagerySettings::ArcGis {
                service: ArcGisService::WorldImagery,
            } => vec![UrlTemplate::new(WORLD_IMAGERY)],
            ImagerySettings::Google => GOOGLE_HOSTS
                .iter()
                .map(|host| {
                    UrlTemplate::new(format!(
                        "https://{host}.google.com/kh/v=930?x=col&y=row&z=level"
                    ))
                })
                .collect(),
            ImagerySettings::Template { urls, .. } => {
                urls.iter().cloned().map(UrlTemplate::new).collect()
            }
        };
        Self::new(templates, settings.format())
    }

    pub fn templates(&self) -> &[UrlTemplate] {
        &self.templates
    }

    /// Image file extension of the fetched tiles.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Resolves the tile URL, picking one template at random when there are several.
    pub fn resolve_url(&self, key: &TileKey) -> Result<String, TemplateError> {
        self.templates
            .choose(&mut rand::thread_rng())
            .ok_or(TemplateError::NoTemplates)?
            .render(key)
    }
}
