//! Configuration file parsing and structures.
//!
//! picod reads a single TOML file. Sections are deserialized with serde and
//! then validated into the typed structures below; validation reports every
//! problem it finds rather than stopping at the first.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

#[cfg(feature = "integration_mqtt")]
use crate::integrations::mqtt::MqttConfig;
use crate::pico::registry::app_entity_id;
use crate::pico::SceneCycle;
use crate::pico::ScenePreset;
use crate::pico::DEFAULT_BRIGHTNESS_STEP_PCT;

/// Top-level configuration structure
#[derive(Debug, Default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub api: Option<ApiConfig>,
    pub integrations: IntegrationsConfig,
    pub pico: PicoConfig,
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"picod::pico::brightness" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build the tracing filter for this logging config.
    pub fn targets(&self) -> Targets {
        Targets::new().with_default(self.level).with_targets(
            self.overrides
                .iter()
                .map(|(target, level)| (target.clone(), *level)),
        )
    }
}

fn default_api_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8565
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_listen")]
    pub listen: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

/// Native integrations
#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsConfig {
    #[cfg(feature = "integration_mqtt")]
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
}

/// A Pico remote's target light
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteConfig {
    pub light_entity_id: String,
}

/// Validated Pico automation configuration
#[derive(Debug, Clone)]
pub struct PicoConfig {
    /// Size of one raise/lower step in percent (1-100)
    pub brightness_step_pct: u8,

    /// Presets cycled by the middle button
    pub scenes: SceneCycle,

    /// Remote device id -> target light
    pub light_mapping: BTreeMap<String, RemoteConfig>,
}

impl Default for PicoConfig {
    fn default() -> Self {
        Self {
            brightness_step_pct: DEFAULT_BRIGHTNESS_STEP_PCT,
            scenes: SceneCycle::default(),
            light_mapping: BTreeMap::new(),
        }
    }
}

fn default_brightness_step_pct() -> u32 {
    u32::from(DEFAULT_BRIGHTNESS_STEP_PCT)
}

fn default_scene_brightness_pct() -> u32 {
    100
}

/// `[pico]` as written in the file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPicoConfig {
    #[serde(default = "default_brightness_step_pct")]
    brightness_step_pct: u32,

    #[serde(default)]
    scenes: Option<Vec<RawSceneConfig>>,

    #[serde(default)]
    light_mapping: BTreeMap<String, RemoteConfig>,
}

impl Default for RawPicoConfig {
    fn default() -> Self {
        Self {
            brightness_step_pct: default_brightness_step_pct(),
            scenes: None,
            light_mapping: BTreeMap::new(),
        }
    }
}

/// One `[[pico.scenes]]` entry: exactly one of `kelvin` or `rgb_color`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSceneConfig {
    kelvin: Option<u32>,
    rgb_color: Option<[u8; 3]>,
    #[serde(default = "default_scene_brightness_pct")]
    brightness_pct: u32,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    api: Option<ApiConfig>,
    #[serde(default)]
    integrations: IntegrationsConfig,
    #[serde(default)]
    pico: RawPicoConfig,
}

/// A single problem with an otherwise well-formed config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field_path: String,
    pub message: String,
}

impl ValidationError {
    fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field_path, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration:{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| format!("\n  - {}", e)).collect()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(contents)?;

        let mut errors = Vec::new();
        let pico = validate_pico(raw.pico, &mut errors);

        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        Ok(Config {
            logging: raw.logging,
            api: raw.api,
            integrations: raw.integrations,
            pico,
        })
    }
}

fn validate_pico(raw: RawPicoConfig, errors: &mut Vec<ValidationError>) -> PicoConfig {
    let brightness_step_pct = match u8::try_from(raw.brightness_step_pct) {
        Ok(step) if (1..=100).contains(&step) => step,
        _ => {
            errors.push(ValidationError::new(
                "pico.brightness_step_pct",
                format!("must be between 1 and 100, got {}", raw.brightness_step_pct),
            ));
            DEFAULT_BRIGHTNESS_STEP_PCT
        }
    };

    let scenes = match raw.scenes {
        None => SceneCycle::default(),
        Some(raw_scenes) => {
            let presets: Vec<ScenePreset> = raw_scenes
                .into_iter()
                .enumerate()
                .filter_map(|(i, scene)| validate_scene(i, scene, errors))
                .collect();

            match SceneCycle::new(presets) {
                Ok(cycle) => cycle,
                Err(e) => {
                    // Only report emptiness when no entry was rejected individually
                    if !errors.iter().any(|err| err.field_path.starts_with("pico.scenes[")) {
                        errors.push(ValidationError::new("pico.scenes", e.to_string()));
                    }
                    SceneCycle::default()
                }
            }
        }
    };

    for (device_id, remote) in &raw.light_mapping {
        if app_entity_id(&remote.light_entity_id).is_none() {
            errors.push(ValidationError::new(
                format!("pico.light_mapping.{}.light_entity_id", device_id),
                format!(
                    "expected '<domain>.<object_id>', got '{}'",
                    remote.light_entity_id
                ),
            ));
        }
    }

    PicoConfig {
        brightness_step_pct,
        scenes,
        light_mapping: raw.light_mapping,
    }
}

fn validate_scene(
    index: usize,
    raw: RawSceneConfig,
    errors: &mut Vec<ValidationError>,
) -> Option<ScenePreset> {
    let path = format!("pico.scenes[{}]", index);
    let before = errors.len();

    let brightness_pct = match u8::try_from(raw.brightness_pct) {
        Ok(pct) if pct <= 100 => pct,
        _ => {
            errors.push(ValidationError::new(
                format!("{}.brightness_pct", path),
                format!("must be between 0 and 100, got {}", raw.brightness_pct),
            ));
            0
        }
    };

    let preset = match (raw.kelvin, raw.rgb_color) {
        (Some(kelvin), None) => match u16::try_from(kelvin) {
            Ok(kelvin) if kelvin > 0 => Some(ScenePreset::kelvin(kelvin, brightness_pct)),
            _ => {
                errors.push(ValidationError::new(
                    format!("{}.kelvin", path),
                    format!("must be between 1 and {}, got {}", u16::MAX, kelvin),
                ));
                None
            }
        },
        (None, Some([r, g, b])) => Some(ScenePreset::rgb(r, g, b, brightness_pct)),
        (Some(_), Some(_)) => {
            errors.push(ValidationError::new(
                path,
                "set only one of 'kelvin' or 'rgb_color'",
            ));
            None
        }
        (None, None) => {
            errors.push(ValidationError::new(
                path,
                "one of 'kelvin' or 'rgb_color' is required",
            ));
            None
        }
    };

    if errors.len() > before {
        return None;
    }
    preset
}
