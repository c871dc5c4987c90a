use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::announce::{DebouncePolicy, SPEAK_DELAY};
use crate::detect::{
    BoxLayout, DecoderConfig, InputSpec, Size, UnknownLabelPolicy, DEFAULT_SCORE_THRESHOLD,
};
use crate::ingest::normalize::TensorType;
use crate::ingest::FileConfig;
use crate::pipeline::PipelineSettings;

const DEFAULT_LABELS_PATH: &str = "labelmap.txt";
const DEFAULT_MODEL_WIDTH: u32 = 320;
const DEFAULT_MODEL_HEIGHT: u32 = 320;
const DEFAULT_DISPLAY_WIDTH: u32 = 640;
const DEFAULT_DISPLAY_HEIGHT: u32 = 480;
const DEFAULT_SOURCE: &str = "stub://camera";
const DEFAULT_SOURCE_FPS: u32 = 10;

#[derive(Debug, Deserialize, Default)]
struct AssistConfigFile {
    labels_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
    model: Option<ModelConfigFile>,
    display: Option<DisplayConfigFile>,
    decoder: Option<DecoderConfigFile>,
    announce: Option<AnnounceConfigFile>,
    source: Option<SourceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    tensor_type: Option<TensorType>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DecoderConfigFile {
    score_threshold: Option<f32>,
    exclude_unknown: Option<bool>,
    box_layout: Option<BoxLayout>,
}

#[derive(Debug, Deserialize, Default)]
struct AnnounceConfigFile {
    policy: Option<String>,
    speak_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    path: Option<String>,
    target_fps: Option<u32>,
}

/// Which debounce policy the session uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyKind {
    SetDifference,
    Cooldown,
}

impl PolicyKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "set_difference" => Ok(PolicyKind::SetDifference),
            "cooldown" => Ok(PolicyKind::Cooldown),
            other => Err(anyhow!(
                "unknown debounce policy '{}' (expected set_difference or cooldown)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssistConfig {
    pub labels_path: PathBuf,
    pub model_path: Option<PathBuf>,
    pub model: InputSpec,
    pub display: Size,
    pub decoder: DecoderConfig,
    pub policy: PolicyKind,
    pub speak_delay: Duration,
    pub source: FileConfig,
}

impl AssistConfig {
    /// Load from `ASSIST_CONFIG` (if set), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ASSIST_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AssistConfigFile) -> Result<Self> {
        let model = file.model.unwrap_or_default();
        let display = file.display.unwrap_or_default();
        let decoder = file.decoder.unwrap_or_default();
        let announce = file.announce.unwrap_or_default();
        let source = file.source.unwrap_or_default();

        let policy = match announce.policy.as_deref() {
            Some(value) => PolicyKind::parse(value)?,
            None => PolicyKind::SetDifference,
        };

        Ok(Self {
            labels_path: file
                .labels_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LABELS_PATH)),
            model_path: file.model_path,
            model: InputSpec {
                width: model.width.unwrap_or(DEFAULT_MODEL_WIDTH),
                height: model.height.unwrap_or(DEFAULT_MODEL_HEIGHT),
                tensor_type: model.tensor_type.unwrap_or_default(),
            },
            display: Size::new(
                display.width.unwrap_or(DEFAULT_DISPLAY_WIDTH),
                display.height.unwrap_or(DEFAULT_DISPLAY_HEIGHT),
            ),
            decoder: DecoderConfig {
                score_threshold: decoder.score_threshold.unwrap_or(DEFAULT_SCORE_THRESHOLD),
                unknown_labels: match decoder.exclude_unknown {
                    Some(false) => UnknownLabelPolicy::Keep,
                    _ => UnknownLabelPolicy::Exclude,
                },
                box_layout: decoder.box_layout.unwrap_or_default(),
            },
            policy,
            speak_delay: announce
                .speak_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(SPEAK_DELAY),
            source: FileConfig {
                path: source.path.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("ASSIST_LABELS_PATH") {
            if !path.trim().is_empty() {
                self.labels_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("ASSIST_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(source) = std::env::var("ASSIST_SOURCE") {
            if !source.trim().is_empty() {
                self.source.path = source;
            }
        }
        if let Ok(threshold) = std::env::var("ASSIST_SCORE_THRESHOLD") {
            self.decoder.score_threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("ASSIST_SCORE_THRESHOLD must be a number"))?;
        }
        if let Ok(policy) = std::env::var("ASSIST_DEBOUNCE_POLICY") {
            self.policy = PolicyKind::parse(&policy)?;
        }
        if let Ok(delay) = std::env::var("ASSIST_SPEAK_DELAY_MS") {
            let millis: u64 = delay.trim().parse().map_err(|_| {
                anyhow!("ASSIST_SPEAK_DELAY_MS must be an integer number of milliseconds")
            })?;
            self.speak_delay = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let threshold = self.decoder.score_threshold;
        if !(0.0..1.0).contains(&threshold) {
            return Err(anyhow!(
                "score threshold must be within [0, 1), got {}",
                threshold
            ));
        }
        if self.model.width == 0 || self.model.height == 0 {
            return Err(anyhow!("model input size must be non-zero"));
        }
        if self.display.is_empty() {
            return Err(anyhow!("display size must be non-zero"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be >= 1"));
        }
        if self.policy == PolicyKind::Cooldown && self.speak_delay.is_zero() {
            return Err(anyhow!("cooldown policy requires a speak delay above zero"));
        }
        Ok(())
    }

    pub fn debounce_policy(&self) -> DebouncePolicy {
        match self.policy {
            PolicyKind::SetDifference => DebouncePolicy::SetDifference,
            PolicyKind::Cooldown => DebouncePolicy::Cooldown {
                delay: self.speak_delay,
            },
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            decoder: self.decoder,
            debounce: self.debounce_policy(),
            display: self.display,
        }
    }
}

fn read_config_file(path: &Path) -> Result<AssistConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_session() -> Result<()> {
        let cfg = AssistConfig::from_file(AssistConfigFile::default())?;
        cfg.validate()?;
        assert_eq!(cfg.model.width, 320);
        assert_eq!(cfg.model.tensor_type, TensorType::U8);
        assert_eq!(cfg.decoder, DecoderConfig::default());
        assert_eq!(cfg.debounce_policy(), DebouncePolicy::SetDifference);
        assert_eq!(cfg.speak_delay, SPEAK_DELAY);
        assert_eq!(cfg.source.path, "stub://camera");
        Ok(())
    }

    #[test]
    fn policy_names_are_forgiving() -> Result<()> {
        assert_eq!(PolicyKind::parse("Set-Difference")?, PolicyKind::SetDifference);
        assert_eq!(PolicyKind::parse(" cooldown ")?, PolicyKind::Cooldown);
        assert!(PolicyKind::parse("loudest").is_err());
        Ok(())
    }

    #[test]
    fn threshold_of_one_is_rejected() -> Result<()> {
        let mut cfg = AssistConfig::from_file(AssistConfigFile::default())?;
        cfg.decoder.score_threshold = 1.0;
        assert!(cfg.validate().is_err());
        Ok(())
    }
}
