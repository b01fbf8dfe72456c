//! Service configuration and client factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use dailyprep_core::assign::IST_OFFSET_MINUTES;
use dailyprep_core::push::PushPolicy;
use dailyprep_core::submission::PointsPolicy;
use dailyprep_core::traits::{AnswerEvaluator, ImageHost, PushGateway, Store};

use crate::cloudinary::CloudinaryHost;
use crate::expo::ExpoGateway;
use crate::gemini::GeminiEvaluator;
use crate::supabase::SupabaseStore;

/// Supabase project settings.
///
/// Note: Custom Debug impls in this module mask secrets to prevent accidental
/// exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("service_key", &"***")
            .finish()
    }
}

/// Expo push settings. Works without an access token unless the project
/// enforces push security.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ExpoConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl std::fmt::Debug for ExpoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpoConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub upload_preset: String,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Top-level dailyprep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyprepConfig {
    /// Calendar offset from UTC used to decide "today", in minutes.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,
    /// Rows per insert request when uploading datasets.
    #[serde(default = "default_upload_batch_size")]
    pub upload_batch_size: usize,
    #[serde(default)]
    pub supabase: Option<SupabaseConfig>,
    #[serde(default)]
    pub expo: ExpoConfig,
    #[serde(default)]
    pub gemini: Option<GeminiConfig>,
    #[serde(default)]
    pub cloudinary: Option<CloudinaryConfig>,
    #[serde(default)]
    pub points: PointsPolicy,
    #[serde(default)]
    pub push: PushPolicy,
}

fn default_utc_offset() -> i32 {
    IST_OFFSET_MINUTES
}
fn default_upload_batch_size() -> usize {
    500
}

impl Default for DailyprepConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset(),
            upload_batch_size: default_upload_batch_size(),
            supabase: None,
            expo: ExpoConfig::default(),
            gemini: None,
            cloudinary: None,
            points: PointsPolicy::default(),
            push: PushPolicy::default(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    // Substituted values are never rescanned.
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + len];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_opt(s: &Option<String>) -> Option<String> {
    s.as_deref().map(resolve_env_vars)
}

impl DailyprepConfig {
    /// Resolve `${VAR}` references in every string setting.
    fn resolve_env(&mut self) {
        if let Some(s) = &mut self.supabase {
            s.url = resolve_env_vars(&s.url);
            s.service_key = resolve_env_vars(&s.service_key);
        }
        self.expo.base_url = resolve_opt(&self.expo.base_url);
        self.expo.access_token = resolve_opt(&self.expo.access_token).filter(|t| !t.is_empty());
        if let Some(g) = &mut self.gemini {
            g.api_key = resolve_env_vars(&g.api_key);
            g.model = resolve_opt(&g.model);
            g.base_url = resolve_opt(&g.base_url);
        }
        if let Some(c) = &mut self.cloudinary {
            c.cloud_name = resolve_env_vars(&c.cloud_name);
            c.upload_preset = resolve_env_vars(&c.upload_preset);
            c.folder = resolve_opt(&c.folder);
            c.base_url = resolve_opt(&c.base_url);
        }
    }

    /// Apply `DAILYPREP_*` environment overrides.
    fn apply_env_overrides(&mut self) {
        let url = std::env::var("DAILYPREP_SUPABASE_URL").ok();
        let key = std::env::var("DAILYPREP_SUPABASE_KEY").ok();
        if let Some(s) = &mut self.supabase {
            if let Some(url) = url {
                s.url = url;
            }
            if let Some(key) = key {
                s.service_key = key;
            }
        } else if let (Some(url), Some(service_key)) = (url, key) {
            self.supabase = Some(SupabaseConfig { url, service_key });
        }

        if let Ok(key) = std::env::var("DAILYPREP_GEMINI_KEY") {
            match &mut self.gemini {
                Some(g) => g.api_key = key,
                None => {
                    self.gemini = Some(GeminiConfig {
                        api_key: key,
                        model: None,
                        base_url: None,
                    })
                }
            }
        }

        if let Ok(token) = std::env::var("DAILYPREP_EXPO_TOKEN") {
            self.expo.access_token = Some(token);
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `dailyprep.toml` in the current directory
/// 2. `~/.config/dailyprep/config.toml`
///
/// Environment variable overrides: `DAILYPREP_SUPABASE_URL`,
/// `DAILYPREP_SUPABASE_KEY`, `DAILYPREP_GEMINI_KEY`, `DAILYPREP_EXPO_TOKEN`.
pub fn load_config() -> Result<DailyprepConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<DailyprepConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("dailyprep.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<DailyprepConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => DailyprepConfig::default(),
    };

    config.apply_env_overrides();
    config.resolve_env();
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("dailyprep"))
}

/// Create the Supabase store.
pub fn create_store(config: &DailyprepConfig) -> Result<Arc<dyn Store>> {
    let supabase = config
        .supabase
        .as_ref()
        .context("no [supabase] section configured. Run `dailyprep init` to create a config file.")?;
    anyhow::ensure!(
        !supabase.service_key.is_empty(),
        "supabase.service_key is empty"
    );
    Ok(Arc::new(SupabaseStore::new(
        &supabase.url,
        &supabase.service_key,
    )?))
}

/// Create the Expo push gateway.
pub fn create_push_gateway(config: &DailyprepConfig) -> Result<Arc<dyn PushGateway>> {
    Ok(Arc::new(ExpoGateway::new(
        config.expo.base_url.clone(),
        config.expo.access_token.clone(),
    )?))
}

/// Create the Gemini answer evaluator.
pub fn create_evaluator(config: &DailyprepConfig) -> Result<Box<dyn AnswerEvaluator>> {
    let gemini = config
        .gemini
        .as_ref()
        .context("no [gemini] section configured")?;
    anyhow::ensure!(!gemini.api_key.is_empty(), "gemini.api_key is empty");
    Ok(Box::new(GeminiEvaluator::new(
        &gemini.api_key,
        gemini.model.clone(),
        gemini.base_url.clone(),
    )?))
}

/// Create the Cloudinary image host.
pub fn create_image_host(config: &DailyprepConfig) -> Result<Box<dyn ImageHost>> {
    let c = config
        .cloudinary
        .as_ref()
        .context("no [cloudinary] section configured")?;
    Ok(Box::new(CloudinaryHost::new(
        &c.cloud_name,
        &c.upload_preset,
        c.folder.clone(),
        c.base_url.clone(),
    )?))
}
