use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::models::{ClientConfig, PersistedClientConfig, API_BASE_ENV};

/// 默认配置文件位置
pub fn default_config_path() -> PathBuf {
    let base = if cfg!(target_os = "windows") {
        std::env::var("APPDATA").map(PathBuf::from)
    } else if cfg!(target_os = "macos") {
        std::env::var("HOME").map(|home| PathBuf::from(home).join("Library/Application Support"))
    } else {
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")))
    };
    base.unwrap_or_else(|_| PathBuf::from("."))
        .join("acuvera")
        .join("config.json")
}

pub struct SettingsManager {
    path: PathBuf,
    data: RwLock<PersistedClientConfig>,
}

impl SettingsManager {
    pub async fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let initial = match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => {
                serde_json::from_slice::<PersistedClientConfig>(&bytes).unwrap_or_else(|e| {
                    warn!("配置文件解析失败，使用默认配置: {}", e);
                    PersistedClientConfig::default()
                })
            }
            _ => {
                let default = PersistedClientConfig::default();
                let json = serde_json::to_string_pretty(&default)?;
                tokio::fs::write(&path, json).await?;
                info!("已生成默认配置: {:?}", path);
                default
            }
        };

        Ok(Self {
            path,
            data: RwLock::new(initial),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self) -> PersistedClientConfig {
        self.data.read().await.clone()
    }

    /// 实际生效的配置（环境变量优先于配置文件）
    pub async fn effective(&self) -> PersistedClientConfig {
        let mut config = self.get().await;
        if let Ok(api_base) = std::env::var(API_BASE_ENV) {
            if !api_base.trim().is_empty() {
                config.api_base = api_base.trim().to_string();
            }
        }
        config
    }

    pub async fn update(&self, update: ClientConfig) -> Result<PersistedClientConfig> {
        let mut config = self.data.write().await;

        if let Some(api_base) = update.api_base {
            config.api_base = api_base;
        }
        if let Some(timeout) = update.request_timeout_secs {
            config.request_timeout_secs = timeout;
        }
        if let Some(origin) = update.origin {
            config.origin = Some(origin).filter(|o| !o.is_empty());
        }
        if let Some(capture) = update.capture_settings {
            config.capture_settings = capture;
        }
        if let Some(upload) = update.upload_settings {
            config.upload_settings = upload;
        }
        if let Some(ui) = update.ui_settings {
            config.ui_settings = ui;
        }
        if let Some(dir) = update.export_dir {
            config.export_dir = Some(dir).filter(|d| !d.is_empty());
        }

        self.save(&config).await?;
        Ok(config.clone())
    }

    async fn save(&self, config: &PersistedClientConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
