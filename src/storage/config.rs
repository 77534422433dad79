//! 配置文件管理模块

use crate::core::graph::{LoadOptions, MalformedPolicy};
use crate::core::requirement::DEFAULT_MAX_DEPTH;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 应用配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 课程数据库路径，未设置时使用数据目录
    pub database_path: Option<PathBuf>,
    /// 需求树嵌套层数上限
    pub max_tree_depth: usize,
    /// 加载时跳过格式错误的课程
    pub skip_malformed_courses: bool,
    /// 默认日志过滤（RUST_LOG 优先）
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_tree_depth: DEFAULT_MAX_DEPTH,
            skip_malformed_courses: true,
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// 实际使用的数据库路径
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|d| d.data_dir().join("catalog.db"))
                .unwrap_or_else(|| PathBuf::from("catalog.db"))
        })
    }

    /// 课程图加载选项
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            policy: if self.skip_malformed_courses {
                MalformedPolicy::Skip
            } else {
                MalformedPolicy::Abort
            },
            max_depth: self.max_tree_depth,
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "coursetree", "CourseTree")
}

/// 配置文件读写，文件不存在时使用默认配置
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// 创建配置管理器
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// 获取默认配置路径
    pub fn default_path() -> PathBuf {
        project_dirs()
            .map(|d| d.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    }

    /// 读取配置，错误信息带上文件路径
    pub fn load(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            tracing::debug!("配置文件不存在，使用默认配置: {}", self.config_path.display());
            return Ok(AppConfig::default());
        }
        let content = std::fs::read_to_string(&self.config_path)
            .with_context(|| format!("无法读取配置文件 {}", self.config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("配置文件格式错误 {}", self.config_path.display()))
    }

    /// 写入配置，必要时创建所在目录
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("无法创建配置目录 {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)
            .with_context(|| format!("无法写入配置文件 {}", self.config_path.display()))?;
        tracing::info!("配置已保存: {}", self.config_path.display());
        Ok(())
    }

    /// 重置为默认配置
    pub fn reset(&self) -> Result<()> {
        self.save(&AppConfig::default())
    }
}
