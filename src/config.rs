//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `COLONY__*` 覆盖（双下划线表示嵌套，如 `COLONY__TASKS__REACH=5.0`）。

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use crate::heuristics::HeuristicParams;
use crate::tasks::TaskSettings;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub orchestrator: OrchestratorSection,
    /// [[agents]]：启动时创建的 agent
    pub agents: Vec<AgentSpec>,
    pub tasks: TaskSettings,
    pub heuristics: HeuristicParams,
}

/// [orchestrator] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    /// 向所有 agent 广播 update 的间隔（毫秒），0 表示不自动广播
    pub tick_interval_ms: u64,
    /// 状态消息广播通道容量
    pub status_buffer: usize,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            status_buffer: 256,
        }
    }
}

/// 单个 agent 的启动参数
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentSpec {
    pub username: String,
    /// 出生后自动进入的任务
    #[serde(default)]
    pub default_task: Option<String>,
    #[serde(default)]
    pub default_data: Option<Value>,
}

impl AgentSpec {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            default_task: None,
            default_data: None,
        }
    }

    pub fn with_default_task(mut self, task: impl Into<String>, data: Value) -> Self {
        self.default_task = Some(task.into());
        self.default_data = Some(data);
        self
    }
}

/// 从 config 目录加载配置，环境变量 COLONY__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 COLONY__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("COLONY")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.orchestrator.tick_interval_ms, 500);
        assert_eq!(config.orchestrator.status_buffer, 256);
        assert!(config.agents.is_empty());
        assert_eq!(config.tasks.follow_distance, 3.0);
        assert_eq!(config.heuristics.danger_radius, 16.0);
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[orchestrator]
tick_interval_ms = 250

[[agents]]
username = "miner"
default_task = "mineBlock"
default_data = {{ block = "coal_ore" }}

[[agents]]
username = "scout"

[tasks]
follow_distance = 5.0
fallback_task = "lookAtPlayers"

[heuristics]
hostile_names = ["zombie"]
"#
        )
        .unwrap();

        let config = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.orchestrator.tick_interval_ms, 250);
        assert_eq!(config.orchestrator.status_buffer, 256);
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.agents[0].default_task.as_deref(), Some("mineBlock"));
        assert_eq!(
            config.agents[0].default_data.as_ref().unwrap()["block"],
            "coal_ore"
        );
        assert_eq!(config.agents[1], AgentSpec::new("scout"));
        assert_eq!(config.tasks.follow_distance, 5.0);
        assert_eq!(config.tasks.reach, 4.5);
        assert_eq!(config.tasks.fallback_task.as_deref(), Some("lookAtPlayers"));
        assert_eq!(config.heuristics.hostile_names, vec!["zombie".to_string()]);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config(Some(PathBuf::from("/nonexistent/colony.toml"))).unwrap();
        assert_eq!(config.tasks.search_radius, 32.0);
    }
}
