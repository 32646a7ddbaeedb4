//! 优化 Pass 的配置。
//!
//! # 契约（What）
//! - 所有字段都有默认值，空 TOML 文档即得到默认配置；
//! - 未知字段直接报错，避免拼写错误被静默忽略；
//! - `decorators` 使用有序映射，保证日志与报告输出顺序稳定。
//!
//! ```toml
//! metadata_call = "add_route_metadata"
//! extension_point = "__spark_dispatch"
//! generated_name = "spark_dispatch"
//! default_response = "not_found_response"
//!
//! [decorators]
//! get = "GET"
//! post = "POST"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 配置加载错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read optimizer config `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse optimizer config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid optimizer config: `{field}` {reason}")]
    Invalid { field: String, reason: String },
}

/// 路由优化配置。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    /// 元数据注册调用名，参数顺序为 `(path, method, handler_name)`。
    pub metadata_call: String,
    /// 装饰器构造调用名到 HTTP 方法的映射。
    pub decorators: BTreeMap<String, String>,
    /// 预声明扩展点函数名。
    pub extension_point: String,
    /// 无扩展点时追加的分派函数名。
    pub generated_name: String,
    /// 未命中分支调用的默认响应工厂名。
    pub default_response: String,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        let decorators = [
            ("get", "GET"),
            ("post", "POST"),
            ("put", "PUT"),
            ("delete", "DELETE"),
            ("patch", "PATCH"),
        ]
        .into_iter()
        .map(|(call, method)| (call.to_owned(), method.to_owned()))
        .collect();

        Self {
            metadata_call: "add_route_metadata".to_owned(),
            decorators,
            extension_point: "__spark_dispatch".to_owned(),
            generated_name: "spark_dispatch".to_owned(),
            default_response: "not_found_response".to_owned(),
        }
    }
}

impl OptimizerConfig {
    /// 从 TOML 文本解析并校验配置。
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 从磁盘加载并校验配置。
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// 语义校验：所有标识符非空，装饰器映射非空且方法名非空。
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = [
            ("metadata_call", &self.metadata_call),
            ("extension_point", &self.extension_point),
            ("generated_name", &self.generated_name),
            ("default_response", &self.default_response),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }

        if self.decorators.is_empty() {
            return Err(invalid("decorators", "must declare at least one method"));
        }
        for (call, method) in &self.decorators {
            if call.trim().is_empty() {
                return Err(invalid("decorators", "contains an empty call name"));
            }
            if method.trim().is_empty() {
                return Err(invalid(
                    &format!("decorators.{call}"),
                    "must map to a non-empty method",
                ));
            }
        }
        Ok(())
    }

    /// 查询装饰器调用名对应的 HTTP 方法。
    pub fn decorator_method(&self, call: &str) -> Option<&str> {
        self.decorators.get(call).map(String::as_str)
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}
