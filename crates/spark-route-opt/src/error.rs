//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 路由优化只在构建期运行，所有失败都以编译期诊断呈现；本模块集中定义会让构建终止的致命错误；
//! - 可恢复的问题（非字面量路径、未链接的处理函数等）不属于错误，由 [`crate::report::Warning`] 承载。
//!
//! ## 设计要求（What）
//! - 所有变体携带可读上下文（路由下标、方法、路径、处理函数名），便于直接定位源码；
//! - 相同输入必然复现相同错误，不提供任何重试语义。

use spark_route_ir::FuncType;
use thiserror::Error;

use crate::config::ConfigError;
use crate::phf::PerfectHashError;

/// 优化 Pass 的致命错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：把“无可用处理函数”“哈希放置失败”“处理函数类型不一致”等
///   构建失败原因收敛为一个枚举，调用方可直接 `?` 传播并交给构建系统输出；
/// - **契约 (What)**：除 [`OptimizeError::Config`] 外，所有变体都描述输入程序结构的缺陷，
///   源码不变则结果不变；
/// - **设计权衡 (Trade-offs)**：上下文以 `String` 保存，换取报错信息的可读性。
#[derive(Debug, Error)]
pub enum OptimizeError {
    /// 检测到路由，但没有任何一条成功链接到处理函数，无法推导分派函数签名。
    #[error(
        "no route handler could be linked ({detected} route(s) detected); dispatch generation aborted"
    )]
    NoHandlersLinked { detected: usize },

    /// 完美哈希构建失败，视为内部缺陷。
    #[error("perfect hash construction failed for {scope}: {source}")]
    PerfectHash {
        scope: String,
        #[source]
        source: PerfectHashError,
    },

    /// 同一 `(method, path)` 被注册了两次。
    #[error("route #{second} duplicates route #{first}: {method} {path}")]
    DuplicateRoute {
        method: String,
        path: String,
        first: usize,
        second: usize,
    },

    /// 处理函数不是“单参数”形状。
    #[error("handler `{handler}` of route #{route} takes {arity} parameter(s); exactly one request parameter is required")]
    HandlerArity {
        route: usize,
        handler: String,
        arity: usize,
    },

    /// 已链接的处理函数签名与首个处理函数不一致。
    #[error(
        "handler `{handler}` of route #{route} ({method} {path}) has signature {found}, \
         but the dispatch signature derived from `{reference}` is {expected}"
    )]
    HeterogeneousHandlerTypes {
        route: usize,
        method: String,
        path: String,
        handler: String,
        reference: String,
        expected: FuncType,
        found: FuncType,
    },

    /// 框架没有提供默认（未命中）响应工厂。
    #[error("default response factory `{name}` was not found in module `{module}`")]
    MissingDefaultResponse { name: String, module: String },

    /// 默认响应工厂的签名不满足契约。
    #[error("default response factory `{name}` has signature {found}; expected {expected}")]
    IncompatibleDefaultResponse {
        name: String,
        expected: String,
        found: FuncType,
    },

    /// 预声明的扩展点签名与分派契约不兼容。
    #[error("extension point `{name}` has signature {found}; expected {expected}")]
    IncompatibleExtensionPoint {
        name: String,
        expected: FuncType,
        found: FuncType,
    },

    /// 配置非法。
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl OptimizeError {
    /// 以 `scope`（如 `global`、`bucket GET`）包装完美哈希错误。
    pub(crate) fn perfect_hash(scope: impl Into<String>, source: PerfectHashError) -> Self {
        Self::PerfectHash {
            scope: scope.into(),
            source,
        }
    }
}
