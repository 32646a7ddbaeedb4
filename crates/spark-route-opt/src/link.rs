//! 处理函数链接。
//!
//! # 解析顺序（What）
//! 1. 精确匹配：函数短名与处理函数名相同；
//! 2. 后缀匹配：函数限定名的最后一个 `.` 分量与处理函数名相同；
//! 3. 都不命中则记为 `NotFound`。
//!
//! 多个候选同时命中时取模块顺序中的第一个。链接对已有 `handler_ref` 的路由不做修改，
//! 因此重复执行得到相同结果。

use core::fmt;

use spark_route_ir::{FuncId, Function, Module};

use crate::detect::RouteRecord;
use crate::report::Warning;

/// 命中方式。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkMatch {
    Exact,
    Suffix,
}

impl fmt::Display for LinkMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkMatch::Exact => "(exact)",
            LinkMatch::Suffix => "(suffix)",
        })
    }
}

/// 单条路由的链接结果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkStatus {
    Linked { function: FuncId, by: LinkMatch },
    /// 没有可用的处理函数名。
    Unresolved,
    /// 处理函数名在模块中找不到。
    NotFound,
    /// 路径不可路由，不参与链接。
    Skipped,
}

impl LinkStatus {
    pub fn is_linked(&self) -> bool {
        matches!(self, LinkStatus::Linked { .. })
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Linked { function, by } => write!(f, "linked {by} {function}"),
            LinkStatus::Unresolved => f.write_str("unresolved"),
            LinkStatus::NotFound => f.write_str("not found"),
            LinkStatus::Skipped => f.write_str("skipped"),
        }
    }
}

/// 查找范围。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkScope {
    /// 只接受有函数体的定义；处理函数链接使用。
    Defined,
    /// 声明也接受；默认响应工厂可以由框架以外部声明提供。
    Any,
}

impl LinkScope {
    fn admits(self, function: &Function) -> bool {
        match self {
            LinkScope::Defined => function.is_defined(),
            LinkScope::Any => true,
        }
    }
}

/// 按“精确 → 后缀”顺序在模块中查找函数。
pub fn resolve_function(
    module: &Module,
    name: &str,
    scope: LinkScope,
) -> Option<(FuncId, LinkMatch)> {
    let candidates = || {
        module
            .functions()
            .filter(move |(_, function)| scope.admits(function))
    };

    candidates()
        .find(|(_, function)| function.name == name)
        .map(|(id, _)| (id, LinkMatch::Exact))
        .or_else(|| {
            candidates()
                .find(|(_, function)| function.qualified().rsplit('.').next() == Some(name))
                .map(|(id, _)| (id, LinkMatch::Suffix))
        })
}

/// 链接阶段输出。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkOutcome {
    pub statuses: Vec<LinkStatus>,
    pub warnings: Vec<Warning>,
}

impl LinkOutcome {
    pub fn linked(&self) -> usize {
        self.count(|status| status.is_linked())
    }

    /// 有处理函数名或应有处理函数名却没能链接的路由数。
    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, LinkStatus::Unresolved | LinkStatus::NotFound))
    }

    pub fn skipped(&self) -> usize {
        self.count(|status| matches!(status, LinkStatus::Skipped))
    }

    fn count(&self, predicate: impl Fn(&LinkStatus) -> bool) -> usize {
        self.statuses.iter().filter(|status| predicate(status)).count()
    }
}

/// 为每条可路由的路由填写 `handler_ref`。
pub fn link_handlers(module: &Module, routes: &mut [RouteRecord]) -> LinkOutcome {
    let mut outcome = LinkOutcome::default();

    for (index, route) in routes.iter_mut().enumerate() {
        if route.literal_path().is_none() {
            outcome.statuses.push(LinkStatus::Skipped);
            continue;
        }
        let Some(name) = route.handler_name().map(str::to_owned) else {
            outcome.statuses.push(LinkStatus::Unresolved);
            continue;
        };

        if route.handler_ref.is_none() {
            route.handler_ref = resolve_function(module, &name, LinkScope::Defined).map(|(id, _)| id);
        }

        match route.handler_ref {
            Some(function) => {
                let by = match module.function(function) {
                    Some(target) if target.name == name => LinkMatch::Exact,
                    _ => LinkMatch::Suffix,
                };
                tracing::debug!(route = index, handler = %name, %function, ?by, "handler linked");
                outcome.statuses.push(LinkStatus::Linked { function, by });
            }
            None => {
                let warning = Warning::UnlinkedHandler {
                    route: index,
                    method: route.method.clone(),
                    path: route.path.to_string(),
                    handler: name,
                };
                warning.log();
                outcome.warnings.push(warning);
                outcome.statuses.push(LinkStatus::NotFound);
            }
        }
    }

    outcome
}
