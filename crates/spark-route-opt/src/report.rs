//! 构建期诊断报告。
//!
//! # 契约（What）
//! - [`Warning`] 描述可恢复的问题：对应路由被排除在分派之外，但构建继续；
//! - [`OptimizationReport`] 汇总发现的路由、逐条链接结果、全局与分桶哈希表规模及负载因子、
//!   桶数量、告警与生成产物；`Display` 输出人类可读文本，[`OptimizationReport::log`]
//!   以结构化 `tracing` 事件输出同样的信息。

use core::fmt;

use crate::codegen::{DispatchArtifact, Integration};
use crate::link::LinkStatus;
use crate::phf::PerfectHashTable;

/// 可恢复的诊断。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// 装饰器调用的路径参数不是字面量，路由无法参与静态分派。
    UnroutablePath { route: usize, method: String },
    /// 元数据调用中的处理函数名不是字面量。
    NonLiteralHandlerName {
        route: usize,
        method: String,
        path: String,
    },
    /// 元数据调用找不到同方法、尚未关联处理函数的路由。
    OrphanMetadata {
        method: String,
        path: String,
        handler: String,
    },
    /// 元数据调用关联到的路由路径与其自身携带的路径不一致。
    CorrelationMismatch {
        route: usize,
        method: String,
        route_path: String,
        metadata_path: String,
        handler: String,
    },
    /// 检测结束时仍未拿到处理函数名。
    UnresolvedHandler {
        route: usize,
        method: String,
        path: String,
    },
    /// 模块中没有与处理函数名匹配的函数。
    UnlinkedHandler {
        route: usize,
        method: String,
        path: String,
        handler: String,
    },
}

impl Warning {
    /// 以 `warn` 级别输出。
    pub fn log(&self) {
        tracing::warn!(target: "spark_route_opt", "{self}");
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnroutablePath { route, method } => write!(
                f,
                "route #{route} ({method}) has a non-literal path and is unroutable; it is dropped from dispatch"
            ),
            Warning::NonLiteralHandlerName {
                route,
                method,
                path,
            } => write!(
                f,
                "route #{route} ({method} {path}) received a non-literal handler name and cannot be linked"
            ),
            Warning::OrphanMetadata {
                method,
                path,
                handler,
            } => write!(
                f,
                "route metadata ({method} {path} -> {handler}) matches no pending route"
            ),
            Warning::CorrelationMismatch {
                route,
                method,
                route_path,
                metadata_path,
                handler,
            } => write!(
                f,
                "handler `{handler}` was correlated with route #{route} ({method} {route_path}) \
                 although its metadata names path {metadata_path}"
            ),
            Warning::UnresolvedHandler {
                route,
                method,
                path,
            } => write!(
                f,
                "route #{route} ({method} {path}) never received a handler name"
            ),
            Warning::UnlinkedHandler {
                route,
                method,
                path,
                handler,
            } => write!(
                f,
                "route #{route} ({method} {path}): no function named `{handler}` in module"
            ),
        }
    }
}

/// 单张完美哈希表的规模统计。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TableStats {
    pub entries: usize,
    pub table_size: usize,
    pub load_factor: f64,
}

impl From<&PerfectHashTable> for TableStats {
    fn from(table: &PerfectHashTable) -> Self {
        Self {
            entries: table.len(),
            table_size: table.table_size(),
            load_factor: table.load_factor(),
        }
    }
}

impl fmt::Display for TableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entr{}, table size {}, load factor {:.1}%",
            self.entries,
            if self.entries == 1 { "y" } else { "ies" },
            self.table_size,
            self.load_factor * 100.0
        )
    }
}

/// 报告中的单条路由。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteSummary {
    pub method: String,
    pub path: String,
    pub handler: Option<String>,
    pub status: LinkStatus,
    /// 链接成功时目标函数的限定名。
    pub target: Option<String>,
}

/// 报告中的单个方法桶。
#[derive(Clone, Debug, PartialEq)]
pub struct BucketSummary {
    pub method: String,
    pub routes: Vec<usize>,
    pub stats: TableStats,
}

/// 生成产物摘要。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactSummary {
    pub name: String,
    pub integration: Integration,
    pub signature: String,
    pub method_branches: usize,
    pub route_branches: usize,
}

impl From<&DispatchArtifact> for ArtifactSummary {
    fn from(artifact: &DispatchArtifact) -> Self {
        Self {
            name: artifact.name.clone(),
            integration: artifact.integration,
            signature: artifact.signature.dispatch_type().to_string(),
            method_branches: artifact.method_branches,
            route_branches: artifact.route_branches,
        }
    }
}

/// 一次 Pass 调用的完整诊断。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptimizationReport {
    pub module: String,
    pub routes: Vec<RouteSummary>,
    pub linked: usize,
    pub failed: usize,
    pub skipped: usize,
    pub global: Option<TableStats>,
    pub buckets: Vec<BucketSummary>,
    pub warnings: Vec<Warning>,
    pub artifact: Option<ArtifactSummary>,
}

impl OptimizationReport {
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// 以结构化事件输出报告摘要。
    pub fn log(&self) {
        tracing::info!(
            target: "spark_route_opt",
            module = %self.module,
            routes = self.routes.len(),
            linked = self.linked,
            failed = self.failed,
            skipped = self.skipped,
            "route detection and linking finished"
        );
        for (index, route) in self.routes.iter().enumerate() {
            tracing::debug!(
                target: "spark_route_opt",
                route = index,
                method = %route.method,
                path = %route.path,
                handler = route.handler.as_deref().unwrap_or("<unresolved>"),
                status = %route.status,
                "route link status"
            );
        }
        if let Some(global) = &self.global {
            tracing::info!(
                target: "spark_route_opt",
                table_size = global.table_size,
                entries = global.entries,
                load_factor = global.load_factor,
                "global perfect hash built"
            );
        }
        for bucket in &self.buckets {
            tracing::info!(
                target: "spark_route_opt",
                method = %bucket.method,
                routes = bucket.routes.len(),
                table_size = bucket.stats.table_size,
                load_factor = bucket.stats.load_factor,
                "method bucket built"
            );
        }
        if let Some(artifact) = &self.artifact {
            tracing::info!(
                target: "spark_route_opt",
                name = %artifact.name,
                integration = ?artifact.integration,
                signature = %artifact.signature,
                method_branches = artifact.method_branches,
                route_branches = artifact.route_branches,
                "dispatch function generated"
            );
        }
    }
}

impl fmt::Display for OptimizationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "route optimization report for module `{}`", self.module)?;
        writeln!(f, "  detected {} route(s)", self.routes.len())?;
        for (index, route) in self.routes.iter().enumerate() {
            write!(
                f,
                "    #{index} {} {} -> {} [",
                route.method,
                route.path,
                route.handler.as_deref().unwrap_or("<unresolved>")
            )?;
            match (&route.status, &route.target) {
                (LinkStatus::Linked { by, .. }, Some(target)) => {
                    write!(f, "linked {by} {target}")?;
                }
                (status, _) => write!(f, "{status}")?,
            }
            writeln!(f, "]")?;
        }
        writeln!(
            f,
            "  linked {}, failed {}, skipped {}",
            self.linked, self.failed, self.skipped
        )?;
        if let Some(global) = &self.global {
            writeln!(f, "  global table: {global}")?;
        }
        writeln!(f, "  method buckets: {}", self.buckets.len())?;
        for bucket in &self.buckets {
            writeln!(f, "    {}: {}", bucket.method, bucket.stats)?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "  warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }
        match &self.artifact {
            Some(artifact) => writeln!(
                f,
                "  dispatch: {} {} {}, {} method branch(es), {} route branch(es)",
                artifact.name,
                artifact.signature,
                artifact.integration,
                artifact.method_branches,
                artifact.route_branches
            ),
            None => writeln!(f, "  dispatch: not generated"),
        }
    }
}
