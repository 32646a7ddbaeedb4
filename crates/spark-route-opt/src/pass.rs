//! 路由优化 Pass 的编排。
//!
//! # 阶段（How）
//! `detect → link → hash → bucket → types → codegen`，每个阶段一个 `tracing` span
//! （`route_opt.<stage>`）。阶段之间只通过显式传递的值交换状态，不存在全局可变状态：
//! 同一个 [`RouteOptimizer`] 可以反复作用于不同模块，相互之间互不影响。
//!
//! # 结果（What）
//! - 没有发现任何路由：只产出报告，不生成分派函数；
//! - 发现了路由但没有任何处理函数链接成功：先记录只含链接结果的报告，再返回
//!   [`OptimizeError::NoHandlersLinked`]；
//! - 其余情况：模块中多出（或被替换出）一个分派函数，报告中附带产物摘要。

use spark_route_ir::Module;

use crate::bucket::{MethodBucket, bucketize, build_global_table, check_duplicates};
use crate::codegen::{DispatchArtifact, generate_dispatch};
use crate::config::OptimizerConfig;
use crate::detect::{RouteRecord, detect_routes};
use crate::error::OptimizeError;
use crate::link::{LinkOutcome, link_handlers};
use crate::phf::PerfectHashTable;
use crate::report::{
    ArtifactSummary, BucketSummary, OptimizationReport, RouteSummary, TableStats, Warning,
};
use crate::signature::resolve_signature;

/// 一次 Pass 调用的全部产出。
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizationOutcome {
    pub routes: Vec<RouteRecord>,
    pub global_table: PerfectHashTable,
    pub buckets: Vec<MethodBucket>,
    pub artifact: Option<DispatchArtifact>,
    pub report: OptimizationReport,
}

/// 路由优化 Pass。
///
/// # 教案式说明
/// - **意图 (Why)**：把发现、链接、哈希、分桶、类型推导与生成串成一次调用，供编译器后端
///   或源码工具直接驱动；
/// - **契约 (What)**：构造时校验配置；`run` 对同一输入总是得到逐字节一致的模块与报告；
/// - **风险 (Trade-offs)**：`run` 原地修改模块，失败时模块可能停留在生成前的状态，
///   但不会出现半写入的分派函数（写入是最后一步）。
#[derive(Clone, Debug, Default)]
pub struct RouteOptimizer {
    config: OptimizerConfig,
}

impl RouteOptimizer {
    pub fn new(config: OptimizerConfig) -> Result<Self, OptimizeError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// 对模块运行完整 Pass。
    pub fn run(&self, module: &mut Module) -> Result<OptimizationOutcome, OptimizeError> {
        let detection = {
            let _span = tracing::info_span!("route_opt.detect", module = %module.name).entered();
            detect_routes(module, &self.config)
        };
        let mut routes = detection.routes;
        let mut warnings = detection.warnings;

        if routes.is_empty() {
            tracing::info!(module = %module.name, "no routes detected; dispatch generation skipped");
            let report = OptimizationReport {
                module: module.name.clone(),
                warnings,
                ..OptimizationReport::default()
            };
            report.log();
            return Ok(OptimizationOutcome {
                routes,
                global_table: PerfectHashTable::default(),
                buckets: Vec::new(),
                artifact: None,
                report,
            });
        }

        let links = {
            let _span = tracing::info_span!("route_opt.link", routes = routes.len()).entered();
            link_handlers(module, &mut routes)
        };
        warnings.extend(links.warnings.iter().cloned());
        if links.linked() == 0 {
            build_report(module, &routes, &links, None, &[], warnings, None).log();
            return Err(OptimizeError::NoHandlersLinked {
                detected: routes.len(),
            });
        }

        let global_table = {
            let _span = tracing::info_span!("route_opt.hash").entered();
            check_duplicates(&routes)?;
            let table = build_global_table(&routes)?;
            tracing::info!(
                entries = table.len(),
                table_size = table.table_size(),
                load_factor = table.load_factor(),
                "global perfect hash built"
            );
            table
        };

        let buckets = {
            let _span = tracing::info_span!("route_opt.bucket").entered();
            bucketize(&routes)?
        };

        let signature = {
            let _span = tracing::info_span!("route_opt.types").entered();
            resolve_signature(module, &routes)?
        };

        let artifact = {
            let _span = tracing::info_span!("route_opt.codegen").entered();
            generate_dispatch(module, &self.config, &routes, &buckets, &signature)?
        };

        let report = build_report(
            module,
            &routes,
            &links,
            Some(&global_table),
            &buckets,
            warnings,
            Some(&artifact),
        );
        report.log();

        Ok(OptimizationOutcome {
            routes,
            global_table,
            buckets,
            artifact: Some(artifact),
            report,
        })
    }
}

fn build_report(
    module: &Module,
    routes: &[RouteRecord],
    links: &LinkOutcome,
    global_table: Option<&PerfectHashTable>,
    buckets: &[MethodBucket],
    warnings: Vec<Warning>,
    artifact: Option<&DispatchArtifact>,
) -> OptimizationReport {
    let summaries = routes
        .iter()
        .zip(&links.statuses)
        .map(|(route, status)| RouteSummary {
            method: route.method.clone(),
            path: route.path.to_string(),
            handler: route.handler_name().map(str::to_owned),
            status: status.clone(),
            target: route
                .handler_ref
                .and_then(|id| module.function(id))
                .map(|function| function.qualified().to_owned()),
        })
        .collect();

    OptimizationReport {
        module: module.name.clone(),
        routes: summaries,
        linked: links.linked(),
        failed: links.failed(),
        skipped: links.skipped(),
        global: global_table.map(TableStats::from),
        buckets: buckets
            .iter()
            .map(|bucket| BucketSummary {
                method: bucket.method.clone(),
                routes: bucket.route_indices.clone(),
                stats: TableStats::from(&bucket.hash_table),
            })
            .collect(),
        warnings,
        artifact: artifact.map(ArtifactSummary::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spark_route_ir::{Call, Flow, Function, Param, Type, Value};
    use tracing_test::traced_test;

    fn module_with(registrations: Vec<Call>) -> Module {
        let response = Type::Named("Response".into());
        let mut module = Module::new("app");
        module.push(Function::define(
            "routes",
            Vec::new(),
            Type::Unit,
            Flow::Series(registrations.into_iter().map(|call| Flow::Eval(call.into())).collect()),
        ));
        module.push(Function::define(
            "index",
            vec![Param::new("request", Type::Named("Request".into()))],
            response.clone(),
            Flow::Return(Value::Opaque("Response::ok()".into())),
        ));
        module.push(Function::declare("not_found_response", Vec::new(), response));
        module
    }

    fn metadata(path: &str, method: &str, handler: &str) -> Call {
        Call::named(
            "add_route_metadata",
            vec![Value::str(path), Value::str(method), Value::str(handler)],
        )
    }

    #[test]
    #[traced_test]
    fn warnings_are_logged_and_reported() {
        let mut module = module_with(vec![
            Call::named("get", vec![Value::str("/")]),
            metadata("/", "GET", "index"),
            Call::named("post", vec![Value::str("/orphan")]),
            metadata("/elsewhere", "PATCH", "nobody"),
        ]);
        let outcome = RouteOptimizer::default().run(&mut module).expect("pass 应成功");

        assert!(matches!(
            outcome.report.warnings.as_slice(),
            [
                Warning::OrphanMetadata { .. },
                Warning::UnresolvedHandler { route: 1, .. }
            ]
        ));
        assert!(logs_contain("matches no pending route"));
        assert!(logs_contain("never received a handler name"));
        assert!(logs_contain("dispatch function generated"));
    }

    #[test]
    #[traced_test]
    fn empty_module_skips_generation() {
        let mut module = module_with(Vec::new());
        let outcome = RouteOptimizer::default().run(&mut module).expect("无路由不是错误");
        assert!(outcome.artifact.is_none());
        assert_eq!(module.find("spark_dispatch"), None);
        assert!(logs_contain("dispatch generation skipped"));
    }

    #[test]
    #[traced_test]
    fn link_failures_are_reported_before_the_error() {
        let mut module = module_with(vec![
            Call::named("get", vec![Value::str("/")]),
            metadata("/", "GET", "ghost"),
        ]);
        let err = RouteOptimizer::default().run(&mut module).unwrap_err();
        assert!(matches!(err, OptimizeError::NoHandlersLinked { detected: 1 }));
        assert!(logs_contain("route detection and linking finished"));
        assert!(logs_contain("failed=1"));
        assert!(logs_contain("route link status"));
        assert!(logs_contain("status=not found"));
        assert!(!logs_contain("dispatch function generated"));
        assert_eq!(module.find("spark_dispatch"), None);
    }

    #[test]
    fn custom_names_flow_through_every_stage() {
        let config = OptimizerConfig::from_toml_str(
            r#"
            metadata_call = "bind"
            generated_name = "route"
            default_response = "index"

            [decorators]
            fetch = "GET"
            "#,
        )
        .expect("配置");
        let mut module = module_with(vec![
            Call::named("fetch", vec![Value::str("/home")]),
            Call::named("bind", vec![Value::str("/home"), Value::str("GET"), Value::str("index")]),
            Call::named("get", vec![Value::str("/ignored")]),
        ]);
        let outcome = RouteOptimizer::new(config)
            .expect("配置合法")
            .run(&mut module)
            .expect("pass 应成功");
        assert_eq!(outcome.routes.len(), 1);
        let artifact = outcome.artifact.expect("产物");
        assert_eq!(artifact.name, "route");
        assert_eq!(Some(artifact.default_response), module.find("index"));
    }
}
