//! 路由发现。
//!
//! # 识别规则（What）
//! - **装饰器构造调用**：被调用者短名命中配置中的装饰器映射（如 `get → GET`），且恰好一个参数；
//!   参数为字符串字面量时记录路径，否则记为 `<unknown>` 并告警，该路由不可路由；
//! - **元数据注册调用**：被调用者短名等于 `metadata_call`，参数依次为 `(path, method, handler_name)`；
//!   命中后把处理函数名填入**第一条**方法相同且仍在等待处理函数名的路由。
//!
//! # 扫描范围（What）
//! 只扫描至少含有一次元数据注册调用的函数。处理函数体里的 `cache.get(key)` 之类调用
//! 与装饰器同名，但不是路由注册。扩展点与已生成的分派函数总是跳过：其中的
//! `delete(request)` 是对处理函数的调用，重复运行时不能被当成新路由。
//!
//! # 关联规则的局限（Gotchas）
//! 路由与元数据调用之间只按“同方法、先到先得”的位置关系关联，不具备语义关联。若元数据调用
//! 自带的路径与被关联路由的路径不一致，会产生 [`Warning::CorrelationMismatch`]，但关联结果不变。

use core::fmt;

use spark_route_ir::visit::{Visitor, walk_call, walk_function, walk_module};
use spark_route_ir::{Call, FuncId, Function, Module, Value};

use crate::config::OptimizerConfig;
use crate::pattern::{PathParam, parse_path};
use crate::report::Warning;

/// 非字面量路径的占位文本。
pub const UNKNOWN_PATH: &str = "<unknown>";

/// 路由路径。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutePath {
    Literal(String),
    Unknown,
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutePath::Literal(path) => f.write_str(path),
            RoutePath::Unknown => f.write_str(UNKNOWN_PATH),
        }
    }
}

/// 处理函数名的填充状态。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerSlot {
    /// 等待后续元数据调用填充。
    Pending,
    Named(String),
    /// 元数据调用给出的名字不是字面量，永远无法链接。
    NonLiteral,
}

/// 一条路由注册记录。
///
/// 由检测阶段创建；`handler_ref` 由链接阶段填写，链接完成后不再修改。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteRecord {
    pub method: String,
    pub path: RoutePath,
    pub handler: HandlerSlot,
    pub handler_ref: Option<FuncId>,
    pub params: Vec<PathParam>,
}

impl RouteRecord {
    pub fn new(method: impl Into<String>, path: RoutePath) -> Self {
        let params = match &path {
            RoutePath::Literal(literal) => parse_path(literal).params().to_vec(),
            RoutePath::Unknown => Vec::new(),
        };
        Self {
            method: method.into(),
            path,
            handler: HandlerSlot::Pending,
            handler_ref: None,
            params,
        }
    }

    pub fn literal_path(&self) -> Option<&str> {
        match &self.path {
            RoutePath::Literal(path) => Some(path),
            RoutePath::Unknown => None,
        }
    }

    pub fn handler_name(&self) -> Option<&str> {
        match &self.handler {
            HandlerSlot::Named(name) => Some(name),
            HandlerSlot::Pending | HandlerSlot::NonLiteral => None,
        }
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|param| param.name.as_str()).collect()
    }

    pub fn param_positions(&self) -> Vec<usize> {
        self.params.iter().map(|param| param.position).collect()
    }

    /// 路径为字面量且已链接处理函数。
    pub fn is_dispatchable(&self) -> bool {
        self.handler_ref.is_some() && self.literal_path().is_some()
    }

    /// 全局完美哈希使用的 `METHOD:path` 键。
    pub fn global_key(&self) -> Option<String> {
        self.literal_path()
            .map(|path| format!("{}:{}", self.method, path))
    }
}

/// 检测结果。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Detection {
    pub routes: Vec<RouteRecord>,
    pub warnings: Vec<Warning>,
}

/// 遍历模块，按遇到顺序收集路由记录。
pub fn detect_routes(module: &Module, config: &OptimizerConfig) -> Detection {
    let mut detector = RouteDetector {
        module,
        config,
        routes: Vec::new(),
        warnings: Vec::new(),
    };
    walk_module(&mut detector, module);
    detector.finish()
}

struct RouteDetector<'a> {
    module: &'a Module,
    config: &'a OptimizerConfig,
    routes: Vec<RouteRecord>,
    warnings: Vec<Warning>,
}

impl RouteDetector<'_> {
    fn on_decorator(&mut self, method: &str, path_arg: &Value) {
        let route = self.routes.len();
        let path = match path_arg.as_str_literal() {
            Some(path) => RoutePath::Literal(path.to_owned()),
            None => {
                self.warn(Warning::UnroutablePath {
                    route,
                    method: method.to_owned(),
                });
                RoutePath::Unknown
            }
        };
        tracing::debug!(route, method, path = %path, "route pattern detected");
        self.routes.push(RouteRecord::new(method, path));
    }

    fn on_metadata(&mut self, args: &[Value]) {
        let metadata_path = args[0].as_str_literal();
        let handler = args[2].as_str_literal();
        let path_text = metadata_path.unwrap_or(UNKNOWN_PATH).to_owned();
        let handler_text = handler.unwrap_or("<non-literal>").to_owned();

        let Some(method) = args[1].as_str_literal() else {
            self.warn(Warning::OrphanMetadata {
                method: "<non-literal>".to_owned(),
                path: path_text,
                handler: handler_text,
            });
            return;
        };

        let pending = self
            .routes
            .iter()
            .position(|route| route.method == method && route.handler == HandlerSlot::Pending);
        let Some(index) = pending else {
            self.warn(Warning::OrphanMetadata {
                method: method.to_owned(),
                path: path_text,
                handler: handler_text,
            });
            return;
        };

        let route = &mut self.routes[index];
        route.handler = match handler {
            Some(name) => HandlerSlot::Named(name.to_owned()),
            None => HandlerSlot::NonLiteral,
        };
        let route_path = route.path.to_string();
        tracing::debug!(route = index, method, handler = %handler_text, "route handler name correlated");

        if handler.is_none() {
            self.warn(Warning::NonLiteralHandlerName {
                route: index,
                method: method.to_owned(),
                path: route_path.clone(),
            });
        }
        let mismatch = match (self.routes[index].literal_path(), metadata_path) {
            (Some(literal), Some(claimed)) if literal != claimed => Some(claimed.to_owned()),
            _ => None,
        };
        if let Some(metadata_path) = mismatch {
            self.warn(Warning::CorrelationMismatch {
                route: index,
                method: method.to_owned(),
                route_path,
                metadata_path,
                handler: handler_text,
            });
        }
    }

    fn warn(&mut self, warning: Warning) {
        warning.log();
        self.warnings.push(warning);
    }

    fn finish(mut self) -> Detection {
        let unresolved: Vec<Warning> = self
            .routes
            .iter()
            .enumerate()
            .filter(|(_, route)| route.handler == HandlerSlot::Pending)
            .map(|(route, record)| Warning::UnresolvedHandler {
                route,
                method: record.method.clone(),
                path: record.path.to_string(),
            })
            .collect();
        for warning in unresolved {
            self.warn(warning);
        }
        Detection {
            routes: self.routes,
            warnings: self.warnings,
        }
    }
}

impl RouteDetector<'_> {
    fn is_metadata(&self, call: &Call) -> bool {
        call.args.len() >= 3
            && self
                .module
                .callee_name(&call.callee)
                .is_some_and(|name| name == self.config.metadata_call)
    }

    fn registers_routes(&self, id: FuncId, function: &Function) -> bool {
        if function.name == self.config.extension_point
            || function.name == self.config.generated_name
        {
            return false;
        }
        let mut scan = MetadataScan {
            detector: self,
            found: false,
        };
        walk_function(&mut scan, id, function);
        scan.found
    }
}

/// 判断函数体内是否出现元数据注册调用。
struct MetadataScan<'d, 'a> {
    detector: &'d RouteDetector<'a>,
    found: bool,
}

impl Visitor for MetadataScan<'_, '_> {
    fn visit_call(&mut self, call: &Call) {
        if self.detector.is_metadata(call) {
            self.found = true;
        } else if !self.found {
            walk_call(self, call);
        }
    }
}

impl Visitor for RouteDetector<'_> {
    fn visit_function(&mut self, id: FuncId, function: &Function) {
        if self.registers_routes(id, function) {
            walk_function(self, id, function);
        } else {
            tracing::trace!(function = %function.name, "function skipped by route detection");
        }
    }

    fn visit_call(&mut self, call: &Call) {
        let module = self.module;
        let config = self.config;
        if let Some(name) = module.callee_name(&call.callee) {
            if self.is_metadata(call) {
                self.on_metadata(&call.args);
                return;
            }
            if call.args.len() == 1 {
                if let Some(method) = config.decorator_method(name) {
                    self.on_decorator(method, &call.args[0]);
                }
            }
        }
        walk_call(self, call);
    }
}
