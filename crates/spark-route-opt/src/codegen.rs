//! 分派函数生成。
//!
//! # 生成形状（What）
//! ```text
//! if method == "GET" {
//!     if path == "/" { return index(request) }
//!     elif path == "/about" { return about(request) }
//!     else { return not_found_response(request) }
//! } elif method == "POST" {
//!     ...
//! } else {
//!     return not_found_response(request)
//! }
//! ```
//! 外层按方法桶顺序比较方法，内层按桶内注册顺序比较路径；所有未命中分支都调用默认响应工厂，
//! 不会退化为调用任意一个已注册的处理函数。
//!
//! # 构建方式（How）
//! 条件链自尾向头构建：先得到最末尾的“未命中”分支，再逐个把 `if cond { hit } else { 已有链 }`
//! 包到外面，最终得到一个嵌套 `If` 节点，不需要任何回填。
//!
//! # 落地（Integration）
//! - 模块中存在扩展点函数时，原地替换其函数体，签名与参数名保持不变；
//! - 否则若已有同名生成函数（上一次运行的产物），同样原地替换；
//! - 都不存在时追加新函数，参数名为 `method`、`path`、`request`。

use core::fmt;

use spark_route_ir::{Call, Flow, FuncId, FuncType, Function, Module, Param, Type, Value};

use crate::bucket::MethodBucket;
use crate::config::OptimizerConfig;
use crate::detect::RouteRecord;
use crate::error::OptimizeError;
use crate::link::{LinkScope, resolve_function};
use crate::signature::DispatchSignature;

/// 追加分派函数时使用的参数名。
pub const DISPATCH_PARAMS: [&str; 3] = ["method", "path", "request"];

/// 分派函数的落地方式。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Integration {
    /// 替换了已存在函数（扩展点或上一次生成的函数）的函数体。
    Replaced,
    /// 追加了新函数。
    Appended,
}

impl fmt::Display for Integration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Integration::Replaced => "(replaced)",
            Integration::Appended => "(appended)",
        })
    }
}

/// 生成结果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchArtifact {
    pub function: FuncId,
    pub name: String,
    pub integration: Integration,
    pub signature: DispatchSignature,
    pub default_response: FuncId,
    pub method_branches: usize,
    pub route_branches: usize,
}

/// 默认响应工厂及其调用形态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Fallback {
    function: FuncId,
    takes_request: bool,
}

impl Fallback {
    fn call(self, request: &str) -> Flow {
        let args = if self.takes_request {
            vec![Value::var(request)]
        } else {
            Vec::new()
        };
        Flow::Return(Call::direct(self.function, args).into())
    }
}

/// 在模块中查找并校验默认响应工厂。
fn resolve_fallback(
    module: &Module,
    config: &OptimizerConfig,
    signature: &DispatchSignature,
) -> Result<Fallback, OptimizeError> {
    let Some((function, _)) = resolve_function(module, &config.default_response, LinkScope::Any)
    else {
        return Err(OptimizeError::MissingDefaultResponse {
            name: config.default_response.clone(),
            module: module.name.clone(),
        });
    };
    let found = module
        .function(function)
        .map(Function::signature)
        .unwrap_or_else(|| FuncType {
            params: Vec::new(),
            ret: Type::Unit,
        });

    let takes_request = match found.params.as_slice() {
        [] => false,
        [request] if *request == signature.request => true,
        _ => return Err(incompatible_fallback(config, signature, found)),
    };
    if found.ret != signature.response {
        return Err(incompatible_fallback(config, signature, found));
    }
    Ok(Fallback {
        function,
        takes_request,
    })
}

fn incompatible_fallback(
    config: &OptimizerConfig,
    signature: &DispatchSignature,
    found: FuncType,
) -> OptimizeError {
    OptimizeError::IncompatibleDefaultResponse {
        name: config.default_response.clone(),
        expected: format!(
            "() -> {response} or ({request}) -> {response}",
            request = signature.request,
            response = signature.response
        ),
        found,
    }
}

/// 找到要被替换的既有函数并校验其签名。
fn resolve_target(
    module: &Module,
    config: &OptimizerConfig,
    signature: &DispatchSignature,
) -> Result<Option<FuncId>, OptimizeError> {
    let target = module
        .find(&config.extension_point)
        .or_else(|| module.find(&config.generated_name));
    let Some(id) = target else {
        return Ok(None);
    };
    let found = module
        .function(id)
        .map(Function::signature)
        .unwrap_or_else(|| FuncType {
            params: Vec::new(),
            ret: Type::Unit,
        });
    let expected = signature.dispatch_type();
    if found != expected {
        let name = module
            .function(id)
            .map(|function| function.name.clone())
            .unwrap_or_else(|| config.extension_point.clone());
        return Err(OptimizeError::IncompatibleExtensionPoint {
            name,
            expected,
            found,
        });
    }
    Ok(Some(id))
}

struct DispatchParams {
    method: String,
    path: String,
    request: String,
}

/// 自尾向头构建条件链，返回函数体与两级分支数量。
fn build_chain(
    routes: &[RouteRecord],
    buckets: &[MethodBucket],
    fallback: Fallback,
    params: &DispatchParams,
) -> (Flow, usize, usize) {
    let mut chain = fallback.call(&params.request);
    let mut method_branches = 0;
    let mut route_branches = 0;

    for bucket in buckets.iter().rev() {
        let mut inner = fallback.call(&params.request);
        let mut hits = 0;
        for &index in bucket.route_indices.iter().rev() {
            let Some(route) = routes.get(index) else {
                continue;
            };
            let (Some(path), Some(handler)) = (route.literal_path(), route.handler_ref) else {
                continue;
            };
            let hit = Flow::Return(Call::direct(handler, vec![Value::var(&params.request)]).into());
            inner = Flow::branch(
                Value::equals(Value::var(&params.path), Value::str(path)),
                hit,
                Some(inner),
            );
            hits += 1;
        }
        if hits == 0 {
            continue;
        }
        chain = Flow::branch(
            Value::equals(Value::var(&params.method), Value::str(&bucket.method)),
            inner,
            Some(chain),
        );
        method_branches += 1;
        route_branches += hits;
    }

    (Flow::Series(vec![chain]), method_branches, route_branches)
}

/// 生成分派函数并写入模块。
pub fn generate_dispatch(
    module: &mut Module,
    config: &OptimizerConfig,
    routes: &[RouteRecord],
    buckets: &[MethodBucket],
    signature: &DispatchSignature,
) -> Result<DispatchArtifact, OptimizeError> {
    let fallback = resolve_fallback(module, config, signature)?;
    let target = resolve_target(module, config, signature)?;

    let params = match target.and_then(|id| module.function(id)) {
        Some(function) => DispatchParams {
            method: function.params[0].name.clone(),
            path: function.params[1].name.clone(),
            request: function.params[2].name.clone(),
        },
        None => DispatchParams {
            method: DISPATCH_PARAMS[0].to_owned(),
            path: DISPATCH_PARAMS[1].to_owned(),
            request: DISPATCH_PARAMS[2].to_owned(),
        },
    };

    let (body, method_branches, route_branches) = build_chain(routes, buckets, fallback, &params);

    let (function, integration) = match target {
        Some(id) => {
            module.replace_body(id, body);
            (id, Integration::Replaced)
        }
        None => {
            let dispatch_type = signature.dispatch_type();
            let names = [&params.method, &params.path, &params.request];
            let fn_params = names
                .into_iter()
                .zip(dispatch_type.params)
                .map(|(name, ty)| Param::new(name.as_str(), ty))
                .collect();
            let id = module.push(Function::define(
                config.generated_name.as_str(),
                fn_params,
                dispatch_type.ret,
                body,
            ));
            (id, Integration::Appended)
        }
    };

    let name = module
        .function(function)
        .map(|function| function.name.clone())
        .unwrap_or_else(|| config.generated_name.clone());
    tracing::debug!(
        name = %name,
        ?integration,
        method_branches,
        route_branches,
        "dispatch function written"
    );

    Ok(DispatchArtifact {
        function,
        name,
        integration,
        signature: signature.clone(),
        default_response: fallback.function,
        method_branches,
        route_branches,
    })
}
