//! 分派签名推导。
//!
//! 以注册顺序中第一个已链接的处理函数为参照：它的唯一参数类型即请求类型，返回类型即响应类型。
//! 其余已链接处理函数必须同为单参数且签名与参照完全一致。

use spark_route_ir::{FuncId, FuncType, Module, Type};

use crate::detect::RouteRecord;
use crate::error::OptimizeError;

/// 生成的分派函数的签名：`(method: str, path: str, request: R) -> S`。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchSignature {
    pub request: Type,
    pub response: Type,
    /// 参照路由的下标。
    pub reference_route: usize,
    pub reference_handler: FuncId,
}

impl DispatchSignature {
    /// 处理函数应有的类型：`(R) -> S`。
    pub fn handler_type(&self) -> FuncType {
        FuncType {
            params: vec![self.request.clone()],
            ret: self.response.clone(),
        }
    }

    /// 分派函数的类型：`(str, str, R) -> S`。
    pub fn dispatch_type(&self) -> FuncType {
        FuncType {
            params: vec![Type::Str, Type::Str, self.request.clone()],
            ret: self.response.clone(),
        }
    }
}

/// 从已链接的处理函数推导分派签名。
///
/// 没有任何已链接处理函数时返回 [`OptimizeError::NoHandlersLinked`]。
pub fn resolve_signature(
    module: &Module,
    routes: &[RouteRecord],
) -> Result<DispatchSignature, OptimizeError> {
    let mut reference: Option<(DispatchSignature, String)> = None;

    for (index, route) in routes.iter().enumerate() {
        let Some(id) = route.handler_ref else {
            continue;
        };
        let Some(function) = module.function(id) else {
            continue;
        };
        let found = function.signature();
        if found.params.len() != 1 {
            return Err(OptimizeError::HandlerArity {
                route: index,
                handler: function.qualified().to_owned(),
                arity: found.params.len(),
            });
        }

        match &reference {
            None => {
                let signature = DispatchSignature {
                    request: found.params[0].clone(),
                    response: found.ret.clone(),
                    reference_route: index,
                    reference_handler: id,
                };
                tracing::debug!(
                    route = index,
                    handler = function.qualified(),
                    signature = %signature.handler_type(),
                    "dispatch signature derived"
                );
                reference = Some((signature, function.qualified().to_owned()));
            }
            Some((signature, reference_name)) => {
                let expected = signature.handler_type();
                if found != expected {
                    return Err(OptimizeError::HeterogeneousHandlerTypes {
                        route: index,
                        method: route.method.clone(),
                        path: route.path.to_string(),
                        handler: function.qualified().to_owned(),
                        reference: reference_name.clone(),
                        expected,
                        found,
                    });
                }
            }
        }
    }

    reference
        .map(|(signature, _)| signature)
        .ok_or(OptimizeError::NoHandlersLinked {
            detected: routes.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::RoutePath;
    use spark_route_ir::{Flow, Function, Param};

    fn named(name: &str) -> Type {
        Type::Named(name.into())
    }

    fn handler(name: &str, params: Vec<Type>, ret: Type) -> Function {
        let params = params
            .into_iter()
            .enumerate()
            .map(|(i, ty)| Param::new(format!("p{i}"), ty))
            .collect();
        Function::define(name, params, ret, Flow::Series(Vec::new()))
    }

    fn route_to(path: &str, id: FuncId) -> RouteRecord {
        let mut route = RouteRecord::new("GET", RoutePath::Literal(path.into()));
        route.handler_ref = Some(id);
        route
    }

    #[test]
    fn first_linked_handler_sets_the_signature() {
        let mut module = Module::new("app");
        let a = module.push(handler("a", vec![named("Request")], named("Response")));
        let b = module.push(handler("b", vec![named("Request")], named("Response")));
        let routes = vec![
            RouteRecord::new("GET", RoutePath::Literal("/none".into())),
            route_to("/a", a),
            route_to("/b", b),
        ];
        let signature = resolve_signature(&module, &routes).expect("签名");
        assert_eq!(signature.request, named("Request"));
        assert_eq!(signature.response, named("Response"));
        assert_eq!(signature.reference_route, 1);
        assert_eq!(signature.dispatch_type().to_string(), "(str, str, Request) -> Response");
    }

    #[test]
    fn mismatched_handler_is_rejected() {
        let mut module = Module::new("app");
        let a = module.push(handler("a", vec![named("Request")], named("Response")));
        let b = module.push(handler("b", vec![named("Request")], Type::Str));
        let routes = vec![route_to("/a", a), route_to("/b", b)];
        let err = resolve_signature(&module, &routes).unwrap_err();
        assert!(matches!(
            err,
            OptimizeError::HeterogeneousHandlerTypes { route: 1, ref reference, .. } if reference == "a"
        ));
    }

    #[test]
    fn handlers_must_take_one_parameter() {
        let mut module = Module::new("app");
        let a = module.push(handler("a", vec![named("Request"), Type::Int], named("Response")));
        let err = resolve_signature(&module, &[route_to("/a", a)]).unwrap_err();
        assert!(matches!(err, OptimizeError::HandlerArity { arity: 2, .. }));
    }

    #[test]
    fn nothing_linked_is_fatal() {
        let module = Module::new("app");
        let routes = vec![RouteRecord::new("GET", RoutePath::Literal("/".into()))];
        let err = resolve_signature(&module, &routes).unwrap_err();
        assert!(matches!(err, OptimizeError::NoHandlersLinked { detected: 1 }));
    }
}
