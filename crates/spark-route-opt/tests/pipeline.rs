//! 端到端 Pass 验证。
//!
//! - 以手工构造的 IR 模块驱动完整 Pass；
//! - 生成的分派函数由一个极简求值器执行，直接断言“哪条请求调用了哪个函数”；
//! - 同一输入运行两次，打印文本必须逐字节一致。

use std::collections::BTreeMap;

use spark_route_ir::{Call, Callee, Flow, FuncId, Function, Literal, Module, Param, Type, Value};
use spark_route_opt::{
    Integration, LinkStatus, OptimizeError, OptimizerConfig, RouteOptimizer, Warning, resolve_route,
};

fn request() -> Type {
    Type::Named("Request".into())
}

fn response() -> Type {
    Type::Named("Response".into())
}

fn handler(name: &str) -> Function {
    Function::define(
        name,
        vec![Param::new("request", request())],
        response(),
        Flow::Return(Value::Opaque(format!("Response::text({name:?})"))),
    )
}

fn register(method_call: &str, path: &str, method: &str, handler: &str) -> [Flow; 2] {
    [
        Flow::Eval(Call::method(Value::var("app"), method_call, vec![Value::str(path)]).into()),
        Flow::Eval(
            Call::method(
                Value::var("app"),
                "add_route_metadata",
                vec![Value::str(path), Value::str(method), Value::str(handler)],
            )
            .into(),
        ),
    ]
}

/// 场景 A：`GET /`、`GET /about`、`POST /submit`、`GET /users/:id`。
fn scenario_a() -> Module {
    let mut module = Module::new("app");
    let mut body = Vec::new();
    body.extend(register("get", "/", "GET", "index"));
    body.extend(register("get", "/about", "GET", "about"));
    body.extend(register("post", "/submit", "POST", "submit"));
    body.extend(register("get", "/users/:id", "GET", "show_user"));
    module.push(Function::define("routes", Vec::new(), Type::Unit, Flow::Series(body)));
    module.push(handler("index"));
    module.push(handler("about").with_qualified_name("pages.about"));
    module.push(handler("submit"));
    module.push(handler("show_user").with_qualified_name("handlers.users.show_user"));
    module.push(Function::declare("not_found_response", Vec::new(), response()));
    module
}

/// 执行分派函数，返回被调用的函数。
fn dispatch(module: &Module, entry: FuncId, method: &str, path: &str) -> Option<FuncId> {
    let function = module.function(entry)?;
    let mut env = BTreeMap::new();
    env.insert(function.params[0].name.clone(), method.to_owned());
    env.insert(function.params[1].name.clone(), path.to_owned());
    eval_flow(function.body.as_ref()?, &env)
}

fn eval_flow(flow: &Flow, env: &BTreeMap<String, String>) -> Option<FuncId> {
    match flow {
        Flow::Series(items) => items.iter().find_map(|item| eval_flow(item, env)),
        Flow::If {
            cond,
            then_flow,
            else_flow,
        } => {
            if eval_cond(cond, env) {
                eval_flow(then_flow, env)
            } else {
                else_flow.as_deref().and_then(|flow| eval_flow(flow, env))
            }
        }
        Flow::Return(Value::Call(Call {
            callee: Callee::Func(id),
            ..
        })) => Some(*id),
        Flow::Return(_) | Flow::Eval(_) => None,
    }
}

fn eval_cond(cond: &Value, env: &BTreeMap<String, String>) -> bool {
    let text = |value: &Value| match value {
        Value::Var(name) => env.get(name).cloned(),
        Value::Literal(Literal::Str(text)) => Some(text.clone()),
        _ => None,
    };
    match cond {
        Value::Eq(lhs, rhs) => text(lhs).is_some() && text(lhs) == text(rhs),
        _ => false,
    }
}

#[test]
fn scenario_a_dispatches_directly_to_linked_handlers() {
    let mut module = scenario_a();
    let outcome = RouteOptimizer::default().run(&mut module).expect("pass 应成功");

    let layout: Vec<(&str, Vec<usize>)> = outcome
        .buckets
        .iter()
        .map(|bucket| (bucket.method.as_str(), bucket.route_indices.clone()))
        .collect();
    assert_eq!(layout, vec![("GET", vec![0, 1, 3]), ("POST", vec![2])]);
    assert_eq!(outcome.report.bucket_count(), 2);
    assert_eq!(outcome.report.linked, 4);
    assert!(outcome.report.warnings.is_empty());

    let artifact = outcome.artifact.expect("应生成分派函数");
    assert_eq!(artifact.integration, Integration::Appended);
    assert_eq!((artifact.method_branches, artifact.route_branches), (2, 4));

    let about = module.find("about").expect("about");
    let fallback = module.find("not_found_response").expect("fallback");
    assert_eq!(dispatch(&module, artifact.function, "GET", "/about"), Some(about));
    assert_eq!(dispatch(&module, artifact.function, "GET", "/missing"), Some(fallback));
    assert_eq!(dispatch(&module, artifact.function, "DELETE", "/"), Some(fallback));
    assert_eq!(
        dispatch(&module, artifact.function, "POST", "/submit"),
        module.find("submit")
    );
    // 路径参数不做匹配，只有字面量相等才命中。
    assert_eq!(dispatch(&module, artifact.function, "GET", "/users/7"), Some(fallback));

    assert_eq!(
        resolve_route(&outcome.buckets, &outcome.routes, "GET", "/users/:id"),
        Some(3)
    );
    assert_eq!(outcome.routes[3].param_names(), vec!["id"]);
}

#[test]
fn report_lists_every_route_and_table() {
    let mut module = scenario_a();
    let outcome = RouteOptimizer::default().run(&mut module).expect("pass 应成功");
    let report = &outcome.report;

    assert!(matches!(
        report.routes[1].status,
        LinkStatus::Linked { .. }
    ));
    assert_eq!(report.routes[1].target.as_deref(), Some("pages.about"));
    let global = report.global.expect("全局表统计");
    assert_eq!(global.entries, 4);
    assert!((4..=8).contains(&global.table_size));

    let text = report.to_string();
    assert!(text.contains("detected 4 route(s)"), "{text}");
    assert!(text.contains("#3 GET /users/:id -> show_user [linked (exact) handlers.users.show_user]"));
    assert!(text.contains("method buckets: 2"));
    assert!(text.contains("dispatch: spark_dispatch (str, str, Request) -> Response (appended)"));
}

#[test]
fn output_is_deterministic() {
    let mut first = scenario_a();
    let mut second = scenario_a();
    let a = RouteOptimizer::default().run(&mut first).expect("第一次");
    let b = RouteOptimizer::default().run(&mut second).expect("第二次");
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(a.report.to_string(), b.report.to_string());
}

#[test]
fn rerun_replaces_previous_dispatch() {
    let mut module = scenario_a();
    let optimizer = RouteOptimizer::default();
    let first = optimizer.run(&mut module).expect("第一次");
    let printed = module.to_string();
    let second = optimizer.run(&mut module).expect("第二次");

    let second_artifact = second.artifact.expect("产物");
    assert_eq!(second_artifact.integration, Integration::Replaced);
    assert_eq!(Some(second_artifact.function), first.artifact.map(|a| a.function));
    assert_eq!(module.to_string(), printed);
}

#[test]
fn extension_point_stub_is_filled_in_place() {
    let mut module = scenario_a();
    let stub = module.push(Function::define(
        "__spark_dispatch",
        vec![
            Param::new("method", Type::Str),
            Param::new("path", Type::Str),
            Param::new("req", request()),
        ],
        response(),
        Flow::Return(Value::Opaque("unimplemented!()".into())),
    ));
    let functions_before = module.len();

    let outcome = RouteOptimizer::default().run(&mut module).expect("pass 应成功");
    let artifact = outcome.artifact.expect("产物");
    assert_eq!(artifact.function, stub);
    assert_eq!(artifact.name, "__spark_dispatch");
    assert_eq!(module.len(), functions_before);
    assert_eq!(
        dispatch(&module, stub, "GET", "/"),
        module.find("index")
    );
}

#[test]
fn module_without_routes_is_left_untouched() {
    let mut module = Module::new("plain");
    module.push(handler("index"));
    let before = module.clone();
    let outcome = RouteOptimizer::default().run(&mut module).expect("无路由不是错误");
    assert!(outcome.artifact.is_none());
    assert!(outcome.routes.is_empty());
    assert_eq!(module, before);
    assert!(outcome.report.to_string().contains("dispatch: not generated"));
}

#[test]
fn no_linked_handler_is_fatal() {
    let mut module = Module::new("app");
    module.push(Function::define(
        "routes",
        Vec::new(),
        Type::Unit,
        Flow::Series(register("get", "/", "GET", "ghost").to_vec()),
    ));
    let err = RouteOptimizer::default().run(&mut module).unwrap_err();
    assert!(matches!(err, OptimizeError::NoHandlersLinked { detected: 1 }));
}

#[test]
fn unlinked_and_unroutable_routes_are_dropped_with_warnings() {
    let mut module = scenario_a();
    let extra = vec![
        Flow::Eval(Call::method(Value::var("app"), "put", vec![Value::var("prefix")]).into()),
        Flow::Eval(
            Call::method(
                Value::var("app"),
                "add_route_metadata",
                vec![Value::var("prefix"), Value::str("PUT"), Value::str("submit")],
            )
            .into(),
        ),
    ];
    let mut tail = extra;
    tail.extend(register("delete", "/gone", "DELETE", "vanished"));
    module.push(Function::define("more_routes", Vec::new(), Type::Unit, Flow::Series(tail)));

    let outcome = RouteOptimizer::default().run(&mut module).expect("pass 应成功");
    let report = &outcome.report;
    assert_eq!((report.linked, report.failed, report.skipped), (4, 1, 1));
    assert_eq!(report.routes[4].status, LinkStatus::Skipped);
    assert_eq!(report.routes[5].status, LinkStatus::NotFound);
    assert!(report.warnings.iter().any(|w| matches!(w, Warning::UnroutablePath { route: 4, .. })));
    assert!(report.warnings.iter().any(|w| matches!(w, Warning::UnlinkedHandler { route: 5, .. })));
    assert_eq!(report.bucket_count(), 2);
}

#[test]
fn duplicate_route_is_fatal() {
    let mut module = scenario_a();
    module.push(Function::define(
        "again",
        Vec::new(),
        Type::Unit,
        Flow::Series(register("get", "/about", "GET", "index").to_vec()),
    ));
    let err = RouteOptimizer::default().run(&mut module).unwrap_err();
    assert!(matches!(
        err,
        OptimizeError::DuplicateRoute { first: 1, second: 4, .. }
    ));
}

#[test]
fn heterogeneous_handlers_are_fatal() {
    let mut module = scenario_a();
    let submit = module.find("submit").expect("submit");
    if let Some(function) = module.function_mut(submit) {
        function.ret = Type::Str;
    }
    let err = RouteOptimizer::default().run(&mut module).unwrap_err();
    assert!(matches!(
        err,
        OptimizeError::HeterogeneousHandlerTypes { route: 2, ref handler, .. } if handler == "submit"
    ));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = OptimizerConfig {
        metadata_call: String::new(),
        ..OptimizerConfig::default()
    };
    assert!(matches!(
        RouteOptimizer::new(config),
        Err(OptimizeError::Config(_))
    ));
}
