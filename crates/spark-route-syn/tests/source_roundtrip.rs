//! 源码级改写的端到端验证：输入 Rust 源码，断言改写结果的文本与可解析性。

use spark_route_opt::{Integration, OptimizeError, OptimizerConfig};
use spark_route_syn::{SourceError, lower_source, optimize_source, render_dispatch};

const REGISTERED: &str = r#"
use framework::{App, Request, Response};

pub fn routes(app: &mut App) {
    app.get("/");
    app.add_route_metadata("/", "GET", "index");
    app.post("/submit");
    app.add_route_metadata("/submit", "POST", "submit");
    app.get("/users/:id");
    app.add_route_metadata("/users/:id", "GET", "show");
}

pub fn index(request: Request) -> Response {
    Response::text("home")
}

pub fn submit(request: Request) -> Response {
    Response::text("ok")
}

pub mod handlers {
    pub mod users {
        use super::super::{Request, Response};

        pub fn show(request: Request) -> Response {
            Response::text("user")
        }
    }
}

pub fn not_found_response() -> Response {
    Response::status(404)
}
"#;

#[test]
fn dispatch_is_appended_when_no_stub_exists() {
    let generated = optimize_source(REGISTERED, &OptimizerConfig::default()).expect("改写应成功");
    let artifact = generated.artifact.expect("应生成分派函数");
    assert_eq!(artifact.integration, Integration::Appended);

    let code = &generated.code;
    assert!(code.starts_with(REGISTERED.trim_end()));
    assert!(
        code.contains("pub fn spark_dispatch(method: &str, path: &str, request: Request) -> Response {"),
        "{code}"
    );
    assert!(code.contains("if method == \"GET\" {"), "{code}");
    assert!(code.contains("handlers::users::show(request)"), "{code}");
    assert!(code.contains("} else if method == \"POST\" {"), "{code}");
    assert!(code.contains("not_found_response()"));
    syn::parse_file(code).expect("改写结果应是合法 Rust");
}

#[test]
fn rewriting_twice_is_stable() {
    let config = OptimizerConfig::default();
    let first = optimize_source(REGISTERED, &config).expect("第一次");
    let second = optimize_source(&first.code, &config).expect("第二次");
    assert_eq!(
        second.artifact.map(|artifact| artifact.integration),
        Some(Integration::Replaced)
    );
    assert_eq!(first.code, second.code);
}

#[test]
fn stub_body_is_replaced_in_place() {
    let src = format!(
        "{REGISTERED}
// routing entry point, filled in at build time
pub mod web {{
    use super::*;

    /// Dispatches a request.
    pub fn __spark_dispatch(verb: &str, uri: &str, req: Request) -> Response {{
        unimplemented!()
    }}
}}
"
    );
    let generated = optimize_source(&src, &OptimizerConfig::default()).expect("改写应成功");
    let artifact = generated.artifact.expect("产物");
    assert_eq!(artifact.integration, Integration::Replaced);
    assert_eq!(artifact.name, "__spark_dispatch");

    let code = &generated.code;
    assert!(code.contains("// routing entry point, filled in at build time"));
    assert!(code.contains("    /// Dispatches a request.\n    pub fn __spark_dispatch(verb: &str, uri: &str, req: Request) -> Response {\n"));
    assert!(!code.contains("unimplemented!()"), "{code}");
    assert!(code.contains("if verb == \"GET\" {"), "{code}");
    assert!(code.contains("super::handlers::users::show(req)"), "{code}");
    assert!(code.contains("super::not_found_response()"), "{code}");
    assert!(!code.contains("fn spark_dispatch"));
    syn::parse_file(code).expect("改写结果应是合法 Rust");
}

#[test]
fn annotated_handlers_are_dispatched() {
    let src = r#"
        #[get("/")]
        fn index(req: Request) -> Response { Response::ok() }

        #[post("/items")]
        fn create(req: Request) -> Response { Response::created() }

        fn not_found_response(req: Request) -> Response { Response::missing(req) }
    "#;
    let generated = render_dispatch(src, &OptimizerConfig::default()).expect("渲染应成功");
    assert_eq!(generated.report.linked, 2);
    let code = &generated.code;
    assert!(code.starts_with("pub fn spark_dispatch("), "{code}");
    assert!(code.contains("create(request)"), "{code}");
    assert!(code.contains("not_found_response(request)"), "{code}");
    syn::parse_file(code).expect("渲染结果应是合法 Rust");
}

#[test]
fn report_travels_with_the_source() {
    let generated = optimize_source(REGISTERED, &OptimizerConfig::default()).expect("改写应成功");
    let report = generated.report.to_string();
    assert!(report.contains("detected 3 route(s)"), "{report}");
    assert!(
        report.contains("GET /users/:id -> show [linked (exact) handlers.users.show]"),
        "{report}"
    );
    assert!(report.contains("linked 3, failed 0, skipped 0"), "{report}");
    assert!(report.contains("method buckets: 2"), "{report}");
}

#[test]
fn sources_without_routes_are_returned_unchanged() {
    let src = "fn main() { println!(\"hi\"); }\n";
    let generated = optimize_source(src, &OptimizerConfig::default()).expect("无路由不是错误");
    assert_eq!(generated.code, src);
    assert!(generated.artifact.is_none());

    let err = render_dispatch(src, &OptimizerConfig::default()).unwrap_err();
    assert!(matches!(err, SourceError::NothingToRender));
}

#[test]
fn missing_default_response_surfaces_as_optimize_error() {
    let src = REGISTERED.replace("pub fn not_found_response()", "pub fn fallback()");
    let err = optimize_source(&src, &OptimizerConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        SourceError::Optimize(OptimizeError::MissingDefaultResponse { .. })
    ));
}

#[test]
fn invalid_source_is_a_parse_error() {
    let err = optimize_source("fn broken( {", &OptimizerConfig::default()).unwrap_err();
    assert!(matches!(err, SourceError::Parse(_)));
}

#[test]
fn lowering_alone_exposes_the_ir() {
    let module = lower_source(REGISTERED, &OptimizerConfig::default()).expect("降级");
    assert!(module.find("show").is_some());
    assert_eq!(
        module
            .functions()
            .find(|(_, function)| function.name == "show")
            .map(|(_, function)| function.qualified().to_owned()),
        Some("handlers.users.show".to_owned())
    );
}

fn squashed(code: &str) -> String {
    code.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[test]
fn handler_lookups_do_not_shift_routes() {
    // `STORE.get("home")` 与装饰器同名，出现在注册函数之前的处理函数体内。
    let src = r#"
pub fn index(request: Request) -> Response {
    Response::text(STORE.get("home"))
}

pub fn routes(app: &mut App) {
    app.get("/");
    app.add_route_metadata("/", "GET", "index");
    app.get("/about");
    app.add_route_metadata("/about", "GET", "about");
}

pub fn about(request: Request) -> Response {
    Response::text("about")
}

pub fn not_found_response() -> Response {
    Response::status(404)
}
"#;
    let generated = optimize_source(src, &OptimizerConfig::default()).expect("改写应成功");
    let report = generated.report.to_string();
    assert!(report.contains("detected 2 route(s)"), "{report}");
    assert!(report.contains("GET / -> index [linked"), "{report}");
    assert!(report.contains("GET /about -> about [linked"), "{report}");
    assert!(!report.contains("home"), "{report}");

    let code = squashed(&generated.code);
    assert!(code.contains(r#"if path == "/" { index(request) }"#), "{code}");
    assert!(code.contains(r#"if path == "/about" { about(request) }"#), "{code}");
}

#[test]
fn handlers_named_after_decorators_survive_a_rerun() {
    let src = r#"
pub fn __spark_dispatch(method: &str, path: &str, request: Request) -> Response {
    unimplemented!()
}

pub fn routes(app: &mut App) {
    app.get("/");
    app.add_route_metadata("/", "GET", "index");
    app.delete("/items");
    app.add_route_metadata("/items", "DELETE", "delete");
}

pub fn index(request: Request) -> Response {
    Response::ok()
}

pub fn delete(request: Request) -> Response {
    Response::status(204)
}

pub fn not_found_response() -> Response {
    Response::status(404)
}
"#;
    let config = OptimizerConfig::default();
    let first = optimize_source(src, &config).expect("第一次");
    let second = optimize_source(&first.code, &config).expect("第二次");
    assert_eq!(first.code, second.code);
    assert_eq!(first.report.to_string(), second.report.to_string());
    assert!(second.report.warnings.is_empty(), "{}", second.report);

    let code = squashed(&second.code);
    assert!(code.contains(r#"method == "DELETE""#), "{code}");
    assert!(code.contains(r#"if path == "/items" { delete(request) }"#), "{code}");
}

#[test]
fn extern_declarations_are_not_default_responses() {
    let src = REGISTERED.replace(
        "pub fn not_found_response() -> Response {\n    Response::status(404)\n}",
        "extern \"C\" {\n    fn not_found_response() -> Response;\n}",
    );
    assert!(src.contains("extern \"C\""));
    let err = optimize_source(&src, &OptimizerConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        SourceError::Optimize(OptimizeError::MissingDefaultResponse { ref name, .. })
            if name == "not_found_response"
    ));
}
