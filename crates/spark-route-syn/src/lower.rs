//! Rust 源码到 IR 的降级。
//!
//! # 覆盖范围（What）
//! - 顶层与内联 `mod` 中的自由函数降级为 [`Function`]，限定名为模块路径加函数名（`handlers.users.show`）；
//! - `extern` 块中的函数不参与降级：生成的分派函数直接调用目标，而外部函数需要 `unsafe` 才能调用；
//! - `impl` 块中的方法、`#[cfg(test)]` 条目、函数体内嵌套的条目都不参与降级；
//! - 函数体按语句降级：`if` 保留为 [`Flow::If`]，块、循环与 `match` 展开为顺序流，
//!   调用、方法调用、`==` 与字面量保留结构，其余表达式一律为 [`Value::Opaque`]；
//! - `?`、`.await`、括号与取引用不改变分析结果，直接穿透到内部表达式。
//!
//! # 注解路由（How）
//! 带 `#[get("/p")]` 一类属性的函数会被汇总进一个合成的注册函数 [`ANNOTATED_ROUTES`]，
//! 它总是模块中的第一个函数；每个注解展开为“装饰器调用 + 紧随其后的元数据调用”，
//! 因此常规的路由发现无需区分两种写法。

use quote::ToTokens;
use spark_route_ir::{Call, Flow, Function, Literal, Module, Param, Type, Value};
use spark_route_opt::OptimizerConfig;
use syn::{Attribute, BinOp, Block, Expr, FnArg, Item, Lit, Pat, Signature, Stmt};

/// 合成注册函数的名字。
pub const ANNOTATED_ROUTES: &str = "__spark_annotated_routes";

const INT_TYPES: [&str; 12] = [
    "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize",
];

/// 把已解析的源文件降级为 IR 模块。
pub fn lower_file(file: &syn::File, module_name: &str, config: &OptimizerConfig) -> Module {
    let mut module = Module::new(module_name);

    let mut annotated = Vec::new();
    collect_annotated(&file.items, config, &mut annotated);
    if !annotated.is_empty() {
        tracing::debug!(
            registrations = annotated.len() / 2,
            "annotated handlers lowered into a registration function"
        );
        module.push(Function::define(
            ANNOTATED_ROUTES,
            Vec::new(),
            Type::Unit,
            Flow::Series(annotated),
        ));
    }

    lower_items(&file.items, &mut Vec::new(), &mut module);
    module
}

fn collect_annotated(items: &[Item], config: &OptimizerConfig, out: &mut Vec<Flow>) {
    for item in items {
        match item {
            Item::Fn(function) if !is_cfg_test(&function.attrs) => {
                let handler = function.sig.ident.to_string();
                for attr in &function.attrs {
                    let Some(segment) = attr.path().segments.last() else {
                        continue;
                    };
                    let call = segment.ident.to_string();
                    let Some(method) = config.decorator_method(&call) else {
                        continue;
                    };
                    let path = match attr.parse_args::<Expr>() {
                        Ok(expr) => lower_value(&expr),
                        Err(_) => Value::Opaque(attr.meta.to_token_stream().to_string()),
                    };
                    out.push(Flow::Eval(Call::named(call.as_str(), vec![path.clone()]).into()));
                    out.push(Flow::Eval(
                        Call::named(
                            config.metadata_call.as_str(),
                            vec![path, Value::str(method), Value::str(handler.as_str())],
                        )
                        .into(),
                    ));
                }
            }
            Item::Mod(inline) if !is_cfg_test(&inline.attrs) => {
                if let Some((_, items)) = &inline.content {
                    collect_annotated(items, config, out);
                }
            }
            _ => {}
        }
    }
}

fn lower_items(items: &[Item], scope: &mut Vec<String>, module: &mut Module) {
    for item in items {
        match item {
            Item::Fn(function) if !is_cfg_test(&function.attrs) => {
                let (params, ret) = lower_signature(&function.sig);
                let lowered = Function::define(
                    function.sig.ident.to_string(),
                    params,
                    ret,
                    lower_block(&function.block),
                )
                .with_qualified_name(qualify(scope, &function.sig.ident));
                module.push(lowered);
            }
            Item::Mod(inline) if !is_cfg_test(&inline.attrs) => {
                if let Some((_, items)) = &inline.content {
                    scope.push(inline.ident.to_string());
                    lower_items(items, scope, module);
                    scope.pop();
                }
            }
            _ => {}
        }
    }
}

fn qualify(scope: &[String], ident: &syn::Ident) -> String {
    let mut segments = scope.to_vec();
    segments.push(ident.to_string());
    segments.join(".")
}

fn is_cfg_test(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("cfg") && attr.parse_args::<syn::Ident>().is_ok_and(|arg| arg == "test")
    })
}

fn lower_signature(sig: &Signature) -> (Vec<Param>, Type) {
    let params = sig
        .inputs
        .iter()
        .map(|input| match input {
            FnArg::Receiver(_) => Param::new("self", Type::Named("Self".to_owned())),
            FnArg::Typed(typed) => {
                let name = match typed.pat.as_ref() {
                    Pat::Ident(ident) => ident.ident.to_string(),
                    other => other.to_token_stream().to_string(),
                };
                Param::new(name, lower_type(&typed.ty))
            }
        })
        .collect();
    let ret = match &sig.output {
        syn::ReturnType::Default => Type::Unit,
        syn::ReturnType::Type(_, ty) => lower_type(ty),
    };
    (params, ret)
}

/// Rust 类型到 IR 类型：字符串类映射为 `Str`，整数映射为 `Int`，其余保留原文。
pub fn lower_type(ty: &syn::Type) -> Type {
    match ty {
        syn::Type::Reference(reference) => match lower_type(&reference.elem) {
            Type::Str => Type::Str,
            _ => named(ty),
        },
        syn::Type::Paren(inner) => lower_type(&inner.elem),
        syn::Type::Group(inner) => lower_type(&inner.elem),
        syn::Type::Tuple(tuple) if tuple.elems.is_empty() => Type::Unit,
        syn::Type::Path(path) if path.qself.is_none() => {
            match path.path.get_ident().map(ToString::to_string).as_deref() {
                Some("str" | "String") => Type::Str,
                Some("bool") => Type::Bool,
                Some(int) if INT_TYPES.contains(&int) => Type::Int,
                _ => named(ty),
            }
        }
        _ => named(ty),
    }
}

fn named(ty: &syn::Type) -> Type {
    Type::Named(ty.to_token_stream().to_string())
}

fn lower_block(block: &Block) -> Flow {
    Flow::Series(block.stmts.iter().filter_map(lower_stmt).collect())
}

fn lower_stmt(stmt: &Stmt) -> Option<Flow> {
    match stmt {
        Stmt::Local(local) => local.init.as_ref().map(|init| lower_expr(&init.expr, false)),
        Stmt::Expr(expr, semi) => Some(lower_expr(expr, semi.is_none())),
        Stmt::Macro(mac) => Some(Flow::Eval(Value::Opaque(mac.to_token_stream().to_string()))),
        Stmt::Item(_) => None,
    }
}

fn lower_expr(expr: &Expr, tail: bool) -> Flow {
    match expr {
        Expr::If(branch) => Flow::branch(
            lower_value(&branch.cond),
            lower_block(&branch.then_branch),
            branch
                .else_branch
                .as_ref()
                .map(|(_, otherwise)| lower_expr(otherwise, tail)),
        ),
        Expr::Block(inner) => lower_block(&inner.block),
        Expr::Unsafe(inner) => lower_block(&inner.block),
        Expr::Loop(inner) => lower_block(&inner.body),
        Expr::ForLoop(inner) => Flow::Series(vec![
            Flow::Eval(lower_value(&inner.expr)),
            lower_block(&inner.body),
        ]),
        Expr::While(inner) => Flow::Series(vec![
            Flow::Eval(lower_value(&inner.cond)),
            lower_block(&inner.body),
        ]),
        Expr::Match(inner) => {
            let mut flows = vec![Flow::Eval(lower_value(&inner.expr))];
            flows.extend(inner.arms.iter().map(|arm| lower_expr(&arm.body, tail)));
            Flow::Series(flows)
        }
        Expr::Return(ret) => Flow::Return(
            ret.expr
                .as_deref()
                .map_or_else(|| Value::Opaque("()".to_owned()), lower_value),
        ),
        other => {
            let value = lower_value(other);
            if tail {
                Flow::Return(value)
            } else {
                Flow::Eval(value)
            }
        }
    }
}

fn lower_value(expr: &Expr) -> Value {
    match expr {
        Expr::Lit(literal) => match &literal.lit {
            Lit::Str(text) => Value::str(text.value()),
            Lit::Int(number) => number
                .base10_parse::<i64>()
                .map(|n| Value::Literal(Literal::Int(n)))
                .unwrap_or_else(|_| opaque(expr)),
            Lit::Bool(flag) => Value::Literal(Literal::Bool(flag.value)),
            _ => opaque(expr),
        },
        Expr::Path(path) if path.qself.is_none() => match path.path.get_ident() {
            Some(ident) => Value::var(ident.to_string()),
            None => opaque(expr),
        },
        Expr::Call(call) => match call.func.as_ref() {
            Expr::Path(callee) if callee.qself.is_none() => {
                let name = callee
                    .path
                    .segments
                    .iter()
                    .map(|segment| segment.ident.to_string())
                    .collect::<Vec<_>>()
                    .join(".");
                Call::named(name, call.args.iter().map(lower_value).collect()).into()
            }
            _ => opaque(expr),
        },
        Expr::MethodCall(call) => Call::method(
            lower_value(&call.receiver),
            call.method.to_string(),
            call.args.iter().map(lower_value).collect(),
        )
        .into(),
        Expr::Binary(binary) if matches!(binary.op, BinOp::Eq(_)) => {
            Value::equals(lower_value(&binary.left), lower_value(&binary.right))
        }
        Expr::Paren(inner) => lower_value(&inner.expr),
        Expr::Group(inner) => lower_value(&inner.expr),
        Expr::Reference(inner) => lower_value(&inner.expr),
        Expr::Try(inner) => lower_value(&inner.expr),
        Expr::Await(inner) => lower_value(&inner.base),
        _ => opaque(expr),
    }
}

fn opaque(expr: &Expr) -> Value {
    Value::Opaque(expr.to_token_stream().to_string())
}
