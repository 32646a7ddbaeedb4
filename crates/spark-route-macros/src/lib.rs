//! 路由注解属性宏。
//!
//! # 设计意图（Why）
//! - 让 `#[get("/users/:id")] fn show(req: Request) -> Response` 这类写法在普通编译中保持合法，
//!   真正的分派函数由构建期的路由优化 Pass 生成；
//! - 路径字面量与处理函数形状在编译期即可校验，错误不必等到优化阶段才暴露。
//!
//! # 展开规则（What）
//! - 参数必须是以 `/` 开头、不含空白的字符串字面量；
//! - 被标注的条目必须是恰好接收一个参数的自由函数（不接受 `self`）；
//! - 校验通过后原样输出函数，不追加任何代码。

use proc_macro::TokenStream;
use quote::ToTokens;
use syn::{Error, FnArg, ItemFn, LitStr, parse_macro_input, spanned::Spanned};

/// 注册 `GET` 路由。
#[proc_macro_attribute]
pub fn get(attr: TokenStream, item: TokenStream) -> TokenStream {
    route("get", attr, item)
}

/// 注册 `POST` 路由。
#[proc_macro_attribute]
pub fn post(attr: TokenStream, item: TokenStream) -> TokenStream {
    route("post", attr, item)
}

/// 注册 `PUT` 路由。
#[proc_macro_attribute]
pub fn put(attr: TokenStream, item: TokenStream) -> TokenStream {
    route("put", attr, item)
}

/// 注册 `DELETE` 路由。
#[proc_macro_attribute]
pub fn delete(attr: TokenStream, item: TokenStream) -> TokenStream {
    route("delete", attr, item)
}

/// 注册 `PATCH` 路由。
#[proc_macro_attribute]
pub fn patch(attr: TokenStream, item: TokenStream) -> TokenStream {
    route("patch", attr, item)
}

fn route(name: &str, attr: TokenStream, item: TokenStream) -> TokenStream {
    let path = parse_macro_input!(attr as LitStr);
    let func = parse_macro_input!(item as ItemFn);
    check_route(name, &path, &func)
        .map(|()| func.into_token_stream())
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn check_route(name: &str, path: &LitStr, func: &ItemFn) -> Result<(), Error> {
    let value = path.value();
    if !value.starts_with('/') {
        return Err(Error::new(
            path.span(),
            format!("#[{name}] 的路径必须以 `/` 开头，实际为 `{value}`"),
        ));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(Error::new(
            path.span(),
            format!("#[{name}] 的路径不能包含空白字符"),
        ));
    }

    let mut inputs = func.sig.inputs.iter();
    match (inputs.next(), inputs.next()) {
        (Some(FnArg::Typed(_)), None) => Ok(()),
        (Some(FnArg::Receiver(receiver)), _) => Err(Error::new(
            receiver.span(),
            format!("#[{name}] 只能标注自由函数，不支持方法"),
        )),
        _ => Err(Error::new(
            func.sig.inputs.span(),
            format!("#[{name}] 的处理函数必须恰好接收一个请求参数"),
        )),
    }
}
