//! IR 到 Rust 源码的生成。
//!
//! # 生成约定（What）
//! - `Flow::Return` 位于块尾时生成尾表达式，否则生成 `return ..;`；
//! - `else { if .. }` 生成 `else if ..`；
//! - `Callee::Func` 生成相对当前函数所在模块的路径（`super::` 链加目标模块段）；
//! - IR 类型到 Rust 类型：`str → &str`、`int → i64`、`bool → bool`、`() → ()`，
//!   具名类型按原文重新解析。
//!
//! 只有分派函数会经过这里，因此不覆盖 IR 中前端永远不会产生的结构组合。

use proc_macro2::{Literal as LitToken, TokenStream};
use quote::{ToTokens, quote};
use spark_route_ir::{Call, Callee, Flow, FuncId, Function, Literal, Module, Type, Value};
use syn::parse_quote;
use thiserror::Error;

/// 生成失败的原因。
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("function {0} is not part of the module")]
    UnknownFunction(FuncId),
    #[error("function `{0}` has no body to emit")]
    MissingBody(String),
    #[error("`{text}` is not a valid Rust type: {source}")]
    InvalidType {
        text: String,
        #[source]
        source: syn::Error,
    },
    #[error("`{text}` is not a valid Rust expression: {source}")]
    InvalidExpr {
        text: String,
        #[source]
        source: syn::Error,
    },
    #[error("`{name}` is not a valid Rust identifier: {source}")]
    InvalidIdent {
        name: String,
        #[source]
        source: syn::Error,
    },
    #[error("generated tokens do not form valid Rust: {0}")]
    Malformed(#[source] syn::Error),
}

/// 生成完整函数项（`pub fn name(..) -> R { .. }`）。
pub fn emit_function(module: &Module, id: FuncId) -> Result<syn::ItemFn, EmitError> {
    let function = module.function(id).ok_or(EmitError::UnknownFunction(id))?;
    let name = ident(&function.name)?;
    let params = function
        .params
        .iter()
        .map(|param| {
            let name = ident(&param.name)?;
            let ty = rust_type(&param.ty)?;
            Ok(quote!(#name: #ty))
        })
        .collect::<Result<Vec<_>, EmitError>>()?;
    let ret = match &function.ret {
        Type::Unit => TokenStream::new(),
        other => {
            let ty = rust_type(other)?;
            quote!(-> #ty)
        }
    };
    let block = emit_block(module, id)?;
    syn::parse2(quote! {
        pub fn #name(#(#params),*) #ret #block
    })
    .map_err(EmitError::Malformed)
}

/// 生成并用 `prettyplease` 格式化完整函数项。
pub fn render_function(module: &Module, id: FuncId) -> Result<String, EmitError> {
    emit_function(module, id).map(unparse)
}

pub(crate) fn unparse(item: syn::ItemFn) -> String {
    prettyplease::unparse(&syn::File {
        shebang: None,
        attrs: Vec::new(),
        items: vec![syn::Item::Fn(item)],
    })
}

/// 只生成函数体，供源码级替换使用。
pub fn emit_block(module: &Module, id: FuncId) -> Result<syn::Block, EmitError> {
    let function = module.function(id).ok_or(EmitError::UnknownFunction(id))?;
    let body = function
        .body
        .as_ref()
        .ok_or_else(|| EmitError::MissingBody(function.name.clone()))?;
    let emitter = Emitter {
        module,
        scope: function.module_path(),
    };
    let stmts = emitter.block_body(body, true)?;
    syn::parse2(quote!({ #stmts })).map_err(EmitError::Malformed)
}

/// IR 类型对应的 Rust 类型。
pub fn rust_type(ty: &Type) -> Result<syn::Type, EmitError> {
    Ok(match ty {
        Type::Str => parse_quote!(&str),
        Type::Int => parse_quote!(i64),
        Type::Bool => parse_quote!(bool),
        Type::Unit => parse_quote!(()),
        Type::Named(text) => syn::parse_str(text).map_err(|source| EmitError::InvalidType {
            text: text.clone(),
            source,
        })?,
    })
}

fn ident(name: &str) -> Result<syn::Ident, EmitError> {
    syn::parse_str(name).map_err(|source| EmitError::InvalidIdent {
        name: name.to_owned(),
        source,
    })
}

struct Emitter<'a> {
    module: &'a Module,
    /// 正在生成的函数所在的模块段。
    scope: Vec<&'a str>,
}

impl Emitter<'_> {
    fn block_body(&self, flow: &Flow, tail: bool) -> Result<TokenStream, EmitError> {
        match flow {
            Flow::Series(items) => {
                let mut out = TokenStream::new();
                for (index, item) in items.iter().enumerate() {
                    let last = index + 1 == items.len();
                    out.extend(self.stmt(item, tail && last)?);
                }
                Ok(out)
            }
            other => self.stmt(other, tail),
        }
    }

    fn stmt(&self, flow: &Flow, tail: bool) -> Result<TokenStream, EmitError> {
        match flow {
            Flow::Series(_) => {
                let inner = self.block_body(flow, tail)?;
                Ok(quote!({ #inner }))
            }
            Flow::If {
                cond,
                then_flow,
                else_flow,
            } => {
                let cond = self.value(cond)?;
                let then_body = self.block_body(then_flow, tail)?;
                let otherwise = match else_flow.as_deref() {
                    None => TokenStream::new(),
                    Some(nested @ Flow::If { .. }) => {
                        let nested = self.stmt(nested, tail)?;
                        quote!(else #nested)
                    }
                    Some(other) => {
                        let body = self.block_body(other, tail)?;
                        quote!(else { #body })
                    }
                };
                Ok(quote!(if #cond { #then_body } #otherwise))
            }
            Flow::Return(value) => {
                let value = self.value(value)?;
                Ok(if tail {
                    value
                } else {
                    quote!(return #value;)
                })
            }
            Flow::Eval(value) => {
                let value = self.value(value)?;
                Ok(quote!(#value;))
            }
        }
    }

    fn value(&self, value: &Value) -> Result<TokenStream, EmitError> {
        match value {
            Value::Literal(Literal::Str(text)) => Ok(LitToken::string(text).into_token_stream()),
            Value::Literal(Literal::Int(number)) => {
                Ok(LitToken::i64_unsuffixed(*number).into_token_stream())
            }
            Value::Literal(Literal::Bool(flag)) => Ok(quote!(#flag)),
            Value::Var(name) => Ok(ident(name)?.into_token_stream()),
            Value::Eq(lhs, rhs) => {
                let lhs = self.value(lhs)?;
                let rhs = self.value(rhs)?;
                Ok(quote!(#lhs == #rhs))
            }
            Value::Opaque(text) => syn::parse_str::<syn::Expr>(text)
                .map(ToTokens::into_token_stream)
                .map_err(|source| EmitError::InvalidExpr {
                    text: text.clone(),
                    source,
                }),
            Value::Call(call) => self.call(call),
        }
    }

    fn call(&self, call: &Call) -> Result<TokenStream, EmitError> {
        let args = call
            .args
            .iter()
            .map(|arg| self.value(arg))
            .collect::<Result<Vec<_>, EmitError>>()?;

        if let Some(receiver) = &call.receiver {
            let receiver = self.value(receiver)?;
            let method = match &call.callee {
                Callee::Func(id) => ident(&self.target(*id)?.name)?,
                Callee::Named(path) => ident(path.rsplit('.').next().unwrap_or(path))?,
            };
            return Ok(quote!(#receiver.#method(#(#args),*)));
        }

        let path = match &call.callee {
            Callee::Func(id) => self.function_path(*id)?,
            Callee::Named(path) => {
                let segments = path
                    .split('.')
                    .map(ident)
                    .collect::<Result<Vec<_>, EmitError>>()?;
                quote!(#(#segments)::*)
            }
        };
        Ok(quote!(#path(#(#args),*)))
    }

    fn target(&self, id: FuncId) -> Result<&Function, EmitError> {
        self.module.function(id).ok_or(EmitError::UnknownFunction(id))
    }

    /// 从当前模块到目标函数的相对路径。
    fn function_path(&self, id: FuncId) -> Result<TokenStream, EmitError> {
        let target = self.target(id)?;
        let target_scope = target.module_path();
        let shared = self
            .scope
            .iter()
            .zip(&target_scope)
            .take_while(|(a, b)| a == b)
            .count();

        let mut segments = Vec::new();
        for _ in shared..self.scope.len() {
            segments.push(quote!(super));
        }
        for segment in &target_scope[shared..] {
            segments.push(ident(segment)?.into_token_stream());
        }
        segments.push(ident(&target.name)?.into_token_stream());
        Ok(quote!(#(#segments)::*))
    }
}
