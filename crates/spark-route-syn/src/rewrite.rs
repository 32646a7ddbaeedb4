//! 源码级改写。
//!
//! # 契约（What）
//! - [`optimize_source`]：解析、降级、运行优化 Pass，再把结果写回源码：
//!   替换扩展点时只改写函数体所在的花括号区间，签名、属性、注释与其余源码逐字保留；
//!   追加时把格式化后的分派函数附加到文件末尾；
//! - [`render_dispatch`]：只输出格式化后的分派函数，适合构建脚本写入 `OUT_DIR` 后 `include!`；
//! - 没有发现路由时，[`optimize_source`] 原样返回源码，[`render_dispatch`] 报错。
//!
//! # 实现要点（How）
//! 区间定位依赖 `proc-macro2` 的 `span-locations`：花括号 span 给出行列号，
//! 再换算为字节偏移完成拼接。生成的函数体先经 `prettyplease` 格式化，
//! 再按目标函数所在行的缩进对齐。

use proc_macro2::LineColumn;
use spark_route_ir::{FuncId, Module};
use spark_route_opt::{
    DispatchArtifact, Integration, OptimizationOutcome, OptimizationReport, OptimizeError,
    OptimizerConfig, RouteOptimizer,
};
use syn::visit::{self, Visit};
use thiserror::Error;

use crate::emit::{EmitError, emit_block, render_function, unparse};
use crate::lower::lower_file;

/// 源码前端使用的模块名。
pub const SOURCE_MODULE: &str = "crate";

/// 源码改写失败的原因。
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to parse Rust source: {0}")]
    Parse(#[from] syn::Error),
    #[error(transparent)]
    Optimize(#[from] OptimizeError),
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error("dispatch target `{0}` could not be located in the source text")]
    TargetNotFound(String),
    #[error("no routes were detected; there is no dispatch function to render")]
    NothingToRender,
}

/// 改写结果。
#[derive(Clone, Debug)]
pub struct GeneratedSource {
    pub code: String,
    pub report: OptimizationReport,
    pub artifact: Option<DispatchArtifact>,
}

/// 解析并降级源码，不运行优化 Pass。
pub fn lower_source(src: &str, config: &OptimizerConfig) -> Result<Module, SourceError> {
    let file = syn::parse_file(src)?;
    Ok(lower_file(&file, SOURCE_MODULE, config))
}

struct Prepared {
    file: syn::File,
    module: Module,
    outcome: OptimizationOutcome,
}

fn prepare(src: &str, config: &OptimizerConfig) -> Result<Prepared, SourceError> {
    let file = syn::parse_file(src)?;
    let mut module = lower_file(&file, SOURCE_MODULE, config);
    tracing::debug!(functions = module.len(), "source lowered");
    let outcome = RouteOptimizer::new(config.clone())?.run(&mut module)?;
    Ok(Prepared {
        file,
        module,
        outcome,
    })
}

/// 运行优化 Pass 并返回改写后的完整源码。
pub fn optimize_source(src: &str, config: &OptimizerConfig) -> Result<GeneratedSource, SourceError> {
    let _span = tracing::info_span!("route_syn.optimize_source").entered();
    let prepared = prepare(src, config)?;
    let report = prepared.outcome.report.clone();
    let Some(artifact) = prepared.outcome.artifact.clone() else {
        return Ok(GeneratedSource {
            code: src.to_owned(),
            report,
            artifact: None,
        });
    };

    let code = match artifact.integration {
        Integration::Replaced => splice_body(src, &prepared, artifact.function)?,
        Integration::Appended => {
            let rendered = render_function(&prepared.module, artifact.function)?;
            format!("{}\n\n{rendered}", src.trim_end())
        }
    };
    tracing::info!(
        name = %artifact.name,
        integration = ?artifact.integration,
        bytes = code.len(),
        "source rewritten"
    );

    Ok(GeneratedSource {
        code,
        report,
        artifact: Some(artifact),
    })
}

/// 运行优化 Pass 并只返回分派函数的源码。
///
/// 生成的处理函数路径相对于分派函数在源码中的模块；追加模式下即 crate 根。
pub fn render_dispatch(src: &str, config: &OptimizerConfig) -> Result<GeneratedSource, SourceError> {
    let _span = tracing::info_span!("route_syn.render_dispatch").entered();
    let prepared = prepare(src, config)?;
    let artifact = prepared
        .outcome
        .artifact
        .clone()
        .ok_or(SourceError::NothingToRender)?;
    let code = render_function(&prepared.module, artifact.function)?;
    Ok(GeneratedSource {
        code,
        report: prepared.outcome.report,
        artifact: Some(artifact),
    })
}

/// 把目标函数的函数体替换为生成的函数体。
fn splice_body(src: &str, prepared: &Prepared, id: FuncId) -> Result<String, SourceError> {
    let qualified = prepared
        .module
        .function(id)
        .map(|function| function.qualified().to_owned())
        .ok_or(EmitError::UnknownFunction(id))?;
    let not_found = || SourceError::TargetNotFound(qualified.clone());

    let mut segments: Vec<String> = qualified.split('.').map(str::to_owned).collect();
    let name = segments.pop().ok_or_else(not_found)?;
    let mut locator = FnLocator {
        scope: Vec::new(),
        target_scope: segments,
        name,
        found: None,
    };
    locator.visit_file(&prepared.file);
    let located = locator.found.ok_or_else(not_found)?;

    let start = byte_offset(src, located.open).ok_or_else(not_found)?;
    let end = byte_offset(src, located.close).ok_or_else(not_found)?;
    let indent: String = src
        .lines()
        .nth(located.fn_line.saturating_sub(1))
        .map(|line| line.chars().take_while(|c| c.is_whitespace()).collect())
        .unwrap_or_default();

    let block = render_block(emit_block(&prepared.module, id)?, &indent);
    let mut out = String::with_capacity(src.len() + block.len());
    out.push_str(&src[..start]);
    out.push_str(&block);
    out.push_str(&src[end..]);
    Ok(out)
}

/// 格式化函数体，返回从 `{` 到 `}` 的文本，首行以外按 `indent` 缩进。
fn render_block(block: syn::Block, indent: &str) -> String {
    let item: syn::ItemFn = syn::ItemFn {
        attrs: Vec::new(),
        vis: syn::Visibility::Inherited,
        sig: syn::parse_quote!(fn __spark_body()),
        block: Box::new(block),
    };
    let rendered = unparse(item);
    let body = rendered
        .find('{')
        .map_or(rendered.as_str(), |open| &rendered[open..])
        .trim_end();

    let mut out = String::with_capacity(body.len());
    for (index, line) in body.lines().enumerate() {
        if index > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
    out
}

/// 行号从 1 开始、列号按字符计数的位置换算为字节偏移。
fn byte_offset(src: &str, position: LineColumn) -> Option<usize> {
    let mut line_start = 0;
    for (index, line) in src.split_inclusive('\n').enumerate() {
        if index + 1 == position.line {
            let within = line
                .char_indices()
                .nth(position.column)
                .map_or(line.len(), |(offset, _)| offset);
            return Some(line_start + within);
        }
        line_start += line.len();
    }
    None
}

struct Located {
    fn_line: usize,
    open: LineColumn,
    close: LineColumn,
}

/// 按模块路径与函数名定位自由函数。
struct FnLocator {
    scope: Vec<String>,
    target_scope: Vec<String>,
    name: String,
    found: Option<Located>,
}

impl<'ast> Visit<'ast> for FnLocator {
    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        self.scope.push(node.ident.to_string());
        visit::visit_item_mod(self, node);
        self.scope.pop();
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        if self.found.is_none() && self.scope == self.target_scope && node.sig.ident == self.name {
            let braces = node.block.brace_token.span;
            self.found = Some(Located {
                fn_line: node.sig.fn_token.span.start().line,
                open: braces.open().start(),
                close: braces.close().end(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_offsets_follow_char_columns() {
        let src = "fn a() {}\n// é\nfn b() {}\n";
        let offset = byte_offset(src, LineColumn { line: 3, column: 7 }).expect("偏移");
        assert_eq!(&src[offset..offset + 2], "{}");
        let after_accent = byte_offset(src, LineColumn { line: 2, column: 4 }).expect("偏移");
        assert_eq!(&src[after_accent..], "\nfn b() {}\n");
    }

    #[test]
    fn rendered_blocks_are_reindented() {
        let block: syn::Block = syn::parse_quote!({
            if ready {
                go()
            } else {
                stop()
            }
        });
        let text = render_block(block, "    ");
        assert!(text.starts_with("{\n"), "{text}");
        assert!(text.ends_with("\n    }"), "{text}");
        assert!(text.contains("ready"));
        for line in text.lines().skip(1) {
            assert!(line.is_empty() || line.starts_with("    "), "{line:?}");
        }
    }
}
