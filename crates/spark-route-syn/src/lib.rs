//! # spark-route-syn
//!
//! ## 定位（Why）
//! - 为 Rust 源码提供路由优化 Pass 的前后端：`syn` 解析并降级为 [`spark_route_ir`] 模块，
//!   Pass 完成后再用 `quote` 生成分派函数，`prettyplease` 格式化输出；
//! - 在无法直接修改编译产物的场景下，以源码级改写完成“查找扩展点并替换函数体”。
//!
//! ## 入口（What）
//! - [`optimize_source`]：返回改写后的完整源文件与诊断报告；
//! - [`render_dispatch`]：只返回分派函数，供构建脚本生成后 `include!`；
//! - [`lower_source`] / [`lower_file`]：只做降级，便于调试或交给其他后端。

pub mod emit;
pub mod lower;
pub mod rewrite;

pub use emit::{EmitError, emit_block, emit_function, render_function, rust_type};
pub use lower::{ANNOTATED_ROUTES, lower_file, lower_type};
pub use rewrite::{
    GeneratedSource, SOURCE_MODULE, SourceError, lower_source, optimize_source, render_dispatch,
};
