//! spark-route-ir：路由优化 Pass 所依赖的中间程序表示（IR）。
//!
//! # 设计意图（Why）
//! - 路由优化只关心“调用点、函数、字面量”三类结构，把它们抽象为与编译器后端无关的 IR，
//!   检测/链接/哈希/代码生成逻辑即可在任意后端（或纯源码生成器）之间复用；
//! - 通过 [`visit::Visitor`] 统一遍历顺序，保证路由发现顺序与生成分支顺序完全确定。
//!
//! # 模块划分（How）
//! - [`module`]：`Module`、`Function`、`Type`、`Value`、`Flow` 等数据结构；
//! - [`visit`]：先序遍历的访问者接口与 `walk_*` 辅助函数；
//! - [`printer`]：稳定的文本渲染，用于诊断与确定性比对。
//!
//! # 契约（What）
//! - 函数一旦加入模块便不会被移除，[`FuncId`] 在模块生命周期内保持稳定；
//! - 所有节点均支持 `serde` 序列化，外部后端可以 JSON 形式交付整个模块。

pub mod module;
pub mod printer;
pub mod visit;

pub use module::{Call, Callee, Flow, FuncId, FuncType, Function, Literal, Module, Param, Type, Value};
pub use visit::Visitor;
