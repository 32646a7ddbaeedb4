//! # spark-route-opt
//!
//! ## 定位（Why）
//! - 在构建期发现应用代码中的路由注册，把每条路由链接到已编译的处理函数，
//!   并合成一个“方法分桶 + 路径比较”的分派函数，使运行期不再有字典查找或列表扫描；
//! - 以 [`spark_route_ir`] 的中间表示为输入，任何能产出该 IR 的前端都可以复用本 Pass。
//!
//! ## 结构（What）
//! - [`pattern`]：路径模式解析；
//! - [`detect`]：基于访问者的路由发现；
//! - [`link`]：处理函数链接；
//! - [`phf`]：线性偏移完美哈希；
//! - [`bucket`]：全局哈希与按方法分桶；
//! - [`signature`]：分派签名推导；
//! - [`codegen`]：分派函数生成与扩展点落地；
//! - [`report`]、[`error`]、[`config`]：诊断、错误与配置；
//! - [`pass`]：把上述阶段串联起来的 [`RouteOptimizer`]。
//!
//! ```
//! use spark_route_ir::{Call, Flow, Function, Module, Param, Type, Value};
//! use spark_route_opt::{OptimizerConfig, RouteOptimizer};
//!
//! let request = Type::Named("Request".into());
//! let response = Type::Named("Response".into());
//! let mut module = Module::new("app");
//! module.push(Function::define(
//!     "routes",
//!     Vec::new(),
//!     Type::Unit,
//!     Flow::Series(vec![
//!         Flow::Eval(Call::method(Value::var("app"), "get", vec![Value::str("/")]).into()),
//!         Flow::Eval(
//!             Call::method(
//!                 Value::var("app"),
//!                 "add_route_metadata",
//!                 vec![Value::str("/"), Value::str("GET"), Value::str("index")],
//!             )
//!             .into(),
//!         ),
//!     ]),
//! ));
//! module.push(Function::define(
//!     "index",
//!     vec![Param::new("request", request.clone())],
//!     response.clone(),
//!     Flow::Return(Value::Opaque("Response::ok()".into())),
//! ));
//! module.push(Function::declare("not_found_response", Vec::new(), response));
//!
//! let optimizer = RouteOptimizer::new(OptimizerConfig::default())?;
//! let outcome = optimizer.run(&mut module)?;
//! assert_eq!(outcome.report.linked, 1);
//! assert!(module.find("spark_dispatch").is_some());
//! # Ok::<(), spark_route_opt::OptimizeError>(())
//! ```

pub mod bucket;
pub mod codegen;
pub mod config;
pub mod detect;
pub mod error;
pub mod link;
pub mod pass;
pub mod pattern;
pub mod phf;
pub mod report;
pub mod signature;

pub use bucket::{MethodBucket, bucketize, resolve_route};
pub use codegen::{DISPATCH_PARAMS, DispatchArtifact, Integration, generate_dispatch};
pub use config::{ConfigError, OptimizerConfig};
pub use detect::{Detection, HandlerSlot, RoutePath, RouteRecord, detect_routes};
pub use error::OptimizeError;
pub use link::{LinkMatch, LinkOutcome, LinkScope, LinkStatus, link_handlers, resolve_function};
pub use pass::{OptimizationOutcome, RouteOptimizer};
pub use pattern::{PathParam, PathPattern, parse_path};
pub use phf::{PerfectHashError, PerfectHashTable, fnv1a32};
pub use report::{OptimizationReport, TableStats, Warning};
pub use signature::{DispatchSignature, resolve_signature};
