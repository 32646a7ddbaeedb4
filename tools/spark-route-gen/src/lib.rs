//! `spark-route-gen`：在构建流程中运行路由优化 Pass 的命令行工具。
//!
//! # 设计动机（Why）
//! - 构建脚本与 CI 都需要“输入源码，输出分派代码与诊断报告”的单一入口；
//! - 非 Rust 后端可以把程序导出为 JSON IR，复用同一条优化链路。
//!
//! # 工作方式（How）
//! 1. 按扩展名判定输入类型：`.rs` 走 `spark-route-syn` 源码前端，`.json` 直接反序列化为 IR 模块；
//! 2. 读取可选的 TOML 配置并运行 [`RouteOptimizer`]；
//! 3. 按 `--emit` 输出改写后的文件、单独的分派函数、JSON IR 或文本清单；
//! 4. 诊断报告写入 `--report` 指定的文件，缺省写到标准错误。
//!
//! # 使用契约（What）
//! - `--check` 不写文件，只在输出文件与生成结果不一致时失败，供 CI 检测生成代码是否过期；
//! - 致命错误以非零退出码结束，警告只出现在报告与日志中。

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use spark_route_ir::Module;
use spark_route_opt::{OptimizationReport, OptimizerConfig, RouteOptimizer};
use spark_route_syn::{lower_source, optimize_source, render_dispatch, render_function};

/// 命令行参数。
#[derive(Debug, Parser)]
#[command(name = "spark-route-gen", version)]
#[command(about = "Generate a compile-time route dispatch function", long_about = None)]
pub struct Cli {
    /// Rust source file (`.rs`) or JSON-serialized IR module (`.json`).
    pub input: PathBuf,

    /// TOML optimizer configuration.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// What to write to the output.
    #[arg(short, long, value_enum, default_value_t = Emit::File)]
    pub emit: Emit,

    /// Output path; standard output when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the diagnostics report to this path instead of standard error.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Fail instead of writing when the output file is out of date.
    #[arg(long, requires = "output")]
    pub check: bool,
}

/// 输出内容。
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Emit {
    /// The whole rewritten input: Rust source, or the IR module as JSON.
    File,
    /// Only the generated dispatch function, as Rust.
    Function,
    /// The optimized IR module as JSON.
    Ir,
    /// The optimized IR module as a text listing.
    Listing,
}

/// 输入类型，由扩展名决定。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    Rust,
    Ir,
}

impl InputKind {
    pub fn detect(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("rs") => Ok(Self::Rust),
            Some("json") => Ok(Self::Ir),
            _ => bail!(
                "cannot tell the input kind of {}: expected a `.rs` or `.json` file",
                path.display()
            ),
        }
    }
}

/// 一次生成的结果。
#[derive(Clone, Debug)]
pub struct Generated {
    pub artifact: String,
    pub report: OptimizationReport,
}

/// 读取配置；未指定路径时使用默认配置。
pub fn load_config(path: Option<&Path>) -> Result<OptimizerConfig> {
    match path {
        Some(path) => OptimizerConfig::load(path)
            .with_context(|| format!("failed to load optimizer config {}", path.display())),
        None => Ok(OptimizerConfig::default()),
    }
}

/// 对内存中的输入运行优化链路，不触碰文件系统。
pub fn generate(
    input: &str,
    kind: InputKind,
    emit: Emit,
    config: &OptimizerConfig,
) -> Result<Generated> {
    match (kind, emit) {
        (InputKind::Rust, Emit::File) => {
            let generated = optimize_source(input, config)?;
            Ok(Generated {
                artifact: generated.code,
                report: generated.report,
            })
        }
        (InputKind::Rust, Emit::Function) => {
            let generated = render_dispatch(input, config)?;
            Ok(Generated {
                artifact: generated.code,
                report: generated.report,
            })
        }
        (InputKind::Rust, Emit::Ir | Emit::Listing) => {
            optimize_module(lower_source(input, config)?, emit, config)
        }
        (InputKind::Ir, _) => {
            let module: Module =
                serde_json::from_str(input).context("input is not a JSON IR module")?;
            optimize_module(module, emit, config)
        }
    }
}

fn optimize_module(mut module: Module, emit: Emit, config: &OptimizerConfig) -> Result<Generated> {
    let outcome = RouteOptimizer::new(config.clone())?.run(&mut module)?;
    let artifact = match emit {
        Emit::File | Emit::Ir => {
            let mut json = serde_json::to_string_pretty(&module)?;
            json.push('\n');
            json
        }
        Emit::Listing => module.to_string(),
        Emit::Function => {
            let artifact = outcome
                .artifact
                .as_ref()
                .context("no routes were detected; there is no dispatch function to render")?;
            render_function(&module, artifact.function)?
        }
    };
    Ok(Generated {
        artifact,
        report: outcome.report,
    })
}

/// 执行一次完整的命令行调用。
pub fn run(cli: &Cli) -> Result<()> {
    let kind = InputKind::detect(&cli.input)?;
    let config = load_config(cli.config.as_deref())?;
    let input = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let generated = generate(&input, kind, cli.emit, &config)
        .with_context(|| format!("route optimization failed for {}", cli.input.display()))?;
    tracing::info!(
        target: "spark_route_gen",
        input = %cli.input.display(),
        emit = ?cli.emit,
        bytes = generated.artifact.len(),
        "artifact generated"
    );

    match &cli.report {
        Some(path) => fs::write(path, generated.report.to_string())
            .with_context(|| format!("failed to write report {}", path.display()))?,
        None => eprint!("{}", generated.report),
    }

    match &cli.output {
        Some(path) if cli.check => {
            let current = fs::read_to_string(path).ok();
            if current.as_deref() != Some(generated.artifact.as_str()) {
                bail!(
                    "{} is out of date; rerun spark-route-gen without --check",
                    path.display()
                );
            }
        }
        Some(path) => fs::write(path, &generated.artifact)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => io::stdout()
            .write_all(generated.artifact.as_bytes())
            .context("failed to write to standard output")?,
    }
    Ok(())
}
