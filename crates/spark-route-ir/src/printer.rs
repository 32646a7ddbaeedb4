//! IR 文本渲染。
//!
//! 输出只依赖节点内容与模块内函数顺序，两个相等的模块总是渲染出逐字节一致的文本；
//! 诊断报告与确定性测试都依赖这一点。
//!
//! ```text
//! fn handlers.about(request: Request) -> Response {
//!     return <opaque Response::ok()>
//! }
//! ```

use core::fmt::{self, Write};

use crate::module::{Call, Callee, Flow, Function, Literal, Module, Value};

const INDENT: &str = "    ";

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {}", self.name)?;
        for (_, function) in self.functions() {
            writeln!(f)?;
            render_function(f, self, function)?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render_function(f, &Module::default(), self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render_value(f, &Module::default(), self)
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render_flow(f, &Module::default(), self, 0)
    }
}

/// 以模块为上下文渲染单个函数，`Callee::Func` 会被解析为目标函数的限定名。
pub fn function_to_string(module: &Module, function: &Function) -> String {
    let mut out = String::new();
    // 写入 String 不会失败。
    let _ = render_function(&mut out, module, function);
    out
}

fn render_function<W: Write>(out: &mut W, module: &Module, function: &Function) -> fmt::Result {
    write!(out, "fn {}(", function.qualified())?;
    for (index, param) in function.params.iter().enumerate() {
        if index > 0 {
            out.write_str(", ")?;
        }
        write!(out, "{}: {}", param.name, param.ty)?;
    }
    write!(out, ") -> {}", function.ret)?;
    match &function.body {
        None => out.write_str(";\n"),
        Some(body) => {
            out.write_str(" {\n")?;
            render_flow(out, module, body, 1)?;
            out.write_str("}\n")
        }
    }
}

fn render_flow<W: Write>(out: &mut W, module: &Module, flow: &Flow, depth: usize) -> fmt::Result {
    match flow {
        Flow::Series(items) => {
            for item in items {
                render_flow(out, module, item, depth)?;
            }
            Ok(())
        }
        Flow::If {
            cond,
            then_flow,
            else_flow,
        } => {
            indent(out, depth)?;
            out.write_str("if ")?;
            render_value(out, module, cond)?;
            out.write_str(" {\n")?;
            render_flow(out, module, then_flow, depth + 1)?;
            let mut tail = else_flow.as_deref();
            // `else { if .. }` 折叠为 `} elif .. {`，与生成代码的 if/elif 语义一致。
            while let Some(next) = tail {
                match next {
                    Flow::If {
                        cond,
                        then_flow,
                        else_flow,
                    } => {
                        indent(out, depth)?;
                        out.write_str("} elif ")?;
                        render_value(out, module, cond)?;
                        out.write_str(" {\n")?;
                        render_flow(out, module, then_flow, depth + 1)?;
                        tail = else_flow.as_deref();
                    }
                    other => {
                        indent(out, depth)?;
                        out.write_str("} else {\n")?;
                        render_flow(out, module, other, depth + 1)?;
                        tail = None;
                    }
                }
            }
            indent(out, depth)?;
            out.write_str("}\n")
        }
        Flow::Return(value) => {
            indent(out, depth)?;
            out.write_str("return ")?;
            render_value(out, module, value)?;
            out.write_char('\n')
        }
        Flow::Eval(value) => {
            indent(out, depth)?;
            render_value(out, module, value)?;
            out.write_char('\n')
        }
    }
}

fn render_value<W: Write>(out: &mut W, module: &Module, value: &Value) -> fmt::Result {
    match value {
        Value::Literal(Literal::Str(text)) => write!(out, "{text:?}"),
        Value::Literal(Literal::Int(number)) => write!(out, "{number}"),
        Value::Literal(Literal::Bool(flag)) => write!(out, "{flag}"),
        Value::Var(name) => out.write_str(name),
        Value::Eq(lhs, rhs) => {
            render_value(out, module, lhs)?;
            out.write_str(" == ")?;
            render_value(out, module, rhs)
        }
        Value::Opaque(text) => write!(out, "<opaque {text}>"),
        Value::Call(call) => render_call(out, module, call),
    }
}

fn render_call<W: Write>(out: &mut W, module: &Module, call: &Call) -> fmt::Result {
    if let Some(receiver) = &call.receiver {
        render_value(out, module, receiver)?;
        out.write_char('.')?;
    }
    match &call.callee {
        Callee::Func(id) => match module.function(*id) {
            Some(function) => out.write_str(function.qualified())?,
            None => write!(out, "{id}")?,
        },
        Callee::Named(path) => out.write_str(path)?,
    }
    out.write_char('(')?;
    for (index, arg) in call.args.iter().enumerate() {
        if index > 0 {
            out.write_str(", ")?;
        }
        render_value(out, module, arg)?;
    }
    out.write_char(')')
}

fn indent<W: Write>(out: &mut W, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        out.write_str(INDENT)?;
    }
    Ok(())
}
