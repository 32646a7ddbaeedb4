//! 只读访问者接口。
//!
//! # 遍历契约（What）
//! - 模块内函数按插入顺序访问，未定义函数体的声明也会触发 `visit_function`；
//! - 控制流按语句顺序先序遍历：`If` 先条件、再 then 分支、最后 else 分支；
//! - 调用节点先交给 `visit_call`，默认实现随后依次访问 receiver 与各参数。
//!
//! 覆写某个 `visit_*` 方法时，如需继续深入子节点，应显式调用对应的 `walk_*`。

use crate::module::{Call, Flow, FuncId, Function, Module, Value};

pub trait Visitor {
    fn visit_function(&mut self, id: FuncId, function: &Function) {
        walk_function(self, id, function);
    }

    fn visit_flow(&mut self, flow: &Flow) {
        walk_flow(self, flow);
    }

    fn visit_value(&mut self, value: &Value) {
        walk_value(self, value);
    }

    fn visit_call(&mut self, call: &Call) {
        walk_call(self, call);
    }
}

pub fn walk_module<V: Visitor + ?Sized>(visitor: &mut V, module: &Module) {
    for (id, function) in module.functions() {
        visitor.visit_function(id, function);
    }
}

pub fn walk_function<V: Visitor + ?Sized>(visitor: &mut V, _id: FuncId, function: &Function) {
    if let Some(body) = &function.body {
        visitor.visit_flow(body);
    }
}

pub fn walk_flow<V: Visitor + ?Sized>(visitor: &mut V, flow: &Flow) {
    match flow {
        Flow::Series(items) => {
            for item in items {
                visitor.visit_flow(item);
            }
        }
        Flow::If {
            cond,
            then_flow,
            else_flow,
        } => {
            visitor.visit_value(cond);
            visitor.visit_flow(then_flow);
            if let Some(else_flow) = else_flow {
                visitor.visit_flow(else_flow);
            }
        }
        Flow::Return(value) | Flow::Eval(value) => visitor.visit_value(value),
    }
}

pub fn walk_value<V: Visitor + ?Sized>(visitor: &mut V, value: &Value) {
    match value {
        Value::Call(call) => visitor.visit_call(call),
        Value::Eq(lhs, rhs) => {
            visitor.visit_value(lhs);
            visitor.visit_value(rhs);
        }
        Value::Literal(_) | Value::Var(_) | Value::Opaque(_) => {}
    }
}

pub fn walk_call<V: Visitor + ?Sized>(visitor: &mut V, call: &Call) {
    if let Some(receiver) = &call.receiver {
        visitor.visit_value(receiver);
    }
    for arg in &call.args {
        visitor.visit_value(arg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Param, Type};

    #[derive(Default)]
    struct CallOrder {
        seen: Vec<String>,
    }

    impl Visitor for CallOrder {
        fn visit_call(&mut self, call: &Call) {
            if let crate::module::Callee::Named(name) = &call.callee {
                self.seen.push(name.clone());
            }
            walk_call(self, call);
        }
    }

    #[test]
    fn calls_are_visited_pre_order_in_body_order() {
        let nested = Call::named("inner", vec![Value::str("/")]);
        let outer = Call::method(Value::var("app"), "outer", vec![nested.into()]);
        let body = Flow::Series(vec![
            Flow::Eval(outer.into()),
            Flow::branch(
                Value::equals(Value::var("x"), Value::str("y")),
                Flow::Eval(Call::named("then_call", Vec::new()).into()),
                Some(Flow::Eval(Call::named("else_call", Vec::new()).into())),
            ),
        ]);

        let mut module = Module::new("m");
        module.push(Function::define(
            "main",
            vec![Param::new("app", Type::Named("App".into()))],
            Type::Unit,
            body,
        ));
        module.push(Function::define(
            "later",
            Vec::new(),
            Type::Unit,
            Flow::Eval(Call::named("last", Vec::new()).into()),
        ));

        let mut visitor = CallOrder::default();
        walk_module(&mut visitor, &module);
        assert_eq!(
            visitor.seen,
            vec!["outer", "inner", "then_call", "else_call", "last"]
        );
    }
}
