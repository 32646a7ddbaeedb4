//! IR 数据结构。
//!
//! 结构刻意保持扁平：模块持有按插入顺序排列的函数列表，函数体是由 [`Flow`]
//! 组成的结构化控制流树，表达式统一为 [`Value`]。

use core::fmt;

use serde::{Deserialize, Serialize};

/// 模块内函数的稳定标识，即其在函数列表中的下标。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FuncId(pub u32);

impl FuncId {
    /// 以 `usize` 形式返回下标。
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 值类型。
///
/// 比较为结构相等：`Named("Request") == Named("Request")`，与来源无关。
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Str,
    Int,
    Bool,
    Unit,
    Named(String),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Str => f.write_str("str"),
            Type::Int => f.write_str("int"),
            Type::Bool => f.write_str("bool"),
            Type::Unit => f.write_str("()"),
            Type::Named(name) => f.write_str(name),
        }
    }
}

/// 函数签名视图：参数类型序列与返回类型。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FuncType {
    pub params: Vec<Type>,
    pub ret: Type,
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

/// 具名参数。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// 字面量常量。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Str(String),
    Int(i64),
    Bool(bool),
}

/// 调用目标。
///
/// - `Func`：指向本模块中已编译函数的直接引用，生成代码只使用这一形式；
/// - `Named`：尚未解析的点分路径（如 `app.get`、`routes.add_route_metadata`）。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Callee {
    Func(FuncId),
    Named(String),
}

/// 调用表达式。`receiver` 不计入 `args`。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub callee: Callee,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<Box<Value>>,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Call {
    /// 构造对具名目标的自由调用。
    pub fn named(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            callee: Callee::Named(name.into()),
            receiver: None,
            args,
        }
    }

    /// 构造方法调用：`receiver.name(args..)`。
    pub fn method(receiver: Value, name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            callee: Callee::Named(name.into()),
            receiver: Some(Box::new(receiver)),
            args,
        }
    }

    /// 构造对模块内函数的直接调用。
    pub fn direct(function: FuncId, args: Vec<Value>) -> Self {
        Self {
            callee: Callee::Func(function),
            receiver: None,
            args,
        }
    }
}

/// 表达式。
///
/// `Opaque` 承载前端无法静态分析的任意表达式文本，分析阶段一律视为“非字面量”。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Literal(Literal),
    Var(String),
    Call(Call),
    Eq(Box<Value>, Box<Value>),
    Opaque(String),
}

impl Value {
    pub fn str(value: impl Into<String>) -> Self {
        Value::Literal(Literal::Str(value.into()))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Value::Var(name.into())
    }

    pub fn equals(lhs: Value, rhs: Value) -> Self {
        Value::Eq(Box::new(lhs), Box::new(rhs))
    }

    /// 若为字符串字面量则返回其内容。
    pub fn as_str_literal(&self) -> Option<&str> {
        match self {
            Value::Literal(Literal::Str(value)) => Some(value),
            _ => None,
        }
    }
}

impl From<Call> for Value {
    fn from(call: Call) -> Self {
        Value::Call(call)
    }
}

/// 结构化控制流。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    Series(Vec<Flow>),
    If {
        cond: Value,
        then_flow: Box<Flow>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_flow: Option<Box<Flow>>,
    },
    Return(Value),
    Eval(Value),
}

impl Flow {
    /// 构造 `if cond { then } else { otherwise }` 节点。
    pub fn branch(cond: Value, then_flow: Flow, else_flow: Option<Flow>) -> Self {
        Flow::If {
            cond,
            then_flow: Box::new(then_flow),
            else_flow: else_flow.map(Box::new),
        }
    }
}

/// 模块中的函数。
///
/// `body == None` 表示仅有声明（外部函数）；有函数体的才算“已定义”。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    /// 点分限定名，例如 `handlers.users.show`；缺省时等于 `name`。
    #[serde(default)]
    pub qualified_name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    pub ret: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Flow>,
}

impl Function {
    /// 构造仅有声明的函数，限定名默认与短名一致。
    pub fn declare(name: impl Into<String>, params: Vec<Param>, ret: Type) -> Self {
        let name = name.into();
        Self {
            qualified_name: name.clone(),
            name,
            params,
            ret,
            body: None,
        }
    }

    /// 构造带函数体的函数。
    pub fn define(name: impl Into<String>, params: Vec<Param>, ret: Type, body: Flow) -> Self {
        Self {
            body: Some(body),
            ..Self::declare(name, params, ret)
        }
    }

    pub fn with_qualified_name(mut self, qualified_name: impl Into<String>) -> Self {
        self.qualified_name = qualified_name.into();
        self
    }

    pub fn is_defined(&self) -> bool {
        self.body.is_some()
    }

    /// 限定名；为空时退化为短名。
    pub fn qualified(&self) -> &str {
        if self.qualified_name.is_empty() {
            &self.name
        } else {
            &self.qualified_name
        }
    }

    /// 限定名中的模块前缀段（不含函数名本身）。
    pub fn module_path(&self) -> Vec<&str> {
        let mut segments: Vec<&str> = self.qualified().split('.').collect();
        segments.pop();
        segments
    }

    pub fn signature(&self) -> FuncType {
        FuncType {
            params: self.params.iter().map(|param| param.ty.clone()).collect(),
            ret: self.ret.clone(),
        }
    }
}

/// 编译单元。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    /// 追加函数并返回其稳定标识。
    pub fn push(&mut self, function: Function) -> FuncId {
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(function);
        id
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    pub fn function_mut(&mut self, id: FuncId) -> Option<&mut Function> {
        self.functions.get_mut(id.index())
    }

    /// 按插入顺序遍历 `(FuncId, &Function)`。
    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> + '_ {
        self.functions
            .iter()
            .enumerate()
            .map(|(index, function)| (FuncId(index as u32), function))
    }

    /// 按短名查找第一个匹配的函数。
    pub fn find(&self, name: &str) -> Option<FuncId> {
        self.functions()
            .find(|(_, function)| function.name == name)
            .map(|(id, _)| id)
    }

    /// 原地替换函数体，返回旧函数体；函数标识、名称与签名均保持不变。
    pub fn replace_body(&mut self, id: FuncId, body: Flow) -> Option<Flow> {
        let function = self.functions.get_mut(id.index())?;
        function.body.replace(body)
    }

    /// 解析调用目标的短名：直接引用取函数短名，具名路径取最后一个点分段。
    pub fn callee_name<'a>(&'a self, callee: &'a Callee) -> Option<&'a str> {
        match callee {
            Callee::Func(id) => self.function(*id).map(|function| function.name.as_str()),
            Callee::Named(path) => path.rsplit('.').next(),
        }
    }
}
