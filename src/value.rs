use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::FunctionDecl,
    diagnostics::{ManifastError, Result},
    environment::EnvironmentRef,
    runtime::ExecutionContext,
};

/// Arrays nested deeper than this render as `...`.
const MAX_RENDER_DEPTH: usize = 32;

/// Arity marker for natives that validate their own argument count.
pub const VARIADIC: usize = usize::MAX;

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn nil() -> Self {
        Self::new(ValueKind::Nil)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn number(value: f64) -> Self {
        Self::new(ValueKind::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::new(ValueKind::Array(RefCell::new(values)))
    }

    pub fn object(fields: IndexMap<String, Value>) -> Self {
        Self::new(ValueKind::Object(RefCell::new(fields)))
    }

    pub fn module(name: impl Into<String>, exports: IndexMap<String, Value>) -> Self {
        Self::new(ValueKind::Module(ModuleValue {
            name: name.into(),
            exports,
        }))
    }

    pub fn function(function: UserFunction) -> Self {
        Self::new(ValueKind::Function(function))
    }

    pub fn native(
        name: &'static str,
        arity: usize,
        callback: fn(&mut ExecutionContext, &[Value]) -> Result<Value>,
    ) -> Self {
        Self::new(ValueKind::NativeFunction(NativeFunction {
            name,
            arity,
            callback,
        }))
    }

    pub fn kind(&self) -> &ValueKind {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        matches!(&*self.0, ValueKind::Nil)
    }

    /// Only `salah` and `nil` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(&*self.0, ValueKind::Nil | ValueKind::Bool(false))
    }

    /// Name reported by `tipe`; instances report their class name.
    pub fn type_name(&self) -> &str {
        match &*self.0 {
            ValueKind::Nil => "nil",
            ValueKind::Bool(_) => "bool",
            ValueKind::Number(_) => "angka",
            ValueKind::String(_) => "string",
            ValueKind::Array(_) => "larik",
            ValueKind::Object(_) => "objek",
            ValueKind::Function(_)
            | ValueKind::BoundMethod(_)
            | ValueKind::NativeFunction(_) => "fungsi",
            ValueKind::Class(_) => "kelas",
            ValueKind::Instance(instance) => &instance.class.name,
            ValueKind::Module(_) => "modul",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match &*self.0 {
            ValueKind::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &*self.0 {
            ValueKind::String(s) => Some(s),
            _ => None,
        }
    }

    /// Value equality for scalars, identity for reference objects.
    pub fn equals(&self, other: &Value) -> bool {
        match (&*self.0, &*other.0) {
            (ValueKind::Nil, ValueKind::Nil) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Number(a), ValueKind::Number(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::NativeFunction(a), ValueKind::NativeFunction(b)) => {
                a.name == b.name && std::ptr::fn_addr_eq(a.callback, b.callback)
            }
            (ValueKind::Class(a), ValueKind::Class(b)) => Rc::ptr_eq(a, b),
            (
                ValueKind::Array(_)
                | ValueKind::Object(_)
                | ValueKind::Function(_)
                | ValueKind::BoundMethod(_)
                | ValueKind::Instance(_)
                | ValueKind::Module(_),
                _,
            ) => Rc::ptr_eq(&self.0, &other.0),
            _ => false,
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match &*self.0 {
            ValueKind::Nil => write!(f, "nil"),
            ValueKind::Bool(true) => write!(f, "benar"),
            ValueKind::Bool(false) => write!(f, "salah"),
            ValueKind::Number(n) => write!(f, "{}", format_number(*n)),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::Array(values) => {
                if depth >= MAX_RENDER_DEPTH {
                    return write!(f, "[...]");
                }
                write!(f, "[")?;
                for (idx, value) in values.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    value.render(f, depth + 1)?;
                }
                write!(f, "]")
            }
            ValueKind::Object(fields) => {
                if depth >= MAX_RENDER_DEPTH {
                    return write!(f, "{{...}}");
                }
                write!(f, "{{")?;
                for (idx, (key, value)) in fields.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: ")?;
                    value.render(f, depth + 1)?;
                }
                write!(f, "}}")
            }
            ValueKind::Function(fun) => write!(f, "<fungsi {}>", fun.name()),
            ValueKind::BoundMethod(bound) => write!(f, "<fungsi {}>", bound.function.name()),
            ValueKind::NativeFunction(fun) => write!(f, "<fungsi bawaan {}>", fun.name),
            ValueKind::Class(class) => write!(f, "<kelas {}>", class.name),
            ValueKind::Instance(instance) => write!(f, "<{} instance>", instance.class.name),
            ValueKind::Module(module) => write!(f, "<modul {}>", module.name),
        }
    }
}

/// Canonical text of a number. Integral values print without a fraction,
/// everything else like C's `%g`: six significant digits, trailing zeros
/// dropped, exponent form below `1e-4` or from `1e6` up.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "nan".into()
    } else if value.is_infinite() {
        if value > 0.0 { "inf".into() } else { "-inf".into() }
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format_general(value)
    }
}

const SIGNIFICANT_DIGITS: i32 = 6;

fn format_general(value: f64) -> String {
    let precision = (SIGNIFICANT_DIGITS - 1) as usize;
    let scientific = format!("{value:.precision$e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };
    if (-4..SIGNIFICANT_DIGITS).contains(&exponent) {
        let decimals = (SIGNIFICANT_DIGITS - 1 - exponent) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::String(s) => write!(f, "{s:?}"),
            _ => self.render(f, 0),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

pub enum ValueKind {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Array(RefCell<Vec<Value>>),
    /// Record built by `{ key: value }`; fields are read and written with `.key`.
    Object(RefCell<IndexMap<String, Value>>),
    Function(UserFunction),
    BoundMethod(BoundMethod),
    NativeFunction(NativeFunction),
    Class(Rc<ClassValue>),
    Instance(InstanceValue),
    Module(ModuleValue),
}

pub struct ModuleValue {
    pub name: String,
    pub exports: IndexMap<String, Value>,
}

/// A script function paired with the environment it was defined in.
#[derive(Clone)]
pub struct UserFunction {
    pub decl: Rc<FunctionDecl>,
    pub env: EnvironmentRef,
    /// Methods expect `self`; read off the class they take it as the first argument.
    pub is_method: bool,
}

impl UserFunction {
    pub fn name(&self) -> &str {
        self.decl.name.as_deref().unwrap_or("anonim")
    }
}

#[derive(Clone)]
pub struct BoundMethod {
    pub receiver: Value,
    pub function: UserFunction,
}

pub struct ClassValue {
    pub name: String,
    pub methods: IndexMap<String, UserFunction>,
}

impl ClassValue {
    pub fn constructor(&self) -> Option<&UserFunction> {
        self.methods.get("inisiasi")
    }
}

pub struct InstanceValue {
    pub class: Rc<ClassValue>,
    pub fields: RefCell<IndexMap<String, Value>>,
}

impl InstanceValue {
    pub fn new(class: Rc<ClassValue>) -> Self {
        Self {
            class,
            fields: RefCell::new(IndexMap::new()),
        }
    }

    /// Own fields shadow class methods.
    pub fn lookup(&self, receiver: &Value, name: &str) -> Option<Value> {
        if let Some(value) = self.fields.borrow().get(name) {
            return Some(value.clone());
        }
        self.class.methods.get(name).map(|function| {
            Value::new(ValueKind::BoundMethod(BoundMethod {
                receiver: receiver.clone(),
                function: function.clone(),
            }))
        })
    }
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub callback: fn(&mut ExecutionContext, &[Value]) -> Result<Value>,
}

impl NativeFunction {
    pub fn call(&self, context: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
        if self.arity != VARIADIC && args.len() != self.arity {
            return Err(ManifastError::runtime(format!(
                "function `{}` expected {} arguments but received {}",
                self.name,
                self.arity,
                args.len()
            )));
        }
        (self.callback)(context, args)
    }
}
