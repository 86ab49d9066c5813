use std::{
    fmt,
    os::raw::{c_int, c_long, c_longlong, c_short},
    rc::Rc,
};

use crate::{
    ast::Expr, diagnostics::RuntimeError, environment::Environment, native::NativeFunction,
};

/// A runtime value. Values never change after construction, so clones share
/// the same allocation.
#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ValueKind::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ValueKind::Float(value))
    }

    /// Text is a byte string. It need not be UTF-8 and is only decoded for
    /// display.
    pub fn text(value: impl Into<Vec<u8>>) -> Self {
        Self::new(ValueKind::Text(value.into()))
    }

    pub fn function(function: UserFunction) -> Self {
        Self::new(ValueKind::Callable(Callable::User(function)))
    }

    pub fn native(function: NativeFunction) -> Self {
        Self::new(ValueKind::Callable(Callable::Native(function)))
    }

    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            ValueKind::Int(_) => "Int",
            ValueKind::Float(_) => "Float",
            ValueKind::Text(_) => "Text",
            ValueKind::Callable(_) => "Function",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(&*self.0, ValueKind::Callable(_))
    }

    /// Narrowing integer conversions wrap and float conversions truncate toward
    /// zero, the same way a C cast does for in-range values.
    pub fn to_short(&self) -> Result<c_short, RuntimeError> {
        self.numeric("short", |n| n as c_short, |f| f as c_short)
    }

    pub fn to_int(&self) -> Result<c_int, RuntimeError> {
        self.numeric("int", |n| n as c_int, |f| f as c_int)
    }

    pub fn to_long(&self) -> Result<c_long, RuntimeError> {
        self.numeric("long", |n| n as c_long, |f| f as c_long)
    }

    pub fn to_long_long(&self) -> Result<c_longlong, RuntimeError> {
        self.numeric("long long", |n| n as c_longlong, |f| f as c_longlong)
    }

    pub fn to_float(&self) -> Result<f32, RuntimeError> {
        self.numeric("float", |n| n as f32, |f| f as f32)
    }

    pub fn to_double(&self) -> Result<f64, RuntimeError> {
        self.numeric("double", |n| n as f64, |f| f)
    }

    pub fn to_text(&self) -> Result<Vec<u8>, RuntimeError> {
        match &*self.0 {
            ValueKind::Int(n) => Ok(n.to_string().into_bytes()),
            ValueKind::Float(f) => Ok(format_float(*f).into_bytes()),
            ValueKind::Text(bytes) => Ok(bytes.clone()),
            ValueKind::Callable(_) => Err(RuntimeError::CallableConversion { kind: "text" }),
        }
    }

    pub fn call(&self, args: &[Value], env: &mut Environment) -> Result<Value, RuntimeError> {
        match &*self.0 {
            ValueKind::Callable(callable) => callable.call(args, env),
            _ => Err(RuntimeError::NotCallable {
                type_name: self.type_name(),
            }),
        }
    }

    fn numeric<T>(
        &self,
        kind: &'static str,
        from_int: impl FnOnce(i64) -> T,
        from_float: impl FnOnce(f64) -> T,
    ) -> Result<T, RuntimeError> {
        match &*self.0 {
            ValueKind::Int(n) => Ok(from_int(*n)),
            ValueKind::Float(f) => Ok(from_float(*f)),
            ValueKind::Text(_) => Err(RuntimeError::TextToNumber { kind }),
            ValueKind::Callable(_) => Err(RuntimeError::CallableConversion { kind }),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Int(n) => write!(f, "{n}"),
            ValueKind::Float(n) => write!(f, "{n:?}"),
            ValueKind::Text(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            ValueKind::Callable(callable) => write!(f, "{callable}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Int(n) => write!(f, "{n}"),
            ValueKind::Float(n) => f.write_str(&format_float(*n)),
            ValueKind::Text(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            ValueKind::Callable(callable) => write!(f, "{callable}"),
        }
    }
}

pub enum ValueKind {
    Int(i64),
    Float(f64),
    Text(Vec<u8>),
    Callable(Callable),
}

/// Fixed notation with six fractional digits, spelling non-finite values the
/// way C's `%f` does.
fn format_float(value: f64) -> String {
    let sign = if value.is_sign_negative() { "-" } else { "" };
    if value.is_nan() {
        format!("{sign}nan")
    } else if value.is_infinite() {
        format!("{sign}inf")
    } else {
        format!("{value:.6}")
    }
}

/// Everything a script can invoke. The set is closed.
pub enum Callable {
    User(UserFunction),
    Native(NativeFunction),
}

impl Callable {
    pub fn call(&self, args: &[Value], env: &mut Environment) -> Result<Value, RuntimeError> {
        match self {
            Callable::User(function) => function.call(args, env),
            Callable::Native(function) => function.call(args),
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::User(function) => write!(f, "<fn {}>", function.display_name()),
            Callable::Native(function) => write!(f, "<native fn {}>", function.name()),
        }
    }
}

/// A function written in the script itself.
#[derive(Debug, Clone)]
pub struct UserFunction {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Rc<Expr>>,
}

impl UserFunction {
    pub fn new(params: Vec<String>, body: Vec<Rc<Expr>>) -> Self {
        Self {
            name: None,
            params,
            body,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous function")
    }
}
