use std::rc::Rc;

use crate::value::Value;

/// Expression tree. Nodes are built once by the parser and shared afterwards.
#[derive(Debug)]
pub enum Expr {
    Constant(Value),
    Variable(String),
    FunctionCall {
        function: Rc<Expr>,
        arguments: Vec<Rc<Expr>>,
    },
}

impl Expr {
    pub fn constant(value: Value) -> Rc<Self> {
        Rc::new(Self::Constant(value))
    }

    pub fn variable(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self::Variable(name.into()))
    }

    pub fn call(function: Rc<Expr>, arguments: Vec<Rc<Expr>>) -> Rc<Self> {
        Rc::new(Self::FunctionCall {
            function,
            arguments,
        })
    }
}

/// A top-level `name = expression;` binding.
#[derive(Debug, Clone)]
pub struct Definition {
    pub name: String,
    pub body: Rc<Expr>,
}

/// A parsed script: its definitions in source order.
#[derive(Debug, Clone, Default)]
pub struct Program {
    definitions: Vec<Definition>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_definition(&mut self, name: impl Into<String>, body: Rc<Expr>) {
        self.definitions.push(Definition {
            name: name.into(),
            body,
        });
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }
}
