use tracing::trace;

use crate::{
    ast::{Definition, Expr, Program},
    diagnostics::{Result, RuntimeError},
    environment::Environment,
    parser::{self, ReplInput},
    value::{UserFunction, Value},
};

impl Expr {
    pub fn evaluate(&self, env: &mut Environment) -> std::result::Result<Value, RuntimeError> {
        match self {
            Expr::Constant(value) => Ok(value.clone()),
            Expr::Variable(name) => {
                env.lookup(name)
                    .cloned()
                    .ok_or_else(|| RuntimeError::Undefined { name: name.clone() })
            }
            Expr::FunctionCall {
                function,
                arguments,
            } => {
                let callee = function.evaluate(env)?;
                // Left to right: arguments may reach native code with side effects.
                let mut values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(argument.evaluate(env)?);
                }
                callee.call(&values, env)
            }
        }
    }
}

impl UserFunction {
    pub fn call(
        &self,
        args: &[Value],
        env: &mut Environment,
    ) -> std::result::Result<Value, RuntimeError> {
        if args.len() != self.params.len() {
            return Err(RuntimeError::Arity {
                name: self.display_name().to_string(),
                expected: self.params.len(),
                actual: args.len(),
            });
        }
        env.push_scope();
        for (name, value) in self.params.iter().zip(args) {
            env.define_local(name, value.clone());
        }
        let result = self.evaluate_body(env);
        env.pop_scope()?;
        result
    }

    fn evaluate_body(&self, env: &mut Environment) -> std::result::Result<Value, RuntimeError> {
        let mut last = Value::int(0);
        for expr in &self.body {
            last = expr.evaluate(env)?;
        }
        Ok(last)
    }
}

/// A session over one root environment.
pub struct Interpreter {
    env: Environment,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Evaluates a definition's body and binds the result. Rebinding a name
    /// overwrites the earlier value.
    pub fn define(&mut self, definition: &Definition) -> std::result::Result<(), RuntimeError> {
        trace!(name = %definition.name, "binding definition");
        let value = definition.body.evaluate(&mut self.env)?;
        self.env.assign(&definition.name, value);
        Ok(())
    }

    pub fn evaluate(&mut self, expr: &Expr) -> std::result::Result<Value, RuntimeError> {
        expr.evaluate(&mut self.env)
    }

    pub fn invoke_main(&mut self) -> std::result::Result<Value, RuntimeError> {
        let main = self
            .env
            .lookup("main")
            .cloned()
            .ok_or(RuntimeError::MainNotFound)?;
        main.call(&[], &mut self.env)
    }

    /// Handles one line of interactive input. Returns the value of a bare
    /// expression, or `None` for a definition.
    pub fn eval_line(&mut self, line: &str) -> Result<Option<Value>> {
        match parser::parse_repl_line(line)? {
            ReplInput::Definition(definition) => {
                self.define(&definition)?;
                Ok(None)
            }
            ReplInput::Expression(expr) => Ok(Some(self.evaluate(&expr)?)),
        }
    }
}

impl Program {
    /// Binds every definition in order, then calls `main` with no arguments.
    pub fn run(&self) -> std::result::Result<(), RuntimeError> {
        let mut interpreter = Interpreter::new();
        for definition in self.definitions() {
            interpreter.define(definition)?;
        }
        interpreter.invoke_main()?;
        Ok(())
    }
}

/// Parses and runs a complete program.
pub fn run_source(source: &str) -> Result<()> {
    let program = parser::parse_program(source)?;
    program.run()?;
    Ok(())
}
