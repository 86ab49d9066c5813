use rustyline::{DefaultEditor, error::ReadlineError};

use crate::{
    diagnostics::{FiffiError, Result},
    runtime::Interpreter,
};

/// Line-oriented session: definitions are bound into one root environment and
/// bare expressions are evaluated and printed.
pub struct Repl {
    interpreter: Interpreter,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Self {
            interpreter: Interpreter::new(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor =
            DefaultEditor::new().map_err(|err| FiffiError::from(std::io::Error::other(err)))?;
        loop {
            match editor.readline(">> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == ":quit" || trimmed == ":exit" {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    if trimmed == ":env" {
                        for (name, value) in self.interpreter.environment().globals() {
                            println!("{name} = {value}");
                        }
                        continue;
                    }
                    match self.interpreter.eval_line(trimmed) {
                        Ok(Some(value)) => println!("{value}"),
                        Ok(None) => {}
                        Err(err) => eprintln!("{}", err.render("<repl>", trimmed)),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(FiffiError::from(std::io::Error::other(err))),
            }
        }
        Ok(())
    }
}
