use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::executor;
use crate::lexer;
use crate::parser::{self, Pipeline};
use crate::reader::{LineReader, ReadOutcome};
use std::io::{self, Write};
use tracing::debug;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate, see [`Interpreter::default`].
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// A minimal shell: reads a line, turns it into a [`Pipeline`] and runs it.
///
/// A single-stage pipeline whose program is a built-in runs in-process through
/// the registered [`CommandFactory`] objects. Everything else is forked and
/// executed by [`executor::execute`].
///
/// Example
/// ```
/// use pipeshell::Interpreter;
/// let mut sh = Interpreter::default();
/// let mut out = Vec::new();
/// let code = sh.execute_line_with_output("echo hello world", &mut out, &mut std::io::sink());
/// assert_eq!(code, 0);
/// assert_eq!(out, b"hello world\n");
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of built-in factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self::with_environment(Environment::new(), commands)
    }

    /// Create an interpreter over an existing shell state.
    pub fn with_environment(env: Environment, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self { env, commands }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn is_running(&self) -> bool {
        self.env.running
    }

    /// Run one input line, writing built-in output to the process stdout.
    pub fn execute_line(&mut self, line: &str) -> ExitCode {
        self.execute_line_with_output(line, &mut io::stdout(), &mut io::stderr())
    }

    /// Run one input line.
    ///
    /// Built-ins write to `stdout` and `stderr`. Forked programs always write
    /// to the process's own descriptors 1 and 2.
    pub fn execute_line_with_output(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> ExitCode {
        let tokens = lexer::split_into_tokens(line);
        let pipeline = parser::parse(&tokens, &self.env);
        debug!(?pipeline, "parsed");
        self.execute_pipeline(&pipeline, stdout, stderr)
    }

    fn execute_pipeline(
        &mut self,
        pipeline: &Pipeline,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> ExitCode {
        if pipeline.is_empty() {
            return 0;
        }

        if let Some(stage) = pipeline.single() {
            let Some(name) = stage.program() else {
                return 0;
            };
            if let Some(cmd) = self.create_builtin(name, &stage.argv[1..]) {
                if stage.input_file.is_some() || stage.output_file.is_some() {
                    debug!(builtin = name, "redirections on built-ins are ignored");
                }
                return match cmd.execute(stdout, stderr, &mut self.env) {
                    Ok(code) => code,
                    Err(e) => {
                        let _ = writeln!(stderr, "{name}: {e}");
                        1
                    }
                };
            }
        }

        executor::execute(pipeline)
    }

    fn create_builtin(&self, name: &str, args: &[String]) -> Option<Box<dyn ExecutableCommand>> {
        self.commands
            .iter()
            .find_map(|factory| factory.try_create(&self.env, name, args))
    }

    /// The prompt shown before each read: `USER@HOST:CWD$ `.
    pub fn prompt(&self) -> String {
        let user = self.env.get_var("USER").unwrap_or_else(|| "user".to_string());
        let host = nix::unistd::gethostname()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        format!("{}@{}:{}$ ", user, host, self.env.current_dir.to_string_lossy())
    }

    /// Read-eval loop: runs lines from `reader` until end of input or `exit`.
    ///
    /// Blank lines are skipped and Ctrl-C discards the line being edited.
    pub fn repl(&mut self, reader: &mut dyn LineReader) -> anyhow::Result<()> {
        while self.env.running {
            let line = match reader.read_line(&self.prompt())? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Interrupted => continue,
                ReadOutcome::Eof => break,
            };
            if line.trim().is_empty() {
                continue;
            }
            let code = self.execute_line(&line);
            debug!(code, "line finished");
        }
        Ok(())
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the default set of built-ins:
    /// `cd`, `exit`, `export`, `pwd`, `echo`.
    fn default() -> Self {
        use crate::builtin::*;
        Self::new(vec![
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Export>::default()),
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Echo>::default()),
        ])
    }
}
