use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::expand::expand;
use crate::interpreter::Factory;
use anyhow::{Result, anyhow};
use nix::unistd::{Uid, User};
use std::io::Write;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins execute in the shell process so that their effect on the
/// [`Environment`] persists. They never fork.
pub(crate) trait BuiltinCommand: Sized {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Builds the command from the words following its name.
    fn from_args(args: &[String]) -> Self;

    /// Executes the command.
    ///
    /// An error is reported on stderr by the caller and turned into status 1.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let result = <T as BuiltinCommand>::execute(*self, stdout, env);
        stdout.flush()?;
        match result {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stderr, "{e}")?;
                Ok(1)
            }
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[String],
    ) -> Option<Box<dyn ExecutableCommand>> {
        (name == T::name()).then(|| Box::new(T::from_args(args)) as Box<dyn ExecutableCommand>)
    }
}

/// Print the current working directory to standard output.
pub struct Pwd;

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn from_args(_args: &[String]) -> Self {
        Pwd
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

/// Change the current working directory.
///
/// Without a target, or with `~`, changes to the home directory of the
/// current user as recorded in the password database.
pub struct Cd {
    pub target: Option<String>,
}

impl Cd {
    fn home_dir(env: &Environment) -> Result<PathBuf> {
        if let Ok(Some(user)) = User::from_uid(Uid::current()) {
            return Ok(user.dir);
        }
        env.get_var("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("cd: HOME not set"))
    }
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn from_args(args: &[String]) -> Self {
        Cd {
            target: args.first().cloned(),
        }
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let target = match self.target {
            Some(t) if t != "~" => PathBuf::from(t),
            _ => Self::home_dir(env)?,
        };

        env.change_dir(&target).map_err(|e| {
            tracing::debug!(path = %target.display(), error = %e, "cd failed");
            anyhow!("cd: {}: No such file or directory", target.display())
        })?;
        Ok(0)
    }
}

/// Stop the shell after the current line.
pub struct Exit;

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn from_args(_args: &[String]) -> Self {
        Exit
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.running = false;
        Ok(0)
    }
}

/// Set `NAME=VALUE` pairs in the shell and in the process environment.
///
/// Arguments without `=` are ignored. Arguments with an invalid name are
/// reported and make the status 1, the remaining ones are still applied.
pub struct Export {
    pub assignments: Vec<String>,
}

impl BuiltinCommand for Export {
    fn name() -> &'static str {
        "export"
    }

    fn from_args(args: &[String]) -> Self {
        Export {
            assignments: args.to_vec(),
        }
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let mut failed = Vec::new();
        for arg in &self.assignments {
            let Some((name, value)) = arg.split_once('=') else {
                continue;
            };
            if let Err(e) = env.export_var(name, value) {
                failed.push(format!("export: {e}"));
            }
        }
        if failed.is_empty() {
            Ok(0)
        } else {
            Err(anyhow!(failed.join("\n")))
        }
    }
}

/// Write the arguments to standard output, separated by single spaces and
/// followed by a newline.
///
/// Arguments are expanded once more before printing, so a variable whose
/// value names another variable prints the inner value.
pub struct Echo {
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn from_args(args: &[String]) -> Self {
        Echo {
            args: args.to_vec(),
        }
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let words: Vec<String> = self.args.iter().map(|arg| expand(arg, env)).collect();
        writeln!(stdout, "{}", words.join(" "))?;
        Ok(0)
    }
}
