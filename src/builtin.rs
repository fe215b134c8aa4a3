use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Names of all commands implemented inside the shell process.
pub const BUILTIN_NAMES: [&str; 6] = ["cd", "pwd", "echo", "exit", "type", "history"];

/// Whether `name` is handled in-process rather than via the search path.
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// directly in-process without spawning a child process. When a builtin runs
/// as one stage of a multi-stage pipeline the orchestrator re-invokes the
/// shell binary headless, so `env` mutations stay local to that stage.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using provided IO streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match T::execute(*self, stdin, stdout, stderr, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stderr, "{}", e)?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.is_error {
            stderr.write_all(self.output.as_bytes())?;
            Ok(1)
        } else {
            stdout.write_all(self.output.as_bytes())?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// With no target, or `~`, changes to the directory named by HOME.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let requested = match self.target.as_deref() {
            Some(t) if !t.is_empty() && t != "~" => t.to_string(),
            _ => match env.get_var("HOME") {
                Some(home) => home,
                None => {
                    writeln!(stderr, "cd: HOME not set")?;
                    return Ok(1);
                }
            },
        };

        let target = PathBuf::from(&requested);
        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let Ok(canonical) = fs::canonicalize(&new_dir) else {
            writeln!(stderr, "cd: {}: No such file or directory", requested)?;
            return Ok(1);
        };
        if env::set_current_dir(&canonical).is_err() {
            writeln!(stderr, "cd: {}: No such file or directory", requested)?;
            return Ok(1);
        }
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell with the given status code (default 0).
pub struct Exit {
    #[argh(positional, greedy)]
    /// exit status; at most one numeric argument.
    pub args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let code = match self.args.as_slice() {
            [] => 0,
            [arg] => match arg.parse::<i32>() {
                Ok(code) => code,
                Err(_) => {
                    writeln!(stderr, "exit: {}: numeric argument required", arg)?;
                    return Ok(1);
                }
            },
            _ => {
                writeln!(stderr, "exit: too many arguments")?;
                return Ok(1);
            }
        };
        // The REPL loop observes this and terminates the process; a headless
        // pipeline stage simply exits its own child process.
        env.pending_exit = Some(code);
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show how a command name would be interpreted.
pub struct Type {
    #[argh(positional)]
    /// command name to look up.
    pub name: String,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if is_builtin(&self.name) {
            writeln!(stdout, "{} is a shell builtin", self.name)?;
            Ok(0)
        } else if let Some(path) = env.index.resolve(&self.name) {
            writeln!(stdout, "{} is {}", self.name, path.display())?;
            Ok(0)
        } else {
            writeln!(stderr, "{}: not found", self.name)?;
            Ok(1)
        }
    }
}

#[derive(FromArgs)]
/// Display or manipulate the history list.
pub struct History {
    #[argh(option, short = 'r', long = "read")]
    /// append entries read from a file to the history list.
    pub read: Option<String>,

    #[argh(option, short = 'w', long = "write")]
    /// write the history list to a file.
    pub write: Option<String>,

    #[argh(positional)]
    /// print only the last N entries.
    pub count: Option<usize>,
}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if let Some(path) = &self.read {
            let text = fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("history: {}: {}", path, e))?;
            env.history.extend(text.lines().map(str::to_string));
            return Ok(0);
        }
        if let Some(path) = &self.write {
            let mut text = env.history.join("\n");
            if !text.is_empty() {
                text.push('\n');
            }
            fs::write(path, text).map_err(|e| anyhow::anyhow!("history: {}: {}", path, e))?;
            return Ok(0);
        }

        let total = env.history.len();
        let start = match self.count {
            Some(n) => total.saturating_sub(n),
            None => 0,
        };
        for (i, entry) in env.history.iter().enumerate().skip(start) {
            writeln!(stdout, "{:5} {}", i + 1, entry)?;
        }
        Ok(0)
    }
}
