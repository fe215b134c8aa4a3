use crate::lexer::Token;
use thiserror::Error;

/// A single pipeline stage: the command name and its arguments.
///
/// Immutable once linked; the first word of a segment is always the name,
/// whatever its literal content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

/// How the redirect target file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// `>` — discard existing content.
    Truncate,
    /// `>>` — preserve existing content.
    Append,
}

/// The single trailing output redirection of a pipeline.
///
/// `fd` is 1 (stdout) or 2 (stderr); it binds to the corresponding stream of
/// the final stage only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectSpec {
    pub fd: u32,
    pub mode: RedirectMode,
    pub path: String,
}

/// One fully linked input line: at least one command, plus at most one
/// trailing redirect. Created fresh per line and consumed by execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    pub redirect: Option<RedirectSpec>,
}

/// Errors produced while linking tokens into a pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    /// An operator closed a command that had no name (e.g. a leading `|`).
    #[error("syntax error: empty command")]
    EmptyCommand,
    /// A redirect without a following target word, one followed by more
    /// tokens, or one with a descriptor other than 1 or 2.
    #[error("syntax error: malformed redirect")]
    MalformedRedirect,
}

/// Groups a token sequence into a [`Pipeline`].
///
/// The first token, or the token right after a `|`, names a command; the
/// following words are its arguments. A redirect must be the final operator
/// of the line, immediately followed by its target word and nothing else.
pub fn link(tokens: Vec<Token>) -> Result<Pipeline, LinkError> {
    let mut commands = Vec::new();
    let mut redirect = None;
    let mut current: Option<Command> = None;
    let mut iter = tokens.into_iter();

    while let Some(token) = iter.next() {
        match token {
            Token::Word(w) => match &mut current {
                None => {
                    current = Some(Command {
                        name: w,
                        args: Vec::new(),
                    })
                }
                Some(cmd) => cmd.args.push(w),
            },
            Token::Pipe => {
                commands.push(current.take().ok_or(LinkError::EmptyCommand)?);
            }
            Token::Redirect { fd, append } => {
                commands.push(current.take().ok_or(LinkError::EmptyCommand)?);
                let fd = fd.unwrap_or(1);
                if fd != 1 && fd != 2 {
                    return Err(LinkError::MalformedRedirect);
                }
                let path = match iter.next() {
                    Some(Token::Word(w)) => w,
                    _ => return Err(LinkError::MalformedRedirect),
                };
                if iter.next().is_some() {
                    return Err(LinkError::MalformedRedirect);
                }
                redirect = Some(RedirectSpec {
                    fd,
                    mode: if append {
                        RedirectMode::Append
                    } else {
                        RedirectMode::Truncate
                    },
                    path,
                });
            }
        }
    }

    match current {
        Some(cmd) => commands.push(cmd),
        // Closed by a redirect is fine; closed by a trailing pipe is not.
        None if redirect.is_none() => return Err(LinkError::EmptyCommand),
        None => {}
    }

    Ok(Pipeline { commands, redirect })
}
