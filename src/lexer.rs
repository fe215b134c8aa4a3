use thiserror::Error;

/// A lexical unit of one input line.
///
/// Words come out fully resolved: quotes stripped and escapes applied, so later
/// stages never look inside them again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A command name, argument, or redirect target.
    Word(String),
    /// The `|` operator connecting two pipeline stages.
    Pipe,
    /// The `>`/`>>` operator, optionally prefixed with a file descriptor digit
    /// (`2>`). `fd` is `None` when the input did not name one.
    Redirect { fd: Option<u32>, append: bool },
}

/// Errors produced while scanning a raw input line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    /// The line ended while a single or double quote was still open.
    #[error("unterminated quote")]
    UnterminatedQuote,
}

#[derive(PartialEq)]
enum State {
    Normal,
    InSingleQuote,
    InDoubleQuote,
}

/// Scans a raw input line into words and operators.
///
/// Quoting follows shell convention: single quotes are fully literal, double
/// quotes allow the narrow `\"`, `\\`, `\$`, `` \` `` escape set, and outside
/// quotes a backslash escapes any single character. Operators are only
/// recognized outside quotes.
///
/// A digit is folded into the following redirect operator only when it stands
/// alone directly before `>` (so `2>log` redirects stderr while `head -n 5 >`
/// keeps `5` as a plain word).
pub fn tokenize(raw: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut state = State::Normal;
    let mut chars = raw.chars().peekable();

    fn flush(word: &mut String, tokens: &mut Vec<Token>) {
        if !word.is_empty() {
            tokens.push(Token::Word(std::mem::take(word)));
        }
    }

    while let Some(c) = chars.next() {
        match state {
            State::InSingleQuote => {
                if c == '\'' {
                    state = State::Normal;
                } else {
                    word.push(c);
                }
            }
            State::InDoubleQuote => match c {
                '"' => state = State::Normal,
                '\\' => match chars.peek() {
                    Some(&next) if matches!(next, '"' | '\\' | '$' | '`') => {
                        chars.next();
                        word.push(next);
                    }
                    // Any other escape stays literal, backslash included.
                    _ => word.push('\\'),
                },
                _ => word.push(c),
            },
            State::Normal => match c {
                '\\' => match chars.next() {
                    Some(next) => word.push(next),
                    None => word.push('\\'),
                },
                '\'' => state = State::InSingleQuote,
                '"' => state = State::InDoubleQuote,
                '|' => {
                    flush(&mut word, &mut tokens);
                    tokens.push(Token::Pipe);
                }
                '>' => {
                    flush(&mut word, &mut tokens);
                    let append = consume_if(&mut chars, '>');
                    tokens.push(Token::Redirect { fd: None, append });
                }
                d if d.is_ascii_digit() && word.is_empty() && chars.peek() == Some(&'>') => {
                    chars.next(); // the '>'
                    let append = consume_if(&mut chars, '>');
                    tokens.push(Token::Redirect {
                        fd: d.to_digit(10),
                        append,
                    });
                }
                w if w.is_whitespace() => flush(&mut word, &mut tokens),
                _ => word.push(c),
            },
        }
    }

    if state != State::Normal {
        return Err(LexError::UnterminatedQuote);
    }
    flush(&mut word, &mut tokens);
    Ok(tokens)
}

fn consume_if(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, expected: char) -> bool {
    if chars.peek() == Some(&expected) {
        chars.next();
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    #[test]
    fn test_splits_on_whitespace() {
        let tokens = tokenize("ls  -l   /tmp").unwrap();
        assert_eq!(tokens, vec![word("ls"), word("-l"), word("/tmp")]);
    }

    #[test]
    fn test_single_quotes_are_literal() {
        let tokens = tokenize(r#"echo 'a b' '$HOME' 'x\ny'"#).unwrap();
        assert_eq!(
            tokens,
            vec![word("echo"), word("a b"), word("$HOME"), word(r"x\ny")]
        );
    }

    #[test]
    fn test_double_quote_escape_set() {
        let tokens = tokenize(r#"echo 'a b' "c\"d""#).unwrap();
        assert_eq!(tokens, vec![word("echo"), word("a b"), word("c\"d")]);

        // Outside the recognized set, the backslash stays.
        let tokens = tokenize(r#"echo "a\nb" "p\$q""#).unwrap();
        assert_eq!(tokens, vec![word("echo"), word(r"a\nb"), word("p$q")]);
    }

    #[test]
    fn test_backslash_outside_quotes() {
        let tokens = tokenize(r"echo a\ b \| \'x\'").unwrap();
        assert_eq!(tokens, vec![word("echo"), word("a b"), word("|"), word("'x'")]);
    }

    #[test]
    fn test_adjacent_quoted_pieces_form_one_word() {
        let tokens = tokenize(r#"echo 'hello'world"x""#).unwrap();
        assert_eq!(tokens, vec![word("echo"), word("helloworldx")]);
    }

    #[test]
    fn test_pipe_operator() {
        let tokens = tokenize("cat f|wc -l").unwrap();
        assert_eq!(
            tokens,
            vec![word("cat"), word("f"), Token::Pipe, word("wc"), word("-l")]
        );
    }

    #[test]
    fn test_redirect_operators() {
        let tokens = tokenize("echo hi > out").unwrap();
        assert_eq!(
            tokens,
            vec![
                word("echo"),
                word("hi"),
                Token::Redirect { fd: None, append: false },
                word("out"),
            ]
        );

        let tokens = tokenize("echo hi >> out").unwrap();
        assert_eq!(
            tokens,
            vec![
                word("echo"),
                word("hi"),
                Token::Redirect { fd: None, append: true },
                word("out"),
            ]
        );
    }

    #[test]
    fn test_fd_prefixed_redirect() {
        let tokens = tokenize("cmd 2> out").unwrap();
        assert_eq!(
            tokens,
            vec![
                word("cmd"),
                Token::Redirect { fd: Some(2), append: false },
                word("out"),
            ]
        );

        let tokens = tokenize("cmd 2>>out").unwrap();
        assert_eq!(
            tokens,
            vec![
                word("cmd"),
                Token::Redirect { fd: Some(2), append: true },
                word("out"),
            ]
        );
    }

    #[test]
    fn test_digit_not_followed_by_redirect_is_a_word() {
        let tokens = tokenize("head -n 5 > out").unwrap();
        assert_eq!(
            tokens,
            vec![
                word("head"),
                word("-n"),
                word("5"),
                Token::Redirect { fd: None, append: false },
                word("out"),
            ]
        );
    }

    #[test]
    fn test_digit_inside_word_is_not_an_fd() {
        // The digit has word characters before it, so it belongs to the word.
        let tokens = tokenize("a2>f").unwrap();
        assert_eq!(
            tokens,
            vec![
                word("a2"),
                Token::Redirect { fd: None, append: false },
                word("f"),
            ]
        );
    }

    #[test]
    fn test_operators_inside_quotes_are_literal() {
        let tokens = tokenize(r#"echo '|' ">>""#).unwrap();
        assert_eq!(tokens, vec![word("echo"), word("|"), word(">>")]);
    }

    #[test]
    fn test_unterminated_quotes() {
        assert_eq!(tokenize("echo 'abc"), Err(LexError::UnterminatedQuote));
        assert_eq!(tokenize("echo \"abc"), Err(LexError::UnterminatedQuote));
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert_eq!(tokenize("").unwrap(), vec![]);
        assert_eq!(tokenize("   \t ").unwrap(), vec![]);
    }
}
