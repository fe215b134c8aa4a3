use rustyline::Helper;
use rustyline::completion::Completer;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use std::collections::BTreeMap;

/// Prefix trie over command names.
///
/// Ordered children keep completion output stable across runs.
#[derive(Debug, Default)]
pub struct Trie {
    root: Node,
}

#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<char, Node>,
    terminal: bool,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a word; duplicates are a no-op.
    pub fn insert(&mut self, word: &str) {
        let mut node = &mut self.root;
        for ch in word.chars() {
            node = node.children.entry(ch).or_default();
        }
        node.terminal = true;
    }

    /// All inserted words starting with `prefix`, in sorted order.
    ///
    /// Traversal is iterative with an explicit stack, so depth is bounded by
    /// heap space rather than the call stack.
    pub fn matches_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut node = &self.root;
        for ch in prefix.chars() {
            match node.children.get(&ch) {
                Some(next) => node = next,
                None => return Vec::new(),
            }
        }

        let mut matches = Vec::new();
        let mut stack = vec![(node, prefix.to_string())];
        while let Some((node, word)) = stack.pop() {
            if node.terminal {
                matches.push(word.clone());
            }
            for (&ch, child) in &node.children {
                let mut next = word.clone();
                next.push(ch);
                stack.push((child, next));
            }
        }
        matches.sort();
        matches
    }
}

/// Line-editor helper completing command names.
///
/// Only the command position is completed: the start of the line, or the word
/// right after a `|`. Arguments are left alone.
pub struct ShellHelper {
    commands: Trie,
}

impl ShellHelper {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut commands = Trie::new();
        for name in names {
            commands.insert(name.as_ref());
        }
        Self { commands }
    }

    fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let head = &line[..pos];
        let segment_start = head.rfind('|').map(|i| i + 1).unwrap_or(0);
        let segment = &head[segment_start..];
        let word = segment.trim_start();
        // Past the command word already.
        if word.contains(char::is_whitespace) {
            return (pos, Vec::new());
        }
        (pos - word.len(), self.commands.matches_with_prefix(word))
    }
}

impl Completer for ShellHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        Ok(self.candidates(line, pos))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}
