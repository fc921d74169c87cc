//! Lexical analysis of a command line.
//!
//! Tokenizing happens in two explicit passes so that the quoting rules of
//! each one can be checked in isolation:
//!
//! 1. [`split_on_pipes`] cuts the line into raw stage strings at every `|`
//!    that is not quoted or escaped. Quotes and backslashes are left in
//!    place for the next pass.
//! 2. [`split_words`] splits one raw stage string into words using POSIX
//!    shell rules, stripping quotes and escapes. `|` has no special meaning
//!    here.

use crate::error::{ParseError, QuoteKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipeState {
    Unquoted,
    SingleQuote,
    DoubleQuote,
}

struct PipeSplitter {
    input: Vec<char>,
    pos: usize,
    state: PipeState,
    buffer: String,
}

impl PipeSplitter {
    fn new(line: &str) -> Self {
        PipeSplitter {
            input: line.chars().collect(),
            pos: 0,
            state: PipeState::Unquoted,
            buffer: String::new(),
        }
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn make_stages(mut self) -> Result<Vec<String>, ParseError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                PipeState::Unquoted => self.handle_unquoted(ch, &mut out),
                PipeState::SingleQuote => self.handle_single_quote(ch),
                PipeState::DoubleQuote => self.handle_double_quote(ch),
            }
        }

        match self.state {
            PipeState::SingleQuote => Err(ParseError::UnterminatedQuote(QuoteKind::Single)),
            PipeState::DoubleQuote => Err(ParseError::UnterminatedQuote(QuoteKind::Double)),
            PipeState::Unquoted => {
                out.push(self.buffer);
                Ok(out)
            }
        }
    }

    fn handle_unquoted(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            '|' => out.push(std::mem::take(&mut self.buffer)),
            '\'' => {
                self.buffer.push(ch);
                self.state = PipeState::SingleQuote;
            }
            '"' => {
                self.buffer.push(ch);
                self.state = PipeState::DoubleQuote;
            }
            '\\' => self.copy_escaped(),
            c => self.buffer.push(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        self.buffer.push(ch);
        if ch == '\'' {
            self.state = PipeState::Unquoted;
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '\\' => self.copy_escaped(),
            '"' => {
                self.buffer.push(ch);
                self.state = PipeState::Unquoted;
            }
            c => self.buffer.push(c),
        }
    }

    /// Copies a backslash and the character it protects verbatim.
    fn copy_escaped(&mut self) {
        self.buffer.push('\\');
        if let Some(next) = self.read_char() {
            self.buffer.push(next);
        }
    }
}

/// Splits a command line into raw pipeline-stage strings.
///
/// A `|` separates stages only when it appears outside quotes and is not
/// preceded by a backslash. The returned strings keep their quotes and
/// surrounding whitespace; the result always has at least one element.
///
/// # Errors
/// [`ParseError::UnterminatedQuote`] when a quote is left open.
pub fn split_on_pipes(line: &str) -> Result<Vec<String>, ParseError> {
    PipeSplitter::new(line).make_stages()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct WordFSM {
    input: Vec<char>,
    pos: usize,
    state: WordState,
    buffer: String,
}

impl WordFSM {
    fn new(stage: &str) -> Self {
        WordFSM {
            input: stage.chars().collect(),
            pos: 0,
            state: WordState::Start,
            buffer: String::new(),
        }
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn make_words(mut self) -> Result<Vec<String>, ParseError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                WordState::Start => self.handle_start(ch)?,
                WordState::ReadingWord => self.handle_word(ch, &mut out)?,
                WordState::ReadingSingleQuote => self.handle_single_quote(ch),
                WordState::ReadingDoubleQuote => self.handle_double_quote(ch),
            }
        }

        match self.state {
            WordState::ReadingSingleQuote => {
                return Err(ParseError::UnterminatedQuote(QuoteKind::Single));
            }
            WordState::ReadingDoubleQuote => {
                return Err(ParseError::UnterminatedQuote(QuoteKind::Double));
            }
            WordState::ReadingWord => out.push(self.buffer),
            WordState::Start => {}
        }

        Ok(out)
    }

    fn handle_start(&mut self, ch: char) -> Result<(), ParseError> {
        match ch {
            ' ' | '\t' | '\n' => {}
            '\'' => self.state = WordState::ReadingSingleQuote,
            '"' => self.state = WordState::ReadingDoubleQuote,
            '\\' => {
                if self.read_escaped()? {
                    self.state = WordState::ReadingWord;
                }
            }
            c => {
                self.buffer.push(c);
                self.state = WordState::ReadingWord;
            }
        }
        Ok(())
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) -> Result<(), ParseError> {
        match ch {
            ' ' | '\t' | '\n' => {
                out.push(std::mem::take(&mut self.buffer));
                self.state = WordState::Start;
            }
            '\'' => self.state = WordState::ReadingSingleQuote,
            '"' => self.state = WordState::ReadingDoubleQuote,
            '\\' => {
                self.read_escaped()?;
            }
            c => self.buffer.push(c),
        }
        Ok(())
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = WordState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = WordState::ReadingWord,
            '\\' => match self.peek_char() {
                Some('\n') => {
                    self.read_char();
                }
                Some(c @ ('\\' | '"' | '$' | '`')) => {
                    self.read_char();
                    self.buffer.push(c);
                }
                _ => self.buffer.push('\\'),
            },
            c => self.buffer.push(c),
        }
    }

    /// Unquoted backslash: the next character is taken literally, and a
    /// backslash-newline pair disappears. Returns whether a character was
    /// added to the word.
    fn read_escaped(&mut self) -> Result<bool, ParseError> {
        match self.read_char() {
            Some('\n') => Ok(false),
            Some(c) => {
                self.buffer.push(c);
                Ok(true)
            }
            None => Err(ParseError::TrailingEscape),
        }
    }
}

/// Splits one stage string into words with POSIX shell quoting rules.
///
/// Whitespace separates words outside quotes. Single quotes preserve their
/// contents literally; inside double quotes a backslash only escapes `\`,
/// `"`, `$`, `` ` `` and newline. Quotes and escapes are removed from the
/// resulting words, and an empty quoted string yields an empty word.
///
/// # Errors
/// [`ParseError::UnterminatedQuote`] or [`ParseError::TrailingEscape`].
pub fn split_words(stage: &str) -> Result<Vec<String>, ParseError> {
    WordFSM::new(stage).make_words()
}

/// Quotes words so that [`split_words`] reproduces them.
///
/// # Errors
/// [`ParseError::Unquotable`] if a word contains a NUL byte.
pub fn join_words<S: AsRef<str>>(words: &[S]) -> Result<String, ParseError> {
    shlex::try_join(words.iter().map(|w| w.as_ref())).map_err(|_| {
        let offending = words
            .iter()
            .map(|w| w.as_ref())
            .find(|w| w.contains('\0'))
            .unwrap_or_default();
        ParseError::Unquotable(offending.to_string())
    })
}
