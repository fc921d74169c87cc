use crate::error::ParseError;
use crate::lexer;

/// One program invocation within a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Program name; never empty.
    pub program: String,
    pub arguments: Vec<String>,
}

impl Stage {
    pub fn new(program: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            program: program.into(),
            arguments,
        }
    }

    /// Quotes the stage back into command-line syntax.
    pub fn to_command_line(&self) -> Result<String, ParseError> {
        let mut words = Vec::with_capacity(self.arguments.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.arguments.iter().map(String::as_str));
        lexer::join_words(&words)
    }
}

/// Stages connected left to right; stage `i` writes into stage `i + 1`.
///
/// A `Pipeline` always holds at least one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false: parsing never yields a pipeline without stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn to_command_line(&self) -> Result<String, ParseError> {
        let stages = self
            .stages
            .iter()
            .map(Stage::to_command_line)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stages.join(" | "))
    }
}

fn parse_stage(index: usize, raw: &str) -> Result<Stage, ParseError> {
    let mut words = lexer::split_words(raw.trim())?.into_iter();
    let program = words.next().ok_or(ParseError::EmptyStage { index })?;
    if program.is_empty() {
        return Err(ParseError::EmptyProgram { index });
    }
    Ok(Stage::new(program, words.collect()))
}

/// Parses a command line into a pipeline.
///
/// Returns `Ok(None)` for an empty or blank line. Stage indices in errors are
/// zero-based.
pub fn parse_pipeline(line: &str) -> Result<Option<Pipeline>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let stages = lexer::split_on_pipes(line)?
        .iter()
        .enumerate()
        .map(|(index, raw)| parse_stage(index, raw))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Pipeline { stages }))
}
