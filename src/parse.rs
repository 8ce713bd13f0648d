//! Line tokenizer: whitespace-separated words with quote grouping,
//! `|` stage separators, `<`/`>` redirections and a trailing `&`.

use std::path::PathBuf;

use thiserror::Error;

use crate::command::{Command, Pipeline};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("syntax error near '|'")]
    EmptyStage,
    #[error("missing filename after '{0}'")]
    MissingTarget(char),
    #[error("duplicate {0} redirection")]
    DuplicateRedirect(&'static str),
    #[error("unterminated quote")]
    UnterminatedQuote,
    #[error("'&' is only allowed at the end of a line")]
    MisplacedAmpersand,
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Word(String),
    Pipe,
    RedirIn,
    RedirOut,
    Background,
}

fn flush(tokens: &mut Vec<Token>, word: &mut String, in_word: &mut bool) {
    if *in_word {
        tokens.push(Token::Word(std::mem::take(word)));
        *in_word = false;
    }
}

fn tokenize(line: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                // quotes group, strip, and may produce an empty word
                in_word = true;
                loop {
                    match chars.next() {
                        Some(q) if q == c => break,
                        Some(other) => word.push(other),
                        None => return Err(ParseError::UnterminatedQuote),
                    }
                }
            }
            '|' | '<' | '>' | '&' => {
                flush(&mut tokens, &mut word, &mut in_word);
                tokens.push(match c {
                    '|' => Token::Pipe,
                    '<' => Token::RedirIn,
                    '>' => Token::RedirOut,
                    _ => Token::Background,
                });
            }
            c if c.is_whitespace() => flush(&mut tokens, &mut word, &mut in_word),
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }
    flush(&mut tokens, &mut word, &mut in_word);
    Ok(tokens)
}

/// Parse one input line. `Ok(None)` means the line held nothing to run.
pub fn parse_line(line: &str) -> Result<Option<Pipeline>, ParseError> {
    let mut tokens = tokenize(line)?;
    if tokens.is_empty() {
        return Ok(None);
    }

    let detached = if tokens.last() == Some(&Token::Background) {
        tokens.pop();
        true
    } else {
        false
    };
    if tokens.is_empty() {
        return Err(ParseError::EmptyStage);
    }

    let mut commands = Vec::new();
    let mut argv: Vec<String> = Vec::new();
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;

    let mut it = tokens.into_iter();
    while let Some(tok) = it.next() {
        match tok {
            Token::Word(w) => argv.push(w),
            Token::RedirIn => {
                if input.is_some() {
                    return Err(ParseError::DuplicateRedirect("input"));
                }
                match it.next() {
                    Some(Token::Word(w)) => input = Some(PathBuf::from(w)),
                    _ => return Err(ParseError::MissingTarget('<')),
                }
            }
            Token::RedirOut => {
                if output.is_some() {
                    return Err(ParseError::DuplicateRedirect("output"));
                }
                match it.next() {
                    Some(Token::Word(w)) => output = Some(PathBuf::from(w)),
                    _ => return Err(ParseError::MissingTarget('>')),
                }
            }
            Token::Pipe => {
                if argv.is_empty() {
                    return Err(ParseError::EmptyStage);
                }
                commands.push(Command {
                    argv: std::mem::take(&mut argv),
                    input: input.take(),
                    output: output.take(),
                    detached: false,
                });
            }
            Token::Background => return Err(ParseError::MisplacedAmpersand),
        }
    }
    if argv.is_empty() {
        return Err(ParseError::EmptyStage);
    }
    commands.push(Command {
        argv,
        input,
        output,
        detached,
    });
    Ok(Some(Pipeline::new(commands)))
}
