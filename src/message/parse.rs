//! Nom-based wire message parser.
//!
//! Splits a single line into tags, prefix, command, middle parameters,
//! and the trailing parameter. Tag values are left in their wire-escaped
//! form.

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::Error as NomError,
    sequence::preceded,
    IResult,
};

use super::{tags, Message, Prefix};
use crate::error::MessageParseError;

type ParseResult<'a, O> = IResult<&'a str, O, NomError<&'a str>>;

/// Tags section: the part after `@` and before the first space.
fn parse_tags(input: &str) -> ParseResult<'_, &str> {
    preceded(char('@'), take_until(" "))(input)
}

/// Prefix: the part after `:` and before the first space.
fn parse_prefix(input: &str) -> ParseResult<'_, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Command name: a verb or a numeric reply code.
fn parse_command(input: &str) -> ParseResult<'_, &str> {
    take_while1(|c: char| c.is_alphanumeric())(input)
}

fn parse_line(input: &str) -> ParseResult<'_, Message> {
    let (input, raw_tags) = opt(parse_tags)(input)?;
    let (input, _) = space0(input)?;

    let (input, raw_prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;

    let (input, command) = parse_command(input)?;

    // Parameters: space-delimited middles until a `:`-led trailing.
    let mut params: Vec<String> = Vec::new();
    let mut trailing: Option<String> = None;
    let mut rest = input;

    while let Some(stripped) = rest.strip_prefix(' ') {
        rest = stripped;

        if let Some(after_colon) = rest.strip_prefix(':') {
            trailing = Some(after_colon.to_string());
            rest = "";
            break;
        }

        let end = rest.find(' ').unwrap_or(rest.len());
        if end == 0 {
            break;
        }
        params.push(rest[..end].to_string());
        rest = &rest[end..];
    }

    Ok((
        rest,
        Message {
            tags: raw_tags.map(tags::split_tags).unwrap_or_default(),
            prefix: raw_prefix.map(Prefix::parse),
            command: command.to_string(),
            params,
            trailing,
        },
    ))
}

/// Parse a complete line into a [`Message`].
///
/// The line terminator, if still attached, is stripped first.
pub(super) fn parse_message(line: &str) -> Result<Message, MessageParseError> {
    if line.is_empty() {
        return Err(MessageParseError::EmptyMessage);
    }

    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.is_empty() {
        return Err(MessageParseError::EmptyMessage);
    }

    match parse_line(trimmed) {
        Ok((_remaining, msg)) => Ok(msg),
        Err(_) => Err(MessageParseError::InvalidCommand),
    }
}
