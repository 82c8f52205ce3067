//! Template tokenizer using nom.
//!
//! A template is raw SQL text with two kinds of tokens:
//!
//! ```text
//! select * from users where id={0} and name={N} and tag='{{x}}'
//!                              ─┬─          ─┬─         ──┬──
//!                               │            │            └── escaped braces, literal "{x}"
//!                               │            └── named token
//!                               └── indexed token
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, one_of},
    combinator::{map, value},
    multi::many0,
    sequence::delimited,
    IResult,
};

use crate::error::{PlaceError, PlaceResult};

/// One piece of a tokenized template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Plain SQL text.
    Text(&'a str),
    /// A literal brace, written `{{` or `}}` in the template (or a lone brace).
    Brace(char),
    /// `{N}`, a slot local to the statement.
    Index(usize),
    /// `{name}`, resolved against the whole tree.
    Name(&'a str),
}

impl Segment<'_> {
    /// The token as it appears in the template, e.g. `{0}` or `{NAME}`.
    pub fn token(&self) -> String {
        match self {
            Segment::Text(s) => s.to_string(),
            Segment::Brace(c) => c.to_string(),
            Segment::Index(i) => format!("{{{}}}", i),
            Segment::Name(n) => format!("{{{}}}", n),
        }
    }
}

/// Split a template into segments.
pub fn parse_template(input: &str) -> PlaceResult<Vec<Segment<'_>>> {
    match many0(segment)(input) {
        Ok(("", segments)) => Ok(segments),
        Ok((remaining, _)) => Err(PlaceError::template(
            input.len() - remaining.len(),
            format!("Unexpected content: '{}'", remaining),
        )),
        Err(e) => Err(PlaceError::template(0, format!("Tokenizing failed: {:?}", e))),
    }
}

fn segment(input: &str) -> IResult<&str, Segment<'_>> {
    alt((
        value(Segment::Brace('{'), tag("{{")),
        value(Segment::Brace('}'), tag("}}")),
        token,
        map(take_while1(|c: char| c != '{' && c != '}'), Segment::Text),
        map(one_of("{}"), Segment::Brace),
    ))(input)
}

/// Parse `{...}` into an indexed or named token.
fn token(input: &str) -> IResult<&str, Segment<'_>> {
    let (input, inner) = delimited(
        char('{'),
        take_while1(|c: char| c != '{' && c != '}'),
        char('}'),
    )(input)?;

    // `usize::from_str` accepts a leading '+', which is not an index here
    let segment = match inner.parse::<usize>() {
        Ok(index) if inner.bytes().all(|b| b.is_ascii_digit()) => Segment::Index(index),
        _ => Segment::Name(inner),
    };
    Ok((input, segment))
}

/// Serialize segments back to template text, escaping literal braces.
pub fn write_template(segments: &[Segment<'_>]) -> String {
    let mut out = String::new();
    for seg in segments {
        match seg {
            Segment::Text(s) => out.push_str(s),
            Segment::Brace('{') => out.push_str("{{"),
            Segment::Brace(_) => out.push_str("}}"),
            Segment::Index(_) | Segment::Name(_) => out.push_str(&seg.token()),
        }
    }
    out
}

/// Escape braces so `text` is taken literally inside a template.
pub fn escape(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

/// Rewrite every `{index}` token in `template` into `{name}`.
pub fn rename_index(template: &str, index: usize, name: &str) -> PlaceResult<String> {
    let segments: Vec<Segment<'_>> = parse_template(template)?
        .into_iter()
        .map(|seg| match seg {
            Segment::Index(i) if i == index => Segment::Name(name),
            other => other,
        })
        .collect();
    Ok(write_template(&segments))
}
