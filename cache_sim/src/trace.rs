use std::{fs::File, io::Read, path::Path};

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{hex_digit1, space0, space1, u8},
    combinator::{eof, opt},
    IResult,
};
use thiserror::Error;

use crate::hierarchy::{RefKind, Reference};

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("line {line}: expected `<op> <hex-address>`, found {content:?}")]
    Malformed { line: usize, content: String },
    #[error("line {line}: unknown reference type {op}")]
    UnknownKind { line: usize, op: u8 },
    #[error("line {line}: address {hex} does not fit in 64 bits")]
    AddressOverflow { line: usize, hex: String },
    #[error("failed to read trace: {0}")]
    Io(#[from] std::io::Error),
}

fn read_line(input: &str) -> IResult<&str, (u8, &str)> {
    let (input, _) = space0(input)?;
    let (input, op) = u8(input)?;
    let (input, _) = space1(input)?;
    let (input, _) = opt(alt((tag("0x"), tag("0X"))))(input)?;
    let (input, hex) = hex_digit1(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = eof(input)?;
    Ok((input, (op, hex)))
}

fn parse_line(line: usize, content: &str) -> Result<Reference, TraceError> {
    let (_, (op, hex)) = read_line(content).map_err(|_| TraceError::Malformed {
        line,
        content: content.to_string(),
    })?;
    let kind = RefKind::try_from(op).map_err(|_| TraceError::UnknownKind { line, op })?;
    let addr = u64::from_str_radix(hex, 16).map_err(|_| TraceError::AddressOverflow {
        line,
        hex: hex.to_string(),
    })?;
    Ok(Reference::new(kind, addr))
}

/// Parses a whole trace. Every line must be a reference; the first bad line
/// aborts with its 1-based line number.
pub fn parse(trace: &str) -> Result<Vec<Reference>, TraceError> {
    trace
        .lines()
        .enumerate()
        .map(|(index, content)| parse_line(index + 1, content))
        .collect()
}

pub fn read(path: impl AsRef<Path>) -> Result<Vec<Reference>, TraceError> {
    let mut buf = String::new();
    let mut file = File::open(path)?;
    file.read_to_string(&mut buf)?;
    let trace = parse(&buf)?;
    log::info!("finished parsing trace. # of references: {}", trace.len());
    Ok(trace)
}
