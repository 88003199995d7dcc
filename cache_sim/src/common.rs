//! Hex strings as they appear on the command line and in memory images.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::hex_digit1,
    combinator::{all_consuming, opt},
    sequence::preceded,
    IResult,
};
use thiserror::Error;

use crate::memory::Addr;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseHexError {
    #[error("`{0}` is not a hexadecimal value")]
    Malformed(String),
    #[error("`{input}` does not fit in {bits} bits")]
    TooWide { input: String, bits: u32 },
}

/// `0x1F`, `0X1f` or `1f`.
fn hex_literal(input: &str) -> IResult<&str, &str> {
    all_consuming(preceded(opt(alt((tag("0x"), tag("0X")))), hex_digit1))(input)
}

pub fn parse_hex(input: &str) -> Result<usize, ParseHexError> {
    let input = input.trim();
    let (_, digits) =
        hex_literal(input).map_err(|_| ParseHexError::Malformed(input.to_owned()))?;
    usize::from_str_radix(digits, 16).map_err(|_| ParseHexError::TooWide {
        input: input.to_owned(),
        bits: usize::BITS,
    })
}

pub fn parse_addr(input: &str) -> Result<Addr, ParseHexError> {
    parse_hex(input).map(Addr::new)
}

pub fn parse_byte(input: &str) -> Result<u8, ParseHexError> {
    let v = parse_hex(input)?;
    u8::try_from(v).map_err(|_| ParseHexError::TooWide {
        input: input.trim().to_owned(),
        bits: u8::BITS,
    })
}
