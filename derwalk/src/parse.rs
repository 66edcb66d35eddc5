//! Header-level DER parsing: identifier and length octets.

use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};

fn fail(i: &[u8]) -> Err<Error<&[u8]>> {
    Err::Error(Error::new(i, ErrorKind::Verify))
}

/// Parse the identifier octet. High tag numbers (low five bits all set)
/// do not occur in LDAP and are rejected.
pub fn parse_tag(i: &[u8]) -> IResult<&[u8], u8> {
    let (rest, tag) = be_u8(i)?;
    if tag & 0x1f == 0x1f {
        return Err(fail(i));
    }
    Ok((rest, tag))
}

/// Parse a definite length: short form below 0x80, long form with one to
/// four length octets. Indefinite lengths and longer prefixes are not DER
/// and are rejected.
pub fn parse_length(i: &[u8]) -> IResult<&[u8], usize> {
    let (rest, first) = be_u8(i)?;
    if first < 0x80 {
        return Ok((rest, first as usize));
    }
    let lenlen = (first & 0x7f) as usize;
    if lenlen == 0 || lenlen > 4 {
        return Err(fail(i));
    }
    let (rest, octets) = take(lenlen)(rest)?;
    let len = octets.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
    Ok((rest, len))
}

/// Parse a full element header, returning the identifier octet and the
/// content length. The number of header octets consumed can be recovered
/// by comparing slice lengths.
pub fn parse_header(i: &[u8]) -> IResult<&[u8], (u8, usize)> {
    let (rest, tag) = parse_tag(i)?;
    let (rest, len) = parse_length(rest)?;
    Ok((rest, (tag, len)))
}

/// Extract an unsigned integer value by big-endian concatenation of
/// content octets.
pub fn parse_uint(i: &[u8]) -> u64 {
    i.iter().fold(0, |res, &byte| (res << 8) | byte as u64)
}
