use encoding_rs::SHIFT_JIS;
use nom::error::{Error, ErrorKind};
use nom::{bytes, number, IResult, Parser};

/// Longest variable-length quantity allowed by SMF (28 bits of payload).
const MAX_VLQ_BYTES: usize = 4;

/// Parse unsigned byte
pub fn parse_u8(i: &[u8]) -> IResult<&[u8], u8> {
    number::complete::be_u8(i)
}

/// Parse big-endian unsigned short
pub fn parse_u16(i: &[u8]) -> IResult<&[u8], u16> {
    number::complete::be_u16(i)
}

/// Parse big-endian unsigned 32
pub fn parse_u32(i: &[u8]) -> IResult<&[u8], u32> {
    number::complete::be_u32(i)
}

/// Parse a 4 bytes chunk tag such as `MThd`.
pub fn parse_chunk_tag(i: &[u8]) -> IResult<&[u8], [u8; 4]> {
    let (i, tag) = bytes::complete::take(4usize)(i)?;
    Ok((i, [tag[0], tag[1], tag[2], tag[3]]))
}

/// Parse a chunk header: tag followed by the big-endian data length.
pub fn parse_chunk_header(i: &[u8]) -> IResult<&[u8], ([u8; 4], u32)> {
    (parse_chunk_tag, parse_u32).parse(i)
}

/// Take `n` bytes, failing on truncated input.
pub fn take_bytes(n: usize) -> impl FnMut(&[u8]) -> IResult<&[u8], &[u8]> {
    move |i: &[u8]| bytes::complete::take(n)(i)
}

/// Skip `n` bytes, failing on truncated input.
pub fn skip(i: &[u8], n: usize) -> IResult<&[u8], ()> {
    log::debug!("skip: {n}");
    let (i, _) = bytes::complete::take(n)(i)?;
    Ok((i, ()))
}

/// Variable-length quantity: 7 bits per byte, big-endian, high bit set on every byte but the last.
pub fn parse_vlq(i: &[u8]) -> IResult<&[u8], u32> {
    let mut value: u32 = 0;
    let mut rest = i;
    for _ in 0..MAX_VLQ_BYTES {
        let (inner, byte) = parse_u8(rest)?;
        rest = inner;
        value = (value << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((rest, value));
        }
    }
    log::debug!("variable-length quantity longer than {MAX_VLQ_BYTES} bytes");
    Err(nom::Err::Failure(Error::new(i, ErrorKind::TooLarge)))
}

/// Big-endian integer made of all the given bytes.
pub fn be_value(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Materialize properly encoded String
pub fn make_string(i: &[u8]) -> String {
    match std::str::from_utf8(i) {
        Ok(s) => s.to_string(),
        Err(e) => {
            log::debug!("Not a UTF-8 string ({e}), trying Shift_JIS");
            let (cow, encoding_used, had_errors) = SHIFT_JIS.decode(i);
            if had_errors {
                log::debug!("Error parsing string with {encoding_used:?}");
            }
            cow.to_string()
        }
    }
}
