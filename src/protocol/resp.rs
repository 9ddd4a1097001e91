//! RESP2 request decoder and reply encoder
//!
//! Requests are decoded straight into the command name + argument list the
//! dispatcher consumes. Replies are encoded from `RespValue`.

use super::types::{RespValue, RespError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const CRLF: &[u8] = b"\r\n";

/// Upper bound on the number of elements of a multibulk request
const MAX_MULTIBULK_LEN: i64 = 1024 * 1024;

/// Upper bound on a single bulk argument (512 MiB, as Redis)
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Upper bound on an inline request line
const MAX_INLINE_LEN: usize = 64 * 1024;

/// Length headers never need more than this many bytes before the CRLF
const MAX_HEADER_LEN: usize = 32;

/// RESP2 request decoder
pub struct RespParser;

impl RespParser {
    /// Decode one request from the front of `buf`
    ///
    /// Returns Ok(Some(args)) and consumes the request when it is complete,
    /// Ok(None) without consuming anything when more data is needed.
    /// A blank inline line decodes to an empty request.
    pub fn parse_request(buf: &mut BytesMut) -> Result<Option<Vec<Bytes>>, RespError> {
        if buf.is_empty() {
            return Ok(None);
        }

        if buf[0] == b'*' {
            Self::parse_multibulk(buf)
        } else {
            Self::parse_inline(buf)
        }
    }

    /// *2\r\n$3\r\nGET\r\n$3\r\nkey\r\n
    fn parse_multibulk(buf: &mut BytesMut) -> Result<Option<Vec<Bytes>>, RespError> {
        let (count, mut pos) = match Self::read_header(buf, 0)? {
            Some(header) => header,
            None => return Ok(None),
        };

        if count <= 0 {
            // *0 and *-1 carry no command
            buf.advance(pos);
            return Ok(Some(Vec::new()));
        }
        if count > MAX_MULTIBULK_LEN {
            return Err(RespError::TooLarge);
        }

        // Locate every argument before consuming anything so a partial
        // request stays in the buffer untouched.
        let mut spans = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if pos >= buf.len() {
                return Ok(None);
            }
            if buf[pos] != b'$' {
                return Err(RespError::InvalidProtocol(format!(
                    "expected '$', got '{}'",
                    buf[pos] as char
                )));
            }

            let (len, start) = match Self::read_header(buf, pos)? {
                Some(header) => header,
                None => return Ok(None),
            };
            if len < 0 {
                return Err(RespError::InvalidLength);
            }
            if len > MAX_BULK_LEN {
                return Err(RespError::TooLarge);
            }

            let end = start + len as usize;
            if buf.len() < end + 2 {
                return Ok(None);
            }
            if &buf[end..end + 2] != CRLF {
                return Err(RespError::InvalidProtocol(
                    "Missing CRLF after bulk string data".to_string(),
                ));
            }

            spans.push((start, end));
            pos = end + 2;
        }

        let frame = buf.split_to(pos).freeze();
        Ok(Some(spans.into_iter().map(|(s, e)| frame.slice(s..e)).collect()))
    }

    /// PING\r\n, as typed in a telnet session
    fn parse_inline(buf: &mut BytesMut) -> Result<Option<Vec<Bytes>>, RespError> {
        let newline = match buf.iter().position(|&b| b == b'\n') {
            Some(i) => i,
            None if buf.len() > MAX_INLINE_LEN => return Err(RespError::TooLarge),
            None => return Ok(None),
        };

        let line = buf.split_to(newline + 1).freeze();
        let args = line[..newline]
            .split(|b| b.is_ascii_whitespace())
            .filter(|word| !word.is_empty())
            .map(|word| line.slice_ref(word))
            .collect();

        Ok(Some(args))
    }

    /// Read a `<prefix><number>\r\n` header starting at `start`
    ///
    /// Returns the number and the position right after the CRLF.
    fn read_header(buf: &BytesMut, start: usize) -> Result<Option<(i64, usize)>, RespError> {
        let rest = &buf[start..];
        let line_end = match rest.windows(2).position(|w| w == CRLF) {
            Some(i) => i,
            None if rest.len() > MAX_HEADER_LEN => return Err(RespError::InvalidLength),
            None => return Ok(None),
        };

        let digits = std::str::from_utf8(&rest[1..line_end]).map_err(|_| RespError::InvalidLength)?;
        let n = digits.parse::<i64>().map_err(|_| RespError::InvalidLength)?;

        Ok(Some((n, start + line_end + 2)))
    }
}

/// RESP2 Encoder
pub struct RespEncoder;

impl RespEncoder {
    /// Encode a RESP value to bytes
    pub fn encode(value: &RespValue) -> Bytes {
        let mut buf = BytesMut::new();
        Self::encode_to(&mut buf, value);
        buf.freeze()
    }

    /// Encode a RESP value into an existing buffer
    pub fn encode_to(buf: &mut BytesMut, value: &RespValue) {
        match value {
            RespValue::SimpleString(s) => {
                buf.put_u8(b'+');
                Self::put_inline(buf, s);
            }
            RespValue::Error(e) => {
                buf.put_u8(b'-');
                Self::put_inline(buf, e);
            }
            RespValue::Integer(i) => {
                buf.put_u8(b':');
                buf.put_slice(i.to_string().as_bytes());
                buf.put_slice(CRLF);
            }
            RespValue::BulkString(bytes) => {
                buf.put_u8(b'$');
                buf.put_slice(bytes.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                buf.put_slice(bytes);
                buf.put_slice(CRLF);
            }
            RespValue::Null => {
                buf.put_slice(b"$-1\r\n");
            }
            RespValue::NullArray => {
                buf.put_slice(b"*-1\r\n");
            }
            RespValue::Array(arr) => {
                buf.put_u8(b'*');
                buf.put_slice(arr.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                for elem in arr {
                    Self::encode_to(buf, elem);
                }
            }
        }
    }

    /// Status and error lines cannot carry CR or LF
    fn put_inline(buf: &mut BytesMut, s: &str) {
        for b in s.bytes() {
            buf.put_u8(if b == b'\r' || b == b'\n' { b' ' } else { b });
        }
        buf.put_slice(CRLF);
    }
}
