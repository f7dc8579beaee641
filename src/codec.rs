use bytes::BytesMut;
use memchr::memchr;
use tokio_util::codec::Decoder;

use crate::IngestError;

/// Upper bound on the pending partial-line buffer.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1 << 20;

/// One complete line of the decoded index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 1-based position in the file.
    pub number: u64,
    pub text: String,
    /// Decompressed bytes consumed up to and including this line.
    pub bytes_read: u64,
}

/// Splits a byte stream on `\n`, carrying partial lines across reads.
pub struct IndexLineCodec {
    charset: &'static encoding_rs::Encoding,
    max_line_length: usize,
    // Bytes of the pending buffer already scanned without finding a newline.
    next_index: usize,
    line_number: u64,
    bytes_read: u64,
}

impl IndexLineCodec {
    pub fn new(charset: &'static encoding_rs::Encoding) -> Self {
        Self::with_max_length(charset, DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_length(
        charset: &'static encoding_rs::Encoding,
        max_line_length: usize,
    ) -> Self {
        Self {
            charset,
            max_line_length,
            next_index: 0,
            line_number: 0,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn emit(&mut self, raw: BytesMut) -> RawLine {
        self.line_number += 1;
        self.bytes_read += raw.len() as u64;

        let mut body: &[u8] = &raw;
        if let Some(stripped) = body.strip_suffix(b"\n") {
            body = stripped;
        }
        if let Some(stripped) = body.strip_suffix(b"\r") {
            body = stripped;
        }

        // Lossy: malformed sequences become U+FFFD rather than failing the pass
        let (text, _had_errors) = self.charset.decode_without_bom_handling(body);
        RawLine {
            number: self.line_number,
            text: text.into_owned(),
            bytes_read: self.bytes_read,
        }
    }
}

impl Decoder for IndexLineCodec {
    type Item = RawLine;
    type Error = IngestError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match memchr(b'\n', &src[self.next_index..]) {
            Some(offset) => {
                let end = self.next_index + offset + 1;
                self.next_index = 0;
                let raw = src.split_to(end);
                Ok(Some(self.emit(raw)))
            }
            None => {
                self.next_index = src.len();
                if src.len() > self.max_line_length {
                    return Err(IngestError::LineTooLong {
                        line: self.line_number + 1,
                        max: self.max_line_length,
                    });
                }
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }

        // Final line without a trailing newline
        let raw = buf.split_to(buf.len());
        self.next_index = 0;
        Ok(Some(self.emit(raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(codec: &mut IndexLineCodec, buf: &mut BytesMut) -> Vec<RawLine> {
        let mut out = Vec::new();
        while let Some(line) = codec.decode(buf).unwrap() {
            out.push(line);
        }
        out
    }

    #[test]
    fn carries_partial_lines_across_reads() {
        let mut codec = IndexLineCodec::new(encoding_rs::UTF_8);
        let mut buf = BytesMut::from(&b"first|a\nsec"[..]);

        let lines = drain(&mut codec, &mut buf);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "first|a");
        assert_eq!(lines[0].number, 1);
        assert_eq!(&buf[..], b"sec");

        buf.extend_from_slice(b"ond|b\r\nthird");
        let lines = drain(&mut codec, &mut buf);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "second|b");
        assert_eq!(lines[0].bytes_read, 8 + 10);

        let last = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(last.text, "third");
        assert_eq!(last.number, 3);
        assert_eq!(codec.bytes_read(), 23);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn empty_lines_are_yielded() {
        let mut codec = IndexLineCodec::new(encoding_rs::UTF_8);
        let mut buf = BytesMut::from(&b"\n\nx\n"[..]);
        let texts: Vec<String> = drain(&mut codec, &mut buf)
            .into_iter()
            .map(|l| l.text)
            .collect();
        assert_eq!(texts, vec!["", "", "x"]);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn rejects_overlong_pending_line() {
        let mut codec = IndexLineCodec::with_max_length(encoding_rs::UTF_8, 4);
        let mut buf = BytesMut::from(&b"abcdefgh"[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, IngestError::LineTooLong { line: 1, max: 4 }));
    }

    #[test]
    fn decodes_legacy_charset() {
        let mut codec = IndexLineCodec::new(encoding_rs::WINDOWS_1252);
        let mut buf = BytesMut::from(&b"SOCI\xc9T\xc9\n"[..]);
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(line.text, "SOCIÉTÉ");
    }
}
