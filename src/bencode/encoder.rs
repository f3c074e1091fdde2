pub trait BencodeEncode {
    fn bencode(&self, buf: &mut Vec<u8>);
}

impl BencodeEncode for i64 {
    fn bencode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(b"i");

        let mut buffer = itoa::Buffer::new();
        buf.extend_from_slice(buffer.format(*self).as_bytes());
        buf.extend_from_slice(b"e");
    }
}

impl BencodeEncode for u32 {
    fn bencode(&self, buf: &mut Vec<u8>) {
        i64::from(*self).bencode(buf);
    }
}

impl BencodeEncode for &[u8] {
    fn bencode(&self, buf: &mut Vec<u8>) {
        let mut buffer = itoa::Buffer::new();
        buf.extend_from_slice(buffer.format(self.len()).as_bytes());
        buf.extend_from_slice(b":");
        buf.extend_from_slice(self);
    }
}

impl BencodeEncode for &str {
    fn bencode(&self, buf: &mut Vec<u8>) {
        self.as_bytes().bencode(buf);
    }
}

/// Info hashes and peer ids are raw 20-byte strings.
impl BencodeEncode for [u8; 20] {
    fn bencode(&self, buf: &mut Vec<u8>) {
        self.as_slice().bencode(buf);
    }
}

/// Writes a dictionary entry by entry.
///
/// Bencode requires keys in ascending byte order; callers add them in that
/// order and debug builds check it.
pub struct DictWriter<'a> {
    buf: &'a mut Vec<u8>,
    #[cfg(debug_assertions)]
    last_key: Option<Vec<u8>>,
}

impl<'a> DictWriter<'a> {
    pub fn begin(buf: &'a mut Vec<u8>) -> Self {
        buf.extend_from_slice(b"d");
        Self {
            buf,
            #[cfg(debug_assertions)]
            last_key: None,
        }
    }

    pub fn entry<K: AsRef<[u8]>, V: BencodeEncode + ?Sized>(&mut self, key: K, value: &V) -> &mut Self {
        let key = key.as_ref();

        #[cfg(debug_assertions)]
        {
            debug_assert!(
                self.last_key.as_deref().map_or(true, |last| last < key),
                "bencode dictionary keys out of order"
            );
            self.last_key = Some(key.to_vec());
        }

        key.bencode(self.buf);
        value.bencode(self.buf);
        self
    }

    /// Write the key and let the caller encode the value directly.
    pub fn key<K: AsRef<[u8]>>(&mut self, key: K) -> &mut Vec<u8> {
        let key = key.as_ref();

        #[cfg(debug_assertions)]
        {
            debug_assert!(
                self.last_key.as_deref().map_or(true, |last| last < key),
                "bencode dictionary keys out of order"
            );
            self.last_key = Some(key.to_vec());
        }

        key.bencode(self.buf);
        &mut *self.buf
    }

    pub fn end(self) {
        self.buf.extend_from_slice(b"e");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_integer() {
        let mut buf = Vec::new();
        42i64.bencode(&mut buf);
        assert_eq!(buf, b"i42e");

        let mut buf = Vec::new();
        (-42i64).bencode(&mut buf);
        assert_eq!(buf, b"i-42e");

        let mut buf = Vec::new();
        u32::MAX.bencode(&mut buf);
        assert_eq!(buf, b"i4294967295e");
    }

    #[test]
    fn test_encode_bytes() {
        let mut buf = Vec::new();
        b"hello".as_slice().bencode(&mut buf);
        assert_eq!(buf, b"5:hello");

        let mut buf = Vec::new();
        b"".as_slice().bencode(&mut buf);
        assert_eq!(buf, b"0:");
    }

    #[test]
    fn test_encode_info_hash() {
        let mut buf = Vec::new();
        [0xffu8; 20].bencode(&mut buf);
        assert_eq!(&buf[..3], b"20:");
        assert_eq!(buf.len(), 23);
    }

    #[test]
    fn test_dict_writer() {
        let mut buf = Vec::new();
        let mut dict = DictWriter::begin(&mut buf);
        dict.entry("complete", &3u32).entry("interval", &1800i64);
        dict.entry("peers", &b"\x7f\x00\x00\x01\x1a\xe1".as_slice());
        dict.end();

        assert_eq!(buf, b"d8:completei3e8:intervali1800e5:peers6:\x7f\x00\x00\x01\x1a\xe1e");
    }

    #[test]
    fn test_dict_writer_nested() {
        let mut buf = Vec::new();
        let mut outer = DictWriter::begin(&mut buf);
        let mut inner = DictWriter::begin(outer.key("files"));
        inner.entry("a", &1i64);
        inner.end();
        outer.end();

        assert_eq!(buf, b"d5:filesd1:ai1eee");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of order")]
    fn test_dict_writer_rejects_unsorted_keys() {
        let mut buf = Vec::new();
        let mut dict = DictWriter::begin(&mut buf);
        dict.entry("peers", &0i64).entry("complete", &0i64);
    }
}
