use bytes::{BufMut, Bytes, BytesMut};

/// ICY (Shoutcast-derived) metadata interleaving, per §4.6.
///
/// When enabled and the client opts in (`Icy-MetaData: 1`), every
/// `icy_metaint` bytes of audio payload is followed by a one-byte length
/// prefix (in 16-byte blocks) plus the padded metadata block itself. A
/// length of `0` means "no metadata this cycle" and carries no further
/// bytes — the common case, since most cycles don't carry fresh metadata.
pub struct IcyInterleaver {
    metaint: usize,
    bytes_since_marker: usize,
    current_metadata: Bytes,
}

impl IcyInterleaver {
    #[must_use]
    pub fn new(metaint: usize) -> Self {
        Self {
            metaint,
            bytes_since_marker: 0,
            current_metadata: Bytes::new(),
        }
    }

    /// Replaces the metadata string announced at the next marker, called by
    /// the HTTP handler on every chunk with whatever
    /// [`crate::mux::ProducerMux::title`] currently reports — the
    /// passthrough from the current producer required by §4.6.
    ///
    /// Formatted as `StreamTitle='...';` per the Shoutcast convention; an
    /// empty `title` clears any pending announcement, per §4.6's
    /// passthrough-or-empty contract.
    pub fn set_metadata(&mut self, title: &str) {
        self.current_metadata = if title.is_empty() {
            Bytes::new()
        } else {
            Bytes::from(format!("StreamTitle='{title}';"))
        };
    }

    /// Interleaves metadata markers into `chunk`, returning the bytes to
    /// write to the client in place of the raw chunk.
    ///
    /// `metaint` is assumed larger than any single chunk in practice
    /// (§6's configured range starts at several kilobytes); chunks that
    /// cross more than one boundary are handled by looping, so the
    /// invariant holds regardless.
    pub fn interleave(&mut self, chunk: &[u8]) -> Bytes {
        if self.metaint == 0 {
            return Bytes::copy_from_slice(chunk);
        }

        let mut out = BytesMut::with_capacity(chunk.len() + 32);
        let mut offset = 0;
        while offset < chunk.len() {
            let until_marker = self.metaint - self.bytes_since_marker;
            let take = until_marker.min(chunk.len() - offset);
            out.put_slice(&chunk[offset..offset + take]);
            offset += take;
            self.bytes_since_marker += take;

            if self.bytes_since_marker == self.metaint {
                out.put_slice(&self.metadata_marker());
                self.bytes_since_marker = 0;
            }
        }
        out.freeze()
    }

    fn metadata_marker(&self) -> Bytes {
        if self.current_metadata.is_empty() {
            return Bytes::from_static(&[0u8]);
        }

        let blocks = (self.current_metadata.len() + 15) / 16;
        let padded_len = blocks * 16;
        let mut block = BytesMut::with_capacity(1 + padded_len);
        block.put_u8(blocks as u8);
        block.put_slice(&self.current_metadata);
        block.resize(1 + padded_len, 0);
        block.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_marker_until_metaint_bytes_pass() {
        let mut icy = IcyInterleaver::new(8);
        let out = icy.interleave(b"1234567");
        assert_eq!(out.as_ref(), b"1234567");
    }

    #[test]
    fn inserts_zero_length_marker_when_no_metadata_set() {
        let mut icy = IcyInterleaver::new(4);
        let out = icy.interleave(b"abcd");
        assert_eq!(out.as_ref(), b"abcd\x00");
    }

    #[test]
    fn inserts_padded_metadata_block_when_set() {
        let mut icy = IcyInterleaver::new(4);
        icy.set_metadata("hi");
        let out = icy.interleave(b"abcd");
        // "StreamTitle='hi';" is 18 bytes -> 2 blocks of 16 = 32 bytes, length byte = 2.
        assert_eq!(out[4], 2);
        assert_eq!(out.len(), 4 + 1 + 32);
        assert!(out[5..].starts_with(b"StreamTitle='hi';"));
    }

    #[test]
    fn handles_chunk_spanning_multiple_markers() {
        let mut icy = IcyInterleaver::new(2);
        let out = icy.interleave(b"abcd");
        // markers after byte 2 and byte 4, both zero-length (no metadata set).
        assert_eq!(out.as_ref(), b"ab\x00cd\x00");
    }
}
