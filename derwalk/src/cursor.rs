use bytes::{Bytes, BytesMut};

/// A non-owning view of DER bytes.
///
/// A cursor is either a window over some buffer or *null*, the marker for
/// an absent optional field. Null is distinct from a present view of zero
/// length: an empty OCTET STRING parses to an empty cursor, a missing one
/// to a null cursor. Clones are cheap and alias the same buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    buf: Option<Bytes>,
}

impl Cursor {
    /// The absent-field marker.
    pub fn null() -> Cursor {
        Cursor { buf: None }
    }

    /// A cursor over a static byte string.
    pub fn from_static(bytes: &'static [u8]) -> Cursor {
        Cursor {
            buf: Some(Bytes::from_static(bytes)),
        }
    }

    pub fn is_null(&self) -> bool {
        self.buf.is_none()
    }

    /// Length of the view; zero for null cursors.
    pub fn len(&self) -> usize {
        self.buf.as_ref().map_or(0, Bytes::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The viewed bytes; empty for null cursors.
    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_ref().map_or(&[], |b| b.as_ref())
    }

    /// The first viewed byte, if any.
    pub fn first(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }

    /// Drop the first `n` bytes from the view.
    pub fn advance(&mut self, n: usize) {
        if let Some(ref mut b) = self.buf {
            let n = n.min(b.len());
            *b = b.slice(n..);
        }
    }

    /// The underlying buffer handle; empty for null cursors.
    pub fn to_bytes(&self) -> Bytes {
        self.buf.clone().unwrap_or_else(Bytes::new)
    }
}

impl From<Bytes> for Cursor {
    fn from(b: Bytes) -> Cursor {
        Cursor { buf: Some(b) }
    }
}

impl From<BytesMut> for Cursor {
    fn from(b: BytesMut) -> Cursor {
        Cursor {
            buf: Some(b.freeze()),
        }
    }
}

impl From<Vec<u8>> for Cursor {
    fn from(v: Vec<u8>) -> Cursor {
        Cursor {
            buf: Some(Bytes::from(v)),
        }
    }
}

impl AsRef<[u8]> for Cursor {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
