//! Frame reassembly: turning the byte stream into whole DER messages.
//!
//! One LDAPMessage is one top-level DER SEQUENCE. Six octets of header
//! scratch are enough to size any frame this crate accepts, since the
//! length prefix is limited to four length octets. The reassembly state
//! lives on the endpoint and survives arbitrarily fragmented reads.

use std::io;

use derwalk::Cursor;
use log::trace;

use crate::endpoint::Endpoint;
use crate::mem::Pool;
use crate::result::{Error, Result};

impl Endpoint {
    /// Drive one tick of the read side: collect bytes for the current
    /// frame and, once complete, hand it to the `get_dercursor` stage,
    /// then go back for more.
    ///
    /// The return value follows `read` conventions: a positive count of
    /// bytes taken this tick, zero for end of stream, and `Retry` when a
    /// non-blocking transport has nothing yet. Short reads are not
    /// errors; the partial frame is picked up on the next call.
    pub fn get_event(&mut self) -> Result<usize> {
        let cfg = self.config().clone();
        loop {
            // Stage 1: a query pool for this frame's allocations.
            if self.get_qpool.is_none() {
                match Pool::new() {
                    Ok(p) => {
                        self.get_qpool = Some(p);
                        self.get_gotten = 0;
                        self.get_total = 0;
                        self.get_buf = None;
                    }
                    Err(e) => return self.record(e),
                }
            }
            // Stage 2: collect six octets and size the frame from them.
            if self.get_gotten < 6 {
                let gotten = self.get_gotten;
                let src = match self.source.as_mut() {
                    Some(s) => s,
                    None => return self.bail(Error::Unsupported("no input transport attached")),
                };
                let n = match src.read(&mut self.get_head[gotten..6]) {
                    Ok(0) => return Ok(0),
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Err(Error::Retry),
                    Err(e) => return self.record(Error::Io(e)),
                };
                self.get_gotten += n;
                if self.get_gotten < 6 {
                    return Ok(n);
                }
                let tag = self.get_head[0];
                let first = self.get_head[1] as usize;
                let mut hlen = 2usize;
                let mut len = first;
                if first > 0x84 {
                    return self.bail(Error::Malformed("length of length above four octets"));
                }
                if first >= 0x80 {
                    let lenlen = first & 0x7f;
                    hlen += lenlen;
                    len = self.get_head[2..2 + lenlen]
                        .iter()
                        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
                }
                if tag != 0x30 || hlen + len < 6 {
                    return self.bail(Error::Malformed("not an LDAPMessage frame"));
                }
                let total = hlen + len;
                trace!("get: frame of {} octets", total);
                self.get_total = total;
                let mut buf = {
                    let pool = self.get_qpool.as_mut().expect("query pool");
                    match pool.alloc_zeroed(total) {
                        Ok(b) => b,
                        Err(e) => return self.bail(e),
                    }
                };
                buf[..6].copy_from_slice(&self.get_head);
                self.get_buf = Some(buf);
            }
            // Stage 3: fill the remainder of the frame.
            if self.get_gotten < self.get_total {
                let gotten = self.get_gotten;
                let total = self.get_total;
                let src = match self.source.as_mut() {
                    Some(s) => s,
                    None => return self.bail(Error::Unsupported("no input transport attached")),
                };
                let buf = self.get_buf.as_mut().expect("frame buffer");
                let n = match src.read(&mut buf[gotten..total]) {
                    Ok(0) => return Ok(0),
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Err(Error::Retry),
                    Err(e) => return self.record(Error::Io(e)),
                };
                self.get_gotten += n;
                if self.get_gotten < total {
                    return Ok(n);
                }
            }
            // Stage 4: hand the frame and the pool downstream. The stage
            // owns the pool from here, on success and on failure alike.
            let stage = match cfg.get_dercursor {
                Some(s) => s,
                None => return self.bail(Error::Unsupported("no get_dercursor stage")),
            };
            let pool = self.get_qpool.take().expect("query pool");
            let frame = Cursor::from(self.get_buf.take().expect("frame buffer"));
            self.get_gotten = 0;
            self.get_total = 0;
            stage(self, pool, frame)?;
            // Stage 5: cycle back for more.
        }
    }

    // A framing error gives up on the current frame and its pool.
    fn bail<T>(&mut self, e: Error) -> Result<T> {
        if let Some(p) = self.get_qpool.take() {
            p.end();
        }
        self.get_buf = None;
        self.get_gotten = 0;
        self.get_total = 0;
        self.record(e)
    }
}
