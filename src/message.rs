//! Shallow LDAPMessage handling: split on the way in, reassemble on the
//! way out.
//!
//! The full LDAPMessage grammar fans out into every operation variant at
//! once, which is more than most layers want to know. This stage stays
//! shallow: message id, the operation as one raw element, and the
//! controls. Rejecting an operation, or passing it through unchanged,
//! then costs nothing more than this split.
//!
//! The controls cursor carries the content octets of the `[0]` wrapper
//! in both directions; the encoder puts the implicit wrapper back, so a
//! split-and-reassemble round trip reproduces the input exactly.

use derwalk::Walk::{self, Enter, Leave, Optional, Store, StoreAny};
use derwalk::{pack_int32, pack_len, pack_tail, parse_uint, unpack, Cursor};
use log::trace;

use crate::endpoint::Endpoint;
use crate::mem::Pool;
use crate::result::{Error, Result};
use crate::MsgId;

// SEQUENCE { messageID INTEGER, protocolOp ANY, controls [0] OPTIONAL }
static LDAPMESSAGE_SHALLOW: &[Walk] = &[
    Enter(0x30),
    Store(0x02),
    StoreAny,
    Optional,
    Store(0xa0),
    Leave,
];

// Fold the INTEGER content and insist on 1..=2^31-1. The high bit is
// reserved for this endpoint's own outbound exchanges and must be clear
// on the wire.
fn message_id(c: &Cursor) -> Option<MsgId> {
    let b = c.as_slice();
    if b.is_empty() || b.len() > 5 || (b.len() == 5 && b[0] != 0) {
        return None;
    }
    let v = parse_uint(b);
    if v == 0 || v > 0x7fff_ffff {
        return None;
    }
    Some(v as MsgId)
}

/// Stage: shallowly take one framed LDAPMessage apart and forward the
/// message id, the raw operation element and the controls.
pub fn get_dercursor(lil: &mut Endpoint, pool: Pool, msg: Cursor) -> Result<()> {
    let mut fields = [Cursor::null(), Cursor::null(), Cursor::null()];
    if let Err(e) = unpack(LDAPMESSAGE_SHALLOW, &msg, &mut fields) {
        pool.end();
        return lil.record(e.into());
    }
    let msgid = match message_id(&fields[0]) {
        Some(id) => id,
        None => {
            pool.end();
            return lil.record(Error::Malformed("message id out of range"));
        }
    };
    let [_, op, controls] = fields;
    trace!("get: msgid {} op {:#04x}", msgid, op.first().unwrap_or(0));
    let stage = match lil.config().get_ldapmessage {
        Some(s) => s,
        None => {
            pool.end();
            return lil.record(Error::Unsupported("no get_ldapmessage stage"));
        }
    };
    stage(lil, pool, msgid, op, controls)
}

/// Stage: the shallow inverse — pack a ready-made operation element and
/// controls into one LDAPMessage and pass the frame down.
pub fn put_ldapmessage(
    lil: &mut Endpoint,
    mut pool: Pool,
    msgid: MsgId,
    operation: Cursor,
    controls: Cursor,
) -> Result<()> {
    let framed = match shallow_pack(&mut pool, msgid, operation, controls) {
        Ok(c) => c,
        Err(e) => {
            pool.end();
            return lil.record(e);
        }
    };
    let stage = match lil.config().put_dercursor {
        Some(s) => s,
        None => {
            pool.end();
            return lil.record(Error::Unsupported("no put_dercursor stage"));
        }
    };
    stage(lil, pool, framed)
}

fn shallow_pack(
    pool: &mut Pool,
    msgid: MsgId,
    operation: Cursor,
    controls: Cursor,
) -> Result<Cursor> {
    let mut midbuf = [0u8; 4];
    let midlen = pack_int32((msgid & 0x7fff_ffff) as i32, &mut midbuf);
    let mid = pool.alloc_copy(&midbuf[..midlen])?;
    let fields = [mid, operation, controls];
    let total = pack_len(LDAPMESSAGE_SHALLOW, &fields)?;
    let mut buf = pool.alloc_zeroed(total)?;
    pack_tail(LDAPMESSAGE_SHALLOW, &fields, &mut buf)?;
    Ok(Cursor::from(buf))
}

impl Endpoint {
    /// Queue a preassembled operation element under the given message
    /// id, going through the shallow message encoder stage.
    pub fn put_ldapmessage(
        &mut self,
        pool: Pool,
        msgid: MsgId,
        operation: Cursor,
        controls: Cursor,
    ) -> Result<()> {
        let stage = match self.config().put_ldapmessage {
            Some(s) => s,
            None => {
                pool.end();
                return self.record(Error::Unsupported("no put_ldapmessage stage"));
            }
        };
        stage(self, pool, msgid, operation, controls)
    }
}
