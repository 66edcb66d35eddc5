//! Opcode routing on the way in, operation encoding on the way out.
//!
//! Routing derives the opcode from the operation's application tag,
//! applies the endpoint's rejection policy, folds extended operations
//! into the flat opcode space by OID, parses the operation through its
//! walk program and hands the field array to the callback registry.
//!
//! The encoder is the exact inverse: a dry-run sizing pass over the
//! field array, one buffer, and the complete LDAPMessage image.

use derwalk::{header_len, pack_int32, pack_len, pack_tail, put_header, unpack, Cursor, Walk};
use log::{debug, trace};

use crate::endpoint::Endpoint;
use crate::exop;
use crate::mem::Pool;
use crate::opcode::{self, Opcode, TAG_OPCODE_LIMIT};
use crate::result::{Error, Result};
use crate::MsgId;

// Failing a stage means ending the pool it owns before reporting.
fn fail<T>(lil: &mut Endpoint, pool: Pool, e: Error) -> Result<T> {
    pool.end();
    lil.record(e)
}

/// Stage: derive the opcode, apply policy, remap extended operations,
/// parse the operation in full and dispatch it.
pub fn get_ldapmessage(
    lil: &mut Endpoint,
    pool: Pool,
    msgid: MsgId,
    op: Cursor,
    controls: Cursor,
) -> Result<()> {
    let tag = match op.first() {
        Some(t) => t,
        None => return fail(lil, pool, Error::Malformed("empty protocolOp")),
    };
    // strip the constructed bit, subtract the application-class base
    let mut opcode = (tag & !0x20).wrapping_sub(0x40);
    if opcode >= TAG_OPCODE_LIMIT {
        return fail(lil, pool, Error::Malformed("protocolOp tag out of range"));
    }
    let mut data: Vec<Cursor> = Vec::new();
    let mut parsed: Option<&'static [Walk]> = None;
    loop {
        if lil.rejects(opcode) {
            debug!("get: opcode {} rejected by policy", opcode);
            return fail(lil, pool, Error::Unsupported("operation rejected by policy"));
        }
        let entry = match opcode::entry(opcode) {
            Some(e) => e,
            None => return fail(lil, pool, Error::Malformed("opcode out of range")),
        };
        let walk = match entry.walk {
            Some(w) => w,
            None => return fail(lil, pool, Error::Unsupported("no parser for opcode")),
        };
        // a remap whose program matches what was already parsed (the
        // extension adds no fields of its own) skips the reparse
        let fresh = match parsed {
            Some(prev) => !std::ptr::eq(prev.as_ptr(), walk.as_ptr()),
            None => true,
        };
        if fresh {
            data = vec![Cursor::null(); entry.fields];
            if let Err(e) = unpack(walk, &op, &mut data) {
                return fail(lil, pool, e.into());
            }
            parsed = Some(walk);
        }
        let extreq = opcode == opcode::EXTENDED_REQUEST;
        let extresp = opcode == opcode::EXTENDED_RESPONSE;
        if !extreq && !extresp {
            break;
        }
        let oid = &data[if extreq { 0 } else { 4 }];
        if oid.is_null() {
            if extreq {
                return fail(lil, pool, Error::Malformed("extended request without OID"));
            }
            // a nameless ExtendedResponse keeps its opcode
            break;
        }
        let ext = match exop::lookup(oid.as_slice()) {
            Some(e) => e,
            None => return fail(lil, pool, Error::Unsupported("unknown extended OID")),
        };
        let remapped = if extreq {
            match ext.request {
                Some(o) => o,
                None => {
                    return fail(lil, pool, Error::Unsupported("extension has no request form"))
                }
            }
        } else {
            ext.response
        };
        trace!("get: OID remaps opcode {} to {}", opcode, remapped);
        opcode = remapped;
        // around again for the policy check and a possible reparse; no
        // remapped opcode maps a second time, so the loop terminates
    }
    let stage = match lil.config().get_operation {
        Some(s) => s,
        None => return fail(lil, pool, Error::Unsupported("no get_operation stage")),
    };
    stage(lil, pool, msgid, opcode, &data, &controls)
}

/// Stage: hand the routed operation to the registered callback. The
/// response bank, when configured, gets first claim on response opcodes.
pub fn get_operation(
    lil: &mut Endpoint,
    pool: Pool,
    msgid: MsgId,
    opcode: Opcode,
    data: &[Cursor],
    controls: &Cursor,
) -> Result<()> {
    let cfg = lil.config().clone();
    let bank = if opcode::is_response(opcode) {
        cfg.responses.as_ref().and_then(|r| r.get(opcode))
    } else {
        None
    };
    let handler = match bank.or_else(|| cfg.registry.get(opcode)) {
        Some(h) => h,
        None => return fail(lil, pool, Error::Unsupported("no callback for opcode")),
    };
    handler(lil, pool, msgid, opcode, data, controls)
}

/// Stage: encode one operation as a complete LDAPMessage and pass the
/// frame to the transmitter stage.
pub fn put_operation(
    lil: &mut Endpoint,
    mut pool: Pool,
    msgid: MsgId,
    opcode: Opcode,
    data: &[Cursor],
    controls: &Cursor,
) -> Result<()> {
    let built = build_message(&mut pool, msgid, opcode, data, controls);
    let msg = match built {
        Ok(m) => m,
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
    stage(lil, pool, msg)
}

// Sizing pass first, then one buffer holding the whole LDAPMessage:
// SEQUENCE header, messageID INTEGER (low 31 bits, minimal form), the
// packed operation, and the rewrapped controls.
fn build_message(
    pool: &mut Pool,
    msgid: MsgId,
    opcode: Opcode,
    data: &[Cursor],
    controls: &Cursor,
) -> Result<Cursor> {
    let walk = opcode::entry(opcode)
        .and_then(|e| e.walk)
        .ok_or(Error::Unsupported("no packer for opcode"))?;
    let op_len = pack_len(walk, data)?;
    if op_len == 0 {
        return Err(Error::Malformed("operation packs to nothing"));
    }
    let ctl_len = if controls.is_null() {
        0
    } else {
        header_len(controls.len()) + controls.len()
    };
    let mut midbuf = [0u8; 4];
    let midlen = pack_int32((msgid & 0x7fff_ffff) as i32, &mut midbuf);
    let content = 2 + midlen + op_len + ctl_len;
    let total = header_len(content) + content;
    let mut buf = pool.alloc_zeroed(total)?;
    let mut at = put_header(&mut buf, 0, 0x30, content);
    at = put_header(&mut buf, at, 0x02, midlen);
    buf[at..at + midlen].copy_from_slice(&midbuf[..midlen]);
    at += midlen;
    let op_end = at + op_len;
    pack_tail(walk, data, &mut buf[..op_end])?;
    at = op_end;
    if !controls.is_null() {
        at = put_header(&mut buf, at, 0xa0, controls.len());
        buf[at..at + controls.len()].copy_from_slice(controls.as_slice());
        at += controls.len();
    }
    debug_assert_eq!(at, total);
    trace!(
        "put: msgid {} opcode {} packed into {} octets",
        msgid & 0x7fff_ffff,
        opcode,
        total
    );
    Ok(Cursor::from(buf))
}

impl Endpoint {
    /// Encode and queue one operation; the entry point of the write
    /// pipeline. The pool moves along the pipeline into the queue, which
    /// ends it after transmission.
    pub fn put_operation(
        &mut self,
        pool: Pool,
        msgid: MsgId,
        opcode: Opcode,
        data: &[Cursor],
        controls: &Cursor,
    ) -> Result<()> {
        let stage = match self.config().put_operation {
            Some(s) => s,
            None => {
                pool.end();
                return self.record(Error::Unsupported("no put_operation stage"));
            }
        };
        stage(self, pool, msgid, opcode, data, controls)
    }
}
