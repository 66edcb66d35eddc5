//! Bind requests. Everything here is asynchronous: the request is
//! encoded and queued, the allocated message id is returned, and the
//! response arrives through the dispatch pipeline like any other
//! operation. Synchronous convenience belongs in application code.

use derwalk::Cursor;

use crate::endpoint::Endpoint;
use crate::mem::Pool;
use crate::opcode::{self, Opcode};
use crate::result::Result;
use crate::MsgId;

impl Endpoint {
    /// Queue a simple Bind with the provided DN and password. Returns
    /// the message id the response will arrive under; it carries the
    /// outbound high bit, which the wire encoding masks off.
    pub fn simple_bind(&mut self, bind_dn: &str, bind_pw: &str) -> Result<MsgId> {
        let mut pool = Pool::new()?;
        let fields = [
            pool.alloc_copy(&[3])?,
            pool.alloc_copy(bind_dn.as_bytes())?,
            pool.alloc_copy(bind_pw.as_bytes())?,
            Cursor::null(),
            Cursor::null(),
        ];
        self.send_request(pool, opcode::BIND_REQUEST, &fields)
    }

    /// Queue a Bind with a SASL mechanism name and raw credentials.
    pub fn bind(&mut self, bind_dn: &str, mechanism: &str, credentials: &[u8]) -> Result<MsgId> {
        let mut pool = Pool::new()?;
        let fields = [
            pool.alloc_copy(&[3])?,
            pool.alloc_copy(bind_dn.as_bytes())?,
            Cursor::null(),
            pool.alloc_copy(mechanism.as_bytes())?,
            pool.alloc_copy(credentials)?,
        ];
        self.send_request(pool, opcode::BIND_REQUEST, &fields)
    }

    /// Queue a Kerberos Bind, spelled the way the classic client API
    /// did: a SASL bind with the GSSAPI mechanism.
    pub fn kerberos_bind(&mut self, bind_dn: &str, credentials: &[u8]) -> Result<MsgId> {
        self.bind(bind_dn, "GSSAPI", credentials)
    }

    // Allocate a message id, encode the request and queue it. The id is
    // released again if the encode fails; on success it stays live until
    // the application frees it.
    pub(crate) fn send_request(
        &mut self,
        pool: Pool,
        opcode: Opcode,
        data: &[Cursor],
    ) -> Result<MsgId> {
        let msgid = self.msgids().alloc()?;
        if let Err(e) = self.put_operation(pool, msgid, opcode, data, &Cursor::null()) {
            self.msgids().free(msgid);
            return Err(e);
        }
        Ok(msgid)
    }
}
