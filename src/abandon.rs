//! Abandoning an operation in flight.

use derwalk::pack_int32;

use crate::endpoint::Endpoint;
use crate::mem::Pool;
use crate::opcode;
use crate::result::Result;
use crate::MsgId;

impl Endpoint {
    /// Queue an Abandon for the given message id and release the query
    /// state held for it locally. Abandon itself has no response, so its
    /// own message id is released right away too.
    pub fn abandon(&mut self, target: MsgId) -> Result<()> {
        let mut pool = Pool::new()?;
        let mut intbuf = [0u8; 4];
        let len = pack_int32((target & 0x7fff_ffff) as i32, &mut intbuf);
        let fields = [pool.alloc_copy(&intbuf[..len])?];
        let msgid = self.send_request(pool, opcode::ABANDON_REQUEST, &fields)?;
        self.msgids().free(msgid);
        self.msgids().free(target);
        Ok(())
    }
}
