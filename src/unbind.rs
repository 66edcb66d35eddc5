//! The Unbind request, the protocol's way of saying goodbye.

use crate::endpoint::Endpoint;
use crate::mem::Pool;
use crate::opcode;
use crate::result::Result;

impl Endpoint {
    /// Queue an Unbind request. Unbind has no response, so the message
    /// id is released as soon as the request is on the queue; closing
    /// the transports afterwards is up to the caller.
    pub fn unbind(&mut self) -> Result<()> {
        let mut pool = Pool::new()?;
        let fields = [pool.alloc_copy(&[])?];
        let msgid = self.send_request(pool, opcode::UNBIND_REQUEST, &fields)?;
        self.msgids().free(msgid);
        Ok(())
    }
}
