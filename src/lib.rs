//! Plumbing for LDAP endpoints — clients, servers and intermediaries —
//! built as a stack of parsers and serializers over a byte stream.
//!
//! The crate plays the role FastCGI or WSGI play for HTTP: application
//! code plugs callbacks into a layered pipeline and receives individual,
//! parsed LDAP operations on input, while operations it injects are
//! serialized and queued for output. Every layer of the stack is an
//! overridable dispatch point, so traffic can be intercepted,
//! transformed or short-circuited at whatever granularity a deployment
//! needs — from a raw passthrough of framed messages up to callbacks
//! with one typed parameter set per operation.
//!
//! The moving parts, bottom up:
//!
//! * [`der`] — the cursor-level DER codec, driven by static walk
//!   programs (the `derwalk` workspace crate);
//! * [`Pool`]/[`install_allocator`] — region-style memory, provided by
//!   the embedding environment;
//! * [`Endpoint::get_event`] — framing and the incoming pipeline:
//!   shallow parse, opcode routing, extended-operation remapping by OID,
//!   and dispatch through the [`OpRegistry`];
//! * [`Endpoint::put_operation`]/[`Endpoint::put_event`] — the outgoing
//!   pipeline: operation encoding, shallow message encoding, and a
//!   lock-free multi-producer queue drained by one transmitter;
//! * [`MsgIdRegistry`] — per-connection message-id bookkeeping, each
//!   in-flight id owning the pool of its query.
//!
//! Both event entry points follow `read`/`write` conventions and report
//! [`ErrorKind::Retry`] instead of blocking, so an endpoint drops into
//! any readiness-based event loop.

pub type MsgId = u32;

pub mod der {
    //! Cursor-level DER codec re-exports.
    //!
    //! Everything the engine needs from the codec: cursors, walk
    //! programs, the packer/unpacker pair, and the header and integer
    //! helpers used when composing messages by hand.
    pub use derwalk::{
        field_count, header_len, pack_int32, pack_len, pack_tail, parse_header, parse_length,
        parse_tag, parse_uint, put_header, unpack, Cursor, Walk, WalkError,
    };
}

mod abandon;
mod atomic;
mod bind;
mod dispatch;
mod endpoint;
pub mod exop;
mod framing;
mod mem;
mod message;
mod msgid;
pub mod opcode;
pub mod ops;
mod queue;
mod registry;
pub mod result;
mod unbind;

pub use derwalk::Cursor;
pub use endpoint::{
    CursorStage, Endpoint, EndpointConfig, MessageStage, OperationStage, NO_PORT,
};
pub use mem::{install_allocator, HeapPools, Pool, PoolAlloc, PoolProvider};
pub use msgid::{MsgIdRegistry, LAYER_SIZE, OUTBOUND};
pub use opcode::Opcode;
pub use queue::{install_wakeup, PutQueue, SendItem, WakeupFn};
pub use registry::{OpHandler, OpRegistry};
pub use result::{Error, ErrorKind, Result};

pub mod stages {
    //! The library's default stage functions, exported so applications
    //! can rewire a pipeline at any level. A passthrough endpoint, for
    //! one, points `get_dercursor` straight at [`put_dercursor`]; a
    //! message-level filter keeps [`get_dercursor`] and swaps its own
    //! function in for [`get_ldapmessage`].
    pub use crate::dispatch::{get_ldapmessage, get_operation, put_operation};
    pub use crate::message::{get_dercursor, put_ldapmessage};
    pub use crate::queue::put_dercursor;
}
