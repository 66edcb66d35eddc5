//! The endpoint: one LDAP connection and the stack wired around it.
//!
//! Behaviour and state are split. [`EndpointConfig`] is the immutable
//! description of a *role* — the stage table and the callback
//! registries — and is shared by every connection playing that role.
//! [`Endpoint`] is the per-connection half: transports, pools, the
//! message-id registry, the outgoing queue, frame reassembly state and
//! the policy bitmap.
//!
//! Every stage is an overridable function pointer. The defaults chain
//! into the full parse-and-dispatch pipeline; an application can point
//! any stage somewhere else to intercept traffic at that level, down to
//! the degenerate passthrough that wires `get_dercursor` straight to
//! [`stages::put_dercursor`](crate::stages).

use std::io::{Read, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;
use std::sync::Arc;

use bytes::BytesMut;
use derwalk::Cursor;
use log::debug;
use url::Url;

use crate::mem::Pool;
use crate::msgid::MsgIdRegistry;
use crate::opcode::Opcode;
use crate::queue::PutQueue;
use crate::registry::OpRegistry;
use crate::result::{Error, ErrorKind, Result};
use crate::{dispatch, message, queue, MsgId};

/// Port sentinel: the hostname names a node, not a TCP target.
pub const NO_PORT: u32 = 131072;

/// Stage shape for whole-frame handoff.
pub type CursorStage = fn(&mut Endpoint, Pool, Cursor) -> Result<()>;
/// Stage shape for the shallowly split LDAPMessage.
pub type MessageStage = fn(&mut Endpoint, Pool, MsgId, Cursor, Cursor) -> Result<()>;
/// Stage shape for a routed operation with parsed fields.
pub type OperationStage =
    fn(&mut Endpoint, Pool, MsgId, Opcode, &[Cursor], &Cursor) -> Result<()>;

/// The immutable role description shared across endpoints. A vacant
/// stage slot is an `Unsupported` error the moment traffic reaches it.
pub struct EndpointConfig {
    pub get_dercursor: Option<CursorStage>,
    pub get_ldapmessage: Option<MessageStage>,
    pub get_operation: Option<OperationStage>,
    pub put_operation: Option<OperationStage>,
    pub put_ldapmessage: Option<MessageStage>,
    pub put_dercursor: Option<CursorStage>,
    /// Operation callbacks, indexed by opcode.
    pub registry: OpRegistry,
    /// When present, consulted before `registry` for response opcodes,
    /// so client-style code can keep response handling separate.
    pub responses: Option<OpRegistry>,
}

impl Default for EndpointConfig {
    fn default() -> EndpointConfig {
        EndpointConfig {
            get_dercursor: Some(message::get_dercursor),
            get_ldapmessage: Some(dispatch::get_ldapmessage),
            get_operation: Some(dispatch::get_operation),
            put_operation: Some(dispatch::put_operation),
            put_ldapmessage: Some(message::put_ldapmessage),
            put_dercursor: Some(queue::put_dercursor),
            registry: OpRegistry::new(),
            responses: None,
        }
    }
}

pub struct Endpoint {
    config: Arc<EndpointConfig>,
    pub(crate) source: Option<Box<dyn Read + Send>>,
    pub(crate) sink: Option<Box<dyn Write + Send>>,
    node: Option<String>,
    cnxpool: Option<Pool>,
    msgids: Arc<MsgIdRegistry>,
    queue: Arc<PutQueue>,
    // frame reassembly
    pub(crate) get_qpool: Option<Pool>,
    pub(crate) get_head: [u8; 6],
    pub(crate) get_gotten: usize,
    pub(crate) get_total: usize,
    pub(crate) get_buf: Option<BytesMut>,
    // policy: operations refused with Unsupported; base ops in word 0,
    // extensions in word 1
    reject_ops: [u32; 2],
    // scalars kept for the classic client surface
    pub deref: i32,
    pub timelimit: i32,
    pub sizelimit: i32,
    last_error: Option<ErrorKind>,
    get_fd: i32,
    put_fd: i32,
}

impl Endpoint {
    /// Create an endpoint for the given role. Fails when no pool
    /// provider has been installed yet.
    pub fn new(config: Arc<EndpointConfig>) -> Result<Endpoint> {
        let cnxpool = Pool::new()?;
        Ok(Endpoint {
            config,
            source: None,
            sink: None,
            node: None,
            cnxpool: Some(cnxpool),
            msgids: Arc::new(MsgIdRegistry::new()),
            queue: Arc::new(PutQueue::new()),
            get_qpool: None,
            get_head: [0; 6],
            get_gotten: 0,
            get_total: 0,
            get_buf: None,
            reject_ops: [0; 2],
            deref: 0,
            timelimit: 0,
            sizelimit: 0,
            last_error: None,
            get_fd: -1,
            put_fd: -1,
        })
    }

    pub fn config(&self) -> &Arc<EndpointConfig> {
        &self.config
    }

    pub fn msgids(&self) -> &Arc<MsgIdRegistry> {
        &self.msgids
    }

    pub fn queue(&self) -> &Arc<PutQueue> {
        &self.queue
    }

    /// Connect to `hostname:port`. The sentinel [`NO_PORT`] marks the
    /// hostname as a node name instead of a TCP target; no socket is
    /// opened then, and transports are expected via [`attach`](Self::attach).
    pub fn open(&mut self, hostname: &str, port: u32) -> Result<()> {
        if port == NO_PORT {
            self.node = Some(hostname.to_owned());
            return Ok(());
        }
        if port == 0 || port > u16::MAX as u32 {
            return self.record(Error::Precondition("port out of range"));
        }
        let stream = match TcpStream::connect((hostname, port as u16)) {
            Ok(s) => s,
            Err(e) => return self.record(Error::Io(e)),
        };
        let sink = match stream.try_clone() {
            Ok(s) => s,
            Err(e) => return self.record(Error::Io(e)),
        };
        #[cfg(unix)]
        {
            self.get_fd = stream.as_raw_fd();
            self.put_fd = sink.as_raw_fd();
            self.queue.set_fd(self.put_fd);
        }
        self.source = Some(Box::new(stream));
        self.sink = Some(Box::new(sink));
        debug!("endpoint: connected to {}:{}", hostname, port);
        Ok(())
    }

    /// Connect from an `ldap://host:port` URL. Schemes that need TLS or
    /// Unix sockets are outside this crate.
    pub fn open_url(&mut self, url: &str) -> Result<()> {
        let url = match Url::parse(url) {
            Ok(u) => u,
            Err(_) => return self.record(Error::Precondition("invalid URL")),
        };
        if url.scheme() != "ldap" {
            return self.record(Error::Unsupported("URL scheme not handled"));
        }
        let host = url.host_str().unwrap_or("localhost").to_owned();
        let port = u32::from(url.port().unwrap_or(389));
        self.open(&host, port)
    }

    /// Wire caller-supplied transports: a pipe pair, an accepted socket,
    /// in-memory buffers under test.
    pub fn attach<R, W>(&mut self, source: R, sink: W)
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        self.source = Some(Box::new(source));
        self.sink = Some(Box::new(sink));
    }

    /// The node name recorded by an [`open`](Self::open) with [`NO_PORT`].
    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    /// Raw descriptors, where the platform has them; -1 otherwise.
    pub fn fds(&self) -> (i32, i32) {
        (self.get_fd, self.put_fd)
    }

    /// Tear the connection down: drop the transports, release every
    /// in-flight query pool, then the connection pool.
    pub fn close(&mut self) {
        self.source = None;
        self.sink = None;
        if let Some(p) = self.get_qpool.take() {
            p.end();
        }
        self.get_buf = None;
        self.get_gotten = 0;
        self.get_total = 0;
        self.msgids.drain();
        if let Some(p) = self.cnxpool.take() {
            p.end();
        }
        debug!("endpoint: closed");
    }

    /// Allocate connection-lifetime memory.
    pub fn alloc_cnx(&mut self, size: usize) -> Result<BytesMut> {
        match self.cnxpool.as_mut() {
            Some(p) => p.alloc_zeroed(size),
            None => Err(Error::Precondition("endpoint is closed")),
        }
    }

    /// Refuse incoming operations with this opcode.
    pub fn reject(&mut self, opcode: Opcode) {
        debug_assert!((opcode as usize) < 64);
        self.reject_ops[(opcode >> 5) as usize] |= 1 << (opcode & 31);
    }

    /// Stop refusing operations with this opcode.
    pub fn accept(&mut self, opcode: Opcode) {
        debug_assert!((opcode as usize) < 64);
        self.reject_ops[(opcode >> 5) as usize] &= !(1 << (opcode & 31));
    }

    pub fn rejects(&self, opcode: Opcode) -> bool {
        let word = (opcode >> 5) as usize;
        word < self.reject_ops.len() && self.reject_ops[word] & (1 << (opcode & 31)) != 0
    }

    /// The kind of the last error this endpoint ran into; `Retry` is
    /// never recorded.
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    pub(crate) fn record<T>(&mut self, e: Error) -> Result<T> {
        if e.kind() != ErrorKind::Retry {
            self.last_error = Some(e.kind());
        }
        Err(e)
    }

    pub(crate) fn source_mut(&mut self) -> Option<&mut (dyn Read + Send + '_)> {
        match self.source.as_mut() {
            Some(b) => Some(b.as_mut()),
            None => None,
        }
    }

    pub(crate) fn sink_mut(&mut self) -> Option<&mut (dyn Write + Send + '_)> {
        match self.sink.as_mut() {
            Some(b) => Some(b.as_mut()),
            None => None,
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.close();
    }
}
