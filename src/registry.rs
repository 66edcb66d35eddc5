//! The operation callback registry.
//!
//! A flat array of type-erased handlers indexed by opcode. The generic
//! [`at`](OpRegistry::at) placement and the named constructors fill the
//! very same slots; the named ones adapt the handler to the typed view
//! of that operation's parsed data, so user code never switches on the
//! opcode itself. Dispatch always goes through the array.

use derwalk::Cursor;

use crate::endpoint::Endpoint;
use crate::mem::Pool;
use crate::opcode::{self, Opcode, OPCODE_COUNT};
use crate::ops;
use crate::result::Result;
use crate::MsgId;

/// The erased shape every handler is stored as.
pub type OpHandler = Box<
    dyn Fn(&mut Endpoint, Pool, MsgId, Opcode, &[Cursor], &Cursor) -> Result<()> + Send + Sync,
>;

pub struct OpRegistry {
    slots: Vec<Option<OpHandler>>,
}

impl OpRegistry {
    pub fn new() -> OpRegistry {
        OpRegistry {
            slots: (0..OPCODE_COUNT).map(|_| None).collect(),
        }
    }

    /// Place a handler in an opcode slot, replacing whatever was there.
    pub fn at<F>(mut self, opcode: Opcode, handler: F) -> Self
    where
        F: Fn(&mut Endpoint, Pool, MsgId, Opcode, &[Cursor], &Cursor) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.slots[opcode as usize] = Some(Box::new(handler));
        self
    }

    pub(crate) fn get(&self, opcode: Opcode) -> Option<&OpHandler> {
        self.slots.get(opcode as usize).and_then(Option::as_ref)
    }
}

impl Default for OpRegistry {
    fn default() -> Self {
        OpRegistry::new()
    }
}

// The named constructors. Each one is nothing more than `at` with the
// cursor array wrapped in the operation's view type.
macro_rules! named {
    ($(#[$doc:meta])* $method:ident, $opcode:expr, $view:ident) => {
        impl OpRegistry {
            $(#[$doc])*
            pub fn $method<F>(self, handler: F) -> Self
            where
                F: Fn(&mut Endpoint, Pool, MsgId, ops::$view, &Cursor) -> Result<()>
                    + Send
                    + Sync
                    + 'static,
            {
                self.at($opcode, move |lil, pool, msgid, _opcode, data, controls| {
                    handler(lil, pool, msgid, ops::$view::new(data), controls)
                })
            }
        }
    };
}

named!(bind_request, opcode::BIND_REQUEST, BindRequest);
named!(bind_response, opcode::BIND_RESPONSE, BindResponse);
named!(search_request, opcode::SEARCH_REQUEST, SearchRequest);
named!(search_result_entry, opcode::SEARCH_RESULT_ENTRY, SearchResultEntry);
named!(
    /// SearchResultDone carries the plain LDAPResult shape.
    search_result_done,
    opcode::SEARCH_RESULT_DONE,
    LdapResult
);
named!(
    search_result_reference,
    opcode::SEARCH_RESULT_REFERENCE,
    SearchResultReference
);
named!(modify_request, opcode::MODIFY_REQUEST, ModifyRequest);
named!(modify_response, opcode::MODIFY_RESPONSE, LdapResult);
named!(add_request, opcode::ADD_REQUEST, AddRequest);
named!(add_response, opcode::ADD_RESPONSE, LdapResult);
named!(del_request, opcode::DEL_REQUEST, DelRequest);
named!(del_response, opcode::DEL_RESPONSE, LdapResult);
named!(modify_dn_request, opcode::MODIFY_DN_REQUEST, ModifyDnRequest);
named!(modify_dn_response, opcode::MODIFY_DN_RESPONSE, LdapResult);
named!(compare_request, opcode::COMPARE_REQUEST, CompareRequest);
named!(compare_response, opcode::COMPARE_RESPONSE, LdapResult);
named!(abandon_request, opcode::ABANDON_REQUEST, AbandonRequest);
named!(extended_request, opcode::EXTENDED_REQUEST, ExtendedRequest);
named!(extended_response, opcode::EXTENDED_RESPONSE, ExtendedResponse);
named!(
    intermediate_response,
    opcode::INTERMEDIATE_RESPONSE,
    IntermediateResponse
);
named!(
    /// Remapped StartTLS request; the data keeps the ExtendedRequest shape.
    starttls_request,
    opcode::STARTTLS_REQUEST,
    ExtendedRequest
);
named!(starttls_response, opcode::STARTTLS_RESPONSE, ExtendedResponse);
named!(
    passwd_modify_request,
    opcode::PASSWD_MODIFY_REQUEST,
    PasswdModifyRequest
);
named!(whoami_request, opcode::WHOAMI_REQUEST, ExtendedRequest);
named!(whoami_response, opcode::WHOAMI_RESPONSE, ExtendedResponse);
named!(cancel_request, opcode::CANCEL_REQUEST, CancelRequest);

impl OpRegistry {
    /// The UnbindRequest has no fields worth a view; the handler gets
    /// the raw cursor array.
    pub fn unbind_request<F>(self, handler: F) -> Self
    where
        F: Fn(&mut Endpoint, Pool, MsgId, &Cursor) -> Result<()> + Send + Sync + 'static,
    {
        self.at(
            opcode::UNBIND_REQUEST,
            move |lil, pool, msgid, _opcode, _data, controls| handler(lil, pool, msgid, controls),
        )
    }
}
