//! Extended operation OID bindings.
//!
//! An extended operation arrives as an ExtendedRequest or
//! ExtendedResponse and is told apart by OID alone. The table below maps
//! each supported OID to its pair of remapped opcodes; the walk program
//! for the operation (value opened up where one is defined) lives in the
//! opcode table under the remapped opcode. Extending the table means
//! adding an opcode pair, a table row and a match arm, and recompiling.

use crate::opcode::{self, Opcode};

pub const STARTTLS_OID: &str = "1.3.6.1.4.1.1466.20037";
pub const PASSMOD_OID: &str = "1.3.6.1.4.1.4203.1.11.1";
pub const WHOAMI_OID: &str = "1.3.6.1.4.1.4203.1.11.3";
pub const CANCEL_OID: &str = "1.3.6.1.1.8";
pub const START_LBURP_OID: &str = "1.3.6.1.1.17.1";
pub const END_LBURP_OID: &str = "1.3.6.1.1.17.2";
pub const LBURP_UPDATE_OID: &str = "1.3.6.1.1.17.3";
pub const TURN_OID: &str = "1.3.6.1.1.19";
pub const START_TXN_OID: &str = "1.3.6.1.1.21.1";
pub const END_TXN_OID: &str = "1.3.6.1.1.21.3";
pub const ABORTED_TXN_OID: &str = "1.3.6.1.1.21.4";

/// Opcode pair for one supported extended operation. A missing request
/// opcode marks a response-only notice.
pub struct ExopEntry {
    pub oid: &'static str,
    pub request: Option<Opcode>,
    pub response: Opcode,
}

const fn pair(oid: &'static str, request: Opcode, response: Opcode) -> ExopEntry {
    ExopEntry {
        oid,
        request: Some(request),
        response,
    }
}

static EXOP_TABLE: [ExopEntry; 11] = [
    pair(STARTTLS_OID, opcode::STARTTLS_REQUEST, opcode::STARTTLS_RESPONSE),
    pair(PASSMOD_OID, opcode::PASSWD_MODIFY_REQUEST, opcode::PASSWD_MODIFY_RESPONSE),
    pair(WHOAMI_OID, opcode::WHOAMI_REQUEST, opcode::WHOAMI_RESPONSE),
    pair(CANCEL_OID, opcode::CANCEL_REQUEST, opcode::CANCEL_RESPONSE),
    pair(START_LBURP_OID, opcode::START_LBURP_REQUEST, opcode::START_LBURP_RESPONSE),
    pair(END_LBURP_OID, opcode::END_LBURP_REQUEST, opcode::END_LBURP_RESPONSE),
    pair(LBURP_UPDATE_OID, opcode::LBURP_UPDATE_REQUEST, opcode::LBURP_UPDATE_RESPONSE),
    pair(TURN_OID, opcode::TURN_REQUEST, opcode::TURN_RESPONSE),
    pair(START_TXN_OID, opcode::START_TXN_REQUEST, opcode::START_TXN_RESPONSE),
    pair(END_TXN_OID, opcode::END_TXN_REQUEST, opcode::END_TXN_RESPONSE),
    ExopEntry {
        oid: ABORTED_TXN_OID,
        request: None,
        response: opcode::ABORTED_TXN_RESPONSE,
    },
];

/// Look up a supported extended OID, given as the raw content of the
/// requestName/responseName field. Constant-time and allocation-free;
/// the compiler turns the match into the usual length-then-prefix
/// decision tree.
pub fn lookup(oid: &[u8]) -> Option<&'static ExopEntry> {
    let idx = match oid {
        b"1.3.6.1.4.1.1466.20037" => 0,
        b"1.3.6.1.4.1.4203.1.11.1" => 1,
        b"1.3.6.1.4.1.4203.1.11.3" => 2,
        b"1.3.6.1.1.8" => 3,
        b"1.3.6.1.1.17.1" => 4,
        b"1.3.6.1.1.17.2" => 5,
        b"1.3.6.1.1.17.3" => 6,
        b"1.3.6.1.1.19" => 7,
        b"1.3.6.1.1.21.1" => 8,
        b"1.3.6.1.1.21.3" => 9,
        b"1.3.6.1.1.21.4" => 10,
        _ => return None,
    };
    Some(&EXOP_TABLE[idx])
}
