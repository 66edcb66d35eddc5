//! The opcode space and the per-opcode parser table.
//!
//! Opcodes 0..=25 are the RFC 4511 application tags with the constructed
//! bit stripped; gaps in that range have no parser and are refused.
//! Opcodes from 32 up identify operations that arrive as
//! ExtendedRequest/ExtendedResponse and are remapped by OID, numbered so
//! that `opcode >> 5` selects the second word of the per-endpoint
//! bitmaps and `opcode & 31` the bit within it.

use derwalk::Walk::{self, Enter, Leave, Optional, Store, StoreAny};
use lazy_static::lazy_static;

/// Identifies one kind of LDAP operation, including remapped extensions.
pub type Opcode = u8;

pub const BIND_REQUEST: Opcode = 0;
pub const BIND_RESPONSE: Opcode = 1;
pub const UNBIND_REQUEST: Opcode = 2;
pub const SEARCH_REQUEST: Opcode = 3;
pub const SEARCH_RESULT_ENTRY: Opcode = 4;
pub const SEARCH_RESULT_DONE: Opcode = 5;
pub const MODIFY_REQUEST: Opcode = 6;
pub const MODIFY_RESPONSE: Opcode = 7;
pub const ADD_REQUEST: Opcode = 8;
pub const ADD_RESPONSE: Opcode = 9;
pub const DEL_REQUEST: Opcode = 10;
pub const DEL_RESPONSE: Opcode = 11;
pub const MODIFY_DN_REQUEST: Opcode = 12;
pub const MODIFY_DN_RESPONSE: Opcode = 13;
pub const COMPARE_REQUEST: Opcode = 14;
pub const COMPARE_RESPONSE: Opcode = 15;
pub const ABANDON_REQUEST: Opcode = 16;
pub const SEARCH_RESULT_REFERENCE: Opcode = 19;
pub const EXTENDED_REQUEST: Opcode = 23;
pub const EXTENDED_RESPONSE: Opcode = 24;
pub const INTERMEDIATE_RESPONSE: Opcode = 25;

pub const STARTTLS_REQUEST: Opcode = 32;
pub const STARTTLS_RESPONSE: Opcode = 33;
pub const PASSWD_MODIFY_REQUEST: Opcode = 34;
pub const PASSWD_MODIFY_RESPONSE: Opcode = 35;
pub const WHOAMI_REQUEST: Opcode = 36;
pub const WHOAMI_RESPONSE: Opcode = 37;
pub const CANCEL_REQUEST: Opcode = 38;
pub const CANCEL_RESPONSE: Opcode = 39;
pub const START_LBURP_REQUEST: Opcode = 40;
pub const START_LBURP_RESPONSE: Opcode = 41;
pub const END_LBURP_REQUEST: Opcode = 42;
pub const END_LBURP_RESPONSE: Opcode = 43;
pub const LBURP_UPDATE_REQUEST: Opcode = 44;
pub const LBURP_UPDATE_RESPONSE: Opcode = 45;
pub const TURN_REQUEST: Opcode = 46;
pub const TURN_RESPONSE: Opcode = 47;
pub const START_TXN_REQUEST: Opcode = 48;
pub const START_TXN_RESPONSE: Opcode = 49;
pub const END_TXN_REQUEST: Opcode = 50;
pub const END_TXN_RESPONSE: Opcode = 51;
pub const ABORTED_TXN_RESPONSE: Opcode = 52;

/// Size of the opcode-indexed tables.
pub const OPCODE_COUNT: usize = 53;

/// Largest tag-derived opcode plus one; anything at or past this on the
/// wire is malformed before extended remapping.
pub const TAG_OPCODE_LIMIT: Opcode = 31;

// Base operations. Tags are full identifier octets; [APPLICATION n]
// constructed is 0x60 | n, primitive 0x40 | n, context-specific 0x80 | n.

static BIND_REQUEST_WALK: &[Walk] = &[
    Enter(0x60),
    Store(0x02),    // version
    Store(0x04),    // name
    Optional,
    Store(0x80),    // simple
    Optional,
    Enter(0xa3),    // sasl
    Store(0x04),    //   mechanism
    Optional,
    Store(0x04),    //   credentials
    Leave,
    Leave,
];

static BIND_RESPONSE_WALK: &[Walk] = &[
    Enter(0x61),
    Store(0x0a),    // resultCode
    Store(0x04),    // matchedDN
    Store(0x04),    // diagnosticMessage
    Optional,
    Store(0xa3),    // referral
    Optional,
    Store(0x87),    // serverSaslCreds
    Leave,
];

static UNBIND_REQUEST_WALK: &[Walk] = &[Store(0x42)];

static SEARCH_REQUEST_WALK: &[Walk] = &[
    Enter(0x63),
    Store(0x04),    // baseObject
    Store(0x0a),    // scope
    Store(0x0a),    // derefAliases
    Store(0x02),    // sizeLimit
    Store(0x02),    // timeLimit
    Store(0x01),    // typesOnly
    StoreAny,       // filter, kept as a raw element
    Store(0x30),    // attributes
    Leave,
];

static SEARCH_RESULT_ENTRY_WALK: &[Walk] = &[
    Enter(0x64),
    Store(0x04),    // objectName
    Store(0x30),    // attributes
    Leave,
];

static SEARCH_RESULT_DONE_WALK: &[Walk] = &[
    Enter(0x65),
    Store(0x0a),
    Store(0x04),
    Store(0x04),
    Optional,
    Store(0xa3),
    Leave,
];

static MODIFY_REQUEST_WALK: &[Walk] = &[
    Enter(0x66),
    Store(0x04),    // object
    Store(0x30),    // changes
    Leave,
];

static MODIFY_RESPONSE_WALK: &[Walk] = &[
    Enter(0x67),
    Store(0x0a),
    Store(0x04),
    Store(0x04),
    Optional,
    Store(0xa3),
    Leave,
];

static ADD_REQUEST_WALK: &[Walk] = &[
    Enter(0x68),
    Store(0x04),    // entry
    Store(0x30),    // attributes
    Leave,
];

static ADD_RESPONSE_WALK: &[Walk] = &[
    Enter(0x69),
    Store(0x0a),
    Store(0x04),
    Store(0x04),
    Optional,
    Store(0xa3),
    Leave,
];

// DelRequest is the DN itself, implicitly tagged and primitive.
static DEL_REQUEST_WALK: &[Walk] = &[Store(0x4a)];

static DEL_RESPONSE_WALK: &[Walk] = &[
    Enter(0x6b),
    Store(0x0a),
    Store(0x04),
    Store(0x04),
    Optional,
    Store(0xa3),
    Leave,
];

static MODIFY_DN_REQUEST_WALK: &[Walk] = &[
    Enter(0x6c),
    Store(0x04),    // entry
    Store(0x04),    // newrdn
    Store(0x01),    // deleteoldrdn
    Optional,
    Store(0x80),    // newSuperior
    Leave,
];

static MODIFY_DN_RESPONSE_WALK: &[Walk] = &[
    Enter(0x6d),
    Store(0x0a),
    Store(0x04),
    Store(0x04),
    Optional,
    Store(0xa3),
    Leave,
];

static COMPARE_REQUEST_WALK: &[Walk] = &[
    Enter(0x6e),
    Store(0x04),    // entry
    Enter(0x30),    // ava
    Store(0x04),    //   attributeDesc
    Store(0x04),    //   assertionValue
    Leave,
    Leave,
];

static COMPARE_RESPONSE_WALK: &[Walk] = &[
    Enter(0x6f),
    Store(0x0a),
    Store(0x04),
    Store(0x04),
    Optional,
    Store(0xa3),
    Leave,
];

// AbandonRequest is the target MessageID, implicitly tagged.
static ABANDON_REQUEST_WALK: &[Walk] = &[Store(0x50)];

// SearchResultReference is a SEQUENCE OF URI under an implicit tag; the
// constructed bit rides along in the stored identifier octet.
static SEARCH_RESULT_REFERENCE_WALK: &[Walk] = &[Store(0x73)];

static EXTENDED_REQUEST_WALK: &[Walk] = &[
    Enter(0x77),
    Store(0x80),    // requestName
    Optional,
    Store(0x81),    // requestValue
    Leave,
];

static EXTENDED_RESPONSE_WALK: &[Walk] = &[
    Enter(0x78),
    Store(0x0a),
    Store(0x04),
    Store(0x04),
    Optional,
    Store(0xa3),
    Optional,
    Store(0x8a),    // responseName
    Optional,
    Store(0x8b),    // responseValue
    Leave,
];

static INTERMEDIATE_RESPONSE_WALK: &[Walk] = &[
    Enter(0x79),
    Optional,
    Store(0x80),    // responseName
    Optional,
    Store(0x81),    // responseValue
    Leave,
];

// Remapped extensions that carry structured values reparse the whole
// operation with the value opened up; the rest reuse the plain
// ExtendedRequest/Response programs so the router need not reparse.

static PASSWD_MODIFY_REQUEST_WALK: &[Walk] = &[
    Enter(0x77),
    Store(0x80),
    Optional,
    Enter(0x81),
    Enter(0x30),
    Optional,
    Store(0x80),    // userIdentity
    Optional,
    Store(0x81),    // oldPasswd
    Optional,
    Store(0x82),    // newPasswd
    Leave,
    Leave,
    Leave,
];

static PASSWD_MODIFY_RESPONSE_WALK: &[Walk] = &[
    Enter(0x78),
    Store(0x0a),
    Store(0x04),
    Store(0x04),
    Optional,
    Store(0xa3),
    Optional,
    Store(0x8a),
    Optional,
    Enter(0x8b),
    Enter(0x30),
    Optional,
    Store(0x80),    // genPasswd
    Leave,
    Leave,
    Leave,
];

static CANCEL_REQUEST_WALK: &[Walk] = &[
    Enter(0x77),
    Store(0x80),
    Enter(0x81),
    Enter(0x30),
    Store(0x02),    // cancelID
    Leave,
    Leave,
    Leave,
];

static START_LBURP_REQUEST_WALK: &[Walk] = &[
    Enter(0x77),
    Store(0x80),
    Enter(0x81),
    Enter(0x30),
    Store(0x04),    // updateStyleOID
    Leave,
    Leave,
    Leave,
];

static START_LBURP_RESPONSE_WALK: &[Walk] = &[
    Enter(0x78),
    Store(0x0a),
    Store(0x04),
    Store(0x04),
    Optional,
    Store(0xa3),
    Optional,
    Store(0x8a),
    Optional,
    Enter(0x8b),
    Store(0x02),    // maxOperations
    Leave,
    Leave,
];

static END_LBURP_REQUEST_WALK: &[Walk] = &[
    Enter(0x77),
    Store(0x80),
    Enter(0x81),
    Enter(0x30),
    Store(0x02),    // sequenceNumber
    Leave,
    Leave,
    Leave,
];

static LBURP_UPDATE_REQUEST_WALK: &[Walk] = &[
    Enter(0x77),
    Store(0x80),
    Enter(0x81),
    Enter(0x30),
    Store(0x02),    // sequenceNumber
    Store(0x30),    // updateOperationList
    Leave,
    Leave,
    Leave,
];

static TURN_REQUEST_WALK: &[Walk] = &[
    Enter(0x77),
    Store(0x80),
    Enter(0x81),
    Enter(0x30),
    Optional,
    Store(0x01),    // mutual
    Store(0x04),    // identifier
    Leave,
    Leave,
    Leave,
];

static END_TXN_REQUEST_WALK: &[Walk] = &[
    Enter(0x77),
    Store(0x80),
    Enter(0x81),
    Enter(0x30),
    Optional,
    Store(0x01),    // commit
    Store(0x04),    // identifier
    Leave,
    Leave,
    Leave,
];

static END_TXN_RESPONSE_WALK: &[Walk] = &[
    Enter(0x78),
    Store(0x0a),
    Store(0x04),
    Store(0x04),
    Optional,
    Store(0xa3),
    Optional,
    Store(0x8a),
    Optional,
    Enter(0x8b),
    Enter(0x30),
    Optional,
    Store(0x02),    // messageID
    Optional,
    Store(0x30),    // updatesControls
    Leave,
    Leave,
    Leave,
];

/// One row of the opcode table: the walk program for the operation and
/// the size of its parsed-field array. Rows without a program belong to
/// opcodes nothing is defined for.
pub struct OpcodeEntry {
    pub walk: Option<&'static [Walk]>,
    pub fields: usize,
}

const fn op(walk: &'static [Walk], fields: usize) -> OpcodeEntry {
    OpcodeEntry {
        walk: Some(walk),
        fields,
    }
}

const fn vacant() -> OpcodeEntry {
    OpcodeEntry {
        walk: None,
        fields: 0,
    }
}

lazy_static! {
    pub static ref OPCODE_TABLE: [OpcodeEntry; OPCODE_COUNT] = [
    op(BIND_REQUEST_WALK, 5),              //  0
    op(BIND_RESPONSE_WALK, 5),             //  1
    op(UNBIND_REQUEST_WALK, 1),            //  2
    op(SEARCH_REQUEST_WALK, 8),            //  3
    op(SEARCH_RESULT_ENTRY_WALK, 2),       //  4
    op(SEARCH_RESULT_DONE_WALK, 4),        //  5
    op(MODIFY_REQUEST_WALK, 2),            //  6
    op(MODIFY_RESPONSE_WALK, 4),           //  7
    op(ADD_REQUEST_WALK, 2),               //  8
    op(ADD_RESPONSE_WALK, 4),              //  9
    op(DEL_REQUEST_WALK, 1),               // 10
    op(DEL_RESPONSE_WALK, 4),              // 11
    op(MODIFY_DN_REQUEST_WALK, 4),         // 12
    op(MODIFY_DN_RESPONSE_WALK, 4),        // 13
    op(COMPARE_REQUEST_WALK, 3),           // 14
    op(COMPARE_RESPONSE_WALK, 4),          // 15
    op(ABANDON_REQUEST_WALK, 1),           // 16
    vacant(),                              // 17
    vacant(),                              // 18
    op(SEARCH_RESULT_REFERENCE_WALK, 1),   // 19
    vacant(),                              // 20
    vacant(),                              // 21
    vacant(),                              // 22
    op(EXTENDED_REQUEST_WALK, 2),          // 23
    op(EXTENDED_RESPONSE_WALK, 6),         // 24
    op(INTERMEDIATE_RESPONSE_WALK, 2),     // 25
    vacant(),                              // 26
    vacant(),                              // 27
    vacant(),                              // 28
    vacant(),                              // 29
    vacant(),                              // 30
    vacant(),                              // 31
    op(EXTENDED_REQUEST_WALK, 2),          // 32 StartTLS request
    op(EXTENDED_RESPONSE_WALK, 6),         // 33 StartTLS response
    op(PASSWD_MODIFY_REQUEST_WALK, 4),     // 34
    op(PASSWD_MODIFY_RESPONSE_WALK, 6),    // 35
    op(EXTENDED_REQUEST_WALK, 2),          // 36 WhoAmI request
    op(EXTENDED_RESPONSE_WALK, 6),         // 37 WhoAmI response
    op(CANCEL_REQUEST_WALK, 2),            // 38
    op(EXTENDED_RESPONSE_WALK, 6),         // 39 Cancel response
    op(START_LBURP_REQUEST_WALK, 2),       // 40
    op(START_LBURP_RESPONSE_WALK, 6),      // 41
    op(END_LBURP_REQUEST_WALK, 2),         // 42
    op(EXTENDED_RESPONSE_WALK, 6),         // 43 EndLBURP response
    op(LBURP_UPDATE_REQUEST_WALK, 3),      // 44
    op(EXTENDED_RESPONSE_WALK, 6),         // 45 LBURPUpdate response
    op(TURN_REQUEST_WALK, 3),              // 46
    op(EXTENDED_RESPONSE_WALK, 6),         // 47 Turn response
    op(EXTENDED_REQUEST_WALK, 2),          // 48 StartTxn request
    op(EXTENDED_RESPONSE_WALK, 6),         // 49 StartTxn response
    op(END_TXN_REQUEST_WALK, 3),           // 50
    op(END_TXN_RESPONSE_WALK, 7),          // 51
    op(EXTENDED_RESPONSE_WALK, 6),         // 52 AbortedTxn notice
    ];
}

pub fn entry(opcode: Opcode) -> Option<&'static OpcodeEntry> {
    OPCODE_TABLE.get(opcode as usize)
}

// Response opcodes, one bit each, in the same two-word layout as the
// per-endpoint bitmaps.
static RESPONSE_MASK: [u32; 2] = [
    (1 << BIND_RESPONSE)
        | (1 << SEARCH_RESULT_ENTRY)
        | (1 << SEARCH_RESULT_DONE)
        | (1 << MODIFY_RESPONSE)
        | (1 << ADD_RESPONSE)
        | (1 << DEL_RESPONSE)
        | (1 << MODIFY_DN_RESPONSE)
        | (1 << COMPARE_RESPONSE)
        | (1 << SEARCH_RESULT_REFERENCE)
        | (1 << EXTENDED_RESPONSE)
        | (1 << INTERMEDIATE_RESPONSE),
    (1 << (STARTTLS_RESPONSE & 31))
        | (1 << (PASSWD_MODIFY_RESPONSE & 31))
        | (1 << (WHOAMI_RESPONSE & 31))
        | (1 << (CANCEL_RESPONSE & 31))
        | (1 << (START_LBURP_RESPONSE & 31))
        | (1 << (END_LBURP_RESPONSE & 31))
        | (1 << (LBURP_UPDATE_RESPONSE & 31))
        | (1 << (TURN_RESPONSE & 31))
        | (1 << (START_TXN_RESPONSE & 31))
        | (1 << (END_TXN_RESPONSE & 31))
        | (1 << (ABORTED_TXN_RESPONSE & 31)),
];

/// Is this opcode a response as far as dispatch routing is concerned?
pub fn is_response(opcode: Opcode) -> bool {
    let word = (opcode >> 5) as usize;
    word < RESPONSE_MASK.len() && RESPONSE_MASK[word] & (1 << (opcode & 31)) != 0
}
