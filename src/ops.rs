//! Typed views of parsed operation data.
//!
//! The router hands callbacks a flat cursor array laid out by the
//! opcode's walk program. These wrappers give the array named fields, so
//! handler code reads `req.name()` instead of `data[1]`. They are plain
//! views: no copying, no validation beyond the parse that produced the
//! array.
//!
//! Null cursors mark optional fields that were absent on the wire.

use derwalk::Cursor;

macro_rules! view {
    ($(#[$doc:meta])* $name:ident, $fields:expr, { $($(#[$fdoc:meta])* $field:ident: $idx:expr),+ $(,)? }) => {
        $(#[$doc])*
        pub struct $name<'a> {
            data: &'a [Cursor],
        }

        impl<'a> $name<'a> {
            pub fn new(data: &'a [Cursor]) -> $name<'a> {
                debug_assert_eq!(data.len(), $fields);
                $name { data }
            }

            $(
                $(#[$fdoc])*
                pub fn $field(&self) -> &Cursor {
                    &self.data[$idx]
                }
            )+
        }
    };
}

view!(
    /// Bind request: protocol version, bind DN, and one of the
    /// authentication choices.
    BindRequest, 5, {
        version: 0,
        name: 1,
        /// Simple authentication password; null when SASL was chosen.
        simple: 2,
        sasl_mechanism: 3,
        sasl_credentials: 4,
    }
);

view!(
    BindResponse, 5, {
        result_code: 0,
        matched_dn: 1,
        diagnostic_message: 2,
        referral: 3,
        server_sasl_creds: 4,
    }
);

view!(
    /// The shared LDAPResult shape of the plain response operations.
    LdapResult, 4, {
        result_code: 0,
        matched_dn: 1,
        diagnostic_message: 2,
        referral: 3,
    }
);

view!(
    SearchRequest, 8, {
        base_object: 0,
        scope: 1,
        deref_aliases: 2,
        size_limit: 3,
        time_limit: 4,
        types_only: 5,
        /// The filter as one raw element, header included.
        filter: 6,
        attributes: 7,
    }
);

view!(
    SearchResultEntry, 2, {
        object_name: 0,
        attributes: 1,
    }
);

view!(
    ModifyRequest, 2, {
        object: 0,
        changes: 1,
    }
);

view!(
    AddRequest, 2, {
        entry: 0,
        attributes: 1,
    }
);

view!(
    /// Delete request; the whole operation is the DN.
    DelRequest, 1, {
        dn: 0,
    }
);

view!(
    ModifyDnRequest, 4, {
        entry: 0,
        newrdn: 1,
        delete_old_rdn: 2,
        new_superior: 3,
    }
);

view!(
    CompareRequest, 3, {
        entry: 0,
        attribute_desc: 1,
        assertion_value: 2,
    }
);

view!(
    /// Abandon request; the content is the target message id.
    AbandonRequest, 1, {
        message_id: 0,
    }
);

view!(
    /// Search continuation reference: the content octets of the
    /// SEQUENCE OF URI.
    SearchResultReference, 1, {
        uris: 0,
    }
);

view!(
    ExtendedRequest, 2, {
        name: 0,
        value: 1,
    }
);

view!(
    ExtendedResponse, 6, {
        result_code: 0,
        matched_dn: 1,
        diagnostic_message: 2,
        referral: 3,
        name: 4,
        value: 5,
    }
);

view!(
    IntermediateResponse, 2, {
        name: 0,
        value: 1,
    }
);

view!(
    /// Password modify request with the value opened up.
    PasswdModifyRequest, 4, {
        name: 0,
        user_identity: 1,
        old_passwd: 2,
        new_passwd: 3,
    }
);

view!(
    /// Cancel request with the value opened up.
    CancelRequest, 2, {
        name: 0,
        cancel_id: 1,
    }
);
