//! The walk interpreter: packing and unpacking of DER structures
//! described by static instruction sequences.

use bytes::Bytes;
use thiserror::Error;

use crate::cursor::Cursor;
use crate::parse::parse_header;
use crate::write::{header_len, put_header};

/// One step of a walk program.
///
/// Tags are full identifier octets, constructed bit included where the
/// production requires it, so packing a stored field reproduces the
/// original element exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Walk {
    /// Descend into an element carrying this identifier octet.
    Enter(u8),
    /// Ascend out of the element entered last.
    Leave,
    /// Store the content octets of an element with this identifier octet.
    Store(u8),
    /// Store a whole element, header included, whatever its identifier.
    StoreAny,
    /// The following Enter or Store may be absent.
    Optional,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum WalkError {
    #[error("element does not match the expected structure")]
    Mismatch,
    #[error("trailing octets after the walked structure")]
    Trailing,
    #[error("a required field is absent")]
    MissingField,
    #[error("walk program and field array disagree")]
    Program,
}

/// Number of cursors a program stores.
pub fn field_count(walk: &[Walk]) -> usize {
    walk.iter()
        .filter(|w| matches!(w, Walk::Store(_) | Walk::StoreAny))
        .count()
}

// Split the next element off `rest`, returning (content, whole element).
// Returns None without consuming anything when `rest` is exhausted or the
// identifier octet does not match `want`; the caller decides whether that
// is acceptable.
fn element(rest: &mut Bytes, want: Option<u8>) -> Result<Option<(Bytes, Bytes)>, WalkError> {
    if rest.is_empty() {
        return Ok(None);
    }
    let (after, (tag, len)) = parse_header(rest.as_ref()).map_err(|_| WalkError::Mismatch)?;
    if let Some(want) = want {
        if tag != want {
            return Ok(None);
        }
    }
    let hlen = rest.len() - after.len();
    if hlen + len > rest.len() {
        return Err(WalkError::Mismatch);
    }
    let whole = rest.split_to(hlen + len);
    let content = whole.slice(hlen..);
    Ok(Some((content, whole)))
}

fn set_field(fields: &mut [Cursor], fi: &mut usize, c: Cursor) -> Result<(), WalkError> {
    let slot = fields.get_mut(*fi).ok_or(WalkError::Program)?;
    *slot = c;
    *fi += 1;
    Ok(())
}

// An absent optional group stores a null cursor for every field inside
// it. Returns the position of the group's Leave.
fn skip_group(
    walk: &[Walk],
    at: usize,
    fields: &mut [Cursor],
    fi: &mut usize,
) -> Result<usize, WalkError> {
    let mut depth = 1usize;
    let mut pc = at + 1;
    while pc < walk.len() {
        match walk[pc] {
            Walk::Enter(_) => depth += 1,
            Walk::Leave => {
                depth -= 1;
                if depth == 0 {
                    return Ok(pc);
                }
            }
            Walk::Store(_) | Walk::StoreAny => set_field(fields, fi, Cursor::null())?,
            Walk::Optional => (),
        }
        pc += 1;
    }
    Err(WalkError::Program)
}

/// Drive `walk` over `input`, storing one cursor per Store/StoreAny
/// instruction. Stored cursors alias the input buffer. Absent optional
/// fields store null cursors. Unconsumed octets at any level are an
/// error.
pub fn unpack(walk: &[Walk], input: &Cursor, fields: &mut [Cursor]) -> Result<(), WalkError> {
    let mut levels: Vec<Bytes> = vec![input.to_bytes()];
    let mut fi = 0usize;
    let mut pc = 0usize;
    let mut opt = false;
    while pc < walk.len() {
        match walk[pc] {
            Walk::Optional => {
                opt = true;
                pc += 1;
                continue;
            }
            Walk::Leave => {
                let done = levels.pop().ok_or(WalkError::Program)?;
                if levels.is_empty() {
                    return Err(WalkError::Program);
                }
                if !done.is_empty() {
                    return Err(WalkError::Trailing);
                }
            }
            Walk::Enter(tag) => {
                let top = levels.last_mut().ok_or(WalkError::Program)?;
                match element(top, Some(tag))? {
                    Some((content, _)) => levels.push(content),
                    None if opt => pc = skip_group(walk, pc, fields, &mut fi)?,
                    None => return Err(WalkError::Mismatch),
                }
            }
            Walk::Store(tag) => {
                let top = levels.last_mut().ok_or(WalkError::Program)?;
                match element(top, Some(tag))? {
                    Some((content, _)) => set_field(fields, &mut fi, Cursor::from(content))?,
                    None if opt => set_field(fields, &mut fi, Cursor::null())?,
                    None => return Err(WalkError::MissingField),
                }
            }
            Walk::StoreAny => {
                let top = levels.last_mut().ok_or(WalkError::Program)?;
                match element(top, None)? {
                    Some((_, whole)) => set_field(fields, &mut fi, Cursor::from(whole))?,
                    None if opt => set_field(fields, &mut fi, Cursor::null())?,
                    None => return Err(WalkError::MissingField),
                }
            }
        }
        opt = false;
        pc += 1;
    }
    if levels.len() != 1 || fi != fields.len() {
        return Err(WalkError::Program);
    }
    if !levels[0].is_empty() {
        return Err(WalkError::Trailing);
    }
    Ok(())
}

fn all_null(fields: &[Cursor]) -> bool {
    fields.iter().all(|c| c.is_null())
}

/// Size of the DER image [`pack_tail`] would produce; the dry-run half
/// of the packer.
pub fn pack_len(walk: &[Walk], fields: &[Cursor]) -> Result<usize, WalkError> {
    let (len, pc, fi) = measure(walk, 0, fields, 0)?;
    if pc != walk.len() || fi != fields.len() {
        return Err(WalkError::Program);
    }
    Ok(len)
}

// Measure instructions from `at` until the matching Leave (consumed) or
// the end of the program. Returns (octets, next pc, next field index).
fn measure(
    walk: &[Walk],
    at: usize,
    fields: &[Cursor],
    fi0: usize,
) -> Result<(usize, usize, usize), WalkError> {
    let mut pc = at;
    let mut fi = fi0;
    let mut len = 0usize;
    let mut opt = false;
    while pc < walk.len() {
        match walk[pc] {
            Walk::Optional => {
                opt = true;
                pc += 1;
                continue;
            }
            Walk::Leave => return Ok((len, pc + 1, fi)),
            Walk::Enter(_) => {
                let (inner, npc, nfi) = measure(walk, pc + 1, fields, fi)?;
                if !(opt && all_null(&fields[fi..nfi])) {
                    len += header_len(inner) + inner;
                }
                pc = npc;
                fi = nfi;
            }
            Walk::Store(_) => {
                let f = fields.get(fi).ok_or(WalkError::Program)?;
                if f.is_null() {
                    if !opt {
                        return Err(WalkError::MissingField);
                    }
                } else {
                    len += header_len(f.len()) + f.len();
                }
                fi += 1;
                pc += 1;
            }
            Walk::StoreAny => {
                let f = fields.get(fi).ok_or(WalkError::Program)?;
                if f.is_null() {
                    if !opt {
                        return Err(WalkError::MissingField);
                    }
                } else {
                    len += f.len();
                }
                fi += 1;
                pc += 1;
            }
        }
        opt = false;
    }
    Ok((len, pc, fi))
}

/// Pack the fields into the tail of `buf`: the image occupies
/// `buf[buf.len() - n..]` and `n` is returned. The caller sizes the
/// buffer, normally with [`pack_len`] plus whatever it will put in front.
pub fn pack_tail(walk: &[Walk], fields: &[Cursor], buf: &mut [u8]) -> Result<usize, WalkError> {
    let total = pack_len(walk, fields)?;
    if total > buf.len() {
        return Err(WalkError::Program);
    }
    let start = buf.len() - total;
    let (end, pc, fi) = emit(walk, 0, fields, 0, buf, start)?;
    if end != buf.len() || pc != walk.len() || fi != fields.len() {
        return Err(WalkError::Program);
    }
    Ok(total)
}

// The emitting twin of `measure`, writing forward from `pos`.
fn emit(
    walk: &[Walk],
    at: usize,
    fields: &[Cursor],
    fi0: usize,
    buf: &mut [u8],
    pos0: usize,
) -> Result<(usize, usize, usize), WalkError> {
    let mut pc = at;
    let mut fi = fi0;
    let mut pos = pos0;
    let mut opt = false;
    while pc < walk.len() {
        match walk[pc] {
            Walk::Optional => {
                opt = true;
                pc += 1;
                continue;
            }
            Walk::Leave => return Ok((pos, pc + 1, fi)),
            Walk::Enter(tag) => {
                let (inner, npc, nfi) = measure(walk, pc + 1, fields, fi)?;
                if opt && all_null(&fields[fi..nfi]) {
                    pc = npc;
                    fi = nfi;
                } else {
                    pos = put_header(buf, pos, tag, inner);
                    let (npos, npc, nfi) = emit(walk, pc + 1, fields, fi, buf, pos)?;
                    pos = npos;
                    pc = npc;
                    fi = nfi;
                }
            }
            Walk::Store(tag) => {
                let f = fields.get(fi).ok_or(WalkError::Program)?;
                if f.is_null() {
                    if !opt {
                        return Err(WalkError::MissingField);
                    }
                } else {
                    pos = put_header(buf, pos, tag, f.len());
                    buf[pos..pos + f.len()].copy_from_slice(f.as_slice());
                    pos += f.len();
                }
                fi += 1;
                pc += 1;
            }
            Walk::StoreAny => {
                let f = fields.get(fi).ok_or(WalkError::Program)?;
                if f.is_null() {
                    if !opt {
                        return Err(WalkError::MissingField);
                    }
                } else {
                    buf[pos..pos + f.len()].copy_from_slice(f.as_slice());
                    pos += f.len();
                }
                fi += 1;
                pc += 1;
            }
        }
        opt = false;
    }
    Ok((pos, pc, fi))
}
