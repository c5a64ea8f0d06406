//! Field extraction from candidate lines.
//!
//! An ordered table maps literal prefixes of the normalized line to field
//! kinds; the first match wins and the value is the remainder, trimmed.
//! Exception: the path value is sliced out of the raw, un-normalized line at
//! a fixed offset, because paths may contain whitespace runs (or invalid
//! UTF-8) that normalization would corrupt.

use crate::error::{ScanError, ScanResult};
use crate::types::FieldValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FieldKind {
    Flags,
    MaxBlkId,
    Path,
    Uid,
    Gid,
    Atime,
    Mtime,
    Ctime,
    Crtime,
    Gen,
    Mode,
    Size,
    Parent,
    Links,
    Pflags,
}

/// First match wins; the zdb spellings with a `dnode ` prefix sit before the
/// bare names so both vintages of the tool are covered.
const FIELD_PREFIXES: &[(&str, FieldKind)] = &[
    ("dnode flags:", FieldKind::Flags),
    ("dnode maxblkid:", FieldKind::MaxBlkId),
    ("flags", FieldKind::Flags),
    ("maxblkid", FieldKind::MaxBlkId),
    ("path", FieldKind::Path),
    ("uid", FieldKind::Uid),
    ("gid", FieldKind::Gid),
    ("atime", FieldKind::Atime),
    ("mtime", FieldKind::Mtime),
    ("ctime", FieldKind::Ctime),
    ("crtime", FieldKind::Crtime),
    ("gen", FieldKind::Gen),
    ("mode", FieldKind::Mode),
    ("size", FieldKind::Size),
    ("parent", FieldKind::Parent),
    ("links", FieldKind::Links),
    ("pflags", FieldKind::Pflags),
];

/// Byte offset of the path value in the raw line: the literal `\tpath\t`.
const PATH_RAW_PREFIX: &[u8] = b"\tpath\t";

/// Match `norm` against the prefix table at a token boundary. Returns the
/// kind and the trimmed remainder.
fn match_prefix(norm: &str) -> Option<(FieldKind, &str)> {
    for (pat, kind) in FIELD_PREFIXES {
        if let Some(rest) = norm.strip_prefix(pat)
            && (rest.is_empty() || rest.starts_with(' '))
        {
            return Some((*kind, rest.trim_start()));
        }
    }
    None
}

fn parse_u64(value: &str, id: u64, field: &'static str) -> ScanResult<u64> {
    value
        .parse::<u64>()
        .map_err(|_| ScanError::MalformedField {
            id,
            field,
            value: value.to_string(),
        })
}

/// Extract the path bytes from the raw line. The line must start with
/// `\tpath\t` and carry its trailing newline; the value is everything in
/// between, untouched.
fn extract_path(raw: &[u8], id: u64) -> ScanResult<Vec<u8>> {
    let ok = raw.len() > PATH_RAW_PREFIX.len()
        && raw.starts_with(PATH_RAW_PREFIX)
        && raw.ends_with(b"\n");
    if !ok {
        return Err(ScanError::MalformedField {
            id,
            field: "path",
            value: String::from_utf8_lossy(raw).into_owned(),
        });
    }
    Ok(raw[PATH_RAW_PREFIX.len()..raw.len() - 1].to_vec())
}

/// Try to extract a field from a candidate line. `norm` is the normalized
/// line, `raw` the original bytes (newline included), `id` the object the
/// current record span belongs to (for error context). Returns `Ok(None)`
/// when no prefix matches: the caller treats that as an anomaly, not an
/// error. A matched prefix with an unconvertible value is fatal, for optional
/// fields too.
pub fn extract_field(norm: &str, raw: &[u8], id: u64) -> ScanResult<Option<FieldValue>> {
    let Some((kind, value)) = match_prefix(norm) else {
        return Ok(None);
    };
    let fv = match kind {
        FieldKind::Flags => FieldValue::Flags(value.to_string()),
        FieldKind::MaxBlkId => FieldValue::MaxBlkId(parse_u64(value, id, "maxblkid")?),
        FieldKind::Path => FieldValue::Path(extract_path(raw, id)?),
        FieldKind::Uid => FieldValue::Uid(parse_u64(value, id, "uid")?),
        FieldKind::Gid => FieldValue::Gid(parse_u64(value, id, "gid")?),
        FieldKind::Atime => FieldValue::Atime(value.to_string()),
        FieldKind::Mtime => FieldValue::Mtime(value.to_string()),
        FieldKind::Ctime => FieldValue::Ctime(value.to_string()),
        FieldKind::Crtime => FieldValue::Crtime(value.to_string()),
        FieldKind::Gen => FieldValue::Gen(parse_u64(value, id, "gen")?),
        FieldKind::Mode => FieldValue::Mode(value.to_string()),
        FieldKind::Size => FieldValue::Size(parse_u64(value, id, "size")?),
        FieldKind::Parent => FieldValue::Parent(parse_u64(value, id, "parent")?),
        FieldKind::Links => FieldValue::Links(parse_u64(value, id, "links")?),
        FieldKind::Pflags => FieldValue::Pflags(value.to_string()),
    };
    Ok(Some(fv))
}
