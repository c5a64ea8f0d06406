//! Line normalization and classification.
//!
//! zdb's report is formatted for humans: columns are aligned with variable
//! whitespace and field lines are tab-indented. Matching happens on a
//! canonical form (trimmed, interior whitespace runs collapsed to single
//! spaces). Normalization operates on raw bytes first because the stream is
//! not guaranteed to be valid UTF-8; the lossy conversion afterwards is safe
//! for matching since the one field where bytes matter (path) is extracted
//! from the raw line, never the normalized one.

/// The column-header line that precedes every object's lead-in row,
/// in normalized form.
pub const HEADER_MARKER: &str = "Object lvl iblk dblk dsize dnsize lsize %full type";

/// Classification of a normalized line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineClass {
    /// Empty after normalization. Never causes a state transition.
    Blank,
    /// The header marker: a new record group starts.
    Header,
    /// Known structural noise carrying no per-object data.
    Ignorable,
    /// Potential field line; handed to the field extractor.
    Candidate,
}

/// How a noise pattern is applied to the normalized line.
#[derive(Clone, Copy, Debug)]
enum NoiseMatch {
    Prefix,
    Suffix,
    Substring,
}

struct NoiseRule {
    how: NoiseMatch,
    pat: &'static str,
}

const fn rule(how: NoiseMatch, pat: &'static str) -> NoiseRule {
    NoiseRule { how, pat }
}

/// Structural report sections zdb emits between and inside record groups.
/// Evaluated in order: prefixes, then suffixes, then substrings. The list is
/// necessarily incomplete and version-dependent; lines it misses are logged
/// as anomalies and skipped, never fatal.
const NOISE_RULES: &[NoiseRule] = &[
    rule(NoiseMatch::Prefix, "Dataset "),
    rule(NoiseMatch::Prefix, "Indirect blocks"),
    rule(NoiseMatch::Prefix, "segment ["),
    rule(NoiseMatch::Prefix, "Fat ZAP stats"),
    rule(NoiseMatch::Prefix, "Pointer table"),
    rule(NoiseMatch::Prefix, "ZAP entries"),
    rule(NoiseMatch::Prefix, "Leaf blocks"),
    rule(NoiseMatch::Prefix, "Total blocks"),
    rule(NoiseMatch::Prefix, "zap_block_type"),
    rule(NoiseMatch::Prefix, "zap_magic"),
    rule(NoiseMatch::Prefix, "zap_salt"),
    rule(NoiseMatch::Prefix, "Entries with"),
    rule(NoiseMatch::Prefix, "Blocks with"),
    rule(NoiseMatch::Prefix, "Blocks n/10"),
    rule(NoiseMatch::Prefix, "microzap:"),
    rule(NoiseMatch::Suffix, "bonus System attributes"),
    rule(NoiseMatch::Suffix, "(type: Regular File)"),
    rule(NoiseMatch::Suffix, "(type: Directory)"),
    rule(NoiseMatch::Substring, "L0 HOLE"),
    rule(NoiseMatch::Substring, "DVA[0]="),
];

/// Trim and collapse interior whitespace runs to single spaces, then convert
/// (lossily) to a `String` for matching.
pub fn normalize(raw: &[u8]) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(raw.len());
    let mut in_run = false;
    for &b in raw {
        if b.is_ascii_whitespace() {
            in_run = true;
            continue;
        }
        if in_run && !out.is_empty() {
            out.push(b' ');
        }
        in_run = false;
        out.push(b);
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Classify a normalized line. Header is an exact match; noise rules are
/// tried in table order.
pub fn classify(norm: &str) -> LineClass {
    if norm.is_empty() {
        return LineClass::Blank;
    }
    if norm == HEADER_MARKER {
        return LineClass::Header;
    }
    for r in NOISE_RULES {
        let hit = match r.how {
            NoiseMatch::Prefix => norm.starts_with(r.pat),
            NoiseMatch::Suffix => norm.ends_with(r.pat),
            NoiseMatch::Substring => norm.contains(r.pat),
        };
        if hit {
            return LineClass::Ignorable;
        }
    }
    LineClass::Candidate
}
