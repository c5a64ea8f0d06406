//! Per-stream record state machine.
//!
//! The stream has no explicit end-of-record marker: a record's span runs from
//! its lead-in row to the next header marker (or end of input). The machine
//! therefore finalizes lazily, on the header that opens the next group.

use log::warn;

use crate::engine::merge::DnodeIndex;
use crate::error::{ScanError, ScanResult};
use crate::parser::fields::extract_field;
use crate::parser::normalize::{LineClass, classify, normalize};
use crate::types::DnodeRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParseState {
    /// Waiting for a header marker.
    Scanning,
    /// Header just seen; the next non-blank line must be a lead-in row.
    InHeader,
    /// Accumulating optional fields for the given object id.
    InRecord(u64),
}

/// What a fed line did, for the driver's bookkeeping (status display,
/// checkpoint cadence, early exit, parent watching).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedEvent {
    None,
    RecordStarted(u64),
    RecordFinalized(u64),
}

/// Decode a lead-in row: whitespace-delimited tokens, positionally
/// `[id, lvl, iblk, dblk, dsize, dnsize, lsize, %full, type...]`.
fn parse_lead_in(norm: &str) -> ScanResult<DnodeRecord> {
    let malformed = || ScanError::MalformedLeadInRow {
        line: norm.to_string(),
    };
    let tokens: Vec<&str> = norm.split_whitespace().collect();
    if tokens.len() < 9 {
        return Err(malformed());
    }
    let object_id: u64 = tokens[0].parse().map_err(|_| malformed())?;
    let lvl: u64 = tokens[1].parse().map_err(|_| malformed())?;
    let pct_full: f64 = tokens[7].parse().map_err(|_| malformed())?;
    Ok(DnodeRecord::new(
        object_id,
        lvl,
        tokens[2].to_string(),
        tokens[3].to_string(),
        tokens[4].to_string(),
        tokens[5].to_string(),
        tokens[6].to_string(),
        pct_full,
        tokens[8..].join(" "),
    ))
}

/// Drives one stream's lines through classification, extraction, and the
/// merge engine. One parser per zdb invocation.
#[derive(Debug)]
pub struct RecordParser {
    state: ParseState,
    /// Unrecognized, non-ignorable lines seen so far. Logged, never fatal.
    pub anomalies: u64,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::Scanning,
            anomalies: 0,
        }
    }

    fn anomaly(&mut self, norm: &str) {
        self.anomalies += 1;
        warn!("unrecognized line skipped: {norm:?}");
    }

    /// Feed one raw line (trailing newline included). Mutates `index` through
    /// the merge engine; returns what happened for the driver's bookkeeping.
    pub fn feed(&mut self, raw: &[u8], index: &mut DnodeIndex) -> ScanResult<FeedEvent> {
        let norm = normalize(raw);
        let class = classify(&norm);

        // Blank lines never transition, regardless of state.
        if class == LineClass::Blank {
            return Ok(FeedEvent::None);
        }

        match (self.state, class) {
            (ParseState::Scanning, LineClass::Header) => {
                self.state = ParseState::InHeader;
                Ok(FeedEvent::None)
            }
            // Pre-header text (dataset banners etc.) is either known noise or
            // an anomaly; neither starts a record.
            (ParseState::Scanning, LineClass::Ignorable) => Ok(FeedEvent::None),
            (ParseState::Scanning, LineClass::Candidate) => {
                self.anomaly(&norm);
                Ok(FeedEvent::None)
            }

            // The line after a header must be the lead-in row. Anything else
            // means the stream's framing assumption is broken.
            (ParseState::InHeader, LineClass::Candidate) => {
                let rec = parse_lead_in(&norm)?;
                let id = index.upsert_mandatory(rec)?;
                self.state = ParseState::InRecord(id);
                Ok(FeedEvent::RecordStarted(id))
            }
            (ParseState::InHeader, LineClass::Header | LineClass::Ignorable) => {
                Err(ScanError::MalformedLeadInRow {
                    line: norm.to_string(),
                })
            }

            (ParseState::InRecord(id), LineClass::Header) => {
                self.state = ParseState::InHeader;
                Ok(FeedEvent::RecordFinalized(id))
            }
            (ParseState::InRecord(_), LineClass::Ignorable) => Ok(FeedEvent::None),
            (ParseState::InRecord(id), LineClass::Candidate) => {
                match extract_field(&norm, raw, id)? {
                    Some(fv) => {
                        index.merge_optional(id, fv)?;
                        Ok(FeedEvent::None)
                    }
                    None => {
                        self.anomaly(&norm);
                        Ok(FeedEvent::None)
                    }
                }
            }

            (_, LineClass::Blank) => Ok(FeedEvent::None),
        }
    }

    /// End of input: finalize whatever record is open. Returns its id.
    pub fn finish(&mut self) -> Option<u64> {
        match self.state {
            ParseState::InRecord(id) => {
                self.state = ParseState::Scanning;
                Some(id)
            }
            _ => {
                self.state = ParseState::Scanning;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &[u8] =
        b"    Object  lvl   iblk   dblk  dsize  dnsize  lsize   %full  type\n";

    fn feed_all(lines: &[&[u8]]) -> (DnodeIndex, RecordParser, Vec<FeedEvent>) {
        let mut index = DnodeIndex::new();
        let mut parser = RecordParser::new();
        let mut events = Vec::new();
        for line in lines {
            events.push(parser.feed(line, &mut index).unwrap());
        }
        (index, parser, events)
    }

    #[test]
    fn single_record_with_fields() {
        let (index, mut parser, events) = feed_all(&[
            HEADER,
            b"        12    0    512    512   1024     168   1024   10.0  ZFS plain file\n",
            b"\tparent\t5\n",
            b"\tuid\t1000\n",
        ]);
        assert_eq!(parser.finish(), Some(12));
        assert_eq!(events[1], FeedEvent::RecordStarted(12));
        let rec = index.get(12).unwrap();
        assert_eq!(rec.obj_type, "ZFS plain file");
        assert_eq!(rec.parent, Some(5));
        assert_eq!(rec.uid, Some(1000));
        assert_eq!(rec.pct_full, 10.0);
    }

    #[test]
    fn second_header_finalizes_first_record() {
        let (index, mut parser, events) = feed_all(&[
            HEADER,
            b"  12 0 512 512 1024 168 1024 10.0 ZFS plain file\n",
            b"\tparent\t5\n",
            HEADER,
            b"  13 0 512 512 1024 168 1024 5.0 ZFS directory\n",
        ]);
        assert!(events.contains(&FeedEvent::RecordFinalized(12)));
        assert_eq!(parser.finish(), Some(13));
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(13).unwrap().obj_type, "ZFS directory");
        assert_eq!(index.get(13).unwrap().parent, None);
    }

    #[test]
    fn anomaly_between_fields_does_not_disturb_record() {
        let (index, mut parser, _) = feed_all(&[
            HEADER,
            b"  12 0 512 512 1024 168 1024 10.0 ZFS plain file\n",
            b"\tparent\t5\n",
            b"\tsome future zdb line nobody has seen\n",
            b"\tuid\t1000\n",
        ]);
        assert_eq!(parser.anomalies, 1);
        parser.finish();
        let rec = index.get(12).unwrap();
        assert_eq!(rec.parent, Some(5));
        assert_eq!(rec.uid, Some(1000));
    }

    #[test]
    fn blank_lines_never_transition() {
        let (index, mut parser, _) = feed_all(&[
            b"\n",
            HEADER,
            b"\n",
            b"  12 0 512 512 1024 168 1024 10.0 ZFS plain file\n",
            b"\n",
            b"\tparent\t5\n",
        ]);
        assert_eq!(parser.finish(), Some(12));
        assert_eq!(index.get(12).unwrap().parent, Some(5));
    }

    #[test]
    fn garbage_lead_in_is_fatal() {
        let mut index = DnodeIndex::new();
        let mut parser = RecordParser::new();
        parser.feed(HEADER, &mut index).unwrap();
        let err = parser
            .feed(b"this is not a lead-in row at all\n", &mut index)
            .unwrap_err();
        assert!(matches!(err, ScanError::MalformedLeadInRow { .. }));
    }

    #[test]
    fn pre_header_noise_is_skipped() {
        let (index, mut parser, _) = feed_all(&[
            b"Dataset tank/data [ZPL], ID 54, cr_txg 1, 100M, 9 objects\n",
            b"\n",
            HEADER,
            b"  12 0 512 512 1024 168 1024 10.0 ZFS plain file\n",
        ]);
        assert_eq!(parser.anomalies, 0);
        assert_eq!(parser.finish(), Some(12));
        assert_eq!(index.len(), 1);
    }
}
