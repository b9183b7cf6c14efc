//! Binary save codec.
//!
//! A save payload is a stream of framed records: FourCC kind, format
//! version, payload length, payload. Readers skip unknown kinds and abort a
//! single record on corruption without giving up on the rest, so a bad
//! record costs one subsystem's state, not the save.
//!
//! All integers and floats are little-endian.

use tracing::{debug, warn};

use crate::error::{AttuneError, Result};
use crate::types::{Category, ItemId, SourceId};

/// Current record format version.
pub const SAVE_VERSION: u32 = 2;

/// Oldest version this build can still read.
pub const MIN_SUPPORTED_VERSION: u32 = 1;

/// Upper bound on any count or string length in a record. Anything larger
/// is corruption, not data.
pub const SANITY_LIMIT: u32 = 4096;

const fn fourcc(tag: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*tag)
}

/// Learning targets record.
pub const KIND_TARGETS: u32 = fourcc(b"TGTS");
/// Progress records.
pub const KIND_PROGRESS: u32 = fourcc(b"PROG");
/// Early-learned set.
pub const KIND_EARLY: u32 = fourcc(b"ERLY");

/// Everything the engine persists, in codec-level form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveData {
    /// Active learning targets.
    pub targets: Vec<(Category, ItemId)>,
    /// Per-item progress: `(item, percent, unlocked, custom accumulators)`.
    pub progress: Vec<(ItemId, f32, bool, Vec<(SourceId, f32)>)>,
    /// The early-learned set.
    pub early: Vec<ItemId>,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_f32(out: &mut Vec<u8>, value: f32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_str(out: &mut Vec<u8>, value: &str) {
    put_u32(out, value.len() as u32);
    out.extend_from_slice(value.as_bytes());
}

fn put_record(out: &mut Vec<u8>, kind: u32, payload: &[u8]) {
    put_u32(out, kind);
    put_u32(out, SAVE_VERSION);
    put_u32(out, payload.len() as u32);
    out.extend_from_slice(payload);
}

/// Encode a save payload at the current format version.
#[must_use]
pub fn encode(data: &SaveData) -> Vec<u8> {
    let mut out = Vec::new();

    let mut targets = Vec::new();
    put_u32(&mut targets, data.targets.len() as u32);
    for (category, item) in &data.targets {
        put_str(&mut targets, category.as_str());
        put_u32(&mut targets, item.0);
    }
    put_record(&mut out, KIND_TARGETS, &targets);

    let mut progress = Vec::new();
    put_u32(&mut progress, data.progress.len() as u32);
    for (item, percent, unlocked, custom) in &data.progress {
        put_u32(&mut progress, item.0);
        put_f32(&mut progress, *percent);
        progress.push(u8::from(*unlocked));
        put_u32(&mut progress, custom.len() as u32);
        for (source, xp) in custom {
            put_str(&mut progress, source.as_str());
            put_f32(&mut progress, *xp);
        }
    }
    put_record(&mut out, KIND_PROGRESS, &progress);

    let mut early = Vec::new();
    put_u32(&mut early, data.early.len() as u32);
    for item in &data.early {
        put_u32(&mut early, item.0);
    }
    put_record(&mut out, KIND_EARLY, &early);

    out
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(AttuneError::CorruptSave(format!(
                "truncated record: wanted {n} bytes, {} left",
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn f32(&mut self) -> Result<f32> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn bounded_u32(&mut self, what: &str) -> Result<u32> {
        let value = self.u32()?;
        if value > SANITY_LIMIT {
            return Err(AttuneError::CorruptSave(format!(
                "{what} {value} exceeds sanity limit {SANITY_LIMIT}"
            )));
        }
        Ok(value)
    }

    fn string(&mut self, what: &str) -> Result<String> {
        let len = self.bounded_u32(what)? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| AttuneError::CorruptSave(format!("{what} is not UTF-8")))
    }
}

fn decode_targets(
    payload: &[u8],
    remap: &impl Fn(ItemId) -> Option<ItemId>,
) -> Result<Vec<(Category, ItemId)>> {
    let mut reader = Reader::new(payload);
    let count = reader.bounded_u32("target count")?;
    let mut targets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let category = Category::new(reader.string("category name length")?);
        let raw = ItemId(reader.u32()?);
        match remap(raw) {
            Some(item) => targets.push((category, item)),
            None => warn!(item = %raw, "dropping target, ID no longer resolvable"),
        }
    }
    Ok(targets)
}

#[allow(clippy::type_complexity)]
fn decode_progress(
    payload: &[u8],
    version: u32,
    remap: &impl Fn(ItemId) -> Option<ItemId>,
) -> Result<Vec<(ItemId, f32, bool, Vec<(SourceId, f32)>)>> {
    let mut reader = Reader::new(payload);
    let count = reader.bounded_u32("progress count")?;
    let mut progress = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let raw = ItemId(reader.u32()?);
        let percent = reader.f32()?;
        let unlocked = reader.u8()? != 0;
        let mut custom = Vec::new();
        if version >= 2 {
            let custom_count = reader.bounded_u32("custom source count")?;
            for _ in 0..custom_count {
                let name = reader.string("custom source name length")?;
                let xp = reader.f32()?;
                custom.push((SourceId::new(name), xp));
            }
        }
        match remap(raw) {
            Some(item) => progress.push((item, percent, unlocked, custom)),
            None => warn!(item = %raw, "dropping progress record, ID no longer resolvable"),
        }
    }
    Ok(progress)
}

fn decode_early(
    payload: &[u8],
    remap: &impl Fn(ItemId) -> Option<ItemId>,
) -> Result<Vec<ItemId>> {
    let mut reader = Reader::new(payload);
    let count = reader.bounded_u32("early count")?;
    let mut early = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let raw = ItemId(reader.u32()?);
        match remap(raw) {
            Some(item) => early.push(item),
            None => warn!(item = %raw, "dropping early entry, ID no longer resolvable"),
        }
    }
    Ok(early)
}

/// Decode a save payload.
///
/// `remap` translates persisted IDs into the current session's IDs; entries
/// it cannot resolve are dropped with a warning. A corrupt or unreadable
/// record loses only that record — decoding continues with the next frame.
///
/// # Errors
/// Returns `AttuneError::CorruptSave` only when the frame structure itself
/// is unreadable (truncated header or payload).
pub fn decode(bytes: &[u8], remap: impl Fn(ItemId) -> Option<ItemId>) -> Result<SaveData> {
    let mut reader = Reader::new(bytes);
    let mut data = SaveData::default();

    while reader.remaining() > 0 {
        let kind = reader.u32()?;
        let version = reader.u32()?;
        let len = reader.u32()? as usize;
        let payload = reader.take(len)?;

        let outcome = if !(MIN_SUPPORTED_VERSION..=SAVE_VERSION).contains(&version) {
            Err(AttuneError::UnsupportedVersion {
                found: version,
                min: MIN_SUPPORTED_VERSION,
                max: SAVE_VERSION,
            })
        } else {
            match kind {
                KIND_TARGETS => decode_targets(payload, &remap).map(|t| data.targets = t),
                KIND_PROGRESS => {
                    decode_progress(payload, version, &remap).map(|p| data.progress = p)
                }
                KIND_EARLY => decode_early(payload, &remap).map(|e| data.early = e),
                other => {
                    warn!(
                        kind = %String::from_utf8_lossy(&other.to_le_bytes()),
                        len,
                        "unknown record kind, skipping"
                    );
                    Ok(())
                }
            }
        };
        if let Err(err) = outcome {
            warn!(error = %err, "record failed to decode, keeping what loaded");
        }
    }

    debug!(
        targets = data.targets.len(),
        progress = data.progress.len(),
        early = data.early.len(),
        "save payload decoded"
    );
    Ok(data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
