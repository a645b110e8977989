//! Binary persistence of models and partition states.
//!
//! Layout: the magic bytes `TKY1` followed by sections, each a little-endian
//! `u32` byte length and its payload. A state blob carries five sections in
//! the order of [`Section`]; a model blob carries only the model section.
//! Every section decodes on its own.

use std::sync::Arc;

use super::counter::MemberCounter;
use super::group::GroupKey;
use super::model::{Interval, IntervalModel};
use super::reviser::PartitionState;
use crate::error::{Result, TukeyError};
use crate::schema::{Cell, ColumnSchema, ColumnType, Domain};
use crate::warning::WarningLog;

pub const MAGIC: &[u8; 4] = b"TKY1";

const MISSING_TAG: u8 = 0xFF;

/// Sections of a state blob, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Model = 0,
    Members = 1,
    Outliers = 2,
    MissingGroups = 3,
    Warnings = 4,
}

/// Encode a model on its own.
pub fn encode_model(model: &IntervalModel) -> Vec<u8> {
    let mut section = Writer::default();
    section.model(model);
    assemble(&[section.finish()])
}

/// Encode a full partition state: model, three counters and warnings.
pub fn encode_state(state: &PartitionState) -> Vec<u8> {
    let mut model = Writer::default();
    model.model(state.model());
    let counters = [&state.members, &state.outliers, &state.missing_groups].map(|counter| {
        let mut w = Writer::default();
        w.counter(counter);
        w.finish()
    });
    let mut warnings = Writer::default();
    warnings.warnings(&state.warnings);

    let [members, outliers, missing] = counters;
    assemble(&[model.finish(), members, outliers, missing, warnings.finish()])
}

/// Decode the model section of a model or state blob.
pub fn decode_model(blob: &[u8]) -> Result<IntervalModel> {
    let mut reader = Reader::new(section(blob, Section::Model)?);
    let model = reader.model()?;
    reader.expect_end("model")?;
    Ok(model)
}

/// Decode one of the counter sections of a state blob.
pub fn decode_counter(blob: &[u8], which: Section) -> Result<MemberCounter> {
    if matches!(which, Section::Model | Section::Warnings) {
        return Err(TukeyError::Codec(format!("{:?} is not a counter section", which)));
    }
    let mut reader = Reader::new(section(blob, which)?);
    let counter = reader.counter()?;
    reader.expect_end("counter")?;
    Ok(counter)
}

/// Decode a full state blob.
pub fn decode_state(blob: &[u8]) -> Result<PartitionState> {
    let model = Arc::new(decode_model(blob)?);
    let mut state = PartitionState::new(model);
    state.members = decode_counter(blob, Section::Members)?;
    state.outliers = decode_counter(blob, Section::Outliers)?;
    state.missing_groups = decode_counter(blob, Section::MissingGroups)?;
    let mut reader = Reader::new(section(blob, Section::Warnings)?);
    state.warnings = reader.warnings()?;
    reader.expect_end("warnings")?;
    Ok(state)
}

/// Payload of one section.
pub fn section(blob: &[u8], which: Section) -> Result<&[u8]> {
    let mut reader = Reader::new(blob);
    if reader.take(MAGIC.len())? != MAGIC {
        return Err(TukeyError::Codec("missing TKY1 header".into()));
    }
    for idx in 0..=which as usize {
        if reader.is_at_end() {
            return Err(TukeyError::Codec(format!("section {:?} not present", which)));
        }
        let len = reader.u32()? as usize;
        let payload = reader.take(len)?;
        if idx == which as usize {
            return Ok(payload);
        }
    }
    Err(TukeyError::Codec(format!("section {:?} not present", which)))
}

fn assemble(sections: &[Vec<u8>]) -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    for payload in sections {
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
    }
    out
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_bits().to_le_bytes());
    }

    fn str(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn cell(&mut self, cell: &Cell) {
        match cell {
            Cell::Missing => self.u8(MISSING_TAG),
            Cell::Int(v) => {
                self.u8(ColumnType::Int.tag());
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            Cell::Long(v) => {
                self.u8(ColumnType::Long.tag());
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            Cell::Double(v) => {
                self.u8(ColumnType::Double.tag());
                self.f64(*v);
            }
            Cell::Str(s) => {
                self.u8(ColumnType::String.tag());
                self.str(s);
            }
            Cell::Bool(b) => {
                self.u8(ColumnType::Boolean.tag());
                self.u8(u8::from(*b));
            }
        }
    }

    fn key(&mut self, key: &GroupKey) {
        self.u32(key.len() as u32);
        for cell in key.cells() {
            self.cell(cell);
        }
    }

    fn column(&mut self, column: &ColumnSchema) {
        self.str(&column.name);
        self.u32(column.position as u32);
        self.u8(column.column_type.tag());
        match column.domain {
            Some(domain) => {
                self.u8(1);
                self.f64(domain.lower);
                self.f64(domain.upper);
            }
            None => self.u8(0),
        }
    }

    fn model(&mut self, model: &IntervalModel) {
        for columns in [model.group_columns(), model.outlier_columns()] {
            self.u32(columns.len() as u32);
            for column in columns {
                self.column(column);
            }
        }
        self.u32(model.group_count() as u32);
        for (key, intervals) in model.groups() {
            self.key(key);
            self.u32(intervals.len() as u32);
            for (column, interval) in intervals {
                self.str(column);
                self.f64(interval.lower);
                self.f64(interval.upper);
            }
        }
    }

    fn counter(&mut self, counter: &MemberCounter) {
        let entries: Vec<_> = counter.entries().collect();
        self.u32(entries.len() as u32);
        for (column, key, count) in entries {
            self.str(column);
            self.key(key);
            self.u64(count);
        }
    }

    fn warnings(&mut self, log: &WarningLog) {
        self.u32(log.len() as u32);
        for message in log.messages() {
            self.str(message);
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn expect_end(&self, what: &str) -> Result<()> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(TukeyError::Codec(format!(
                "{} trailing bytes after {} section",
                self.bytes.len() - self.pos,
                what
            )))
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                TukeyError::Codec(format!("unexpected end of data at byte {}", self.pos))
            })?;
        let bytes = self.bytes;
        let slice = &bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(u64::from_le_bytes(self.array()?)))
    }

    /// A length prefix, rejected when it cannot fit in the remaining bytes.
    fn count(&mut self, min_item_size: usize) -> Result<usize> {
        let len = self.u32()? as usize;
        let remaining = self.bytes.len() - self.pos;
        if len.saturating_mul(min_item_size) > remaining {
            return Err(TukeyError::Codec(format!(
                "length {} at byte {} exceeds remaining data",
                len, self.pos
            )));
        }
        Ok(len)
    }

    fn str(&mut self) -> Result<String> {
        let len = self.count(1)?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| TukeyError::Codec(format!("invalid UTF-8 string: {}", e)))
    }

    fn column_type(&mut self) -> Result<ColumnType> {
        let tag = self.u8()?;
        ColumnType::from_tag(tag)
            .ok_or_else(|| TukeyError::Codec(format!("unknown column type tag {}", tag)))
    }

    fn cell(&mut self) -> Result<Cell> {
        let tag = self.u8()?;
        if tag == MISSING_TAG {
            return Ok(Cell::Missing);
        }
        let column_type = ColumnType::from_tag(tag)
            .ok_or_else(|| TukeyError::Codec(format!("unknown cell tag {}", tag)))?;
        Ok(match column_type {
            ColumnType::Int => Cell::Int(i32::from_le_bytes(self.array()?)),
            ColumnType::Long => Cell::Long(i64::from_le_bytes(self.array()?)),
            ColumnType::Double => Cell::Double(self.f64()?),
            ColumnType::String => Cell::Str(self.str()?),
            ColumnType::Boolean => Cell::Bool(self.u8()? != 0),
        })
    }

    fn key(&mut self) -> Result<GroupKey> {
        let len = self.count(1)?;
        let cells = (0..len).map(|_| self.cell()).collect::<Result<Vec<_>>>()?;
        Ok(GroupKey::new(cells))
    }

    fn column(&mut self) -> Result<ColumnSchema> {
        let name = self.str()?;
        let position = self.u32()? as usize;
        let column_type = self.column_type()?;
        let mut column = ColumnSchema::new(name, position, column_type);
        if self.u8()? != 0 {
            let lower = self.f64()?;
            let upper = self.f64()?;
            column = column.with_domain(Domain::new(lower, upper));
        }
        Ok(column)
    }

    fn columns(&mut self) -> Result<Vec<ColumnSchema>> {
        let len = self.count(10)?;
        (0..len).map(|_| self.column()).collect()
    }

    fn model(&mut self) -> Result<IntervalModel> {
        let group_columns = self.columns()?;
        let outlier_columns = self.columns()?;
        let mut model = IntervalModel::new(group_columns, outlier_columns);
        let groups = self.count(8)?;
        for _ in 0..groups {
            let key = self.key()?;
            model.add_group(key.clone());
            let intervals = self.count(20)?;
            for _ in 0..intervals {
                let column = self.str()?;
                let lower = self.f64()?;
                let upper = self.f64()?;
                model.insert(key.clone(), column, Interval::new(lower, upper));
            }
        }
        Ok(model)
    }

    fn counter(&mut self) -> Result<MemberCounter> {
        let entries = self.count(16)?;
        let mut counter = MemberCounter::new();
        for _ in 0..entries {
            let column = self.str()?;
            let key = self.key()?;
            let count = self.u64()?;
            counter.add(&column, &key, count);
        }
        Ok(counter)
    }

    fn warnings(&mut self) -> Result<WarningLog> {
        let len = self.count(4)?;
        (0..len).map(|_| self.str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> PartitionState {
        let group = ColumnSchema::new("site", 0, ColumnType::String);
        let value = ColumnSchema::new("v", 1, ColumnType::Long).with_domain(Domain::new(0.0, 9.0));
        let mut model = IntervalModel::new(vec![group], vec![value]);
        let a = GroupKey::new(vec![Cell::from("north")]);
        let b = GroupKey::new(vec![Cell::Missing]);
        model.insert(a.clone(), "v", Interval::new(-1.0, 7.0));
        model.add_group(b.clone());

        let mut state = PartitionState::new(Arc::new(model));
        state.members.add("v", &a, 5);
        state.outliers.add("v", &a, 1);
        state.missing_groups.add("v", &GroupKey::new(vec![Cell::from("south")]), 2);
        state.warnings.push("Node created an empty data table");
        state
    }

    #[test]
    fn test_state_round_trip() {
        let state = sample_state();
        let blob = encode_state(&state);
        assert_eq!(&blob[..4], MAGIC);
        assert_eq!(decode_state(&blob).unwrap(), state);
    }

    #[test]
    fn test_sections_decode_independently() {
        let state = sample_state();
        let blob = encode_state(&state);
        assert_eq!(decode_model(&blob).unwrap(), *state.model());
        assert_eq!(decode_counter(&blob, Section::Outliers).unwrap(), state.outliers);
        assert!(decode_counter(&blob, Section::Model).is_err());

        let model_only = encode_model(state.model());
        assert_eq!(decode_model(&model_only).unwrap(), *state.model());
        assert!(decode_state(&model_only).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(decode_model(b"").is_err());
        assert!(decode_model(b"XXXX\x00\x00\x00\x00").is_err());
        let blob = encode_state(&sample_state());
        assert!(decode_state(&blob[..blob.len() - 3]).is_err());
    }
}
