use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, IntoStaticStr};

use crate::config::FIELD_COUNT;

/// One column of the reading table, in the order the board sends them.
#[derive(AsRefStr, IntoStaticStr, Clone, Copy, Debug, EnumIter, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    Time,
    Temp,
    Pressure,
    Gas,
}

impl Channel {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Channel::Time => "Time (s)",
            Channel::Temp => "Temperature (C)",
            Channel::Pressure => "Pressure",
            Channel::Gas => "Gas Sensor Reading (arbitrary units)",
        }
    }
}

/// Column names as they appear in the CSV header.
pub fn column_titles() -> Vec<&'static str> {
    Channel::iter().map(<&'static str>::from).collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Reading {
    values: [f64; FIELD_COUNT],
}

impl Reading {
    pub fn new(values: [f64; FIELD_COUNT]) -> Self {
        Reading { values }
    }

    /// Builds a reading from parsed fields, `None` unless exactly four.
    pub fn from_fields(fields: &[f64]) -> Option<Self> {
        let values: [f64; FIELD_COUNT] = fields.try_into().ok()?;
        Some(Reading { values })
    }

    pub fn values(&self) -> [f64; FIELD_COUNT] {
        self.values
    }
}

/// How unfilled slots are treated when the table is read out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RowPolicy {
    /// Unfilled slots become all-zero rows, so there is always one row per slot.
    #[default]
    ZeroFill,
    /// Unfilled slots are left out.
    Omit,
}

/// Fixed number of slots, indexed by arrival order.
///
/// A slot stays `None` when its line was dropped, which keeps the indices of
/// later readings stable.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadingTable {
    slots: Vec<Option<Reading>>,
}

impl ReadingTable {
    pub fn new(len: usize) -> Self {
        ReadingTable {
            slots: vec![None; len],
        }
    }

    /// Fills a slot. Indices past the end are ignored; the table never grows.
    pub fn set(&mut self, index: usize, reading: Reading) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(reading);
        }
    }

    pub fn get(&self, index: usize) -> Option<&Reading> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots holding a genuine reading.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn rows(&self, policy: RowPolicy) -> impl Iterator<Item = [f64; FIELD_COUNT]> + '_ {
        self.slots.iter().filter_map(move |slot| match (slot, policy) {
            (Some(r), _) => Some(r.values()),
            (None, RowPolicy::ZeroFill) => Some(Reading::default().values()),
            (None, RowPolicy::Omit) => None,
        })
    }

    /// `(x, y)` pairs of two channels, ready for plotting.
    pub fn series(&self, x: Channel, y: Channel, policy: RowPolicy) -> Vec<(f64, f64)> {
        self.rows(policy)
            .map(|row| (row[x.index()], row[y.index()]))
            .collect()
    }
}
