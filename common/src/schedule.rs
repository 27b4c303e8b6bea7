use crate::{
    error::ControlError,
    types::{Channel, Levels, MAX_INTENSITY},
};

pub const HOURS: usize = 24;
pub const SLOT_COUNT: usize = HOURS * Channel::ALL.len();

/// Intensity table for 24 hours and two channels, stored hour-major:
/// `values[hour * 2 + channel]`.
///
/// The same 48 bytes are the persisted settings block. There is no checksum or
/// version tag, so any block (including uninitialised storage) is a valid
/// schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    values: [u8; SLOT_COUNT],
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            values: [0; SLOT_COUNT],
        }
    }
}

impl Schedule {
    pub fn slot_index(hour: u8, channel: Channel) -> usize {
        (hour as usize % HOURS) * Channel::ALL.len() + channel.index()
    }

    /// Builds a schedule from a raw settings block. Short blocks are
    /// zero-padded and extra bytes are ignored.
    pub fn from_block(block: &[u8]) -> Self {
        let mut values = [0; SLOT_COUNT];
        let len = block.len().min(SLOT_COUNT);
        values[..len].copy_from_slice(&block[..len]);
        Self { values }
    }

    pub fn from_values(values: &[u8]) -> Result<Self, ControlError> {
        if values.len() < SLOT_COUNT {
            return Err(ControlError::IncompleteSchedule {
                parsed: values.len(),
            });
        }
        Ok(Self::from_block(values))
    }

    /// Parses the comma separated body of a set request.
    ///
    /// The first 48 integers are used. Parsing stops at the first token that is
    /// not a decimal integer; a trailing comma is allowed so a get response can
    /// be sent back unchanged. Values are clamped to 0..=100.
    pub fn parse_csv(input: &str) -> Result<Self, ControlError> {
        let mut parsed = Vec::with_capacity(SLOT_COUNT);
        let mut tokens = input.split(',').map(str::trim).peekable();

        while let Some(token) = tokens.next() {
            if parsed.len() == SLOT_COUNT {
                break;
            }
            if token.is_empty() && tokens.peek().is_none() {
                break;
            }
            let Ok(value) = token.parse::<i64>() else {
                break;
            };
            parsed.push(value.clamp(0, MAX_INTENSITY as i64) as u8);
        }

        Self::from_values(&parsed)
    }

    /// 48 decimal integers, each followed by a comma.
    pub fn to_csv(&self) -> String {
        self.values.iter().fold(String::new(), |mut out, value| {
            out.push_str(&value.to_string());
            out.push(',');
            out
        })
    }

    pub fn values(&self) -> &[u8; SLOT_COUNT] {
        &self.values
    }

    pub fn slot(&self, hour: u8, channel: Channel) -> u8 {
        self.values[Self::slot_index(hour, channel)]
    }

    pub fn levels_at(&self, hour: u8) -> Levels {
        Levels::new(self.slot(hour, Channel::A), self.slot(hour, Channel::B))
    }
}
