use serde::Serialize;

pub const MAX_INTENSITY: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::A, Channel::B];

    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

/// One intensity per channel, 0..=100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Levels {
    pub a: u8,
    pub b: u8,
}

impl Levels {
    pub fn new(a: u8, b: u8) -> Self {
        Self { a, b }
    }

    pub fn get(self, channel: Channel) -> u8 {
        match channel {
            Channel::A => self.a,
            Channel::B => self.b,
        }
    }

    pub fn set(&mut self, channel: Channel, value: u8) {
        match channel {
            Channel::A => self.a = value,
            Channel::B => self.b = value,
        }
    }

    pub fn clamped(self) -> Self {
        Self {
            a: self.a.min(MAX_INTENSITY),
            b: self.b.min(MAX_INTENSITY),
        }
    }
}

/// Forced intensities that supersede the schedule until cleared.
///
/// The last requested pair is kept while inactive so that an override request
/// naming only channel A reuses the previous channel B value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Override {
    active: bool,
    levels: Levels,
}

impl Override {
    pub fn set(&mut self, a: u8, b: Option<u8>) {
        self.levels.a = a;
        if let Some(b) = b {
            self.levels.b = b;
        }
        self.active = true;
    }

    pub fn clear(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn get(&self) -> Option<Levels> {
        self.active.then_some(self.levels)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    #[serde(rename = "timeSynced")]
    pub time_synced: bool,
    #[serde(rename = "localTime")]
    pub local_time: String,
    pub timezone: String,
    pub hour: Option<u8>,
    #[serde(rename = "overrideActive")]
    pub override_active: bool,
    #[serde(rename = "overrideLevels")]
    pub override_levels: Option<Levels>,
    #[serde(rename = "scheduledLevels")]
    pub scheduled_levels: Option<Levels>,
    pub intensities: Levels,
}
