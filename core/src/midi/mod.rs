pub mod drums;
pub mod gm;
pub mod smf;

/// 4 bit value (MIDI channel).
pub type U4 = u8;

/// 7 bit value (key, velocity, program).
pub type U7 = u8;

pub const MAX_U7: U7 = 127;
