//! Chromatic notes, equal-tempered frequencies, and the note color scale.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Note name parse failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteError {
    #[error("unsupported note: {0}")]
    UnsupportedNote(String),
}

/// Pitch class (sharps only, as on the color keyboard)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Note {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl Note {
    pub const ALL: [Note; 12] = [
        Note::C,
        Note::CSharp,
        Note::D,
        Note::DSharp,
        Note::E,
        Note::F,
        Note::FSharp,
        Note::G,
        Note::GSharp,
        Note::A,
        Note::ASharp,
        Note::B,
    ];

    /// Semitones above C
    pub fn semitone(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Note::C => "C",
            Note::CSharp => "C#",
            Note::D => "D",
            Note::DSharp => "D#",
            Note::E => "E",
            Note::F => "F",
            Note::FSharp => "F#",
            Note::G => "G",
            Note::GSharp => "G#",
            Note::A => "A",
            Note::ASharp => "A#",
            Note::B => "B",
        }
    }

    /// Fill color for the shape (RGB), one hue per pitch class
    pub fn color(&self) -> [u8; 3] {
        match self {
            Note::C => [0xff, 0x00, 0x00],
            Note::CSharp => [0xca, 0xa3, 0xff],
            Note::D => [0xff, 0xff, 0x00],
            Note::DSharp => [0x5b, 0x5f, 0x8b],
            Note::E => [0xdf, 0xf8, 0xff],
            Note::F => [0x8b, 0x1a, 0x0e],
            Note::FSharp => [0x18, 0xbf, 0xfb],
            Note::G => [0xff, 0x7a, 0x00],
            Note::GSharp => [0xff, 0x00, 0xff],
            Note::A => [0x39, 0xc5, 0x2a],
            Note::ASharp => [0x8a, 0x8a, 0x8a],
            Note::B => [0x0c, 0x2b, 0xff],
        }
    }

    /// Equal-tempered frequency (A4 = 440 Hz)
    pub fn frequency(&self, octave: u8) -> f32 {
        let midi = (octave as i32 + 1) * 12 + self.semitone() as i32;
        440.0 * 2f32.powf((midi - 69) as f32 / 12.0)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Note {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Note::ALL
            .into_iter()
            .find(|note| note.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| NoteError::UnsupportedNote(s.to_string()))
    }
}

/// Identity of a preview voice: one voice per (note, octave)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteKey {
    pub note: Note,
    pub octave: u8,
}

impl NoteKey {
    pub fn new(note: Note, octave: u8) -> Self {
        Self { note, octave }
    }
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.note, self.octave)
    }
}
