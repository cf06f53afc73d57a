//! Processor status register state, tracked per flag.
//!
//! Each flag is tri-state plus "unspecified": the code analyzer needs to tell
//! apart "known clear", "known set", "could be either" and "no information".

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a single status flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TriState {
    /// No information
    #[default]
    Unspecified,
    /// Known to be clear
    Zero,
    /// Known to be set
    One,
    /// Paths disagree
    Indeterminate,
}

impl TriState {
    /// Merge two states reached by different code paths.
    pub fn merge(self, other: TriState) -> TriState {
        match (self, other) {
            (TriState::Unspecified, o) => o,
            (s, TriState::Unspecified) => s,
            (s, o) if s == o => s,
            _ => TriState::Indeterminate,
        }
    }

    fn to_char(self, set: char) -> char {
        match self {
            TriState::Unspecified => '-',
            TriState::Zero => set.to_ascii_lowercase(),
            TriState::One => set,
            TriState::Indeterminate => '?',
        }
    }
}

/// 65xx status register: N V M X D I Z C, plus the emulation bit E.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StatusFlags {
    pub n: TriState,
    pub v: TriState,
    pub m: TriState,
    pub x: TriState,
    pub d: TriState,
    pub i: TriState,
    pub z: TriState,
    pub c: TriState,
    pub e: TriState,
}

impl StatusFlags {
    /// All flags unspecified; used as "no override".
    pub const DEFAULT: StatusFlags = StatusFlags {
        n: TriState::Unspecified,
        v: TriState::Unspecified,
        m: TriState::Unspecified,
        x: TriState::Unspecified,
        d: TriState::Unspecified,
        i: TriState::Unspecified,
        z: TriState::Unspecified,
        c: TriState::Unspecified,
        e: TriState::Unspecified,
    };

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }

    fn fields_mut(&mut self) -> [&mut TriState; 9] {
        [
            &mut self.n,
            &mut self.v,
            &mut self.m,
            &mut self.x,
            &mut self.d,
            &mut self.i,
            &mut self.z,
            &mut self.c,
            &mut self.e,
        ]
    }

    fn fields(&self) -> [TriState; 9] {
        [
            self.n, self.v, self.m, self.x, self.d, self.i, self.z, self.c, self.e,
        ]
    }

    /// Merge flags arriving from another code path.
    pub fn merge(&mut self, other: &StatusFlags) {
        for (mine, theirs) in self.fields_mut().into_iter().zip(other.fields()) {
            *mine = mine.merge(theirs);
        }
    }

    /// Apply an override: every specified flag in `other` replaces ours.
    pub fn apply(&mut self, other: &StatusFlags) {
        for (mine, theirs) in self.fields_mut().into_iter().zip(other.fields()) {
            if theirs != TriState::Unspecified {
                *mine = theirs;
            }
        }
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = ['N', 'V', 'M', 'X', 'D', 'I', 'Z', 'C'];
        for (state, name) in self.fields().iter().zip(names) {
            write!(f, "{}", state.to_char(name))?;
        }
        write!(f, " {}", self.e.to_char('E'))
    }
}
