use std::fmt::{Debug, Formatter};

/// Cached classification of a vertex, stored in the second byte of the
/// binary record.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexFlags(u8);

impl VertexFlags {
    pub const EMPTY: VertexFlags = VertexFlags(0);
    pub const BRANCH: VertexFlags = VertexFlags(0x01);
    pub const SOURCE: VertexFlags = VertexFlags(0x02);
    pub const SINK: VertexFlags = VertexFlags(0x04);

    const ALL: u8 = 0x07;

    /// `None` if unknown bits are set.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL != 0 {
            None
        } else {
            Some(VertexFlags(bits))
        }
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: VertexFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: VertexFlags, on: bool) {
        if on {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }

    pub const fn is_branch(self) -> bool {
        self.contains(Self::BRANCH)
    }

    pub const fn is_source(self) -> bool {
        self.contains(Self::SOURCE)
    }

    pub const fn is_sink(self) -> bool {
        self.contains(Self::SINK)
    }
}

impl Debug for VertexFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexFlags")
            .field("branch", &self.is_branch())
            .field("source", &self.is_source())
            .field("sink", &self.is_sink())
            .finish()
    }
}

#[cfg(test)]
mod flags_tests {
    use super::VertexFlags;

    #[test]
    fn set_and_clear() {
        let mut flags = VertexFlags::EMPTY;
        flags.set(VertexFlags::BRANCH, true);
        flags.set(VertexFlags::SINK, true);
        assert!(flags.is_branch() && flags.is_sink() && !flags.is_source());
        assert_eq!(flags.bits(), 0x05);

        flags.set(VertexFlags::BRANCH, false);
        assert_eq!(flags, VertexFlags::SINK);
    }

    #[test]
    fn unknown_bits_are_rejected() {
        assert_eq!(VertexFlags::from_bits(0x07), Some(VertexFlags(0x07)));
        assert_eq!(VertexFlags::from_bits(0x08), None);
    }
}
