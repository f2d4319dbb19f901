//! Select encodings for the supported multiplexer families.

use crate::SegmentId;

/// LTC4306 register holding the downstream bus FET enables.
const LTC4306_FET_REGISTER: u8 = 0x03;

/// Multiplexer part family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(rename_all = "lowercase")
)]
pub enum MuxDriverKind {
    /// NXP PCA9545: 4 channels, one-hot control register.
    Pca9545,
    /// NXP PCA9546: 4 channels, one-hot control register.
    Pca9546,
    /// NXP PCA9548: 8 channels, one-hot control register.
    Pca9548,
    /// Analog Devices LTC4306: 4 buses, FET enables in register 3.
    Ltc4306,
}

impl MuxDriverKind {
    /// Largest segment number the part provides.
    #[must_use]
    pub const fn max_segments(self) -> u8 {
        match self {
            Self::Pca9545 | Self::Pca9546 | Self::Ltc4306 => 4,
            Self::Pca9548 => 8,
        }
    }

    /// Variant identifier used in generated source.
    #[must_use]
    pub const fn variant_name(self) -> &'static str {
        match self {
            Self::Pca9545 => "Pca9545",
            Self::Pca9546 => "Pca9546",
            Self::Pca9548 => "Pca9548",
            Self::Ltc4306 => "Ltc4306",
        }
    }

    /// Write that connects `segment` and disconnects every other segment,
    /// or `None` if the part has no such segment.
    #[must_use]
    pub const fn select_command(self, segment: SegmentId) -> Option<MuxCommand> {
        let Some(channel) = segment.channel() else {
            return None;
        };
        if channel >= self.max_segments() {
            return None;
        }
        Some(match self {
            Self::Pca9545 | Self::Pca9546 | Self::Pca9548 => MuxCommand::one(1 << channel),
            Self::Ltc4306 => MuxCommand::two(LTC4306_FET_REGISTER, 0x80 >> channel),
        })
    }

    /// Write that disconnects every segment.
    #[must_use]
    pub const fn deselect_command(self) -> MuxCommand {
        match self {
            Self::Pca9545 | Self::Pca9546 | Self::Pca9548 => MuxCommand::one(0),
            Self::Ltc4306 => MuxCommand::two(LTC4306_FET_REGISTER, 0),
        }
    }

    /// Decodes a control write back into the segment it enables.
    ///
    /// Returns `Some(None)` for a deselect, `Some(Some(segment))` for a
    /// select, and `None` when the bytes are not a control write for this part.
    #[must_use]
    pub fn decode_command(self, bytes: &[u8]) -> Option<Option<SegmentId>> {
        let mask = match (self, bytes) {
            (Self::Pca9545 | Self::Pca9546 | Self::Pca9548, [mask]) => *mask,
            (Self::Ltc4306, [LTC4306_FET_REGISTER, fets]) => fets.reverse_bits(),
            _ => return None,
        };
        match mask.count_ones() {
            0 => Some(None),
            1 => Some(Some(SegmentId(mask.trailing_zeros() as u8 + 1))),
            _ => None,
        }
    }
}

/// Encoded control write, at most two bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MuxCommand {
    bytes: [u8; 2],
    len: usize,
}

impl MuxCommand {
    const fn one(byte: u8) -> Self {
        Self {
            bytes: [byte, 0],
            len: 1,
        }
    }

    const fn two(register: u8, value: u8) -> Self {
        Self {
            bytes: [register, value],
            len: 2,
        }
    }

    /// Bytes to write to the mux's address.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::MuxDriverKind;
    use crate::SegmentId;

    #[rstest]
    #[case(MuxDriverKind::Pca9548, 1, &[0x01])]
    #[case(MuxDriverKind::Pca9548, 8, &[0x80])]
    #[case(MuxDriverKind::Pca9545, 3, &[0x04])]
    #[case(MuxDriverKind::Pca9546, 4, &[0x08])]
    #[case(MuxDriverKind::Ltc4306, 1, &[0x03, 0x80])]
    #[case(MuxDriverKind::Ltc4306, 4, &[0x03, 0x10])]
    fn select_encodings(#[case] kind: MuxDriverKind, #[case] segment: u8, #[case] bytes: &[u8]) {
        let command = kind
            .select_command(SegmentId(segment))
            .expect("segment is in range");
        assert_eq!(command.as_bytes(), bytes);
        assert_eq!(
            kind.decode_command(command.as_bytes()),
            Some(Some(SegmentId(segment)))
        );
    }

    #[rstest]
    #[case(MuxDriverKind::Pca9548, 0)]
    #[case(MuxDriverKind::Pca9548, 9)]
    #[case(MuxDriverKind::Pca9545, 5)]
    #[case(MuxDriverKind::Ltc4306, 5)]
    fn out_of_range_segments_have_no_select(#[case] kind: MuxDriverKind, #[case] segment: u8) {
        assert!(kind.select_command(SegmentId(segment)).is_none());
    }

    #[rstest]
    #[case(MuxDriverKind::Pca9545)]
    #[case(MuxDriverKind::Pca9546)]
    #[case(MuxDriverKind::Pca9548)]
    #[case(MuxDriverKind::Ltc4306)]
    fn deselect_decodes_as_no_segment(#[case] kind: MuxDriverKind) {
        let command = kind.deselect_command();
        assert_eq!(kind.decode_command(command.as_bytes()), Some(None));
    }

    #[test]
    fn multi_channel_masks_are_not_decoded() {
        assert_eq!(MuxDriverKind::Pca9548.decode_command(&[0x03]), None);
        assert_eq!(MuxDriverKind::Ltc4306.decode_command(&[0x01, 0x80]), None);
    }
}
