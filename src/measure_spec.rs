/// How a parent constrains one axis of a child during measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasureMode {
    /// No constraint; the child may take any size.
    Unspecified,
    /// The child must take exactly the carried size.
    Exactly,
    /// The child may take up to the carried size.
    AtMost,
}

impl MeasureMode {
    pub fn name(self) -> &'static str {
        match self {
            MeasureMode::Unspecified => "UNSPECIFIED",
            MeasureMode::Exactly => "EXACTLY",
            MeasureMode::AtMost => "AT_MOST",
        }
    }

    fn bits(self) -> u32 {
        match self {
            MeasureMode::Unspecified => 0,
            MeasureMode::Exactly => 1,
            MeasureMode::AtMost => 2,
        }
    }
}

const MODE_SHIFT: u32 = 30;
const SIZE_MASK: u32 = (1 << MODE_SHIFT) - 1;

/// A size and a [`MeasureMode`] packed into one 32-bit token.
///
/// The mode lives in the two most significant bits and the size in the
/// low 30 bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeasureSpec(u32);

impl MeasureSpec {
    /// Largest size the token can carry.
    pub const MAX_SIZE: i32 = SIZE_MASK as i32;

    /// Packs `size` and `mode`. Negative sizes are stored as 0; sizes above
    /// [`MeasureSpec::MAX_SIZE`] are masked.
    pub fn new(size: i32, mode: MeasureMode) -> Self {
        let size = size.max(0) as u32 & SIZE_MASK;
        MeasureSpec((mode.bits() << MODE_SHIFT) | size)
    }

    pub fn exactly(size: i32) -> Self {
        Self::new(size, MeasureMode::Exactly)
    }

    pub fn at_most(size: i32) -> Self {
        Self::new(size, MeasureMode::AtMost)
    }

    pub fn unspecified(size: i32) -> Self {
        Self::new(size, MeasureMode::Unspecified)
    }

    pub fn mode(self) -> MeasureMode {
        match self.0 >> MODE_SHIFT {
            1 => MeasureMode::Exactly,
            2 => MeasureMode::AtMost,
            _ => MeasureMode::Unspecified,
        }
    }

    pub fn size(self) -> i32 {
        (self.0 & SIZE_MASK) as i32
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn from_raw(raw: u32) -> Self {
        MeasureSpec(raw)
    }
}

impl std::fmt::Debug for MeasureSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MeasureSpec({} {})", self.mode().name(), self.size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_mode() -> impl Strategy<Value = MeasureMode> {
        prop_oneof![
            Just(MeasureMode::Unspecified),
            Just(MeasureMode::Exactly),
            Just(MeasureMode::AtMost),
        ]
    }

    #[test]
    fn mode_occupies_top_bits() {
        assert_eq!(MeasureSpec::exactly(0).raw(), 1 << 30);
        assert_eq!(MeasureSpec::at_most(5).raw(), (2 << 30) | 5);
        assert_eq!(MeasureSpec::unspecified(7).raw(), 7);
    }

    #[test]
    fn max_size_survives_every_mode() {
        for mode in [MeasureMode::Unspecified, MeasureMode::Exactly, MeasureMode::AtMost] {
            let spec = MeasureSpec::new(MeasureSpec::MAX_SIZE, mode);
            assert_eq!(spec.size(), MeasureSpec::MAX_SIZE);
            assert_eq!(spec.mode(), mode);
        }
    }

    #[test]
    fn negative_size_is_stored_as_zero() {
        let spec = MeasureSpec::at_most(-12);
        assert_eq!(spec.size(), 0);
        assert_eq!(spec.mode(), MeasureMode::AtMost);
    }

    #[test]
    fn reserved_mode_bits_decode_as_unspecified() {
        let spec = MeasureSpec::from_raw((3 << 30) | 40);
        assert_eq!(spec.mode(), MeasureMode::Unspecified);
        assert_eq!(spec.size(), 40);
    }

    #[test]
    fn debug_output_names_the_mode() {
        assert_eq!(format!("{:?}", MeasureSpec::at_most(9)), "MeasureSpec(AT_MOST 9)");
    }

    proptest! {
        #[test]
        fn encode_decode_round_trip(size in 0..=MeasureSpec::MAX_SIZE, mode in any_mode()) {
            let spec = MeasureSpec::new(size, mode);
            prop_assert_eq!(spec.size(), size);
            prop_assert_eq!(spec.mode(), mode);
            prop_assert_eq!(MeasureSpec::from_raw(spec.raw()), spec);
        }
    }
}
