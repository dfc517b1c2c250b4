/// Number of architecturally visible general-purpose registers (`X0..X30`).
pub const GENERAL_REGISTER_COUNT: usize = 31;

/// Checked index of a general-purpose register (`X0..X30`).
///
/// Encoding value 31 names `SP` or `XZR` depending on the instruction and is
/// never a general-purpose register here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct GeneralRegister(u8);

impl GeneralRegister {
    /// Frame pointer alias (`X29`).
    pub const FP: Self = Self(29);
    /// Link register alias (`X30`).
    pub const LR: Self = Self(30);

    /// Returns the register for `index`, or `None` outside `0..=30`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_index(index: u32) -> Option<Self> {
        if index < GENERAL_REGISTER_COUNT as u32 {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Returns the array index for this register (`0..=30`).
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Iterates `X0..=X30` in order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0_u8..).take(GENERAL_REGISTER_COUNT).map(Self)
    }
}

impl TryFrom<u32> for GeneralRegister {
    type Error = u32;

    fn try_from(index: u32) -> Result<Self, Self::Error> {
        Self::from_index(index).ok_or(index)
    }
}

impl std::fmt::Display for GeneralRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "X{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{GeneralRegister, GENERAL_REGISTER_COUNT};

    #[test]
    fn register_count_matches_architecture() {
        assert_eq!(GENERAL_REGISTER_COUNT, 31);
        assert_eq!(GeneralRegister::all().count(), GENERAL_REGISTER_COUNT);
    }

    #[test]
    fn all_walks_x0_through_lr_in_order() {
        let regs: Vec<_> = GeneralRegister::all().collect();
        assert_eq!(regs.first().map(|reg| reg.index()), Some(0));
        assert_eq!(regs.last(), Some(&GeneralRegister::LR));
        assert!(regs.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn in_range_indices_decode_to_matching_register() {
        for index in 0_u32..=30 {
            let reg = GeneralRegister::from_index(index).expect("valid register index");
            assert_eq!(reg.index(), index as usize);
        }
    }

    #[test]
    fn index_31_and_above_are_rejected() {
        assert!(GeneralRegister::from_index(31).is_none());
        assert!(GeneralRegister::from_index(u32::MAX).is_none());
        assert_eq!(GeneralRegister::try_from(31), Err(31));
    }

    #[test]
    fn aliases_name_frame_pointer_and_link_register() {
        assert_eq!(GeneralRegister::FP.index(), 29);
        assert_eq!(GeneralRegister::LR.index(), 30);
        assert_eq!(GeneralRegister::LR.to_string(), "X30");
    }
}
