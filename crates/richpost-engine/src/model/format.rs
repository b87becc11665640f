use std::ops::{BitOr, BitXor};

use serde::{Deserialize, Serialize};

/// Format bitset carried by a text run.
///
/// A run's format never changes after the run is created; reformatting
/// replaces runs instead (see `commands::format`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextFormat(u8);

impl TextFormat {
    pub const PLAIN: Self = Self(0);
    pub const BOLD: Self = Self(1);
    pub const ITALIC: Self = Self(1 << 1);
    pub const STRIKETHROUGH: Self = Self(1 << 2);
    pub const UNDERLINE: Self = Self(1 << 3);
    pub const CODE: Self = Self(1 << 4);

    const ALL: u8 = 0b1_1111;

    /// Builds a format from raw bits, dropping unknown bits.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn is_plain(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    #[must_use]
    pub fn toggled(self, other: Self) -> Self {
        Self(self.0 ^ other.0)
    }
}

impl BitOr for TextFormat {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

impl BitXor for TextFormat {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self {
        self.toggled(rhs)
    }
}

/// The formats a toolbar can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Bold,
    Italic,
    Strikethrough,
    Underline,
    Code,
}

impl FormatKind {
    pub fn flag(self) -> TextFormat {
        match self {
            FormatKind::Bold => TextFormat::BOLD,
            FormatKind::Italic => TextFormat::ITALIC,
            FormatKind::Strikethrough => TextFormat::STRIKETHROUGH,
            FormatKind::Underline => TextFormat::UNDERLINE,
            FormatKind::Code => TextFormat::CODE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggling_twice_restores_format() {
        let f = TextFormat::BOLD | TextFormat::UNDERLINE;
        assert_eq!(f.toggled(TextFormat::ITALIC).toggled(TextFormat::ITALIC), f);
        assert!(!f.toggled(TextFormat::BOLD).contains(TextFormat::BOLD));
    }

    #[test]
    fn test_from_bits_drops_unknown_bits() {
        assert_eq!(TextFormat::from_bits(0xFF).bits(), 0b1_1111);
        assert!(TextFormat::from_bits(0).is_plain());
    }

    #[test]
    fn test_contains_requires_every_bit() {
        let f = TextFormat::BOLD | TextFormat::ITALIC;
        assert!(f.contains(TextFormat::BOLD));
        assert!(!TextFormat::BOLD.contains(f));
        assert!(f.contains(TextFormat::PLAIN));
    }
}
