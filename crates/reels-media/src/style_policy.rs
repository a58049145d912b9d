//! Accent-clip eligibility and placement.

use reels_models::StylePreset;

/// Photos that precede the accent clip in the sequence.
pub const ACCENT_INSERT_INDEX: usize = 2;

/// Where an accent clip goes, when it goes anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccentPlacement {
    /// Index of the first photo that follows the accent clip
    pub insert_index: usize,
}

/// Whether the style wants an accent clip generated at all.
pub fn accent_eligible(style: StylePreset) -> bool {
    style.allows_accent()
}

/// Decide whether a produced accent clip is used and where.
///
/// Parallax and destination render as classic. Fewer than two photos
/// silently drops the clip.
pub fn accent_placement(style: StylePreset, photo_count: usize, accent_available: bool) -> Option<AccentPlacement> {
    if accent_eligible(style) && accent_available && photo_count >= ACCENT_INSERT_INDEX {
        Some(AccentPlacement {
            insert_index: ACCENT_INSERT_INDEX,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_hybrid_with_clip_and_two_photos() {
        assert_eq!(
            accent_placement(StylePreset::Hybrid, 3, true),
            Some(AccentPlacement { insert_index: 2 })
        );
        assert_eq!(
            accent_placement(StylePreset::Hybrid, 2, true),
            Some(AccentPlacement { insert_index: 2 })
        );
        assert_eq!(accent_placement(StylePreset::Hybrid, 1, true), None);
        assert_eq!(accent_placement(StylePreset::Hybrid, 5, false), None);
    }

    #[test]
    fn test_other_styles_never_use_accent() {
        for style in [StylePreset::Classic, StylePreset::Parallax, StylePreset::Destination] {
            assert!(!accent_eligible(style));
            assert_eq!(accent_placement(style, 6, true), None);
        }
    }
}
