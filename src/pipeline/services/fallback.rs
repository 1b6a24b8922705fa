//! Deterministic substitutes used when a stage's primary method is exhausted.

use crate::pipeline::types::{ImageRef, ProductLabel};

/// The first `size` frames, in chronological order.
pub fn shortlist_fallback(frames: &[ImageRef], size: usize) -> Vec<ImageRef> {
    frames.iter().take(size.max(1)).cloned().collect()
}

pub fn identification_fallback() -> ProductLabel {
    ProductLabel::Unknown
}

pub fn best_frame_fallback() -> usize {
    0
}

/// Pad `renders` up to `min` entries by cycling through the successful renders,
/// or repeating `segmented` when there are none.
pub fn fill_enhancements(renders: Vec<ImageRef>, segmented: &ImageRef, min: usize) -> Vec<ImageRef> {
    if renders.len() >= min {
        return renders;
    }

    let pool = if renders.is_empty() {
        vec![segmented.clone()]
    } else {
        renders.clone()
    };

    let mut filled = renders;
    let mut cycle = pool.iter().cycle();
    while filled.len() < min {
        match cycle.next() {
            Some(image) => filled.push(image.clone()),
            None => break,
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(names: &[&str]) -> Vec<ImageRef> {
        names.iter().map(ImageRef::new).collect()
    }

    #[test]
    fn test_shortlist_takes_leading_frames() {
        let frames = refs(&["a", "b", "c", "d"]);
        assert_eq!(shortlist_fallback(&frames, 3), refs(&["a", "b", "c"]));
        assert_eq!(shortlist_fallback(&frames[..2], 3), refs(&["a", "b"]));
    }

    #[test]
    fn test_fill_with_segmented_when_nothing_rendered() {
        let segmented = ImageRef::new("segmented.png");
        let filled = fill_enhancements(Vec::new(), &segmented, 2);
        assert_eq!(filled, vec![segmented.clone(), segmented]);
    }

    #[test]
    fn test_fill_cycles_successful_renders() {
        let segmented = ImageRef::new("segmented.png");
        let filled = fill_enhancements(refs(&["studio.png"]), &segmented, 3);
        assert_eq!(filled, refs(&["studio.png", "studio.png", "studio.png"]));
    }

    #[test]
    fn test_fill_leaves_enough_renders_alone() {
        let segmented = ImageRef::new("segmented.png");
        let renders = refs(&["studio.png", "lifestyle.png", "creative.png"]);
        assert_eq!(fill_enhancements(renders.clone(), &segmented, 2), renders);
    }
}
