//! Pure calculation functions for box-fit dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::orientation::Orientation;

/// Dimensions of the image as it will be displayed.
///
/// Vertical orientations (90°/270°) swap width and height, but only when
/// orientation is being applied; otherwise the raw decoded size is used.
pub fn oriented_dimensions(
    source: (u32, u32),
    orientation: Orientation,
    apply_orientation: bool,
) -> (u32, u32) {
    let (w, h) = source;
    if apply_orientation && orientation.is_vertical() {
        (h, w)
    } else {
        (w, h)
    }
}

/// Scale `source` to fit inside `target` while preserving its aspect ratio.
///
/// The constraining axis lands exactly on its bound; the other axis is at
/// most its bound. Neither axis drops below 1 pixel. Sources smaller than
/// the box are scaled up.
///
/// # Examples
/// ```
/// # use derivcache::imaging::calculate_fit_dimensions;
/// assert_eq!(calculate_fit_dimensions((400, 200), (200, 100)), (200, 100));
/// assert_eq!(calculate_fit_dimensions((400, 300), (200, 100)), (133, 100));
/// ```
pub fn calculate_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    if src_w == 0 || src_h == 0 {
        return (tgt_w.max(1), tgt_h.max(1));
    }

    let scale = (tgt_w as f64 / src_w as f64).min(tgt_h as f64 / src_h as f64);
    let w = (src_w as f64 * scale).round() as u32;
    let h = (src_h as f64 * scale).round() as u32;
    (w.clamp(1, tgt_w.max(1)), h.clamp(1, tgt_h.max(1)))
}

/// Resize target for a decoded image, in decoded (pre-orientation) pixel space.
///
/// The scale is chosen from the displayed dimensions, so a vertical image is
/// fitted as it will be seen. The result is expressed along the decoded axes:
/// resize the decoded pixels to it, then apply the orientation, and the
/// upright rendition fits the box. A 300x400 decoded image tagged rotate-90
/// fitted into 200x100 resizes to 100x133 and displays as 133x100.
pub fn plan_fit(
    source: (u32, u32),
    orientation: Orientation,
    apply_orientation: bool,
    target: (u32, u32),
) -> (u32, u32) {
    let (w, h) = calculate_fit_dimensions(
        oriented_dimensions(source, orientation, apply_orientation),
        target,
    );
    if apply_orientation && orientation.is_vertical() {
        (h, w)
    } else {
        (w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // calculate_fit_dimensions tests
    // =========================================================================

    #[test]
    fn fit_same_aspect_reaches_both_bounds() {
        assert_eq!(calculate_fit_dimensions((400, 200), (200, 100)), (200, 100));
    }

    #[test]
    fn fit_height_constrained() {
        // 400x300 into 200x100: scale = min(0.5, 0.333) → 133x100
        assert_eq!(calculate_fit_dimensions((400, 300), (200, 100)), (133, 100));
    }

    #[test]
    fn fit_width_constrained() {
        // 1000x200 into 200x100: scale = min(0.2, 0.5) → 200x40
        assert_eq!(calculate_fit_dimensions((1000, 200), (200, 100)), (200, 40));
    }

    #[test]
    fn fit_upscales_small_sources() {
        assert_eq!(calculate_fit_dimensions((50, 25), (200, 200)), (200, 100));
    }

    #[test]
    fn fit_never_collapses_to_zero() {
        // 10000x1 into 100x100 → height would round to 0
        assert_eq!(calculate_fit_dimensions((10000, 1), (100, 100)), (100, 1));
    }

    #[test]
    fn fit_never_exceeds_box() {
        for (sw, sh) in [(3, 7), (7, 3), (1001, 999), (1, 1), (640, 480), (17, 4000)] {
            for (tw, th) in [(1, 1), (99, 101), (200, 100), (64, 64)] {
                let (w, h) = calculate_fit_dimensions((sw, sh), (tw, th));
                assert!(w <= tw && h <= th, "{sw}x{sh} into {tw}x{th} gave {w}x{h}");
                assert!(w == tw || h == th, "{sw}x{sh} into {tw}x{th} gave {w}x{h}");
            }
        }
    }

    #[test]
    fn fit_degenerate_source_fills_box() {
        assert_eq!(calculate_fit_dimensions((0, 10), (20, 30)), (20, 30));
    }

    // =========================================================================
    // plan_fit tests
    // =========================================================================

    #[test]
    fn plan_fit_rotated_source_resizes_in_decoded_space() {
        // 300x400 decoded, rotate-90 → displays 400x300 → fits as 133x100,
        // which is 100x133 along the decoded axes
        assert_eq!(
            plan_fit((300, 400), Orientation::Rotate90, true, (200, 100)),
            (100, 133)
        );
    }

    #[test]
    fn plan_fit_ignores_orientation_when_not_applied() {
        assert_eq!(
            plan_fit((300, 400), Orientation::Rotate90, false, (200, 100)),
            (75, 100)
        );
    }

    #[test]
    fn plan_fit_horizontal_tag_does_not_swap() {
        assert_eq!(
            plan_fit((400, 300), Orientation::Rotate180, true, (200, 100)),
            (133, 100)
        );
    }

    #[test]
    fn oriented_dimensions_swaps_only_vertical() {
        assert_eq!(
            oriented_dimensions((300, 400), Orientation::Rotate270, true),
            (400, 300)
        );
        assert_eq!(
            oriented_dimensions((300, 400), Orientation::MirrorVertical, true),
            (300, 400)
        );
    }
}
