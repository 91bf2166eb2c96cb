//! Capture region geometry.
//!
//! Computes the pixel rectangle to crop from a full-window thumbnail so the
//! OCR only sees the question area, skipping browser chrome at the top and
//! footers at the bottom.

/// A pixel rectangle in the coordinate space of a captured thumbnail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Fraction of the thumbnail width trimmed from each side.
const SIDE_MARGIN: f64 = 0.05;

/// Returns the (top, bottom) margin fractions for a thumbnail height.
///
/// Larger screens show proportionally more chrome around the content, so
/// the vertical margins grow with resolution.
fn vertical_margins(thumbnail_height: u32) -> (f64, f64) {
    if thumbnail_height < 900 {
        (0.12, 0.08)
    } else if thumbnail_height < 1500 {
        (0.13, 0.09)
    } else if thumbnail_height < 2200 {
        (0.14, 0.10)
    } else {
        (0.16, 0.12)
    }
}

/// Computes the region to crop from a thumbnail of the given size.
///
/// The region is always fully contained in the thumbnail. Degenerate
/// thumbnails produce zero-size regions, which downstream code reports as
/// an empty-image failure.
pub fn compute_region(thumbnail_width: u32, thumbnail_height: u32) -> CaptureRegion {
    let (top, bottom) = vertical_margins(thumbnail_height);

    let x = (thumbnail_width as f64 * SIDE_MARGIN).round() as u32;
    let y = (thumbnail_height as f64 * top).round() as u32;
    let width = (thumbnail_width as f64 * (1.0 - 2.0 * SIDE_MARGIN)).round() as u32;
    let height = (thumbnail_height as f64 * (1.0 - top - bottom)).round() as u32;

    // Rounding must never push the region past the thumbnail edge
    let width = width.min(thumbnail_width.saturating_sub(x));
    let height = height.min(thumbnail_height.saturating_sub(y));

    CaptureRegion {
        x,
        y,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_contained(region: &CaptureRegion, w: u32, h: u32) {
        assert!(region.x + region.width <= w, "region exceeds width of {}", w);
        assert!(region.y + region.height <= h, "region exceeds height of {}", h);
    }

    #[test]
    fn test_tier_boundaries() {
        // (height, expected top, expected bottom)
        let cases = [
            (899, 0.12, 0.08),
            (900, 0.13, 0.09),
            (1499, 0.13, 0.09),
            (1500, 0.14, 0.10),
            (2199, 0.14, 0.10),
            (2200, 0.16, 0.12),
            (2201, 0.16, 0.12),
        ];

        for (height, top, bottom) in cases {
            let region = compute_region(1920, height);
            let expected_y = (height as f64 * top).round() as u32;
            let expected_h = (height as f64 * (1.0 - top - bottom)).round() as u32;
            assert_eq!(region.y, expected_y, "top offset for height {}", height);
            assert_eq!(region.height, expected_h, "height for height {}", height);
        }
    }

    #[test]
    fn test_side_margins() {
        let region = compute_region(1000, 800);
        assert_eq!(region.x, 50);
        assert_eq!(region.width, 900);
    }

    #[test]
    fn test_always_contained() {
        for (w, h) in [
            (1, 1),
            (10, 10),
            (800, 600),
            (1366, 768),
            (1920, 1080),
            (2560, 1440),
            (3840, 2160),
            (333, 2201),
        ] {
            let region = compute_region(w, h);
            assert_contained(&region, w, h);
        }
    }

    #[test]
    fn test_degenerate_thumbnail() {
        let region = compute_region(0, 0);
        assert!(region.is_empty());
        assert_eq!(region.x, 0);
        assert_eq!(region.y, 0);
    }
}
