//! Image size fitting.
//!
//! All lengths are EMU (English Metric Units, 914400 per inch), the integer
//! unit WordprocessingML uses for drawing extents. Table measurements arrive
//! in twips (1/20 point) and are converted before fitting.

/// EMU per inch.
pub const EMU_PER_INCH: i64 = 914_400;

/// EMU per twip (the unit of `w:tcW` and `w:trHeight` values).
pub const EMU_PER_TWIP: i64 = 635;

/// Width used for images in unconstrained paragraphs: 2.0 inches.
pub const DEFAULT_WIDTH_EMU: i64 = 2 * EMU_PER_INCH;

// Fraction of a cell dimension available to the image.
const CELL_MARGIN: f64 = 0.95;

/// Target extents for an embedded image, aspect ratio preserved within
/// truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitResult {
    pub width_emu: i64,
    pub height_emu: i64,
}

/// Convert a twip measurement to EMU.
pub fn twips_to_emu(twips: i64) -> i64 {
    twips * EMU_PER_TWIP
}

/// Compute target extents for an `img_w` x `img_h` pixel image.
///
/// With both cell constraints present and positive, the image is fit inside
/// the cell shrunk by a 5% margin: whichever side is relatively larger than
/// the cell's is bound to its usable dimension and the other derived from
/// the image aspect ratio. Equal aspect ratios bind the height. Without a
/// full constraint pair the image gets the fixed 2-inch default width and a
/// height derived from its own aspect ratio.
///
/// Derived dimensions truncate toward zero. Callers must reject
/// zero-dimension images before fitting (see `fetch::ResolveError`).
pub fn fit_image(img_w: u32, img_h: u32, cell_w: Option<i64>, cell_h: Option<i64>) -> FitResult {
    let aspect = img_w as f64 / img_h as f64;
    match (cell_w, cell_h) {
        (Some(cw), Some(ch)) if cw > 0 && ch > 0 => {
            let usable_w = cw as f64 * CELL_MARGIN;
            let usable_h = ch as f64 * CELL_MARGIN;
            if aspect > usable_w / usable_h {
                // Image is relatively wider than the cell: width binds.
                FitResult {
                    width_emu: usable_w as i64,
                    height_emu: (usable_w / aspect) as i64,
                }
            } else {
                FitResult {
                    width_emu: (usable_h * aspect) as i64,
                    height_emu: usable_h as i64,
                }
            }
        }
        _ => FitResult {
            width_emu: DEFAULT_WIDTH_EMU,
            height_emu: (DEFAULT_WIDTH_EMU as f64 / aspect) as i64,
        },
    }
}
