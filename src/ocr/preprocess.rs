//! Background classification and OCR image normalization.
//!
//! Question screenshots come from arbitrary apps with arbitrary themes.
//! Tesseract expects dark text on a light background, so before OCR the
//! crop is classified by sampling pixel statistics and then pushed through
//! a category-specific enhancement pipeline.

use image::{GrayImage, ImageBuffer, Rgba};
use rand::Rng;

/// Number of random pixels sampled for classification.
const SAMPLE_SIZE: usize = 2000;

/// Background category of a captured region, driving normalization choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackgroundCategory {
    Dark,
    LightColored,
    MediumColored,
    Light,
    Neutral,
}

impl std::fmt::Display for BackgroundCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackgroundCategory::Dark => write!(f, "dark"),
            BackgroundCategory::LightColored => write!(f, "light-colored"),
            BackgroundCategory::MediumColored => write!(f, "medium-colored"),
            BackgroundCategory::Light => write!(f, "light"),
            BackgroundCategory::Neutral => write!(f, "neutral"),
        }
    }
}

/// Pixel statistics of a captured region.
#[derive(Clone, Copy, Debug)]
pub struct BackgroundProfile {
    /// Mean of (r+g+b)/3 over the sample, 0..255.
    pub average_brightness: f64,
    /// Mean of (max-min)/max*100 over the sample, 0..100.
    pub average_saturation: f64,
    pub category: BackgroundCategory,
}

/// Classifies the background of a cropped region.
///
/// Draws a fixed-size random sample (with replacement) over the image, so
/// the result is statistically stable but not bit-reproducible on noisy
/// images. Uniform images classify exactly.
pub fn classify(img: &ImageBuffer<Rgba<u8>, Vec<u8>>) -> BackgroundProfile {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return profile_for(0.0, 0.0);
    }

    let mut rng = rand::thread_rng();
    let mut brightness_sum = 0.0f64;
    let mut saturation_sum = 0.0f64;

    for _ in 0..SAMPLE_SIZE {
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);
        let pixel = img.get_pixel(x, y);
        let (r, g, b) = (pixel[0] as f64, pixel[1] as f64, pixel[2] as f64);

        brightness_sum += (r + g + b) / 3.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        if max > 0.0 {
            saturation_sum += (max - min) / max * 100.0;
        }
    }

    profile_for(
        brightness_sum / SAMPLE_SIZE as f64,
        saturation_sum / SAMPLE_SIZE as f64,
    )
}

/// Applies the classification rules, in priority order.
fn profile_for(brightness: f64, saturation: f64) -> BackgroundProfile {
    let category = if brightness < 100.0 {
        BackgroundCategory::Dark
    } else if brightness >= 160.0 && saturation > 30.0 {
        BackgroundCategory::LightColored
    } else if brightness < 160.0 && saturation > 30.0 {
        BackgroundCategory::MediumColored
    } else if brightness >= 160.0 {
        BackgroundCategory::Light
    } else {
        BackgroundCategory::Neutral
    };

    BackgroundProfile {
        average_brightness: brightness,
        average_saturation: saturation,
        category,
    }
}

/// A single normalization step. Steps run on the greyscaled image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    /// Additive brightness shift by a fraction of full scale.
    Brighten(f32),
    /// Contrast adjustment, in percent.
    Contrast(f32),
    /// Invert, for light text on dark or colored-light backgrounds.
    Invert,
    /// Linear min/max level stretch.
    StretchLevels,
}

/// Returns the step sequence for a category. Order matters.
pub fn normalize_steps(category: BackgroundCategory) -> &'static [Step] {
    match category {
        BackgroundCategory::Dark => &[
            Step::Brighten(0.20),
            Step::Contrast(60.0),
            Step::StretchLevels,
        ],
        BackgroundCategory::LightColored => {
            &[Step::Invert, Step::Contrast(50.0), Step::StretchLevels]
        }
        BackgroundCategory::MediumColored => &[
            Step::Contrast(50.0),
            Step::Brighten(0.10),
            Step::StretchLevels,
        ],
        BackgroundCategory::Light => &[Step::Contrast(40.0), Step::StretchLevels],
        BackgroundCategory::Neutral => &[Step::Contrast(50.0), Step::StretchLevels],
    }
}

/// Normalizes a cropped region for OCR: greyscale first, then the
/// category's step sequence.
pub fn normalize(
    img: &ImageBuffer<Rgba<u8>, Vec<u8>>,
    category: BackgroundCategory,
) -> GrayImage {
    let mut grey = image::imageops::grayscale(img);

    for step in normalize_steps(category) {
        grey = match step {
            Step::Brighten(fraction) => {
                image::imageops::brighten(&grey, (255.0 * fraction).round() as i32)
            }
            Step::Contrast(percent) => image::imageops::contrast(&grey, *percent),
            Step::Invert => {
                image::imageops::invert(&mut grey);
                grey
            }
            Step::StretchLevels => stretch_levels(grey),
        };
    }

    grey
}

/// Linearly stretches pixel values so the darkest maps to 0 and the
/// brightest to 255. Flat images are returned unchanged.
fn stretch_levels(img: GrayImage) -> GrayImage {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    for pixel in img.pixels() {
        min = min.min(pixel[0]);
        max = max.max(pixel[0]);
    }

    if max <= min {
        return img;
    }

    let range = (max - min) as f32;
    let mut out = img;
    for pixel in out.pixels_mut() {
        pixel[0] = ((pixel[0] - min) as f32 / range * 255.0).round() as u8;
    }
    out
}
