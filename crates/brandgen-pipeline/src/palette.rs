//! Dominant color extraction
//!
//! Used to derive brand palettes from a logo or reference photo before
//! writing catalog style prompts. The image is sampled on a fixed grid,
//! near-black and near-white greys are discarded, and the rest is clustered
//! with k-means. Center seeding is farthest-first, so the same image always
//! yields the same palette.

use brandgen_core::{BrandgenError, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use std::fmt;
use std::path::Path;

/// Side of the square sampling grid
const SAMPLE_SIZE: u32 = 200;
const MAX_ITERATIONS: usize = 50;

pub const DEFAULT_COLORS: usize = 8;

/// One cluster of the palette
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteColor {
    pub rgb: [u8; 3],
    /// Sampled pixels assigned to this color
    pub pixels: usize,
    /// Fraction of kept pixels, 0..1
    pub share: f64,
}

impl PaletteColor {
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.rgb[0], self.rgb[1], self.rgb[2])
    }

    /// Hue in degrees, saturation and lightness in percent (truncated)
    pub fn hsl(&self) -> (u16, u8, u8) {
        let [r, g, b] = self.rgb.map(|c| c as f64 / 255.0);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        if max == min {
            return (0, 0, (l * 100.0) as u8);
        }

        let d = max - min;
        let s = if l <= 0.5 { d / (max + min) } else { d / (2.0 - max - min) };
        let h = if max == r {
            (g - b) / d
        } else if max == g {
            2.0 + (b - r) / d
        } else {
            4.0 + (r - g) / d
        };
        let h = (h / 6.0).rem_euclid(1.0);

        ((h * 360.0) as u16, (s * 100.0) as u8, (l * 100.0) as u8)
    }
}

impl fmt::Display for PaletteColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, s, l) = self.hsl();
        write!(
            f,
            "{}  rgb({},{},{})  HSL({} {}% {}%)  {:.1}%",
            self.hex(),
            self.rgb[0],
            self.rgb[1],
            self.rgb[2],
            h,
            s,
            l,
            self.share * 100.0
        )
    }
}

/// Dominant colors of an image, largest share first
#[derive(Debug, Clone)]
pub struct Palette {
    /// Original image dimensions
    pub width: u32,
    pub height: u32,
    /// Pixels that survived the grey filter
    pub kept: usize,
    pub colors: Vec<PaletteColor>,
}

/// Load an image file and extract up to `k` dominant colors
pub fn extract_palette(path: &Path, k: usize) -> Result<Palette> {
    let img = image::open(path).map_err(|e| {
        BrandgenError::PaletteError(format!("Failed to load '{}': {}", path.display(), e))
    })?;
    palette_of(&img, k)
}

/// Extract up to `k` dominant colors from a decoded image
pub fn palette_of(img: &DynamicImage, k: usize) -> Result<Palette> {
    if k == 0 {
        return Err(BrandgenError::PaletteError("color count must be at least 1".to_string()));
    }

    let (width, height) = (img.width(), img.height());
    let rgb = if (width, height) == (SAMPLE_SIZE, SAMPLE_SIZE) {
        img.to_rgb8()
    } else {
        img.resize_exact(SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Triangle)
            .to_rgb8()
    };

    let samples: Vec<[f64; 3]> = rgb
        .pixels()
        .map(|p| p.0)
        .filter(|px| is_colorful(*px))
        .map(|px| px.map(f64::from))
        .collect();

    if samples.is_empty() {
        return Err(BrandgenError::PaletteError(
            "image has no pixels outside the near-black/near-white range".to_string(),
        ));
    }

    let (centers, counts) = kmeans(&samples, k);
    let kept = samples.len();

    let mut colors: Vec<PaletteColor> = centers
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(center, count)| PaletteColor {
            rgb: center.map(|c| c.clamp(0.0, 255.0) as u8),
            pixels: count,
            share: count as f64 / kept as f64,
        })
        .collect();
    colors.sort_by(|a, b| b.pixels.cmp(&a.pixels).then(a.rgb.cmp(&b.rgb)));

    Ok(Palette {
        width,
        height,
        kept,
        colors,
    })
}

/// Keep mid-tones, and anything with visible chroma
fn is_colorful(px: [u8; 3]) -> bool {
    let max = px.iter().copied().max().unwrap_or(0);
    let min = px.iter().copied().min().unwrap_or(0);
    (max > 30 && max < 245) || max - min > 15
}

fn distance2(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (0..3).map(|i| (a[i] - b[i]).powi(2)).sum()
}

fn nearest(point: &[f64; 3], centers: &[[f64; 3]]) -> usize {
    let mut best = 0;
    let mut best_d = f64::MAX;
    for (i, c) in centers.iter().enumerate() {
        let d = distance2(point, c);
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

/// Farthest-first seeding: start at the mean, then repeatedly take the
/// sample farthest from every chosen center. Stops early when the samples
/// hold fewer than `k` distinct colors.
fn seed_centers(samples: &[[f64; 3]], k: usize) -> Vec<[f64; 3]> {
    let n = samples.len() as f64;
    let mut mean = [0.0; 3];
    for s in samples {
        for i in 0..3 {
            mean[i] += s[i] / n;
        }
    }

    let first = samples[nearest_sample(samples, &mean)];
    let mut centers = vec![first];
    let mut dist: Vec<f64> = samples.iter().map(|s| distance2(s, &first)).collect();

    while centers.len() < k {
        let (idx, far) = dist
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0), |best, (i, d)| if d > best.1 { (i, d) } else { best });
        if far == 0.0 {
            break;
        }
        let next = samples[idx];
        for (d, s) in dist.iter_mut().zip(samples) {
            *d = d.min(distance2(s, &next));
        }
        centers.push(next);
    }
    centers
}

fn nearest_sample(samples: &[[f64; 3]], target: &[f64; 3]) -> usize {
    let mut best = 0;
    let mut best_d = f64::MAX;
    for (i, s) in samples.iter().enumerate() {
        let d = distance2(s, target);
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

fn kmeans(samples: &[[f64; 3]], k: usize) -> (Vec<[f64; 3]>, Vec<usize>) {
    let mut centers = seed_centers(samples, k);
    let mut labels = vec![usize::MAX; samples.len()];

    for iteration in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (label, s) in labels.iter_mut().zip(samples) {
            let n = nearest(s, &centers);
            if *label != n {
                *label = n;
                changed = true;
            }
        }
        if !changed {
            tracing::trace!(iteration, "k-means converged");
            break;
        }

        let mut sums = vec![[0.0; 3]; centers.len()];
        let mut counts = vec![0usize; centers.len()];
        for (label, s) in labels.iter().zip(samples) {
            counts[*label] += 1;
            for i in 0..3 {
                sums[*label][i] += s[i];
            }
        }
        for (c, (sum, count)) in centers.iter_mut().zip(sums.iter().zip(&counts)) {
            if *count > 0 {
                *c = sum.map(|v| v / *count as f64);
            }
        }
    }

    let mut counts = vec![0usize; centers.len()];
    for label in &labels {
        counts[*label] += 1;
    }
    (centers, counts)
}
