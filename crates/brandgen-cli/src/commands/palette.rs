use anyhow::{Context, Result};
use brandgen_pipeline::extract_palette;
use std::path::Path;

pub fn run(image: &str, colors: usize) -> Result<()> {
    let path = Path::new(image);
    if !path.exists() {
        anyhow::bail!("File not found: {}", image);
    }

    let palette = extract_palette(path, colors)
        .with_context(|| format!("Could not extract palette from {}", image))?;

    println!("Dominant colors:");
    for color in &palette.colors {
        println!("  {}", color);
    }
    println!("Size: {}x{}", palette.width, palette.height);
    Ok(())
}
