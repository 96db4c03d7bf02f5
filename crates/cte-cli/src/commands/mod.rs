//! CLI command implementations

pub mod correct;
pub mod simulate;
pub mod smooth;
pub mod trap_map;

use crate::Geometry;
use anyhow::{Context, Result, bail};
use cte_core::{CteParameters, Image, StorageOrder};
use std::path::Path;
#[allow(unused_imports)]
use tracing::{debug, trace};

const PIXEL_BYTES: usize = std::mem::size_of::<f32>();

/// Load a raw little-endian f32 column-major image
pub fn load_image(path: &Path, geometry: Geometry) -> Result<Image> {
    trace!(
        path = %path.display(),
        rows = geometry.rows,
        columns = geometry.columns,
        "load_image"
    );
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to load: {}", path.display()))?;
    decode_image(&bytes, geometry).with_context(|| format!("Bad image file: {}", path.display()))
}

/// Save an image as raw little-endian f32 column-major
pub fn save_image(path: &Path, image: &Image) -> Result<()> {
    let bytes = encode_image(image);
    std::fs::write(path, bytes).with_context(|| format!("Failed to save: {}", path.display()))?;
    debug!(
        path = %path.display(),
        rows = image.n_rows(),
        columns = image.n_columns(),
        "saved image"
    );
    Ok(())
}

/// Load and validate a YAML parameter bundle
pub fn load_params(path: &Path) -> Result<CteParameters> {
    CteParameters::from_file(path)
        .with_context(|| format!("Failed to load parameters: {}", path.display()))
}

fn decode_image(bytes: &[u8], geometry: Geometry) -> Result<Image> {
    let expected = geometry
        .rows
        .checked_mul(geometry.columns)
        .and_then(|n| n.checked_mul(PIXEL_BYTES))
        .context("image geometry overflows")?;
    if bytes.len() != expected {
        bail!(
            "expected {} bytes for {}x{} f32 pixels, found {}",
            expected,
            geometry.rows,
            geometry.columns,
            bytes.len()
        );
    }
    let data = bytes
        .chunks_exact(PIXEL_BYTES)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(Image::from_data(
        geometry.rows,
        geometry.columns,
        StorageOrder::ColumnMajor,
        data,
    )?)
}

fn encode_image(image: &Image) -> Vec<u8> {
    image.data().iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.f32");
        let geometry = Geometry { rows: 5, columns: 3 };
        let img = Image::from_fn(5, 3, |i, j| i as f32 - 2.5 * j as f32);

        save_image(&path, &img).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 60);
        assert_eq!(load_image(&path, geometry).unwrap(), img);
    }

    #[test]
    fn test_wrong_size_rejected() {
        let geometry = Geometry { rows: 4, columns: 4 };
        assert!(decode_image(&[0u8; 60], geometry).is_err());
        assert!(decode_image(&[0u8; 64], geometry).is_ok());
    }

    #[test]
    fn test_little_endian() {
        let geometry = Geometry { rows: 1, columns: 1 };
        let img = decode_image(&1.5f32.to_le_bytes(), geometry).unwrap();
        assert_eq!(img.get(0, 0), 1.5);
        assert_eq!(encode_image(&img), 1.5f32.to_le_bytes().to_vec());
    }
}
