//! HDR environment map loading and prefiltering.
//!
//! The equirectangular image is decoded to f32, reduced into a box-filtered
//! mip chain and stored as f16 for a filterable `Rgba16Float` texture. The
//! shader reads diffuse irradiance from the last level and glossy reflections
//! from a roughness-selected level.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use half::f16;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Error, Result};

pub const ENVIRONMENT_PATH: &str = "hdr/sunflowers_1k.hdr";

static NEXT_ENV_ID: AtomicU64 = AtomicU64::new(1);

/// One level of the mip chain, RGBA f16.
#[derive(Clone, Debug)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f16>,
}

/// Prefiltered lighting environment.
#[derive(Debug)]
pub struct EnvironmentMap {
    id: u64,
    pub levels: Vec<MipLevel>,
    pub intensity: f32,
}

impl EnvironmentMap {
    /// Unique per environment; the renderer re-uploads when it changes.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.levels.first().map_or(0, |l| l.width)
    }

    pub fn height(&self) -> u32 {
        self.levels.first().map_or(0, |l| l.height)
    }

    /// Index of the blurriest level.
    pub fn max_mip(&self) -> u32 {
        self.levels.len().saturating_sub(1) as u32
    }

    /// All levels back to back, as expected by a layer-major texture upload.
    pub fn texture_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for level in &self.levels {
            bytes.extend_from_slice(bytemuck::cast_slice(&level.data));
        }
        bytes
    }
}

/// Decode an HDR file and prefilter it. The decoded source is dropped once
/// the mip chain exists.
#[tracing::instrument(level = "debug")]
pub fn load_hdr(path: &Path) -> Result<EnvironmentMap> {
    use image::ImageReader;

    let img = ImageReader::open(path)?.decode()?;
    let rgba = img.to_rgba32f();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::invalid_image(path, "zero-sized environment map"));
    }
    drop(img);

    let env = prefilter(width, height, rgba.into_raw());
    debug!(width, height, levels = env.levels.len(), "environment prefiltered");
    Ok(env)
}

/// Build the mip chain from RGBA f32 texels.
pub fn prefilter(width: u32, height: u32, rgba: Vec<f32>) -> EnvironmentMap {
    let mut levels = Vec::new();
    let mut current = (width, height, rgba);

    loop {
        let (w, h, data) = &current;
        levels.push(MipLevel {
            width: *w,
            height: *h,
            data: data.par_iter().map(|&v| f16::from_f32(v)).collect(),
        });
        if *w == 1 && *h == 1 {
            break;
        }
        current = downsample(*w, *h, data);
    }

    EnvironmentMap {
        id: NEXT_ENV_ID.fetch_add(1, Ordering::Relaxed),
        levels,
        intensity: 1.0,
    }
}

/// 2x2 box filter; odd edges clamp. Output is `max(1, w/2) x max(1, h/2)`.
fn downsample(width: u32, height: u32, src: &[f32]) -> (u32, u32, Vec<f32>) {
    let dw = (width / 2).max(1);
    let dh = (height / 2).max(1);
    let (w, h) = (width as usize, height as usize);
    let mut dst = vec![0.0f32; dw as usize * dh as usize * 4];

    dst.par_chunks_mut(dw as usize * 4).enumerate().for_each(|(y, row)| {
        let y0 = (y * 2).min(h - 1);
        let y1 = (y * 2 + 1).min(h - 1);
        for x in 0..dw as usize {
            let x0 = (x * 2).min(w - 1);
            let x1 = (x * 2 + 1).min(w - 1);
            for c in 0..4 {
                let sum = src[(y0 * w + x0) * 4 + c]
                    + src[(y0 * w + x1) * 4 + c]
                    + src[(y1 * w + x0) * 4 + c]
                    + src[(y1 * w + x1) * 4 + c];
                row[x * 4 + c] = sum * 0.25;
            }
        }
    });

    (dw, dh, dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_chain_sizes() {
        let env = prefilter(8, 4, vec![1.0; 8 * 4 * 4]);
        let sizes: Vec<(u32, u32)> = env.levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(8, 4), (4, 2), (2, 1), (1, 1)]);
        assert_eq!(env.max_mip(), 3);
        assert_eq!(env.width(), 8);
        assert_eq!(env.height(), 4);
        assert_eq!(env.texture_bytes().len(), (32 + 8 + 2 + 1) * 4 * 2);
    }

    #[test]
    fn test_constant_image_stays_constant() {
        let env = prefilter(4, 2, vec![0.5; 4 * 2 * 4]);
        for level in &env.levels {
            assert!(level.data.iter().all(|v| v.to_f32() == 0.5));
        }
    }

    #[test]
    fn test_box_average() {
        // 2x1: red 0 and red 2 average to red 1
        let src = vec![0.0, 0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 1.0];
        let env = prefilter(2, 1, src);
        assert_eq!(env.levels.len(), 2);
        assert_eq!(env.levels[1].data[0].to_f32(), 1.0);
        assert_eq!(env.levels[1].data[3].to_f32(), 1.0);
    }

    #[test]
    fn test_odd_sizes() {
        let env = prefilter(5, 3, vec![1.0; 5 * 3 * 4]);
        let sizes: Vec<(u32, u32)> = env.levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(5, 3), (2, 1), (1, 1)]);
    }

    #[test]
    fn test_load_hdr_file() {
        use image::codecs::hdr::HdrEncoder;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.hdr");
        let pixels = vec![image::Rgb([2.0f32, 1.0, 0.5]); 4 * 2];
        let file = std::fs::File::create(&path).unwrap();
        HdrEncoder::new(std::io::BufWriter::new(file))
            .encode(&pixels, 4, 2)
            .unwrap();

        let env = load_hdr(&path).unwrap();
        assert_eq!((env.width(), env.height()), (4, 2));
        let last = env.levels.last().unwrap();
        assert!((last.data[0].to_f32() - 2.0).abs() < 0.05);
        assert_eq!(last.data[3].to_f32(), 1.0);
    }

    #[test]
    fn test_load_missing() {
        assert!(load_hdr(Path::new("no/such/file.hdr")).is_err());
    }

    #[test]
    fn test_unique_ids() {
        let a = prefilter(1, 1, vec![0.0; 4]);
        let b = prefilter(1, 1, vec![0.0; 4]);
        assert_ne!(a.id(), b.id());
    }
}
