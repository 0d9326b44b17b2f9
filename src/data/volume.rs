use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};
use ndarray::Array3;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{DataError, Result};

/// Voxel size of the synthetic volumes, (z, y, x) in nanometers.
const SYNTHETIC_RESOLUTION: (f32, f32, f32) = (40., 4., 4.);

/// Neurites per side of the grid a synthetic volume is laid out on.
const SYNTHETIC_GRID: usize = 4;

/// A labelled electron microscopy volume, indexed (z, y, x).
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub name: String,
    pub image: Array3<f32>,
    /// Segmentation ids, `0` is background.
    pub labels: Array3<u32>,
    /// Voxel size along (z, y, x).
    pub resolution: (f32, f32, f32),
}

/// On-disk layout of a volume: shapes plus flat, row-major buffers.
#[derive(Debug, Serialize, Deserialize)]
struct VolumeFile {
    name: String,
    shape: (usize, usize, usize),
    resolution: (f32, f32, f32),
    image: Vec<f32>,
    labels: Vec<u32>,
}

impl Volume {
    /// Creates a volume, checking that image and labels agree.
    pub fn new(
        name: &str,
        image: Array3<f32>,
        labels: Array3<u32>,
        resolution: (f32, f32, f32),
    ) -> std::result::Result<Self, DataError> {
        if image.dim() != labels.dim() {
            return Err(DataError::InvalidVolume(format!(
                "{name}: image shape {:?} and labels shape {:?} differ",
                image.dim(),
                labels.dim()
            )));
        }
        if labels.is_empty() {
            return Err(DataError::EmptyVolume(name.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            image,
            labels,
            resolution,
        })
    }

    /// Reads a volume from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let VolumeFile {
            name,
            shape,
            resolution,
            image,
            labels,
        } = serde_json::from_slice(&fs::read(path)?)?;
        let invalid = |e: ndarray::ShapeError| DataError::InvalidVolume(format!("{name}: {e}"));

        let image = Array3::from_shape_vec(shape, image).map_err(invalid)?;
        let labels = Array3::from_shape_vec(shape, labels).map_err(invalid)?;
        Ok(Self::new(&name, image, labels, resolution)?)
    }

    /// Writes this volume as JSON, readable back with `Volume::load`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = VolumeFile {
            name: self.name.clone(),
            shape: self.labels.dim(),
            resolution: self.resolution,
            image: self.image.iter().copied().collect(),
            labels: self.labels.iter().copied().collect(),
        };

        fs::write(path, serde_json::to_vec(&file)?)?;
        Ok(())
    }
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Reads every volume under `{path}/train` and `{path}/test`, in file name order.
///
/// # Returns
/// The volumes or an error if a file is unreadable or none were found.
pub fn prepare_volumes(path: &Path) -> Result<Vec<Volume>> {
    let mut volumes = Vec::new();

    for split in ["train", "test"] {
        for file in json_files(&path.join(split))? {
            debug!(file:? = file; "loading volume");
            volumes.push(Volume::load(&file)?);
        }
    }

    if volumes.is_empty() {
        return Err(DataError::InvalidVolume(format!(
            "no volumes found under {}",
            path.display()
        ))
        .into());
    }

    info!("loaded {} volumes from {}", volumes.len(), path.display());
    Ok(volumes)
}

/// Generates `count` volumes of tube-like neurites running along z.
///
/// Each volume holds a grid of neurites whose centers drift slice by slice, every one
/// with its own label.
///
/// # Arguments
/// * `count` - The amount of volumes.
/// * `shape` - The (z, y, x) shape of every volume.
/// * `seed` - The seed of the generator.
pub fn synthetic_volumes(count: usize, shape: (usize, usize, usize), seed: u64) -> Vec<Volume> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| synthetic_volume(&mut rng, &format!("synthetic_{i}"), shape))
        .collect()
}

fn synthetic_volume(
    rng: &mut StdRng,
    name: &str,
    (depth, height, width): (usize, usize, usize),
) -> Volume {
    let mut labels = Array3::zeros((depth, height, width));
    let cell = (height / SYNTHETIC_GRID, width / SYNTHETIC_GRID);

    let mut label = 0;
    for gy in 0..SYNTHETIC_GRID {
        for gx in 0..SYNTHETIC_GRID {
            label += 1;
            let radius = rng.random_range(2.0..4.0f32).min(cell.0.min(cell.1) as f32 / 3.);
            let home = (
                (gy as f32 + 0.5) * cell.0 as f32,
                (gx as f32 + 0.5) * cell.1 as f32,
            );
            let drift = cell.0.min(cell.1) as f32 / 2. - radius;
            let (mut cy, mut cx) = home;

            // neurites wander inside their own cell, so they never touch
            for z in 0..depth {
                cy = (cy + rng.random_range(-0.5..0.5f32)).clamp(home.0 - drift, home.0 + drift);
                cx = (cx + rng.random_range(-0.5..0.5f32)).clamp(home.1 - drift, home.1 + drift);

                let y0 = (cy - radius).floor().max(0.) as usize;
                let x0 = (cx - radius).floor().max(0.) as usize;
                let y1 = ((cy + radius).ceil() as usize).min(height.saturating_sub(1));
                let x1 = ((cx + radius).ceil() as usize).min(width.saturating_sub(1));

                for y in y0..=y1 {
                    for x in x0..=x1 {
                        let (dy, dx) = (y as f32 - cy, x as f32 - cx);
                        if dy * dy + dx * dx <= radius * radius {
                            labels[[z, y, x]] = label;
                        }
                    }
                }
            }
        }
    }

    let image = labels.mapv(|l| {
        let base = if l == 0 { 0.2 } else { 0.8 };
        base + rng.random_range(-0.05..0.05f32)
    });

    Volume {
        name: name.to_string(),
        image,
        labels,
        resolution: SYNTHETIC_RESOLUTION,
    }
}
