use std::{collections::BTreeMap, ops::Range, sync::Arc};

use log::debug;
use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};

use super::{Augmentor, Dataset, PointSample, Volume};
use crate::{DataError, ProofreaderError, Result, config::DatasetConfig};

/// Class of a sample whose halves belong to the same object.
pub const SAME_OBJECT: usize = 0;

/// Class of a sample whose lower half belongs to another object.
pub const FALSE_MERGE: usize = 1;

/// A labelled object of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Object {
    volume: usize,
    label: u32,
    /// Inclusive z extent.
    z: (usize, usize),
    /// Inclusive (y0, y1, x0, x1) bounding box over every slice.
    bbox: (usize, usize, usize, usize),
    voxels: usize,
}

impl Object {
    fn new(volume: usize, label: u32, (z, y, x): (usize, usize, usize)) -> Self {
        Self {
            volume,
            label,
            z: (z, z),
            bbox: (y, y, x, x),
            voxels: 0,
        }
    }

    fn extend(&mut self, (z, y, x): (usize, usize, usize)) {
        self.z = (self.z.0.min(z), self.z.1.max(z));
        self.bbox = (
            self.bbox.0.min(y),
            self.bbox.1.max(y),
            self.bbox.2.min(x),
            self.bbox.3.max(x),
        );
        self.voxels += 1;
    }

    fn extent(&self) -> usize {
        self.z.1 - self.z.0 + 1
    }
}

/// Voxels of a sample half, in voxel coordinates.
type Voxels = Vec<[f32; 3]>;

/// Point clouds of objects cut by a plane with a few slices taken out around it.
///
/// Every sample is a pure function of the dataset's seed and its index: even indices
/// keep both halves on the same object, odd ones swap the lower half for a
/// neighbouring object, mimicking a false merge. Extra passes (`epoch_multiplier`)
/// revisit every object with fresh cuts.
#[derive(Debug)]
pub struct SplitterDataset {
    volumes: Arc<[Volume]>,
    /// Objects of every volume, sorted by label.
    volume_objects: Vec<Vec<Object>>,
    /// Objects tall enough to be cut.
    objects: Vec<Object>,
    num_slices: (usize, usize),
    radius: usize,
    context_slices: usize,
    num_points: usize,
    epoch_multiplier: usize,
    augmentor: Augmentor,
    seed: u64,
}

impl SplitterDataset {
    /// Creates a new `SplitterDataset`, scanning every volume for its objects.
    ///
    /// # Arguments
    /// * `config` - Geometry of the samples.
    /// * `augmentor` - Applied to every sample.
    /// * `volumes` - The labelled volumes.
    /// * `seed` - The seed every sample derives from.
    ///
    /// # Returns
    /// The dataset, `InvalidConfig` on degenerate geometry or `NoObjects` if no volume has
    /// an object tall enough to be cut.
    pub fn new(
        config: &DatasetConfig,
        augmentor: Augmentor,
        volumes: Arc<[Volume]>,
        seed: u64,
    ) -> Result<Self> {
        let (min_gap, max_gap) = config.num_slices;
        if min_gap > max_gap {
            return Err(ProofreaderError::InvalidConfig(format!(
                "num_slices {:?} is not a range",
                config.num_slices
            )));
        }
        if config.context_slices == 0 || config.num_points == 0 || config.epoch_multiplier == 0 {
            return Err(ProofreaderError::InvalidConfig(
                "context_slices, num_points and epoch_multiplier must be positive".to_string(),
            ));
        }

        let mut volume_objects = Vec::with_capacity(volumes.len());
        for (v, volume) in volumes.iter().enumerate() {
            if volume.labels.is_empty() {
                return Err(DataError::EmptyVolume(volume.name.clone()).into());
            }
            volume_objects.push(scan_objects(v, volume));
        }

        let min_extent = 2 * min_gap + 2;
        let objects: Vec<Object> = volume_objects
            .iter()
            .filter(|objects| objects.len() >= 2)
            .flatten()
            .filter(|object| object.extent() >= min_extent)
            .copied()
            .collect();

        if objects.is_empty() {
            return Err(DataError::NoObjects.into());
        }

        let total_voxels: usize = objects.iter().map(|o| o.voxels).sum();
        debug!(objects = objects.len(), voxels = total_voxels; "scanned volumes");

        Ok(Self {
            volumes,
            volume_objects,
            objects,
            num_slices: config.num_slices,
            radius: config.radius,
            context_slices: config.context_slices,
            num_points: config.num_points,
            epoch_multiplier: config.epoch_multiplier,
            augmentor,
            seed,
        })
    }

    /// The amount of objects samples are cut from.
    pub fn objects(&self) -> usize {
        self.objects.len()
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Returns the class of the sample at `index`.
    pub fn class_of(&self, index: usize) -> usize {
        index % 2
    }

    fn sample(&self, index: usize) -> std::result::Result<PointSample, DataError> {
        let mut rng = StdRng::seed_from_u64(sample_seed(self.seed, index));
        let object = &self.objects[index % self.objects.len()];
        let class = self.class_of(index);
        let volume = &self.volumes[object.volume];

        let gap = rng
            .random_range(self.num_slices.0..=self.num_slices.1)
            .min(object.extent() - 2);
        let cut = rng.random_range(object.z.0 + 1..=object.z.1 - gap);
        let c = self.context_slices;

        let upper_slices = cut.saturating_sub(c).max(object.z.0)..cut;
        let lower_slices = cut + gap..cut + gap + c;

        let upper = voxels(volume, object, upper_slices);
        let (cy, cx) = centroid(&upper).unwrap_or_else(|| {
            let (y0, y1, x0, x1) = object.bbox;
            ((y0 + y1) as f32 / 2., (x0 + x1) as f32 / 2.)
        });

        let lower = match class {
            SAME_OBJECT => voxels(volume, object, lower_slices),
            _ => self.false_merge(&mut rng, object, lower_slices, (cy, cx)),
        };

        let r = self.radius as f32;
        let in_window = |p: &&[f32; 3]| (p[1] - cy).abs() <= r && (p[2] - cx).abs() <= r;
        let mut pool: Voxels = upper
            .iter()
            .chain(&lower)
            .filter(in_window)
            .copied()
            .collect();
        if pool.is_empty() {
            pool = upper.into_iter().chain(lower).collect();
        }
        if pool.is_empty() {
            return Err(DataError::InvalidVolume(format!(
                "sample {index} of {} has no voxels",
                volume.name
            )));
        }

        let (rz, ry, rx) = volume.resolution;
        let origin = [cut as f32, cy, cx];
        let mut points = Array2::zeros((self.num_points, 3));
        for mut row in points.rows_mut() {
            let p = pool[rng.random_range(0..pool.len())];
            row[0] = (p[0] - origin[0]) * rz;
            row[1] = (p[1] - origin[1]) * ry;
            row[2] = (p[2] - origin[2]) * rx;
        }

        self.augmentor.apply(&mut rng, &mut points);

        Ok(PointSample {
            points,
            label: class,
        })
    }

    /// Voxels of another object standing in for the lower half of `object`.
    ///
    /// The closest foreign label under the upper half is used as found. Without one,
    /// another object of the volume is moved under the upper half.
    fn false_merge(
        &self,
        rng: &mut StdRng,
        object: &Object,
        slices: Range<usize>,
        (cy, cx): (f32, f32),
    ) -> Voxels {
        let volume = &self.volumes[object.volume];
        let candidates = &self.volume_objects[object.volume];

        let nearest = nearest_label(volume, object.label, slices.clone(), (cy, cx), self.radius);
        if let Some(label) = nearest
            && let Ok(i) = candidates.binary_search_by_key(&label, |o| o.label)
        {
            return voxels(volume, &candidates[i], slices);
        }

        let others: Vec<&Object> = candidates.iter().filter(|o| o.label != object.label).collect();
        let Some(other) = others.choose(rng) else {
            return Vec::new();
        };

        let mut found = voxels(volume, other, slices.clone());
        let mut dz = 0.;
        if found.is_empty() {
            let own = other.z.0..other.z.0 + self.context_slices;
            dz = slices.start as f32 - other.z.0 as f32;
            found = voxels(volume, other, own);
        }

        let Some((oy, ox)) = centroid(&found) else {
            return found;
        };

        for p in &mut found {
            p[0] += dz;
            p[1] += cy - oy;
            p[2] += cx - ox;
        }

        found
    }
}

impl Dataset for SplitterDataset {
    fn len(&self) -> usize {
        self.objects.len() * self.epoch_multiplier
    }

    fn get(&self, index: usize) -> std::result::Result<PointSample, DataError> {
        if index >= self.len() {
            return Err(DataError::OutOfBounds {
                index,
                len: self.len(),
            });
        }

        self.sample(index)
    }
}

/// Spreads consecutive indices over unrelated seeds.
fn sample_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn scan_objects(v: usize, volume: &Volume) -> Vec<Object> {
    let mut objects: BTreeMap<u32, Object> = BTreeMap::new();

    for (idx, &label) in volume.labels.indexed_iter() {
        if label == 0 {
            continue;
        }

        objects
            .entry(label)
            .or_insert_with(|| Object::new(v, label, idx))
            .extend(idx);
    }

    objects.into_values().collect()
}

/// Collects the voxels of `object` in `slices`.
fn voxels(volume: &Volume, object: &Object, slices: Range<usize>) -> Voxels {
    let (depth, _, _) = volume.labels.dim();
    let (y0, y1, x0, x1) = object.bbox;
    let mut out = Vec::new();

    for z in slices.start.min(depth)..slices.end.min(depth) {
        for y in y0..=y1 {
            for x in x0..=x1 {
                if volume.labels[[z, y, x]] == object.label {
                    out.push([z as f32, y as f32, x as f32]);
                }
            }
        }
    }

    out
}

fn centroid(voxels: &[[f32; 3]]) -> Option<(f32, f32)> {
    if voxels.is_empty() {
        return None;
    }

    let n = voxels.len() as f32;
    let (sy, sx) = voxels
        .iter()
        .fold((0., 0.), |(sy, sx), p| (sy + p[1], sx + p[2]));
    Some((sy / n, sx / n))
}

/// Finds the foreign label closest to `(cy, cx)` inside the `radius` window of `slices`.
fn nearest_label(
    volume: &Volume,
    own: u32,
    slices: Range<usize>,
    (cy, cx): (f32, f32),
    radius: usize,
) -> Option<u32> {
    let (depth, height, width) = volume.labels.dim();
    let window = |c: f32, len: usize| {
        let lo = (c - radius as f32).floor().max(0.) as usize;
        let hi = ((c + radius as f32).ceil().max(0.) as usize + 1).min(len);
        lo..hi
    };

    let mut best: Option<(f32, u32)> = None;
    for z in slices.start.min(depth)..slices.end.min(depth) {
        for y in window(cy, height) {
            for x in window(cx, width) {
                let label = volume.labels[[z, y, x]];
                if label == 0 || label == own {
                    continue;
                }

                let d = (y as f32 - cy).powi(2) + (x as f32 - cx).powi(2);
                if best.is_none_or(|(bd, _)| d < bd) {
                    best = Some((d, label));
                }
            }
        }
    }

    best.map(|(_, label)| label)
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;
    use crate::{config::AugmentorConfig, data::synthetic_volumes};

    fn config() -> DatasetConfig {
        DatasetConfig {
            num_points: 64,
            radius: 16,
            context_slices: 3,
            ..DatasetConfig::default()
        }
    }

    fn dataset(config: &DatasetConfig) -> SplitterDataset {
        let volumes: Arc<[Volume]> = synthetic_volumes(2, (12, 48, 48), 5).into();
        let augmentor = Augmentor::new(AugmentorConfig {
            normalize: (1., 1., 1.),
            ..AugmentorConfig::default()
        })
        .unwrap();
        SplitterDataset::new(config, augmentor, volumes, 7).unwrap()
    }

    #[test]
    fn one_sample_per_object_and_pass() {
        let ds = dataset(&config());
        assert_eq!(ds.objects(), 32);
        assert_eq!(ds.len(), 32);

        let ds = dataset(&DatasetConfig {
            epoch_multiplier: 3,
            ..config()
        });
        assert_eq!(ds.len(), 96);
    }

    #[test]
    fn samples_are_deterministic() {
        let ds = dataset(&config());
        let a = ds.get(5).unwrap();
        assert_eq!(a, ds.get(5).unwrap());
        assert_eq!(a.points.dim(), (64, 3));
        assert_ne!(a, ds.get(6).unwrap());
    }

    #[test]
    fn classes_alternate_with_the_index() {
        let ds = dataset(&DatasetConfig {
            epoch_multiplier: 2,
            ..config()
        });
        assert_eq!(ds.get(0).unwrap().label, SAME_OBJECT);
        assert_eq!(ds.get(1).unwrap().label, FALSE_MERGE);
        assert_eq!(ds.get(32).unwrap().label, SAME_OBJECT);
        assert_eq!(ds.get(33).unwrap().label, FALSE_MERGE);
        assert!((0..ds.len()).all(|i| ds.class_of(i) == i % 2));
    }

    #[test]
    fn points_are_relative_to_the_cut() {
        let ds = dataset(&config());
        let sample = ds.get(0).unwrap();
        let (rz, ..) = ds.volumes[0].resolution;
        let c = config();

        for p in sample.points.rows() {
            let slices = p[0] / rz;
            assert!(slices >= -(c.context_slices as f32));
            assert!(slices < (c.num_slices.1 + c.context_slices) as f32);
        }
    }

    #[test]
    fn out_of_bounds_index_fails() {
        let ds = dataset(&config());
        assert_eq!(
            ds.get(32),
            Err(DataError::OutOfBounds { index: 32, len: 32 })
        );
    }

    #[test]
    fn flat_volumes_have_no_objects() {
        let mut labels = Array3::zeros((2, 8, 8));
        labels[[0, 1, 1]] = 1;
        labels[[1, 5, 5]] = 2;
        let volume = Volume::new("flat", Array3::zeros((2, 8, 8)), labels, (1., 1., 1.)).unwrap();
        let augmentor = Augmentor::new(AugmentorConfig::default()).unwrap();

        let err = SplitterDataset::new(&config(), augmentor, vec![volume].into(), 0).unwrap_err();
        assert!(matches!(err, ProofreaderError::Data(DataError::NoObjects)));
    }
}
