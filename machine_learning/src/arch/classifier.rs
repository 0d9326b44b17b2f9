use ndarray::{prelude::*, s};
use rand::Rng;
use rayon::prelude::*;

use super::{
    Model, Sequential,
    activations::ActFn,
    layers::{Layer, PoolMode},
};
use crate::{MlErr, Result};

/// Neighbours used to estimate the local curve direction of a point.
const CURVE_NEIGHBOURS: usize = 8;

/// Width of the first two shared per-point layers.
const POINT_WIDTHS: [usize; 2] = [64, 128];

/// The point-cloud feature extractors a classifier can be built on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backbone {
    /// Shared per-point MLP over raw coordinates followed by max pooling.
    PointNet,
    /// Same trunk over coordinates extended with each point's displacement from the
    /// mean of its nearest neighbours, followed by max and mean pooling.
    CurveNet,
}

impl Backbone {
    fn in_features(self) -> usize {
        match self {
            Backbone::PointNet => 3,
            Backbone::CurveNet => 6,
        }
    }

    fn pool_mode(self) -> PoolMode {
        match self {
            Backbone::PointNet => PoolMode::Max,
            Backbone::CurveNet => PoolMode::MaxMean,
        }
    }
}

/// A point-cloud classifier producing log-probabilities, one row per cloud.
///
/// The parameters live outside of the model (see `Model`), so any number of replicas
/// can be cloned from one instance and run over the same parameter buffer.
#[derive(Clone, Debug)]
pub struct PointCloudClassifier {
    backbone: Backbone,
    num_points: usize,
    num_classes: usize,
    net: Sequential,
}

impl PointCloudClassifier {
    /// Creates a PointNet classifier.
    ///
    /// # Arguments
    /// * `num_points` - The amount of points of every cloud.
    /// * `dim` - The width of the global feature.
    /// * `num_classes` - The amount of output classes.
    pub fn pointnet(num_points: usize, dim: usize, num_classes: usize) -> Result<Self> {
        Self::new(Backbone::PointNet, num_points, dim, num_classes)
    }

    /// Creates a CurveNet classifier, see `Backbone::CurveNet`.
    pub fn curvenet(num_points: usize, dim: usize, num_classes: usize) -> Result<Self> {
        Self::new(Backbone::CurveNet, num_points, dim, num_classes)
    }

    /// Creates a new classifier.
    ///
    /// # Arguments
    /// * `backbone` - The feature extractor.
    /// * `num_points` - The amount of points of every cloud.
    /// * `dim` - The width of the global feature, the head halves it.
    /// * `num_classes` - The amount of output classes.
    ///
    /// # Returns
    /// The classifier or an error if any of the sizes is degenerate.
    pub fn new(
        backbone: Backbone,
        num_points: usize,
        dim: usize,
        num_classes: usize,
    ) -> Result<Self> {
        if num_points == 0 {
            return Err(MlErr::InvalidInput("num_points must be positive"));
        }
        if num_classes < 2 {
            return Err(MlErr::InvalidInput("a classifier needs at least two classes"));
        }
        if dim < 2 {
            return Err(MlErr::InvalidInput("dim must be at least 2"));
        }

        let [w1, w2] = POINT_WIDTHS;
        let mode = backbone.pool_mode();
        let pooled = match mode {
            PoolMode::Max => dim,
            PoolMode::MaxMean => 2 * dim,
        };

        let net = Sequential::new([
            Layer::dense((backbone.in_features(), w1), Some(ActFn::relu())),
            Layer::dense((w1, w2), Some(ActFn::relu())),
            Layer::dense((w2, dim), Some(ActFn::relu())),
            Layer::pool(num_points, mode),
            Layer::dense((pooled, dim / 2), Some(ActFn::relu())),
            Layer::dense((dim / 2, num_classes), None),
            Layer::log_softmax(),
        ]);

        Ok(Self {
            backbone,
            num_points,
            num_classes,
            net,
        })
    }

    pub fn backbone(&self) -> Backbone {
        self.backbone
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Returns the amount of parameters of the classifier.
    pub fn size(&self) -> usize {
        self.net.size()
    }

    /// Allocates and initializes a parameter vector for this classifier.
    pub fn init_params<R: Rng>(&self, rng: &mut R) -> Result<Vec<f32>> {
        let mut params = vec![0.; self.size()];
        self.net.init_params(rng, &mut params)?;
        Ok(params)
    }

    /// Turns a batch of clouds `[batch, points, 3]` into per-point input rows
    /// `[batch * points, features]`.
    pub fn featurize(&self, clouds: ArrayView3<f32>) -> Result<Array2<f32>> {
        let (batch, points, coords) = clouds.dim();

        if batch == 0 {
            return Err(MlErr::InvalidInput("empty batch"));
        }
        if points != self.num_points {
            return Err(MlErr::SizeMismatch {
                what: "points per cloud",
                got: points,
                expected: self.num_points,
            });
        }
        if coords != 3 {
            return Err(MlErr::SizeMismatch {
                what: "point coordinates",
                got: coords,
                expected: 3,
            });
        }

        let features = self.backbone.in_features();
        let mut x = Array2::zeros((batch * points, features));

        for (b, cloud) in clouds.outer_iter().enumerate() {
            let rows = b * points..(b + 1) * points;
            x.slice_mut(s![rows.clone(), 0..3]).assign(&cloud);

            if self.backbone == Backbone::CurveNet {
                x.slice_mut(s![rows, 3..6])
                    .assign(&local_curve(cloud, CURVE_NEIGHBOURS));
            }
        }

        Ok(x)
    }

    /// Makes a forward pass over a batch of clouds.
    ///
    /// # Arguments
    /// * `params` - The classifier's parameters.
    /// * `clouds` - The batch, `[batch, points, 3]`.
    ///
    /// # Returns
    /// The log-probabilities of every class, `[batch, classes]`.
    pub fn forward(&mut self, params: &[f32], clouds: ArrayView3<f32>) -> Result<Array2<f32>> {
        let x = self.featurize(clouds)?;
        self.net.forward(params, x.view())
    }

    /// Backpropagates the derivative of the loss with respect to the output of the last
    /// `forward` call, accumulating the gradient into `grad`.
    pub fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array2<f32>) -> Result<()> {
        self.net.backward(params, grad, d)?;
        Ok(())
    }
}

/// Displacement of every point from the centroid of its `k` nearest neighbours.
///
/// Points along a thin neurite get a displacement orthogonal to the neurite, so the
/// feature encodes the local curvature of the surface.
fn local_curve(cloud: ArrayView2<f32>, k: usize) -> Array2<f32> {
    let n = cloud.nrows();
    let k = k.min(n.saturating_sub(1));
    let mut out = Array2::zeros((n, 3));

    if k == 0 {
        return out;
    }

    let offsets: Vec<[f32; 3]> = (0..n)
        .into_par_iter()
        .map(|i| {
            let p = cloud.row(i);
            let mut dists: Vec<(f32, usize)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| {
                    let q = cloud.row(j);
                    let d = (0..3).map(|a| (p[a] - q[a]).powi(2)).sum::<f32>();
                    (d, j)
                })
                .collect();

            dists.select_nth_unstable_by(k - 1, |a, b| a.0.total_cmp(&b.0));

            let mut mean = [0f32; 3];
            for &(_, j) in &dists[..k] {
                for (a, m) in mean.iter_mut().enumerate() {
                    *m += cloud[[j, a]];
                }
            }

            let k = k as f32;
            [p[0] - mean[0] / k, p[1] - mean[1] / k, p[2] - mean[2] / k]
        })
        .collect();

    for (mut row, offset) in out.rows_mut().into_iter().zip(offsets) {
        row.assign(&aview1(&offset));
    }

    out
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn outputs_log_probabilities_per_cloud() {
        let mut model = PointCloudClassifier::pointnet(5, 8, 3).unwrap();
        let params = model.init_params(&mut StdRng::seed_from_u64(1)).unwrap();
        let clouds = Array3::from_shape_fn((2, 5, 3), |(b, p, c)| (b + p + c) as f32 * 0.1);

        let y = model.forward(&params, clouds.view()).unwrap();
        assert_eq!(y.dim(), (2, 3));
        for row in y.rows() {
            let total: f32 = row.iter().map(|v| v.exp()).sum();
            assert!((total - 1.).abs() < 1e-4);
        }
    }

    #[test]
    fn point_order_does_not_change_the_prediction() {
        let mut model = PointCloudClassifier::curvenet(6, 8, 2).unwrap();
        let params = model.init_params(&mut StdRng::seed_from_u64(3)).unwrap();
        let cloud = Array3::from_shape_fn((1, 6, 3), |(_, p, c)| ((p * 3 + c) as f32).sin());
        let mut reversed = cloud.clone();
        reversed.invert_axis(Axis(1));

        let a = model.forward(&params, cloud.view()).unwrap();
        let b = model.forward(&params, reversed.view()).unwrap();
        for (a, b) in a.iter().zip(b.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn wrong_point_count_is_rejected() {
        let mut model = PointCloudClassifier::pointnet(4, 4, 2).unwrap();
        let params = vec![0.; model.size()];
        let clouds = Array3::zeros((1, 3, 3));
        assert!(model.forward(&params, clouds.view()).is_err());
    }

    #[test]
    fn local_curve_of_a_line_is_zero_in_the_middle() {
        let line = Array2::from_shape_fn((5, 3), |(p, c)| if c == 0 { p as f32 } else { 0. });
        let offsets = local_curve(line.view(), 2);
        assert_eq!(offsets.row(2), aview1(&[0f32, 0., 0.]));
    }
}
