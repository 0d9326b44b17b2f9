pub mod activations;
mod classifier;
pub mod layers;
pub mod loss;
mod model;
mod sequential;

pub use classifier::{Backbone, PointCloudClassifier};
pub use model::Model;
pub use sequential::Sequential;
