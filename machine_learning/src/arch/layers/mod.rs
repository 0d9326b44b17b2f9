mod dense;
mod layer;
mod log_softmax;
mod pool;

pub use dense::Dense;
pub use layer::Layer;
pub use log_softmax::{LogSoftmax, log_softmax};
pub use pool::{GlobalPool, PoolMode};
