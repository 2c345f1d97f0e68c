mod batch_norm;
mod dense;
mod dropout;
mod layer;
mod relu;
mod sigmoid;

pub use batch_norm::BatchNorm;
pub use dense::Dense;
pub use dropout::Dropout;
pub use layer::Layer;
pub use relu::Relu;
pub use sigmoid::Sigmoid;
