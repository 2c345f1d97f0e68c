pub mod activation;
pub mod error;
pub mod init;
pub mod layers;
pub mod loss;
pub mod optimizer;
mod sequential;

pub use error::{NnError, Result};
pub use sequential::Sequential;
