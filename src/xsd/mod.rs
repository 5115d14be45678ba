pub mod loader;
pub mod model;

pub use loader::{load, load_str, XS_NS};
pub use model::*;
