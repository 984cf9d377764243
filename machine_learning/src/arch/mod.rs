pub mod layers;
pub mod loss;
mod model;
mod sequential;

pub use model::{Model, ParamSlot};
pub use sequential::Sequential;
