mod loss_fn;
mod nll;

pub use loss_fn::LossFn;
pub use nll::NllLoss;
