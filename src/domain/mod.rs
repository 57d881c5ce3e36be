mod energy;
mod house;
mod recharge;

pub use energy::*;
pub use house::*;
pub use recharge::*;
