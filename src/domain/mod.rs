pub mod battery;
pub mod device;
pub mod energy;
pub mod types;

pub use battery::*;
pub use device::*;
pub use energy::*;
pub use types::*;
