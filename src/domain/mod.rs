pub mod doe;
pub mod network;
pub mod types;

pub use doe::*;
pub use network::*;
pub use types::*;
