pub mod coordinate;
pub mod creative;
pub mod listing;

pub use coordinate::*;
pub use creative::*;
pub use listing::*;
