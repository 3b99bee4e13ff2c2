pub mod fixture;
pub mod macros;
pub mod round;

pub use fixture::*;
pub use round::*;
