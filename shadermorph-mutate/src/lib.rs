pub mod driver;
pub mod eval;
pub mod families;
pub mod fuzzer;
pub mod injection;
pub mod mutation;
pub mod opaque;
pub mod params;

pub use driver::*;
pub use mutation::*;
pub use params::GenerationParams;
