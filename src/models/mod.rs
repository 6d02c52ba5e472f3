pub mod case;
pub mod enums;
pub mod fingerprint;
pub mod lab;

pub use case::*;
pub use enums::*;
pub use fingerprint::*;
pub use lab::*;
