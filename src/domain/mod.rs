pub mod account;
pub mod admission;
pub mod reset;
pub mod tier;
pub mod usage;

pub use account::*;
pub use admission::*;
pub use reset::*;
pub use tier::*;
pub use usage::*;
