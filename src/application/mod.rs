pub mod generation;
pub mod quota;

pub use generation::*;
pub use quota::*;
