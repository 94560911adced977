pub mod debug;
pub mod index;
pub mod models;

pub use debug::*;
pub use index::*;
pub use models::*;
