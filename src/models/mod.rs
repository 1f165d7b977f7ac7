pub mod email;
pub mod report;
pub mod schedule;
pub mod shared;

pub use email::*;
pub use report::*;
pub use schedule::*;
pub use shared::*;
