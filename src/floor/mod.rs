pub mod floor;
mod floor_tests;

pub use floor::Floor;
pub use floor::FloorError;
