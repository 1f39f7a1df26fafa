pub mod image;
pub mod volume;
