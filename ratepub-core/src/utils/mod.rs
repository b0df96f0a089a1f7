pub mod alignment;
pub mod clock;
