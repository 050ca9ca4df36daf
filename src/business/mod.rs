pub mod input;
pub mod writer;
