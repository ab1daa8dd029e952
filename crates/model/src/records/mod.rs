pub mod chunk;
pub mod result;
