#![allow(dead_code)]

pub mod mock;
pub mod utils;

#[cfg(test)]
mod batches;
#[cfg(test)]
mod runner;
