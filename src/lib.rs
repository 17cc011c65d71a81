#![forbid(unsafe_code)]

pub mod backend;
pub mod collections;
pub mod ir;
