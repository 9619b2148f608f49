//! Internal building blocks (object model, zlib inflate) that power the public APIs.

pub mod object;
pub mod zlib;
