//! Integration test modules

mod assignment;
mod discovery;
