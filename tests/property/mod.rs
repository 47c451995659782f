//! Property test modules

mod extraction;
mod finalization;
