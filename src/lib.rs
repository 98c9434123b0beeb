//! Library exports for the cliplink backend
//!
//! This module exposes internal components for testing and potential library usage.

pub mod context;
pub mod database;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod route;
