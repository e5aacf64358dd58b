// src/lib.rs

//! social-info: follower harvester library

pub mod config;
pub mod error;
pub mod mapping;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod sink;
pub mod storage;
pub mod utils;
