//! Flutter 侧接口

pub mod analyzer;
pub mod models;
