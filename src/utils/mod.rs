//! 工具函数模块
//!
//! - 输入验证（垃圾桶、纠正标签）

pub mod validation;

pub use validation::*;
