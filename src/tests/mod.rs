// src/tests/mod.rs - 内部测试框架模块

pub mod builders;
pub mod mocks;

pub mod common {
    pub use super::builders::*;
    pub use super::mocks::*;
}
