//! 工具模块

mod parse;

pub use parse::parse_u32;
