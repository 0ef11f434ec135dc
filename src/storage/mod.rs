//! 存储层 - 配置文件

pub mod config;
