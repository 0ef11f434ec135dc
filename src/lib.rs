//! Plan CrossCheck - 放疗计划参数交叉核对
//!
//! 核心设计原则：
//! - 只读：不修改计划，只输出检查结果
//! - 规则即配置：阈值、命名规则、结构前缀都来自配置
//! - 宁可多查：几何边界情况按更保守的方式处理
//! - 结果可复现：相同输入得到相同的结果序列

pub mod core;
pub mod logging;
pub mod rules;
pub mod storage;
