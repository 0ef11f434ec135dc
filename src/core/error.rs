//! 错误类型
//!
//! 只有"不应该发生"的情况才会走到这里：几何数据损坏、射野没有控制点、
//! 配置的正则无法编译。预期内的数据缺失由规则本身输出 Finding，不报错。

use thiserror::Error;

/// 中止整次审核的硬错误
#[derive(Debug, Error)]
pub enum ReviewError {
    /// 轮廓点或等中心坐标不是有限数
    #[error("malformed geometry in '{owner}': {detail}")]
    MalformedGeometry { owner: String, detail: String },

    /// 射野缺少控制点，无法取得机架角
    #[error("field '{0}' has no control points")]
    MissingControlPoints(String),

    /// 配置中的命名规则无法编译
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type ReviewResult<T> = std::result::Result<T, ReviewError>;
