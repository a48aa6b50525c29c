//! 错误类型
//!
//! 整条流水线共用一个错误枚举，任何一个阶段失败都会中止本次运行。

use std::path::PathBuf;
use thiserror::Error;

/// 流水线错误
#[derive(Debug, Error)]
pub enum GridError {
    /// 命令行参数不正确
    #[error("参数错误: {0}")]
    Usage(String),

    /// 文件读写失败
    #[error("无法访问文件 {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 特征值中存在无法解析的数字
    #[error("第 {index} 个特征值无法解析: {token:?}")]
    Parse { index: usize, token: String },

    /// 特征数量与模型帧大小不一致
    #[error("特征数组长度不正确: 期望 {expected} 个, 实际 {actual} 个")]
    SizeMismatch { expected: usize, actual: usize },

    /// 张量形状或图像尺寸不符合预期
    #[error("校验失败: {0}")]
    Validation(String),

    /// 推理引擎返回错误（初始化、推理或释放）
    #[error("推理失败: {0}")]
    Inference(String),

    /// 配置文件无法解析
    #[error("配置错误: {0}")]
    Config(String),

    /// 位图编码失败
    #[error("图像编码失败: {0}")]
    Image(#[from] image::ImageError),
}

pub type GridResult<T> = Result<T, GridError>;

impl GridError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GridError::Io { path: path.into(), source }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        GridError::Validation(msg.into())
    }
}
