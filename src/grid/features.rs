use std::path::Path;

use crate::error::{GridError, GridResult};

/// 模型输入的特征向量
///
/// 特征提取（DSP）之后的原始值，长度等于模型的输入帧大小。加载后不再修改。
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f32>,
}

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 校验长度是否等于模型帧大小，必须在分配任何张量之前调用
    pub fn expect_len(&self, frame_size: usize) -> GridResult<()> {
        if self.values.len() != frame_size {
            return Err(GridError::SizeMismatch { expected: frame_size, actual: self.values.len() });
        }
        Ok(())
    }
}

/// 参数是否看起来像文件名：不含空格且包含 `.`
pub fn looks_like_path(arg: &str) -> bool {
    !arg.contains(' ') && arg.contains('.')
}

/// 解析逗号分隔的特征值
///
/// 每个值两侧的空白会被去掉，末尾多余的逗号会被忽略。
///
/// # 错误处理
/// 任何一个值无法解析都会返回 `Parse` 错误，不会跳过
pub fn parse_features(text: &str) -> GridResult<FeatureVector> {
    let text = text.trim_end();
    let text = text.strip_suffix(',').unwrap_or(text);
    if text.trim().is_empty() {
        return Ok(FeatureVector::new(Vec::new()));
    }

    let values = text
        .split(',')
        .enumerate()
        .map(|(index, token)| {
            let token = token.trim();
            token
                .parse::<f32>()
                .map_err(|_| GridError::Parse { index, token: token.to_string() })
        })
        .collect::<GridResult<Vec<f32>>>()?;
    Ok(FeatureVector::new(values))
}

/// 从文本文件读取特征值
pub fn read_features(path: &Path) -> GridResult<FeatureVector> {
    let text = std::fs::read_to_string(path).map_err(|e| GridError::io(path, e))?;
    parse_features(&text)
}

/// 加载特征：参数像文件名时读取文件，否则当作逗号分隔的字面值
pub fn load_features(arg: &str) -> GridResult<FeatureVector> {
    if looks_like_path(arg) {
        log::debug!("从文件读取特征: {}", arg);
        read_features(Path::new(arg))
    } else {
        parse_features(arg)
    }
}
