use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{GridError, GridResult};
use crate::grid::decode::{DedupMode, GridDecoder, GridVariant};
use crate::grid::render::EdgeMode;
use crate::grid::report::Report;
use crate::grid::tensor::QuantParams;

/// 网格单元到像素的缩放倍数（模型下采样步长）
pub const GRID_SCALE: usize = 8;

// 检测阈值
pub const CLASS_AB_THRESHOLD: f32 = 0.5;
pub const BINARY_THRESHOLD: f32 = 0.3;
pub const DEFAULT_HIGHLIGHT: f32 = 0.1;

pub const DEFAULT_INPUT_WIDTH: usize = 96;
pub const DEFAULT_INPUT_HEIGHT: usize = 96;
pub const DEFAULT_OUTPUT_PATH: &str = "debug.bmp";
pub const DEFAULT_CONFIG_FILE: &str = "gridsight.toml";
pub const ONNX_INTRA_THREADS: usize = 4;

/// 配置文件的全部内容，所有字段都有默认值
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub model: ModelConfig,
    pub decode: DecodeConfig,
    pub render: RenderConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// ONNX 模型路径
    pub path: Option<PathBuf>,
    /// 输入张量形状 `[batch, height, width, channels]`
    pub input_dims: Vec<usize>,
    /// 帧大小，缺省时为输入张量除批次外各维度之积
    pub frame_size: Option<usize>,
    /// 输入为 int8 时的量化参数
    pub input_quant: Option<QuantParams>,
    /// 输出为 int8 时的量化参数
    pub output_quant: Option<QuantParams>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: None,
            input_dims: vec![1, DEFAULT_INPUT_HEIGHT, DEFAULT_INPUT_WIDTH, 1],
            frame_size: None,
            input_quant: None,
            output_quant: None,
        }
    }
}

impl ModelConfig {
    pub fn frame_size(&self) -> usize {
        self.frame_size
            .unwrap_or_else(|| self.input_dims.iter().skip(1).product())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub variant: GridVariant,
    /// 缺省时使用通道布局的默认阈值
    pub threshold: Option<f32>,
    /// 缺省时使用通道布局的默认去重方式
    pub dedup: Option<DedupMode>,
}

impl DecodeConfig {
    pub fn decoder(&self) -> GridDecoder {
        let mut decoder = GridDecoder::new(self.variant);
        if let Some(threshold) = self.threshold {
            decoder = decoder.with_threshold(threshold);
        }
        if let Some(dedup) = self.dedup {
            decoder = decoder.with_dedup(dedup);
        }
        decoder
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub output: PathBuf,
    pub edge: EdgeMode,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT_PATH),
            edge: EdgeMode::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub highlight: f32,
    pub color: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { highlight: DEFAULT_HIGHLIGHT, color: true }
    }
}

impl ReportConfig {
    pub fn report(&self) -> Report {
        Report::new(self.highlight, self.color)
    }
}

impl GridConfig {
    pub fn from_toml_str(text: &str) -> GridResult<Self> {
        toml::from_str(text).map_err(|e| GridError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> GridResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| GridError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// 查找配置文件
    ///
    /// 显式指定的路径必须存在；否则尝试当前目录下的 `gridsight.toml`，都没有时使用默认配置。
    pub fn discover(explicit: Option<&Path>) -> GridResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.exists() {
            log::info!("使用配置文件: {}", fallback.display());
            return Self::load(fallback);
        }
        Ok(Self::default())
    }
}
