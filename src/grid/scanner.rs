use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{DEFAULT_OUTPUT_PATH, GridConfig};
use crate::error::{GridError, GridResult};
use crate::grid::cubes::Cube;
use crate::grid::decode::GridDecoder;
use crate::grid::engine::InferenceEngine;
use crate::grid::features::FeatureVector;
use crate::grid::render::{DebugImage, EdgeMode};
use crate::grid::report::Report;

/// 诊断输出中展示的通道（A 类 / 目标通道）
const PRIMARY_CHANNEL: usize = 1;

/// 一次运行的结果
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub cubes: Vec<Cube>,
    pub width: usize,
    pub height: usize,
    pub quantized: bool,
    pub output_path: PathBuf,
}

/// 完整的单次流水线：校验 → 推理 → 解码 → 诊断输出 → 调试位图
///
/// 每次运行独占自己的特征、张量和图像缓冲区，`Scanner` 本身不保存可变状态，
/// 可以在多个线程间共享。
#[derive(Debug, Clone)]
pub struct Scanner {
    frame_size: usize,
    decoder: GridDecoder,
    report: Report,
    edge: EdgeMode,
    output_path: PathBuf,
}

impl Scanner {
    pub fn new(frame_size: usize, decoder: GridDecoder) -> Self {
        Self {
            frame_size,
            decoder,
            report: Report::default(),
            edge: EdgeMode::default(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
        }
    }

    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(config.model.frame_size(), config.decode.decoder())
            .with_report(config.report.report())
            .with_edge_mode(config.render.edge)
            .with_output_path(config.render.output.clone())
    }

    pub fn with_report(mut self, report: Report) -> Self {
        self.report = report;
        self
    }

    pub fn with_edge_mode(mut self, edge: EdgeMode) -> Self {
        self.edge = edge;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// 运行一次，位图写到配置的输出路径
    pub fn run<E, W>(&self, engine: &mut E, features: &FeatureVector, out: &mut W) -> GridResult<ScanOutcome>
    where
        E: InferenceEngine,
        W: Write,
    {
        self.run_to(engine, features, &self.output_path, out)
    }

    /// 运行一次，位图写到 `output_path`
    ///
    /// # 参数
    /// * `engine` - 推理引擎
    /// * `features` - 输入特征，长度必须等于帧大小
    /// * `output_path` - 调试位图路径，已存在的文件会被覆盖
    /// * `out` - 文本诊断输出
    ///
    /// # 错误处理
    /// 任何阶段失败都立即返回，不产生部分结果
    pub fn run_to<E, W>(
        &self,
        engine: &mut E,
        features: &FeatureVector,
        output_path: &Path,
        out: &mut W,
    ) -> GridResult<ScanOutcome>
    where
        E: InferenceEngine,
        W: Write,
    {
        // 在分配任何张量之前校验特征数量
        features.expect_len(self.frame_size)?;

        engine.init()?;

        let input = engine
            .input()
            .ok_or_else(|| GridError::Inference("无法获取输入张量".to_string()))?;
        let input_shape = input.grid_shape()?;
        if input_shape.channels != 1 {
            return Err(GridError::validation(format!(
                "输入张量应为 1 个通道, 实际为 {}",
                input_shape.channels
            )));
        }
        let (height, width) = (input_shape.rows, input_shape.cols);
        if width * height != self.frame_size {
            return Err(GridError::validation(format!(
                "输入张量 {}x{} 与帧大小 {} 不一致",
                width, height, self.frame_size
            )));
        }

        let start = Instant::now();
        input.write_features(features.as_slice())?;
        log::debug!("写入输入张量耗时: {:?}", start.elapsed());

        self.report
            .write_settings(out, width, height, self.frame_size)
            .and_then(|()| self.report.write_dims(out, "Input", &*input))
            .map_err(diagnostics_err)?;

        let start = Instant::now();
        engine.invoke()?;
        log::debug!("模型推理耗时: {:?}", start.elapsed());

        let output = engine
            .output()
            .ok_or_else(|| GridError::Inference("无法获取输出张量".to_string()))?;
        let quantized = output.is_quantized();
        self.report
            .write_dims(out, "Output", output)
            .and_then(|()| writeln!(out, "Is quantized? {}", u8::from(quantized)))
            .map_err(diagnostics_err)?;

        let start = Instant::now();
        let cubes = self.decoder.decode(output)?;
        log::debug!("后处理耗时: {:?}", start.elapsed());

        self.report
            .write_grid(out, output, PRIMARY_CHANNEL)
            .and_then(|()| self.report.write_cubes(out, &cubes))
            .map_err(diagnostics_err)?;

        let mut image = DebugImage::from_features(features.as_slice(), width, height)?;
        image.overlay(&cubes, self.edge);
        image.write_bmp(output_path)?;

        engine.reset()?;

        log::info!("检测到 {} 个目标", cubes.len());
        Ok(ScanOutcome {
            cubes,
            width,
            height,
            quantized,
            output_path: output_path.to_path_buf(),
        })
    }
}

fn diagnostics_err(e: std::io::Error) -> GridError {
    GridError::io("<diagnostics>", e)
}
