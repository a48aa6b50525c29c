use std::path::{Path, PathBuf};

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::{inputs, value::Tensor as OrtTensor};

use crate::config::{ModelConfig, ONNX_INTRA_THREADS};
use crate::error::{GridError, GridResult};
use crate::grid::engine::InferenceEngine;
use crate::grid::tensor::{QuantParams, Tensor, TensorData};

/// 加载 ONNX 模型
///
/// 加载ONNX格式的模型，并应用优化配置。
///
/// # 参数
/// * `model_path` - 模型文件路径
///
/// # 返回值
/// 返回加载的Session对象
pub fn load_model(model_path: &Path) -> Result<Session, ort::Error> {
    let model = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(ONNX_INTRA_THREADS)?
        .commit_from_file(model_path)?;
    Ok(model)
}

fn ort_err(e: ort::Error) -> GridError {
    GridError::Inference(e.to_string())
}

/// 基于 ONNX Runtime 的推理引擎
///
/// 输入张量的形状和存储类型来自配置；输出配置了量化参数时按 int8 读取，否则按 f32 读取。
pub struct OnnxEngine {
    model_path: PathBuf,
    input: Tensor,
    output_quant: Option<QuantParams>,
    session: Option<Session>,
    input_name: String,
    output: Option<Tensor>,
}

impl OnnxEngine {
    pub fn new(model_path: impl Into<PathBuf>, input: Tensor) -> Self {
        Self {
            model_path: model_path.into(),
            input,
            output_quant: None,
            session: None,
            input_name: String::new(),
            output: None,
        }
    }

    pub fn with_output_quant(mut self, params: QuantParams) -> Self {
        self.output_quant = Some(params);
        self
    }

    /// 按模型配置创建引擎
    ///
    /// # 错误处理
    /// 配置中没有模型路径时返回 `Usage` 错误
    pub fn from_config(config: &ModelConfig) -> GridResult<Self> {
        let path = config
            .path
            .clone()
            .ok_or_else(|| GridError::Usage("未指定模型文件（--model 或配置项 model.path）".to_string()))?;
        let input = Tensor::zeros(&config.input_dims, config.input_quant);
        let engine = Self::new(path, input);
        Ok(match config.output_quant {
            Some(params) => engine.with_output_quant(params),
            None => engine,
        })
    }
}

fn to_dims(shape: &[i64]) -> Vec<usize> {
    shape.iter().map(|&d| d.max(0) as usize).collect()
}

impl InferenceEngine for OnnxEngine {
    fn init(&mut self) -> GridResult<()> {
        let session = load_model(&self.model_path)
            .map_err(|e| GridError::Inference(format!("无法加载模型 {}: {}", self.model_path.display(), e)))?;
        self.input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| GridError::Inference("模型没有输入".to_string()))?;
        log::debug!("模型已加载: {} (输入 {})", self.model_path.display(), self.input_name);
        self.session = Some(session);
        Ok(())
    }

    fn input(&mut self) -> Option<&mut Tensor> {
        self.session.as_ref()?;
        Some(&mut self.input)
    }

    fn output(&self) -> Option<&Tensor> {
        self.output.as_ref()
    }

    fn invoke(&mut self) -> GridResult<()> {
        let shape = match *self.input.dims() {
            [b, h, w, c] => [b, h, w, c],
            ref dims => {
                return Err(GridError::validation(format!("输入张量维度数应为 4, 实际为 {}", dims.len())));
            }
        };
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| GridError::Inference("引擎尚未初始化".to_string()))?;

        let outputs = match self.input.data() {
            TensorData::Float(values) => {
                let tensor = OrtTensor::from_array((shape, values.iter().copied().collect::<Vec<f32>>()))
                    .map_err(ort_err)?;
                session.run(inputs![self.input_name.as_str() => tensor]).map_err(ort_err)?
            }
            TensorData::Quantized { values, .. } => {
                let tensor = OrtTensor::from_array((shape, values.iter().copied().collect::<Vec<i8>>()))
                    .map_err(ort_err)?;
                session.run(inputs![self.input_name.as_str() => tensor]).map_err(ort_err)?
            }
        };

        let output = match self.output_quant {
            Some(params) => {
                let (shape, data) = outputs[0].try_extract_tensor::<i8>().map_err(ort_err)?;
                Tensor::quantized(&to_dims(shape), data.to_vec(), params)?
            }
            None => {
                let (shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(ort_err)?;
                Tensor::float(&to_dims(shape), data.to_vec())?
            }
        };
        drop(outputs);
        self.output = Some(output);
        Ok(())
    }

    fn reset(&mut self) -> GridResult<()> {
        self.session = None;
        self.output = None;
        Ok(())
    }
}
