//! Grid模块 - 网格检测输出的后处理与可视化
//!
//! 该模块把模型输出的网格置信度张量转换为：
//! - 文本诊断信息
//! - 去重后的检测结果（网格坐标）
//! - 用于调试的标注位图
//!
//! # 主要组件
//!
//! - features：读取并校验特征向量
//! - tensor：量化/浮点张量的存储与解码
//! - decode：阈值判定与相邻结果去重
//! - render：调试位图的绘制与 BMP 编码
//! - engine / onnx：推理引擎接口及其 ONNX Runtime 实现
//! - scanner：把以上步骤串成一次完整运行
//!
//! # 工作流程
//!
//! 1. 使用load_features加载特征
//! 2. 创建推理引擎（OnnxEngine 或 ReplayEngine）
//! 3. 用Scanner执行推理、解码并写出调试位图

pub mod cubes;
pub mod decode;
pub mod engine;
pub mod features;
pub mod onnx;
pub mod render;
pub mod report;
pub mod scanner;
pub mod tensor;

// 重新导出常用类型和函数
pub use cubes::{Cube, CubeClass};
pub use decode::{DedupMode, GridDecoder, GridVariant};
pub use engine::{InferenceEngine, ReplayEngine};
pub use features::{FeatureVector, load_features, parse_features};
pub use onnx::{OnnxEngine, load_model};
pub use render::{DebugImage, EdgeMode};
pub use report::Report;
pub use scanner::{ScanOutcome, Scanner};
pub use tensor::{QuantParams, RawValue, Tensor, decode, dequantize, quantize};
