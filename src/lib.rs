pub mod config;
pub mod error;
pub mod grid;
pub mod gridsight;

// 重新导出grid模块中的常用类型和函数
pub use error::{GridError, GridResult};
pub use grid::{Cube, CubeClass, DebugImage, DedupMode, EdgeMode, GridDecoder, GridVariant};
pub use grid::{FeatureVector, QuantParams, Tensor, load_features, parse_features};
pub use grid::{InferenceEngine, OnnxEngine, ReplayEngine, ScanOutcome, Scanner};
