//! 推理引擎接口
//!
//! 模型和推理运行时都是外部组件，流水线只依赖这里的 trait。

use crate::error::{GridError, GridResult};
use crate::grid::tensor::Tensor;

/// 推理引擎
///
/// 调用顺序为 `init` → 写入 `input` → `invoke` → 读取 `output` → `reset`。
pub trait InferenceEngine {
    /// 分配资源、加载模型
    fn init(&mut self) -> GridResult<()>;

    /// 可写的输入张量，引擎未初始化时返回 `None`
    fn input(&mut self) -> Option<&mut Tensor>;

    /// 输出张量，`invoke` 成功之前返回 `None`
    fn output(&self) -> Option<&Tensor>;

    /// 执行一次推理
    fn invoke(&mut self) -> GridResult<()>;

    /// 释放资源
    fn reset(&mut self) -> GridResult<()>;
}

/// 回放预先录制的输出张量的引擎
///
/// 不论输入是什么，`invoke` 之后都给出同一个输出。用于测试和离线分析。
#[derive(Debug, Clone)]
pub struct ReplayEngine {
    input: Tensor,
    recorded: Tensor,
    output: Option<Tensor>,
    initialized: bool,
    invocations: usize,
}

impl ReplayEngine {
    /// # 参数
    /// * `input` - 输入张量模板（形状和存储类型）
    /// * `recorded` - 每次推理都返回的输出张量
    pub fn new(input: Tensor, recorded: Tensor) -> Self {
        Self {
            input,
            recorded,
            output: None,
            initialized: false,
            invocations: 0,
        }
    }

    /// 最近一次写入的输入
    pub fn last_input(&self) -> &Tensor {
        &self.input
    }

    pub fn invocations(&self) -> usize {
        self.invocations
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl InferenceEngine for ReplayEngine {
    fn init(&mut self) -> GridResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn input(&mut self) -> Option<&mut Tensor> {
        self.initialized.then_some(&mut self.input)
    }

    fn output(&self) -> Option<&Tensor> {
        self.output.as_ref()
    }

    fn invoke(&mut self) -> GridResult<()> {
        if !self.initialized {
            return Err(GridError::Inference("引擎尚未初始化".to_string()));
        }
        self.output = Some(self.recorded.clone());
        self.invocations += 1;
        Ok(())
    }

    fn reset(&mut self) -> GridResult<()> {
        self.output = None;
        self.initialized = false;
        Ok(())
    }
}
