//! 网格检测解码
//!
//! 按行优先顺序扫描输出网格，对每个单元解码通道值、应用置信度阈值，
//! 然后对相邻的检测结果去重。

use serde::Deserialize;

use crate::config::{BINARY_THRESHOLD, CLASS_AB_THRESHOLD};
use crate::error::{GridError, GridResult};
use crate::grid::cubes::{Cube, CubeClass};
use crate::grid::tensor::Tensor;

/// 模型输出的通道布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridVariant {
    /// 二通道：0 = 背景，1 = 目标
    #[default]
    Binary,
    /// 三通道：0 = 背景/其他，1 = A 类，2 = B 类
    ClassAb,
}

impl GridVariant {
    pub fn channels(self) -> usize {
        match self {
            GridVariant::Binary => 2,
            GridVariant::ClassAb => 3,
        }
    }

    pub fn default_threshold(self) -> f32 {
        match self {
            GridVariant::Binary => BINARY_THRESHOLD,
            GridVariant::ClassAb => CLASS_AB_THRESHOLD,
        }
    }

    /// 二通道默认贪心去重，三通道默认保留所有结果
    pub fn default_dedup(self) -> DedupMode {
        match self {
            GridVariant::Binary => DedupMode::Greedy,
            GridVariant::ClassAb => DedupMode::Off,
        }
    }
}

/// 相邻检测结果的去重方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    /// 保留所有超过阈值的单元
    Off,
    /// 按扫描顺序接受，和已接受结果相邻（切比雪夫距离 <= 1）的候选被丢弃
    Greedy,
    /// 按置信度从高到低接受，相邻的低置信度候选被抑制
    Ranked,
}

/// 网格检测解码器
///
/// # 示例
///
/// ```
/// use gridsight::{GridDecoder, GridVariant, Tensor};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut values = vec![0.0f32; 3 * 3 * 2];
/// values[(1 * 3 + 1) * 2 + 1] = 0.9;
/// let tensor = Tensor::float(&[1, 3, 3, 2], values)?;
///
/// let cubes = GridDecoder::new(GridVariant::Binary).decode(&tensor)?;
/// assert_eq!(cubes.len(), 1);
/// assert_eq!((cubes[0].row, cubes[0].col), (1, 1));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridDecoder {
    variant: GridVariant,
    threshold: f32,
    dedup: DedupMode,
}

impl GridDecoder {
    /// 按通道布局创建解码器，阈值和去重方式使用该布局的默认值
    pub fn new(variant: GridVariant) -> Self {
        Self {
            variant,
            threshold: variant.default_threshold(),
            dedup: variant.default_dedup(),
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupMode) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn variant(&self) -> GridVariant {
        self.variant
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn dedup(&self) -> DedupMode {
        self.dedup
    }

    /// 解码输出张量
    ///
    /// # 参数
    /// * `tensor` - 形状为 `[batch, rows, cols, channels]` 的输出张量，只读取第一个批次
    ///
    /// # 返回值
    /// 按扫描顺序排列的检测结果
    ///
    /// # 错误处理
    /// 维度数不是 4、批次为 0 或通道数与布局不符时返回 `Validation` 错误
    pub fn decode(&self, tensor: &Tensor) -> GridResult<Vec<Cube>> {
        let shape = tensor.grid_shape()?;
        if shape.batch == 0 {
            return Err(GridError::validation("输出张量批次为 0"));
        }
        if shape.channels != self.variant.channels() {
            return Err(GridError::validation(format!(
                "输出张量通道数应为 {}, 实际为 {}",
                self.variant.channels(),
                shape.channels
            )));
        }

        let mut candidates = Vec::new();
        for row in 0..shape.rows {
            for col in 0..shape.cols {
                if let Some(cube) = self.classify(tensor, row, col)? {
                    candidates.push(cube);
                }
            }
        }
        log::debug!("{} 个网格单元超过阈值 {}", candidates.len(), self.threshold);

        Ok(match self.dedup {
            DedupMode::Off => candidates,
            DedupMode::Greedy => greedy_dedup(candidates),
            DedupMode::Ranked => ranked_dedup(candidates),
        })
    }

    /// 单个网格单元最多产生一个候选结果
    fn classify(&self, tensor: &Tensor, row: usize, col: usize) -> GridResult<Option<Cube>> {
        let read = |channel: usize| {
            tensor.value(row, col, channel).ok_or_else(|| {
                GridError::validation(format!("网格单元 ({}, {}) 的通道 {} 越界", row, col, channel))
            })
        };

        let cube = match self.variant {
            GridVariant::ClassAb => {
                let a = read(1)?;
                let b = read(2)?;
                if a >= self.threshold {
                    Some(Cube::new(row, col, a, CubeClass::ClassA))
                } else if b >= self.threshold {
                    Some(Cube::new(row, col, b, CubeClass::ClassB))
                } else {
                    None
                }
            }
            GridVariant::Binary => {
                let v = read(1)?;
                (v > self.threshold).then(|| Cube::new(row, col, v, CubeClass::Object))
            }
        };
        Ok(cube)
    }
}

/// 贪心去重：先扫描到的结果抑制后扫描到的相邻结果，不比较置信度
fn greedy_dedup(candidates: Vec<Cube>) -> Vec<Cube> {
    let mut accepted: Vec<Cube> = Vec::with_capacity(candidates.len());
    for cube in candidates {
        let suppressed = accepted
            .iter()
            .any(|kept| kept.class == cube.class && kept.is_adjacent(&cube));
        if !suppressed {
            accepted.push(cube);
        }
    }
    accepted
}

/// 按置信度排序的抑制，结果仍按扫描顺序返回
fn ranked_dedup(candidates: Vec<Cube>) -> Vec<Cube> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    // 稳定排序，置信度相同时保持扫描顺序
    order.sort_by(|&a, &b| candidates[b].confidence.total_cmp(&candidates[a].confidence));

    let mut picked = vec![false; candidates.len()];
    let mut suppressed = vec![false; candidates.len()];
    for &i in &order {
        if suppressed[i] {
            continue;
        }
        picked[i] = true;
        for &j in &order {
            if picked[j] || suppressed[j] {
                continue;
            }
            if candidates[j].class == candidates[i].class && candidates[i].is_adjacent(&candidates[j]) {
                suppressed[j] = true;
            }
        }
    }

    candidates
        .into_iter()
        .zip(picked)
        .filter_map(|(cube, keep)| keep.then_some(cube))
        .collect()
}
