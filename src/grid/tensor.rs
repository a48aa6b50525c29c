//! 张量存储与解码
//!
//! 模型输出要么是 int8 量化值（附带 `scale` 和 `zero_point`），要么是 f32 浮点值，
//! 由模型构建时决定。存储类型用枚举表示，因此同一个张量里不可能混用两种表示。

use ndarray::{ArrayD, IxDyn};
use serde::Deserialize;

use crate::error::{GridError, GridResult};

/// 量化参数
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct QuantParams {
    pub scale: f32,
    pub zero_point: i32,
}

impl QuantParams {
    pub fn new(scale: f32, zero_point: i32) -> Self {
        Self { scale, zero_point }
    }
}

/// 将 int8 量化值还原为浮点值
///
/// 先把存储值和零点都扩展为 f32 再相减，避免在 8 位整数上溢出。
///
/// # 参数
/// * `raw` - 张量中存储的 int8 值
/// * `params` - 张量的量化参数
///
/// # 返回值
/// 返回 `(raw - zero_point) * scale`
pub fn dequantize(raw: i8, params: QuantParams) -> f32 {
    (raw as f32 - params.zero_point as f32) * params.scale
}

/// 将浮点值量化为 int8，超出范围时饱和到 [-128, 127]
pub fn quantize(value: f32, params: QuantParams) -> i8 {
    let q = (value / params.scale).round() as i32 + params.zero_point;
    q.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

/// 张量中的一个原始元素
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    /// 量化存储的值及其所属张量的量化参数
    Quantized(i8, QuantParams),
    /// 浮点存储的值
    Float(f32),
}

/// 解码一个原始元素
///
/// 量化值经过反量化，浮点值原样返回。读取张量的每个通道都必须经过这里。
pub fn decode(raw: RawValue) -> f32 {
    match raw {
        RawValue::Quantized(value, params) => dequantize(value, params),
        RawValue::Float(value) => value,
    }
}

/// 张量的底层存储
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Quantized { values: ArrayD<i8>, params: QuantParams },
    Float(ArrayD<f32>),
}

/// `[batch, rows, cols, channels]` 四维网格的几何信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub batch: usize,
    pub rows: usize,
    pub cols: usize,
    pub channels: usize,
}

/// 推理引擎的输入或输出张量
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: TensorData,
}

impl Tensor {
    /// 用 int8 数据创建量化张量
    ///
    /// # 参数
    /// * `dims` - 张量形状
    /// * `values` - 按行优先排列的存储值，长度必须等于各维度之积
    /// * `params` - 量化参数
    pub fn quantized(dims: &[usize], values: Vec<i8>, params: QuantParams) -> GridResult<Self> {
        let values = ArrayD::from_shape_vec(IxDyn(dims), values)
            .map_err(|e| GridError::validation(format!("张量数据与形状 {:?} 不匹配: {}", dims, e)))?;
        Ok(Self { data: TensorData::Quantized { values, params } })
    }

    /// 用 f32 数据创建浮点张量
    pub fn float(dims: &[usize], values: Vec<f32>) -> GridResult<Self> {
        let values = ArrayD::from_shape_vec(IxDyn(dims), values)
            .map_err(|e| GridError::validation(format!("张量数据与形状 {:?} 不匹配: {}", dims, e)))?;
        Ok(Self { data: TensorData::Float(values) })
    }

    /// 创建全零张量，`params` 为 `Some` 时使用量化存储
    pub fn zeros(dims: &[usize], params: Option<QuantParams>) -> Self {
        let data = match params {
            Some(params) => TensorData::Quantized { values: ArrayD::zeros(IxDyn(dims)), params },
            None => TensorData::Float(ArrayD::zeros(IxDyn(dims))),
        };
        Self { data }
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn dims(&self) -> &[usize] {
        match &self.data {
            TensorData::Quantized { values, .. } => values.shape(),
            TensorData::Float(values) => values.shape(),
        }
    }

    pub fn len(&self) -> usize {
        self.dims().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_quantized(&self) -> bool {
        matches!(self.data, TensorData::Quantized { .. })
    }

    pub fn quant_params(&self) -> Option<QuantParams> {
        match self.data {
            TensorData::Quantized { params, .. } => Some(params),
            TensorData::Float(_) => None,
        }
    }

    /// 存储占用的字节数（量化 1 字节/元素，浮点 4 字节/元素）
    pub fn byte_len(&self) -> usize {
        match self.data {
            TensorData::Quantized { .. } => self.len(),
            TensorData::Float(_) => self.len() * std::mem::size_of::<f32>(),
        }
    }

    /// 读取原始元素，越界时返回 `None`
    pub fn raw(&self, index: &[usize]) -> Option<RawValue> {
        match &self.data {
            TensorData::Quantized { values, params } => {
                values.get(index).map(|&v| RawValue::Quantized(v, *params))
            }
            TensorData::Float(values) => values.get(index).map(|&v| RawValue::Float(v)),
        }
    }

    /// 读取并解码一个元素
    pub fn value_at(&self, index: &[usize]) -> Option<f32> {
        self.raw(index).map(decode)
    }

    /// 读取第一个批次中网格单元 `(row, col)` 的某个通道
    pub fn value(&self, row: usize, col: usize, channel: usize) -> Option<f32> {
        self.value_at(&[0, row, col, channel])
    }

    /// 按 `[batch, rows, cols, channels]` 解释张量形状
    ///
    /// # 错误处理
    /// 维度数不是 4 时返回 `Validation` 错误
    pub fn grid_shape(&self) -> GridResult<GridShape> {
        match *self.dims() {
            [batch, rows, cols, channels] => Ok(GridShape { batch, rows, cols, channels }),
            ref dims => Err(GridError::validation(format!(
                "张量维度数应为 4, 实际为 {}",
                dims.len()
            ))),
        }
    }

    /// 把特征值写入张量，int8 张量会先量化
    pub fn write_features(&mut self, features: &[f32]) -> GridResult<()> {
        if features.len() != self.len() {
            return Err(GridError::SizeMismatch { expected: self.len(), actual: features.len() });
        }
        match &mut self.data {
            TensorData::Quantized { values, params } => {
                let params = *params;
                for (slot, &f) in values.iter_mut().zip(features) {
                    *slot = quantize(f, params);
                }
            }
            TensorData::Float(values) => {
                for (slot, &f) in values.iter_mut().zip(features) {
                    *slot = f;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: QuantParams = QuantParams { scale: 0.00390625, zero_point: -128 };

    #[test]
    fn dequantize_widens_before_subtracting() {
        // 127 - (-128) 在 i8 上会溢出
        assert!((dequantize(127, PARAMS) - 255.0 * PARAMS.scale).abs() < 1e-6);
        assert_eq!(dequantize(-128, PARAMS), 0.0);
    }

    #[test]
    fn dequantize_is_monotonic() {
        let mut prev = f32::NEG_INFINITY;
        for raw in i8::MIN..=i8::MAX {
            let v = dequantize(raw, PARAMS);
            assert!(v >= prev, "{} 解码为 {}, 小于前一个值 {}", raw, v, prev);
            prev = v;
        }
    }

    #[test]
    fn quantize_then_decode_stays_within_one_scale_unit() {
        for i in 0..=100 {
            let f = i as f32 / 100.0;
            let back = decode(RawValue::Quantized(quantize(f, PARAMS), PARAMS));
            assert!((back - f).abs() <= PARAMS.scale, "{} -> {}", f, back);
        }
    }

    #[test]
    fn quantize_saturates() {
        assert_eq!(quantize(10.0, PARAMS), i8::MAX);
        assert_eq!(quantize(-10.0, PARAMS), i8::MIN);
    }

    #[test]
    fn float_values_pass_through() {
        assert_eq!(decode(RawValue::Float(0.42)), 0.42);
    }

    #[test]
    fn value_reads_row_major_layout() {
        // 1 x 2 x 2 x 2
        let values = vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7];
        let tensor = Tensor::float(&[1, 2, 2, 2], values).unwrap();
        assert_eq!(tensor.value(1, 0, 1), Some(0.5));
        assert_eq!(tensor.value(2, 0, 0), None);
        assert_eq!(tensor.byte_len(), 32);
    }

    #[test]
    fn quantized_value_is_decoded() {
        let params = QuantParams::new(0.5, 2);
        let tensor = Tensor::quantized(&[1, 1, 1, 2], vec![2, 6], params).unwrap();
        assert_eq!(tensor.value(0, 0, 0), Some(0.0));
        assert_eq!(tensor.value(0, 0, 1), Some(2.0));
        assert_eq!(tensor.byte_len(), 2);
    }

    #[test]
    fn grid_shape_requires_rank_four() {
        let tensor = Tensor::zeros(&[1, 4, 4], None);
        assert!(matches!(tensor.grid_shape(), Err(GridError::Validation(_))));
    }

    #[test]
    fn shape_and_data_length_must_agree() {
        assert!(Tensor::float(&[1, 2, 2, 1], vec![0.0; 3]).is_err());
    }

    #[test]
    fn write_features_quantizes_int8_input() {
        let mut tensor = Tensor::zeros(&[1, 1, 2, 1], Some(PARAMS));
        tensor.write_features(&[0.0, 1.0]).unwrap();
        match tensor.data() {
            TensorData::Quantized { values, .. } => {
                assert_eq!(values.iter().copied().collect::<Vec<_>>(), vec![-128, 127]);
            }
            TensorData::Float(_) => panic!("应为量化张量"),
        }
    }
}
