//! 文本诊断输出
//!
//! 输出推理设置、张量形状、每个网格单元的解码值以及检测结果坐标。

use std::io::{self, Write};

use crate::config::DEFAULT_HIGHLIGHT;
use crate::grid::cubes::Cube;
use crate::grid::tensor::Tensor;

const YELLOW: &str = "\x1b[0;33m";
const RESET: &str = "\x1b[0m";

/// 诊断输出的格式设置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    /// 达到该值的单元会被高亮
    pub highlight: f32,
    /// 是否使用 ANSI 颜色
    pub color: bool,
}

impl Default for Report {
    fn default() -> Self {
        Self { highlight: DEFAULT_HIGHLIGHT, color: true }
    }
}

impl Report {
    pub fn new(highlight: f32, color: bool) -> Self {
        Self { highlight, color }
    }

    pub fn write_settings<W: Write>(&self, out: &mut W, width: usize, height: usize, frame_size: usize) -> io::Result<()> {
        writeln!(out, "Inferencing settings:")?;
        writeln!(out, "\tImage resolution: {}x{}", width, height)?;
        writeln!(out, "\tFrame size: {}", frame_size)
    }

    /// 输出张量形状，`label` 一般为 "Input" 或 "Output"
    pub fn write_dims<W: Write>(&self, out: &mut W, label: &str, tensor: &Tensor) -> io::Result<()> {
        writeln!(out, "{} dims size {}, bytes {}", label, tensor.dims().len(), tensor.byte_len())?;
        for (ix, dim) in tensor.dims().iter().enumerate() {
            writeln!(out, "    dim {}: {}", ix, dim)?;
        }
        Ok(())
    }

    /// 逐行输出某个通道的解码值，每个网格行一行
    pub fn write_grid<W: Write>(&self, out: &mut W, tensor: &Tensor, channel: usize) -> io::Result<()> {
        // 形状错误由解码器报告，这里只跳过
        let Ok(shape) = tensor.grid_shape() else {
            return Ok(());
        };
        for row in 0..shape.rows {
            for col in 0..shape.cols {
                let v = tensor.value(row, col, channel).unwrap_or(0.0);
                if self.color && v >= self.highlight {
                    write!(out, "{}{:.2}{} ", YELLOW, v, RESET)?;
                } else {
                    write!(out, "{:.2} ", v)?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }

    pub fn write_cubes<W: Write>(&self, out: &mut W, cubes: &[Cube]) -> io::Result<()> {
        writeln!(out, "Found {} cube(s):", cubes.len())?;
        for cube in cubes {
            writeln!(
                out,
                "    {} at x={}, y={} = {:.5}",
                cube.class.label(),
                cube.x(),
                cube.y(),
                cube.confidence
            )?;
        }
        Ok(())
    }
}
