//! 调试位图
//!
//! 把灰度特征缓冲区转换为 RGB 画布，在检测到的网格单元上覆盖纯色方块，
//! 最后编码为未压缩的 24 位 BMP 文件。

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, RgbImage};
use raqote::{AntialiasMode, DrawOptions, DrawTarget, SolidSource, Source};
use serde::Deserialize;

use crate::config::GRID_SCALE;
use crate::error::{GridError, GridResult};
use crate::grid::cubes::{Cube, CubeClass};

const OPAQUE: u32 = 0xFF00_0000;
const RGB_MASK: u32 = 0x00FF_FFFF;

/// 方块超出图像右边界或下边界时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// 超出图像的像素直接丢弃
    #[default]
    Clip,
    /// 按 `y * width + x` 线性寻址，超出右边界的部分折回到下一行；
    /// 超出缓冲区末尾的写入被丢弃
    Wrap,
}

/// 把 [0, 1] 的灰度值转换为 8 位像素强度
pub fn gray_level(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// 把灰度值打包为 R = G = B 的 0xRRGGBB
pub fn gray_rgb(value: f32) -> u32 {
    let p = gray_level(value) as u32;
    (p << 16) | (p << 8) | p
}

/// 调试图像，每个特征值对应一个像素，按行优先存储
pub struct DebugImage {
    target: DrawTarget,
    width: usize,
    height: usize,
}

impl DebugImage {
    /// 从灰度特征创建调试图像
    ///
    /// # 参数
    /// * `features` - 取值在 [0, 1] 的灰度值，长度必须等于 `width * height`
    /// * `width` - 图像宽度，来自模型输入张量
    /// * `height` - 图像高度，来自模型输入张量
    ///
    /// # 错误处理
    /// 尺寸为 0 或与特征数量不一致时返回 `Validation` 错误
    pub fn from_features(features: &[f32], width: usize, height: usize) -> GridResult<Self> {
        if width == 0 || height == 0 {
            return Err(GridError::validation(format!("图像尺寸无效: {}x{}", width, height)));
        }
        if width * height != features.len() {
            return Err(GridError::validation(format!(
                "图像尺寸 {}x{} 与特征数量 {} 不一致",
                width,
                height,
                features.len()
            )));
        }

        let mut target = DrawTarget::new(width as i32, height as i32);
        for (pixel, &value) in target.get_data_mut().iter_mut().zip(features) {
            *pixel = OPAQUE | gray_rgb(value);
        }
        Ok(Self { target, width, height })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// 读取一个像素（0xRRGGBB），越界时返回 `None`
    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.target.get_data()[y * self.width + x] & RGB_MASK)
    }

    /// 按行优先顺序返回所有像素（0xRRGGBB）
    pub fn pixels(&self) -> impl Iterator<Item = u32> + '_ {
        self.target.get_data().iter().map(|&p| p & RGB_MASK)
    }

    /// 在每个检测结果的位置覆盖 8x8 的纯色方块
    ///
    /// 方块完全替换原有像素，不做混合。A 类（以及无标记目标）先画，B 类后画。
    pub fn overlay(&mut self, cubes: &[Cube], edge: EdgeMode) {
        let primary = cubes.iter().filter(|c| c.class != CubeClass::ClassB);
        let secondary = cubes.iter().filter(|c| c.class == CubeClass::ClassB);
        for cube in primary.chain(secondary) {
            match edge {
                EdgeMode::Clip => self.fill_block_clipped(cube),
                EdgeMode::Wrap => self.fill_block_wrapped(cube),
            }
        }
    }

    fn fill_block_clipped(&mut self, cube: &Cube) {
        let color = cube.class.color();
        let source = Source::Solid(SolidSource::from_unpremultiplied_argb(
            0xFF,
            (color >> 16) as u8,
            (color >> 8) as u8,
            color as u8,
        ));
        let options = DrawOptions {
            antialias: AntialiasMode::None,
            ..DrawOptions::new()
        };
        let size = GRID_SCALE as f32;
        self.target
            .fill_rect(cube.x() as f32, cube.y() as f32, size, size, &source, &options);
    }

    fn fill_block_wrapped(&mut self, cube: &Cube) {
        let color = OPAQUE | cube.class.color();
        let width = self.width;
        let data = self.target.get_data_mut();
        for dy in 0..GRID_SCALE {
            for dx in 0..GRID_SCALE {
                let index = (cube.y() + dy) * width + cube.x() + dx;
                if let Some(pixel) = data.get_mut(index) {
                    *pixel = color;
                }
            }
        }
    }

    /// 转换为 RGB 图像
    pub fn to_rgb_image(&self) -> RgbImage {
        let bytes: Vec<u8> = self
            .pixels()
            .flat_map(|p| [(p >> 16) as u8, (p >> 8) as u8, p as u8])
            .collect();
        // 尺寸在构造时已校验，缓冲区长度必然匹配
        RgbImage::from_raw(self.width as u32, self.height as u32, bytes)
            .unwrap_or_else(|| RgbImage::new(self.width as u32, self.height as u32))
    }

    /// 编码为未压缩、自下而上、24 位的 BMP 数据
    pub fn encode_bmp(&self) -> GridResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.to_rgb_image().write_to(&mut cursor, ImageFormat::Bmp)?;
        Ok(cursor.into_inner())
    }

    /// 写入 BMP 文件，已存在的文件会被直接覆盖
    pub fn write_bmp(&self, path: &Path) -> GridResult<()> {
        let bytes = self.encode_bmp()?;
        std::fs::write(path, bytes).map_err(|e| GridError::io(path, e))?;
        log::info!("调试位图已保存到: {}", path.display());
        Ok(())
    }
}

impl std::fmt::Debug for DebugImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
