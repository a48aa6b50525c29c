use crate::config::GRID_SCALE;

/// 检测目标的类别标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeClass {
    /// 三通道模型的通道 1
    ClassA,
    /// 三通道模型的通道 2
    ClassB,
    /// 二通道模型的单一目标类别（无标记）
    Object,
}

impl CubeClass {
    /// 调试位图中该类别方块的填充颜色（0xRRGGBB）
    pub fn color(self) -> u32 {
        match self {
            CubeClass::ClassA | CubeClass::Object => 0xFF0000,
            CubeClass::ClassB => 0x00FF00,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CubeClass::ClassA => "class-a",
            CubeClass::ClassB => "class-b",
            CubeClass::Object => "object",
        }
    }
}

/// 网格上的一个检测结果
///
/// 只记录网格坐标，每个网格单元对应原图中 8x8 像素的区域。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cube {
    pub row: usize,
    pub col: usize,
    pub confidence: f32,
    pub class: CubeClass,
}

impl Cube {
    pub fn new(row: usize, col: usize, confidence: f32, class: CubeClass) -> Self {
        Self { row, col, confidence, class }
    }

    /// 方块左上角在原图中的 x 坐标
    pub fn x(&self) -> usize {
        self.col * GRID_SCALE
    }

    /// 方块左上角在原图中的 y 坐标
    pub fn y(&self) -> usize {
        self.row * GRID_SCALE
    }

    /// 两个网格单元之间的切比雪夫距离
    pub fn chebyshev_distance(&self, other: &Cube) -> usize {
        self.row.abs_diff(other.row).max(self.col.abs_diff(other.col))
    }

    /// 是否与另一个结果相邻（包括对角线和同一单元）
    pub fn is_adjacent(&self, other: &Cube) -> bool {
        self.chebyshev_distance(other) <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_uses_chebyshev_distance() {
        let center = Cube::new(5, 5, 0.9, CubeClass::Object);
        assert!(center.is_adjacent(&Cube::new(4, 6, 0.4, CubeClass::Object)));
        assert!(center.is_adjacent(&Cube::new(6, 6, 0.4, CubeClass::Object)));
        assert!(!center.is_adjacent(&Cube::new(7, 5, 0.4, CubeClass::Object)));
        assert_eq!(center.chebyshev_distance(&Cube::new(2, 4, 0.1, CubeClass::Object)), 3);
    }

    #[test]
    fn pixel_origin_is_scaled_grid_position() {
        let cube = Cube::new(2, 3, 0.7, CubeClass::ClassB);
        assert_eq!((cube.x(), cube.y()), (24, 16));
    }
}
