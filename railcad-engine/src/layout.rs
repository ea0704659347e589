use railcad_core::geometry::Point2;

/// 滑块沿导轨方向的长度与导轨宽度之比。
pub const BLOCK_LENGTH_RATIO: f64 = 2.0;
/// 滑块横向宽度与导轨宽度之比，滑块比导轨宽。
pub const BLOCK_WIDTH_RATIO: f64 = 1.5;

/// 滑块尺寸，全部由导轨宽度按比例推导。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockSize {
    pub length: f64,
    pub width: f64,
}

impl BlockSize {
    #[inline]
    pub fn for_rail(rail_width: f64) -> Self {
        Self {
            length: rail_width * BLOCK_LENGTH_RATIO,
            width: rail_width * BLOCK_WIDTH_RATIO,
        }
    }
}

/// 单个滑块，`position` 为左下角。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block {
    pub position: Point2,
    pub size: BlockSize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockLayout {
    pub blocks: Vec<Block>,
    pub size: BlockSize,
    /// 相邻滑块（及两端）之间的间距；无滑块时为 `None`。
    pub spacing: Option<f64>,
}

impl BlockLayout {
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// 滑块总长超过导轨时间距为负，滑块彼此重叠或伸出导轨。
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.spacing.is_some_and(|spacing| spacing < 0.0)
    }
}

/// 沿导轨中心线等距排布 `num_blocks` 个滑块。
///
/// 间距为 `(rail_length - n * block_length) / (n + 1)`，不做截断：
/// 结果为负时照样返回，由调用方决定如何处理。
pub fn layout_blocks(rail_length: f64, rail_width: f64, num_blocks: usize) -> BlockLayout {
    let size = BlockSize::for_rail(rail_width);
    if num_blocks == 0 {
        return BlockLayout {
            blocks: Vec::new(),
            size,
            spacing: None,
        };
    }

    let count = num_blocks as f64;
    let remaining = rail_length - count * size.length;
    let spacing = remaining / (count + 1.0);
    let y = -size.width / 2.0;

    let blocks = (0..num_blocks)
        .map(|index| Block {
            position: Point2::new(spacing + index as f64 * (size.length + spacing), y),
            size,
        })
        .collect();

    BlockLayout {
        blocks,
        size,
        spacing: Some(spacing),
    }
}
