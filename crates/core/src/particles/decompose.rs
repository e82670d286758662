use image::RgbaImage;

use crate::{comments::Rgb, config::ScanOrder};

/// An opaque pixel picked out of the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSample {
    pub x: u32,
    pub y: u32,
    pub color: Rgb,
    /// Alpha channel in `[0, 1]`.
    pub opacity: f32,
}

/// Column is the opaque pixels of one image column, top to bottom.
pub type Column = Vec<PixelSample>;

/// Opaque pixels of an image, split at the vertical center line and grouped
/// by column in scan order. Empty columns are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decomposition {
    pub width: u32,
    pub height: u32,
    pub left: Vec<Column>,
    pub right: Vec<Column>,
}

impl Decomposition {
    pub fn point_count(&self) -> usize {
        self.left
            .iter()
            .chain(&self.right)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }
}

/// Splits `image` into its left and right halves. With an odd width the
/// middle column belongs to the right half.
pub fn decompose(image: &RgbaImage, left_scan: ScanOrder, right_scan: ScanOrder) -> Decomposition {
    let (width, height) = image.dimensions();
    let middle = width / 2;

    let left: Vec<u32> = match left_scan {
        ScanOrder::CenterOut => (0..middle).rev().collect(),
        ScanOrder::EdgeIn => (0..middle).collect(),
    };
    let right: Vec<u32> = match right_scan {
        ScanOrder::CenterOut => (middle..width).collect(),
        ScanOrder::EdgeIn => (middle..width).rev().collect(),
    };

    let collect = |columns: Vec<u32>| -> Vec<Column> {
        columns
            .into_iter()
            .map(|x| opaque_column(image, x))
            .filter(|column| !column.is_empty())
            .collect()
    };

    Decomposition {
        width,
        height,
        left: collect(left),
        right: collect(right),
    }
}

fn opaque_column(image: &RgbaImage, x: u32) -> Column {
    (0..image.height())
        .filter_map(|y| {
            let [r, g, b, a] = image.get_pixel(x, y).0;
            (a > 0).then(|| PixelSample {
                x,
                y,
                color: Rgb::from_channels(r, g, b),
                opacity: a as f32 / 255.0,
            })
        })
        .collect()
}
