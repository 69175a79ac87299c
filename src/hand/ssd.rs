//! Anchor generation for the Single Shot MultiBox Detector (SSD) used by the palm network.
//!
//! Only supports what the palm network needs: fixed-size anchors centered on each feature map
//! cell, with an equal number of anchors per cell within each layer.

use std::ops::Index;

use crate::image::Resolution;

/// An anchor of an SSD network.
///
/// Coordinates range from 0 to 1 and are relative to the network input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// Describes an output layer of an SSD network.
pub struct LayerInfo {
    /// Number of anchors per feature map cell. Must be non-zero.
    boxes_per_cell: u32,
    /// Feature map resolution of this layer.
    resolution: Resolution,
}

impl LayerInfo {
    /// Creates a new SSD layer description.
    ///
    /// # Parameters
    ///
    /// - `boxes_per_cell`: the number of boxes associated with each cell in this feature map.
    /// - `width`/`height`: size of this layer's feature map, in output cells.
    pub const fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        assert!(boxes_per_cell != 0);
        Self {
            boxes_per_cell,
            resolution: Resolution::new(width, height),
        }
    }
}

/// The full list of anchors of an SSD network, in network output order.
pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    pub fn calculate(layers: &[LayerInfo]) -> Self {
        let mut anchors = Vec::new();

        for layer in layers {
            let height = layer.resolution.height();
            let width = layer.resolution.width();

            for y in 0..height {
                for x in 0..width {
                    let anchor = Anchor {
                        x_center: (x as f32 + 0.5) / width as f32,
                        y_center: (y as f32 + 0.5) / height as f32,
                    };
                    // All boxes of a cell share its center since the anchors have fixed size.
                    anchors.extend((0..layer.boxes_per_cell).map(|_| anchor));
                }
            }
        }

        Self { anchors }
    }

    /// Returns the total number of SSD anchors/priors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.anchors[index]
    }
}
