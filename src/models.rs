// Core data models for the Facial Expressions Detection application

use crate::expression::ExpressionScores;

/// Represents a single video frame with RGB data
#[derive(Clone, Debug)]
pub struct Frame {
    /// Raw RGB pixel data (width * height * 3 bytes)
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl Frame {
    /// Creates a new Frame with the given parameters
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Returns true when the buffer length matches width * height * 3
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == self.width as usize * self.height as usize * 3
    }
}

/// Bounding box of a detected face, in frame pixel coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Detector confidence (0.0 to 1.0)
    pub score: f32,
}

impl FaceBox {
    /// Clamps the box to the frame and rounds it to whole pixels.
    ///
    /// Returns `(x, y, width, height)`, or `None` when nothing of the box
    /// lies inside the frame.
    pub fn clamped_to(&self, frame_width: u32, frame_height: u32) -> Option<(i32, i32, i32, i32)> {
        let left = self.x.max(0.0).floor() as i32;
        let top = self.y.max(0.0).floor() as i32;
        let right = (self.x + self.width).min(frame_width as f32).ceil() as i32;
        let bottom = (self.y + self.height).min(frame_height as f32).ceil() as i32;

        if right <= left || bottom <= top {
            return None;
        }

        Some((left, top, right - left, bottom - top))
    }
}

/// The single best face in a frame together with its expression scores
#[derive(Clone, Debug)]
pub struct FaceExpressions {
    pub detection: FaceBox,
    pub expressions: ExpressionScores,
}
