//! Depth frame sampling
//!
//! A [`DepthFrame`] borrows one host depth buffer. [`DepthSampler`] walks it on
//! a sparse grid and lazily yields the valid pixels; [`FramePoints`] turns those
//! into [`ScanPoint`]s. Malformed buffers and bad pixels are skipped, never
//! reported.

use crate::normals::estimate_normal;
use lidarscan_core::{CameraIntrinsics, Point3f, ScanPoint, Transform3D};
use serde::{Deserialize, Serialize};

/// Grid stride used when none is configured
pub const DEFAULT_GRID_STRIDE: usize = 10;

/// Farthest depth accepted when none is configured
pub const DEFAULT_MAX_RANGE: f32 = 5.0;

/// Sampling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Step between sampled pixels, in both axes
    pub grid_stride: usize,
    /// Samples deeper than this are skipped
    pub max_range: f32,
    /// Samples with lower confidence are skipped
    pub min_confidence: f32,
    /// Stop after this many points per frame
    pub max_samples_per_frame: Option<usize>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            grid_stride: DEFAULT_GRID_STRIDE,
            max_range: DEFAULT_MAX_RANGE,
            min_confidence: 0.0,
            max_samples_per_frame: None,
        }
    }
}

/// One borrowed depth buffer plus whatever the host knows about it.
///
/// `depth` is row-major with `stride` elements per row. Optional confidence
/// and color buffers share that layout. Depth values `<= 0` (or non-finite)
/// mark invalid pixels.
#[derive(Debug, Clone, Copy)]
pub struct DepthFrame<'a> {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub depth: &'a [f32],
    /// Per-pixel confidence level, 0 (low) to 2 (high)
    pub confidence: Option<&'a [u8]>,
    pub color: Option<&'a [[u8; 3]]>,
    pub intrinsics: Option<CameraIntrinsics>,
    /// Camera-to-world pose
    pub camera_to_world: Option<Transform3D>,
}

impl<'a> DepthFrame<'a> {
    /// Tightly packed frame (`stride == width`)
    pub fn new(width: usize, height: usize, depth: &'a [f32]) -> Self {
        Self::with_stride(width, height, width, depth)
    }

    pub fn with_stride(width: usize, height: usize, stride: usize, depth: &'a [f32]) -> Self {
        Self {
            width,
            height,
            stride,
            depth,
            confidence: None,
            color: None,
            intrinsics: None,
            camera_to_world: None,
        }
    }

    pub fn with_confidence(mut self, confidence: &'a [u8]) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_color(mut self, color: &'a [[u8; 3]]) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_intrinsics(mut self, intrinsics: CameraIntrinsics) -> Self {
        self.intrinsics = Some(intrinsics);
        self
    }

    pub fn with_pose(mut self, camera_to_world: Transform3D) -> Self {
        self.camera_to_world = Some(camera_to_world);
        self
    }

    /// Whether the frame can yield anything at all
    pub fn is_usable(&self) -> bool {
        self.width > 0 && self.height > 0 && self.stride >= self.width && !self.depth.is_empty()
    }

    fn offset(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        y.checked_mul(self.stride)?.checked_add(x)
    }

    /// Raw depth at a pixel if it is inside the buffer
    pub fn depth_at(&self, x: usize, y: usize) -> Option<f32> {
        self.offset(x, y).and_then(|i| self.depth.get(i)).copied()
    }

    /// Valid depth at a pixel: finite and strictly positive
    pub fn valid_depth_at(&self, x: usize, y: usize) -> Option<f32> {
        self.depth_at(x, y).filter(|d| d.is_finite() && *d > 0.0)
    }

    /// Confidence in `[0, 1]`; 1.0 when the host sent no confidence map
    pub fn confidence_at(&self, x: usize, y: usize) -> f32 {
        match self.confidence {
            None => 1.0,
            Some(map) => self
                .offset(x, y)
                .and_then(|i| map.get(i))
                .map(|&level| (level.min(2) as f32) / 2.0)
                .unwrap_or(0.0),
        }
    }

    pub fn color_at(&self, x: usize, y: usize) -> Option<[f32; 3]> {
        let rgb = self.offset(x, y).and_then(|i| self.color?.get(i))?;
        Some(rgb.map(|c| c as f32 / 255.0))
    }

    /// Sparse grid walk over the valid pixels of this frame
    pub fn samples(&self, config: &SamplerConfig) -> DepthSampler<'a> {
        DepthSampler::new(*self, config.grid_stride, config.max_range)
    }

    /// Scan points for every accepted sample of this frame
    pub fn points(&self, config: &SamplerConfig) -> FramePoints<'a> {
        FramePoints::new(*self, config)
    }

    /// Back-project a sample.
    ///
    /// With intrinsics this is a pinhole back-projection, moved into world
    /// space when the frame carries a pose. Without intrinsics the result is
    /// the approximate `(x / W, y / H, depth)` and the pose is not applied.
    pub fn back_project(&self, sample: &DepthSample) -> Point3f {
        match self.intrinsics.filter(CameraIntrinsics::is_valid) {
            Some(k) => {
                let local = k.back_project(sample.x as f32, sample.y as f32, sample.depth);
                match &self.camera_to_world {
                    Some(pose) => pose.transform_point(&local),
                    None => local,
                }
            }
            None => Point3f::new(
                sample.x as f32 / self.width as f32,
                sample.y as f32 / self.height as f32,
                sample.depth,
            ),
        }
    }
}

/// A valid pixel picked by the sampler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthSample {
    pub x: usize,
    pub y: usize,
    pub depth: f32,
}

/// Lazy, finite iterator over the valid pixels of a stride grid
#[derive(Debug, Clone)]
pub struct DepthSampler<'a> {
    frame: DepthFrame<'a>,
    step: usize,
    max_range: f32,
    x: usize,
    y: usize,
}

impl<'a> DepthSampler<'a> {
    pub fn new(frame: DepthFrame<'a>, stride: usize, max_range: f32) -> Self {
        let y = if frame.is_usable() { 0 } else { frame.height };
        Self {
            frame,
            step: stride.max(1),
            max_range,
            x: 0,
            y,
        }
    }
}

impl Iterator for DepthSampler<'_> {
    type Item = DepthSample;

    fn next(&mut self) -> Option<Self::Item> {
        while self.y < self.frame.height {
            let (x, y) = (self.x, self.y);

            self.x += self.step;
            if self.x >= self.frame.width {
                self.x = 0;
                self.y += self.step;
            }

            if let Some(depth) = self.frame.valid_depth_at(x, y) {
                if depth <= self.max_range {
                    return Some(DepthSample { x, y, depth });
                }
            }
        }
        None
    }
}

/// Lazy iterator of [`ScanPoint`]s built from a frame's samples
#[derive(Debug, Clone)]
pub struct FramePoints<'a> {
    samples: DepthSampler<'a>,
    min_confidence: f32,
    remaining: Option<usize>,
}

impl<'a> FramePoints<'a> {
    pub fn new(frame: DepthFrame<'a>, config: &SamplerConfig) -> Self {
        Self {
            samples: frame.samples(config),
            min_confidence: config.min_confidence,
            remaining: config.max_samples_per_frame,
        }
    }

    fn to_point(&self, sample: &DepthSample) -> ScanPoint {
        let frame = &self.samples.frame;
        let mut point = ScanPoint::new(frame.back_project(sample))
            .with_confidence(frame.confidence_at(sample.x, sample.y));

        if let Some(color) = frame.color_at(sample.x, sample.y) {
            point = point.with_color(color);
        }
        if let Some(normal) = estimate_normal(frame, sample.x, sample.y) {
            let normal = match (&frame.camera_to_world, frame.intrinsics) {
                (Some(pose), Some(_)) => pose.transform_vector(&normal),
                _ => normal,
            };
            point = point.with_normal(normal);
        }
        point
    }
}

impl Iterator for FramePoints<'_> {
    type Item = ScanPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        loop {
            let sample = self.samples.next()?;
            let frame = &self.samples.frame;
            if frame.confidence_at(sample.x, sample.y) < self.min_confidence {
                continue;
            }
            if let Some(n) = self.remaining.as_mut() {
                *n -= 1;
            }
            return Some(self.to_point(&sample));
        }
    }
}
