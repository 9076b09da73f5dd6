use glam::Vec2;

/// Sub-rectangle of a texture in normalized UV space (bottom-left origin).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UvRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for UvRect {
    fn default() -> Self {
        Self::FULL
    }
}

impl UvRect {
    /// The whole texture.
    pub const FULL: Self = Self {
        min: Vec2::ZERO,
        max: Vec2::ONE,
    };

    #[inline]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_min_size(min: Vec2, size: Vec2) -> Self {
        Self { min, max: min + size }
    }

    /// Rectangle given in texel coordinates of a `texture_size` texture.
    #[inline]
    pub fn from_pixels(min: Vec2, max: Vec2, texture_size: [u32; 2]) -> Self {
        let size = Vec2::new(texture_size[0] as f32, texture_size[1] as f32).max(Vec2::ONE);
        Self {
            min: min / size,
            max: max / size,
        }
    }

    #[inline]
    pub fn size(self) -> Vec2 {
        self.max - self.min
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        let s = self.size();
        s.x <= 0.0 || s.y <= 0.0
    }

    /// UVs in quad corner order: bottom-left, bottom-right, top-right, top-left.
    #[inline]
    pub fn corners(self) -> [[f32; 2]; 4] {
        [
            [self.min.x, self.min.y],
            [self.max.x, self.min.y],
            [self.max.x, self.max.y],
            [self.min.x, self.max.y],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_full_texture() {
        assert_eq!(UvRect::default(), UvRect::FULL);
        assert_eq!(UvRect::FULL.size(), Vec2::ONE);
    }

    #[test]
    fn pixels_are_normalized() {
        let r = UvRect::from_pixels(Vec2::new(16.0, 0.0), Vec2::new(32.0, 8.0), [64, 32]);
        assert_eq!(r.min, Vec2::new(0.25, 0.0));
        assert_eq!(r.max, Vec2::new(0.5, 0.25));
    }

    #[test]
    fn corners_start_bottom_left() {
        let r = UvRect::from_min_size(Vec2::new(0.25, 0.5), Vec2::splat(0.25));
        assert_eq!(r.corners()[0], [0.25, 0.5]);
        assert_eq!(r.corners()[2], [0.5, 0.75]);
    }

    #[test]
    fn degenerate_rect_is_empty() {
        assert!(UvRect::new(Vec2::ONE, Vec2::ONE).is_empty());
        assert!(!UvRect::FULL.is_empty());
    }
}
