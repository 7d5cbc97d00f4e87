use std::fmt;

/// Size of a frame, window or network input, in pixels.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Returns the reduced `width:height` ratio, or [`None`] if either side is 0.
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        AspectRatio::new(self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A `width:height` ratio in lowest terms.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct AspectRatio {
    // Both nonzero, coprime.
    width: u32,
    height: u32,
}

impl AspectRatio {
    /// 1:1, the shape of the palm, landmark and letter network inputs.
    pub const SQUARE: Self = Self {
        width: 1,
        height: 1,
    };

    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let d = gcd(width, height);
        Some(Self {
            width: width / d,
            height: height / d,
        })
    }

    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl fmt::Debug for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduces_ratio() {
        assert_eq!(gcd(6, 9), 3);
        assert_eq!(gcd(0, 7), 7);
        assert_eq!(gcd(7, 0), 7);

        let vga = Resolution::new(640, 480).aspect_ratio().unwrap();
        assert_eq!(vga.to_string(), "4:3");
        assert_eq!(Some(vga), AspectRatio::new(1024, 768));
        assert_eq!(AspectRatio::new(192, 192), Some(AspectRatio::SQUARE));
        assert_eq!(Resolution::new(0, 480).aspect_ratio(), None);
    }

    #[test]
    fn display() {
        let res = Resolution::new(1280, 720);
        assert_eq!(res.to_string(), "1280x720");
        assert_eq!(format!("{res:?}"), "1280x720");
        assert_eq!(res.num_pixels(), 921_600);
    }
}
