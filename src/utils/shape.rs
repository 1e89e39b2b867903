use crate::utils::error::{Error, Result};
use std::fmt;

/// Per-sample feature-map geometry. Features are stored channel-last (HWC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl Shape {
    pub const fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// A flattened feature vector of `n` values.
    pub const fn flat(n: usize) -> Self {
        Self::new(1, 1, n)
    }

    pub fn len(&self) -> usize {
        self.height * self.width * self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pixels(&self) -> usize {
        self.height * self.width
    }

    pub fn with_channels(self, channels: usize) -> Self {
        Self { channels, ..self }
    }

    /// Offset of `(y, x, c)` inside one sample's row.
    pub fn index(&self, y: usize, x: usize, c: usize) -> usize {
        (y * self.width + x) * self.channels + c
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// Output length of a strided window over `size` (floor mode).
pub fn conv_output(size: usize, kernel: usize, stride: usize, padding: usize) -> Result<usize> {
    if stride == 0 || kernel == 0 {
        return Err(Error::Architecture(format!(
            "kernel {kernel} with stride {stride} is not a valid window"
        )));
    }
    let padded = size + 2 * padding;
    if padded < kernel {
        return Err(Error::Architecture(format!(
            "kernel {kernel} does not fit input of size {size} with padding {padding}"
        )));
    }
    Ok((padded - kernel) / stride + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_arithmetic() {
        assert_eq!(conv_output(156, 7, 2, 0).unwrap(), 75);
        assert_eq!(conv_output(75, 3, 2, 0).unwrap(), 37);
        assert_eq!(conv_output(18, 3, 1, 1).unwrap(), 18);
        assert_eq!(conv_output(18, 3, 2, 0).unwrap(), 8);
        assert!(conv_output(2, 3, 2, 0).is_err());
    }

    #[test]
    fn hwc_index() {
        let s = Shape::new(2, 3, 4);
        assert_eq!(s.len(), 24);
        assert_eq!(s.index(1, 2, 3), 23);
        assert_eq!(s.to_string(), "2x3x4");
    }
}
