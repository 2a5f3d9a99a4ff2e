use crate::error::{Result, VmError};

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;

/// 64x32 monochrome pixels, row-major (index = x + y * WIDTH). Pixels only
/// ever change by XOR, or all at once by `clear`.
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pixels: Box<[bool; WIDTH * HEIGHT]>,
}

impl Framebuffer {
    pub fn new() -> Self {
        Framebuffer {
            pixels: Box::new([false; WIDTH * HEIGHT]),
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }

    fn index(x: usize, y: usize) -> Result<usize> {
        if x >= WIDTH || y >= HEIGHT {
            return Err(VmError::InvalidCoordinate { x, y });
        }
        Ok(x + y * WIDTH)
    }

    pub fn pixel(&self, x: usize, y: usize) -> Result<bool> {
        Ok(self.pixels[Self::index(x, y)?])
    }

    pub fn pixels(&self) -> &[bool] {
        &self.pixels[..]
    }

    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|&&p| p).count()
    }

    /// XOR `bit` (0 or 1) into (x, y); true if the pixel went from set to clear
    pub fn draw_pixel(&mut self, x: usize, y: usize, bit: u8) -> Result<bool> {
        if bit > 1 {
            return Err(VmError::InvalidPixel { value: bit });
        }
        let i = Self::index(x, y)?;
        let old = self.pixels[i];
        self.pixels[i] = old ^ (bit == 1);
        Ok(old && !self.pixels[i])
    }

    /// Draw each row MSB-first starting at (x, y). Only set bits are drawn, so
    /// clear bits hanging off the right or bottom edge are fine; a set bit out
    /// there is an error. True if any pixel collided.
    pub fn draw_sprite(&mut self, x: usize, y: usize, rows: &[u8]) -> Result<bool> {
        let mut collision = false;
        for (dy, row) in rows.iter().enumerate() {
            for dx in 0..8 {
                if row & (0x80 >> dx) != 0 {
                    collision |= self.draw_pixel(x + dx, y + dy, 1)?;
                }
            }
        }
        Ok(collision)
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.pixels.chunks(WIDTH) {
            let line: String = row.iter().map(|&p| if p { '#' } else { '.' }).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
