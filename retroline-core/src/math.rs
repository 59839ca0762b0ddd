/// Math utilities - fixed point and 2D transforms
///
/// The rasterizer inner loops run on 16.16 fixed point. Matrices are only
/// used when (re)configuring an affine layer, so they stay in floating
/// point and get converted to fixed point steppers once per scanline.

/// 16.16 fixed point value
pub type Fix = i32;

pub const FIXED_BITS: u32 = 16;
pub const FIXED_ONE: Fix = 1 << FIXED_BITS;

#[inline]
pub fn int2fix(value: i32) -> Fix {
    value << FIXED_BITS
}

#[inline]
pub fn fix2int(value: Fix) -> i32 {
    value >> FIXED_BITS
}

#[inline]
pub fn float2fix(value: f32) -> Fix {
    (value * FIXED_ONE as f32) as Fix
}

/// Integer rectangle with exclusive right/bottom edges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + w,
            y2: y + h,
        }
    }
}

/// 3x3 transform matrix, row-vector convention: p' = p * M
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3 {
    pub m: [[f32; 3]; 3],
}

impl Matrix3 {
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    pub fn translation(dx: f32, dy: f32) -> Self {
        let mut matrix = Self::identity();
        matrix.m[2][0] = dx;
        matrix.m[2][1] = dy;
        matrix
    }

    /// Rotation by angle in degrees
    pub fn rotation(angle: f32) -> Self {
        let rad = angle.to_radians();
        let cos = rad.cos();
        let sin = rad.sin();
        let mut matrix = Self::identity();
        matrix.m[0][0] = cos;
        matrix.m[0][1] = sin;
        matrix.m[1][0] = -sin;
        matrix.m[1][1] = cos;
        matrix
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        let mut matrix = Self::identity();
        matrix.m[0][0] = sx;
        matrix.m[1][1] = sy;
        matrix
    }

    /// Composes in place: self = self * other
    pub fn multiply(&mut self, other: &Matrix3) {
        let mut result = [[0.0f32; 3]; 3];
        for (row, result_row) in result.iter_mut().enumerate() {
            for (col, cell) in result_row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.m[row][k] * other.m[k][col]).sum();
            }
        }
        self.m = result;
    }
}

impl Default for Matrix3 {
    fn default() -> Self {
        Self::identity()
    }
}

/// 2D point in layer space
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Applies a transform in place: p = p * M
    pub fn multiply(&mut self, matrix: &Matrix3) {
        let x = self.x * matrix.m[0][0] + self.y * matrix.m[1][0] + matrix.m[2][0];
        let y = self.x * matrix.m[0][1] + self.y * matrix.m[1][1] + matrix.m[2][1];
        self.x = x;
        self.y = y;
    }
}
