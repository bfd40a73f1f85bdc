use half::{bf16, f16};
use serde::{Deserialize, Serialize};

use crate::error::KernelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sizes { pub m: usize, pub n: usize, pub k: usize }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layout {
    RowMajor,
    ColMajor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Int8,
    Float16,
    BFloat16,
}

impl DType {
    pub fn parse(tag: &str) -> Result<Self, KernelError> {
        match tag {
            "int8" => Ok(DType::Int8),
            "float16" => Ok(DType::Float16),
            "bfloat16" => Ok(DType::BFloat16),
            other => Err(KernelError::UnsupportedDtype(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DType::Int8 => "int8",
            DType::Float16 => "float16",
            DType::BFloat16 => "bfloat16",
        }
    }
}

/// Reduced-precision float element usable by the floating GEMM path.
/// Widening to f32 is exact for both supported types; narrowing rounds
/// to nearest even.
pub trait Element: Copy + Send + Sync + 'static {
    const DTYPE: DType;
    fn to_f32(self) -> f32;
    fn from_f32(v: f32) -> Self;
    fn to_bits(self) -> u16;
    fn from_bits(bits: u16) -> Self;
}

impl Element for f16 {
    const DTYPE: DType = DType::Float16;
    fn to_f32(self) -> f32 { self.to_f32() }
    fn from_f32(v: f32) -> Self { f16::from_f32(v) }
    fn to_bits(self) -> u16 { self.to_bits() }
    fn from_bits(bits: u16) -> Self { f16::from_bits(bits) }
}

impl Element for bf16 {
    const DTYPE: DType = DType::BFloat16;
    fn to_f32(self) -> f32 { self.to_f32() }
    fn from_f32(v: f32) -> Self { bf16::from_f32(v) }
    fn to_bits(self) -> u16 { self.to_bits() }
    fn from_bits(bits: u16) -> Self { bf16::from_bits(bits) }
}

/// A 2-D operand: owned buffer plus logical shape and physical layout.
///
/// The layout flag only changes stride arithmetic, never the logical
/// shape. A column-major (K, N) operand reads the same buffer as a
/// row-major (N, K) operand; `transposed` converts between the two
/// without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
    layout: Layout,
}

impl<T: Copy> Matrix<T> {
    /// Row-major matrix over `data`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, KernelError> {
        if data.len() != rows * cols {
            return Err(KernelError::shape("matrix buffer", rows * cols, data.len()));
        }
        Ok(Self { data, rows, cols, layout: Layout::RowMajor })
    }

    /// Column-major matrix over `data` (stride between columns = rows).
    pub fn col_major(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, KernelError> {
        if data.len() != rows * cols {
            return Err(KernelError::shape("matrix buffer", rows * cols, data.len()));
        }
        Ok(Self { data, rows, cols, layout: Layout::ColMajor })
    }

    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self { data: vec![value; rows * cols], rows, cols, layout: Layout::RowMajor }
    }

    /// Logical transpose without copying: swaps the shape and flips the
    /// layout flag. The buffer is untouched.
    pub fn transposed(self) -> Self {
        Self {
            data: self.data,
            rows: self.cols,
            cols: self.rows,
            layout: match self.layout {
                Layout::RowMajor => Layout::ColMajor,
                Layout::ColMajor => Layout::RowMajor,
            },
        }
    }

    pub fn rows(&self) -> usize { self.rows }
    pub fn cols(&self) -> usize { self.cols }
    pub fn layout(&self) -> Layout { self.layout }
    pub fn as_slice(&self) -> &[T] { &self.data }
    pub fn into_vec(self) -> Vec<T> { self.data }

    /// Element strides (row_stride, col_stride) in the physical buffer.
    pub fn strides(&self) -> (usize, usize) {
        match self.layout {
            Layout::RowMajor => (self.cols, 1),
            Layout::ColMajor => (1, self.rows),
        }
    }

    #[inline]
    pub fn element(&self, i: usize, j: usize) -> T {
        debug_assert!(i < self.rows && j < self.cols);
        match self.layout {
            Layout::RowMajor => self.data[i * self.cols + j],
            Layout::ColMajor => self.data[j * self.rows + i],
        }
    }
}

/// Per-row or per-column dequantization scales, stored as bf16 like the
/// operator interface requires. Widened to f32 once per call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleVector {
    values: Vec<bf16>,
}

impl ScaleVector {
    pub fn new(values: Vec<bf16>) -> Self {
        Self { values }
    }

    pub fn from_f32(values: &[f32]) -> Self {
        Self { values: values.iter().map(|&v| bf16::from_f32(v)).collect() }
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
    pub fn as_slice(&self) -> &[bf16] { &self.values }

    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.values.iter().map(|v| v.to_f32()).collect()
    }
}

/// Inner-dimension agreement check shared by every GEMM entry point.
/// Runs before any computation.
pub fn check_inner_dims<T: Copy, U: Copy>(
    a: &Matrix<T>,
    b: &Matrix<U>,
) -> Result<Sizes, KernelError> {
    if a.cols() != b.rows() {
        return Err(KernelError::shape("inner dimension K", a.cols(), b.rows()));
    }
    Ok(Sizes { m: a.rows(), n: b.cols(), k: a.cols() })
}

/// Scale-length checks for the dequantization epilogue.
pub fn check_scale_lens(
    sizes: &Sizes,
    channel_scale: &ScaleVector,
    per_token_scale: &ScaleVector,
) -> Result<(), KernelError> {
    if per_token_scale.len() != sizes.m {
        return Err(KernelError::shape("per_token_scale length", sizes.m, per_token_scale.len()));
    }
    if channel_scale.len() != sizes.n {
        return Err(KernelError::shape("channel scale length", sizes.n, channel_scale.len()));
    }
    Ok(())
}
