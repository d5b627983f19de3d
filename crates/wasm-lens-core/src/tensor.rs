use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tensor shape (dimensions)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape(pub Vec<usize>);

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Self(dims)
    }

    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    /// Number of elements under one index of the leading dimension
    pub fn outer_stride(&self) -> usize {
        self.0.iter().skip(1).product()
    }

    /// Validates shape dimensions
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(Error::InvalidShape("Shape cannot be empty".into()));
        }
        if self.0.contains(&0) {
            return Err(Error::InvalidShape(format!("Shape dimensions must be > 0, got {:?}", self.0)));
        }
        Ok(())
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Dense row-major f32 tensor with a fixed shape.
///
/// The shape is validated once at construction and the element count always
/// matches it, so downstream kernels can index without re-checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

#[derive(Deserialize)]
struct RawTensor {
    shape: Shape,
    data: Vec<f32>,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = Error;

    fn try_from(raw: RawTensor) -> Result<Self> {
        Tensor::from_vec(raw.shape.0, raw.data)
    }
}

impl Tensor {
    pub fn zeros(dims: Vec<usize>) -> Result<Self> {
        let shape = Shape::new(dims);
        shape.validate()?;
        let data = vec![0.0; shape.numel()];
        Ok(Self { shape, data })
    }

    pub fn from_vec(dims: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let shape = Shape::new(dims);
        shape.validate()?;
        if shape.numel() != data.len() {
            return Err(Error::InvalidShape(format!(
                "Shape {} needs {} elements, got {}",
                shape,
                shape.numel(),
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Fill a tensor element by element in row-major order
    pub fn from_fn<F>(dims: Vec<usize>, mut f: F) -> Result<Self>
    where
        F: FnMut() -> f32,
    {
        let shape = Shape::new(dims);
        shape.validate()?;
        let data = (0..shape.numel()).map(|_| f()).collect();
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Sub-tensor under index `i` of the leading dimension.
    ///
    /// Panics if `i` is out of bounds, like slice indexing.
    pub fn outer(&self, i: usize) -> &[f32] {
        let stride = self.shape.outer_stride();
        &self.data[i * stride..(i + 1) * stride]
    }

    pub fn get_outer(&self, i: usize) -> Option<&[f32]> {
        if i < self.shape.0[0] {
            Some(self.outer(i))
        } else {
            None
        }
    }

    /// Iterate over the sub-tensors of the leading dimension
    pub fn outer_iter(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.shape.outer_stride())
    }

    /// Check that this tensor has exactly the given dimensions
    pub fn expect_dims(&self, name: &str, dims: &[usize]) -> Result<()> {
        if self.shape.dims() != dims {
            return Err(Error::InvalidShape(format!(
                "{} has shape {}, expected {:?}",
                name, self.shape, dims
            )));
        }
        Ok(())
    }
}
