//! Device image management.
//!
//! Allocates the input/output image pair on the device and binds them as
//! kernel arguments. Both images are created from one [`ImageExtent`], so
//! their dimensions cannot diverge.

use std::fmt;

use tracing::debug;

use crate::backend::{ComputeRuntime, ImageAccess};
use crate::context::ExecutionContext;
use crate::kernel::CompiledKernel;
use crate::{ComputeError, ComputeResult};

/// Bytes per RGBA8 texel.
pub const BYTES_PER_TEXEL: usize = 4;

/// Validated image dimensions (both positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageExtent {
    width: u32,
    height: u32,
}

impl ImageExtent {
    /// Create extent, rejecting zero width or height.
    pub fn new(width: u32, height: u32) -> ComputeResult<Self> {
        if width == 0 || height == 0 {
            return Err(ComputeError::InvalidDimensions(width, height));
        }
        Ok(Self { width, height })
    }

    /// Width in texels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in texels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Texel count.
    pub fn texel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Bytes in one tightly packed RGBA8 row.
    pub fn row_bytes(&self) -> usize {
        (self.width as usize) * BYTES_PER_TEXEL
    }

    /// Bytes of a tightly packed RGBA8 image.
    pub fn byte_len(&self) -> usize {
        self.texel_count() * BYTES_PER_TEXEL
    }
}

impl fmt::Display for ImageExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which of the two pipeline images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Input,
    Output,
}

impl ImageRole {
    /// Kernel-side access of this role.
    pub fn access(&self) -> ImageAccess {
        match self {
            Self::Input => ImageAccess::ReadOnly,
            Self::Output => ImageAccess::WriteOnly,
        }
    }

    /// Positional kernel argument index.
    pub fn arg_index(&self) -> u32 {
        match self {
            Self::Input => 0,
            Self::Output => 1,
        }
    }
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Input and output images of one dispatch.
///
/// Field order is release order: output, then input.
pub struct DeviceImages<R: ComputeRuntime> {
    output: R::Image,
    input: R::Image,
    extent: ImageExtent,
}

impl<R: ComputeRuntime> DeviceImages<R> {
    /// Allocate both images.
    ///
    /// The input is populated eagerly from `pixels`; the output is left
    /// uninitialized. `pixels` must hold exactly `extent.byte_len()` bytes.
    pub fn create(
        runtime: &R,
        exec: &ExecutionContext<R>,
        extent: ImageExtent,
        pixels: &[u8],
    ) -> ComputeResult<Self> {
        if pixels.len() != extent.byte_len() {
            return Err(ComputeError::BufferSizeMismatch {
                expected: extent.byte_len(),
                actual: pixels.len(),
            });
        }

        let input = allocate(runtime, exec, ImageRole::Input, extent, Some(pixels))?;
        let output = allocate(runtime, exec, ImageRole::Output, extent, None)?;

        Ok(Self { input, output, extent })
    }

    /// Shared extent of both images.
    pub fn extent(&self) -> ImageExtent {
        self.extent
    }

    /// Device image of `role`.
    pub fn image(&self, role: ImageRole) -> &R::Image {
        match role {
            ImageRole::Input => &self.input,
            ImageRole::Output => &self.output,
        }
    }

    /// Bind input as argument 0 and output as argument 1.
    ///
    /// On failure the images and the kernel are released together.
    pub fn bind(self, runtime: &R, kernel: CompiledKernel<R>) -> ComputeResult<BoundKernel<R>> {
        let bound = BoundKernel { images: self, kernel };

        for role in [ImageRole::Input, ImageRole::Output] {
            let index = role.arg_index();
            runtime
                .set_image_arg(bound.kernel.kernel(), index, bound.images.image(role))
                .map_err(|status| ComputeError::ArgumentBindingFailed { index, status })?;
        }

        debug!(entry_point = bound.kernel.entry_point(), "kernel arguments bound");
        Ok(bound)
    }
}

fn allocate<R: ComputeRuntime>(
    runtime: &R,
    exec: &ExecutionContext<R>,
    role: ImageRole,
    extent: ImageExtent,
    pixels: Option<&[u8]>,
) -> ComputeResult<R::Image> {
    let image = runtime
        .create_image(exec.context(), role.access(), extent, pixels)
        .map_err(|status| ComputeError::ImageAllocationFailed { which: role, status })?;
    debug!(image = %role, extent = %extent, "device image allocated");
    Ok(image)
}

/// A compiled kernel with both image arguments bound.
///
/// The only thing the dispatcher accepts. Drops images first, then the
/// kernel and its program.
pub struct BoundKernel<R: ComputeRuntime> {
    images: DeviceImages<R>,
    kernel: CompiledKernel<R>,
}

impl<R: ComputeRuntime> BoundKernel<R> {
    /// Bound images.
    pub fn images(&self) -> &DeviceImages<R> {
        &self.images
    }

    /// Underlying compiled kernel.
    pub fn compiled(&self) -> &CompiledKernel<R> {
        &self.kernel
    }

    /// Extent shared by both images.
    pub fn extent(&self) -> ImageExtent {
        self.images.extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_rejects_zero() {
        assert!(matches!(ImageExtent::new(0, 10), Err(ComputeError::InvalidDimensions(0, 10))));
        assert!(matches!(ImageExtent::new(10, 0), Err(ComputeError::InvalidDimensions(10, 0))));
    }

    #[test]
    fn test_extent_sizes() {
        let e = ImageExtent::new(3, 2).unwrap();
        assert_eq!(e.texel_count(), 6);
        assert_eq!(e.row_bytes(), 12);
        assert_eq!(e.byte_len(), 24);
        assert_eq!(e.to_string(), "3x2");
    }

    #[test]
    fn test_roles() {
        assert_eq!(ImageRole::Input.arg_index(), 0);
        assert_eq!(ImageRole::Output.arg_index(), 1);
        assert_eq!(ImageRole::Input.access(), ImageAccess::ReadOnly);
        assert_eq!(ImageRole::Output.access(), ImageAccess::WriteOnly);
    }
}
