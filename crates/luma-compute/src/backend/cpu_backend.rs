//! CPU reference device using rayon for parallelization.
//!
//! Emulates the driver primitives on the host: images live in RAM and a
//! launch runs a host implementation of the kernel over the global range.
//! The device cannot execute arbitrary OpenCL C. A program builds only if
//! its source, modulo whitespace, is one the device has a host
//! implementation for (see [`host_program`]).

use std::sync::{Arc, Mutex, RwLock};

use rayon::prelude::*;
use tracing::trace;

use super::{ComputeRuntime, DriverResult, DriverStatus, ImageAccess};
use crate::image::ImageExtent;
use crate::kernel::{GRAYSCALE_ENTRY_POINT, GRAYSCALE_KERNEL};
use crate::partition::WorkPartition;

/// Work-group limit reported by the reference device.
pub const DEFAULT_MAX_WORK_GROUP_SIZE: usize = 1024;

/// Largest image width or height the reference device accepts.
pub const DEFAULT_MAX_IMAGE_DIM: u32 = 16384;

/// Per-texel body of a host kernel: RGBA in, RGBA out.
type TexelFn = fn([u8; 4]) -> [u8; 4];

/// Entry points of one host-implemented program.
type HostKernels = &'static [(&'static str, TexelFn)];

const GRAYSCALE_PROGRAM: HostKernels = &[(GRAYSCALE_ENTRY_POINT, color_to_gray as TexelFn)];

/// Host kernels for `source`, matched on the whole program text with
/// whitespace runs collapsed.
fn host_program(source: &str) -> Option<HostKernels> {
    let text = normalize(source);
    if text == normalize(GRAYSCALE_KERNEL) {
        Some(GRAYSCALE_PROGRAM)
    } else {
        None
    }
}

fn normalize(source: &str) -> String {
    source.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Host twin of `color_to_gray` in [`crate::kernel::GRAYSCALE_KERNEL`].
///
/// Evaluated in f32 left to right and truncated, matching the device code.
fn color_to_gray(px: [u8; 4]) -> [u8; 4] {
    let gray = (0.299f32 * px[0] as f32 + 0.587f32 * px[1] as f32 + 0.114f32 * px[2] as f32) as u8;
    [gray, gray, gray, 255]
}

// =============================================================================
// Handles
// =============================================================================

/// The single host platform.
#[derive(Debug, Clone)]
pub struct CpuPlatform {
    name: &'static str,
}

/// Reference device descriptor.
#[derive(Debug, Clone)]
pub struct CpuDevice {
    name: String,
    max_work_group_size: usize,
    max_image_dim: u32,
}

/// Context bound to one reference device.
#[derive(Debug)]
pub struct CpuContext {
    device: CpuDevice,
}

/// In-order queue. Launches execute synchronously on submission.
#[derive(Debug)]
pub struct CpuQueue {
    max_work_group_size: usize,
}

/// Program object: source text plus the result of the last build.
#[derive(Debug)]
pub struct CpuProgram {
    source: String,
    kernels: HostKernels,
    build_log: String,
    built: bool,
}

/// Kernel object with its two image argument slots.
pub struct CpuKernel {
    name: String,
    body: TexelFn,
    args: Mutex<[Option<CpuImage>; 2]>,
}

impl std::fmt::Debug for CpuKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuKernel").field("name", &self.name).finish()
    }
}

/// RGBA8 image in host memory.
///
/// Clones share storage; a bound kernel argument refers to the same texels.
#[derive(Debug, Clone)]
pub struct CpuImage {
    texels: Arc<RwLock<Vec<u8>>>,
    extent: ImageExtent,
    access: ImageAccess,
}

// =============================================================================
// CpuRuntime
// =============================================================================

/// Host reference implementation of [`ComputeRuntime`].
#[derive(Debug, Clone)]
pub struct CpuRuntime {
    max_work_group_size: usize,
    max_image_dim: u32,
}

impl CpuRuntime {
    pub fn new() -> Self {
        Self {
            max_work_group_size: DEFAULT_MAX_WORK_GROUP_SIZE,
            max_image_dim: DEFAULT_MAX_IMAGE_DIM,
        }
    }

    /// Reference device reporting a different work-group limit.
    pub fn with_max_work_group_size(max_work_group_size: usize) -> Self {
        Self { max_work_group_size, ..Self::new() }
    }

    /// Reference device with a different image dimension limit.
    pub fn with_max_image_dim(mut self, max_image_dim: u32) -> Self {
        self.max_image_dim = max_image_dim;
        self
    }
}

impl Default for CpuRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeRuntime for CpuRuntime {
    type Platform = CpuPlatform;
    type Device = CpuDevice;
    type Context = CpuContext;
    type Queue = CpuQueue;
    type Program = CpuProgram;
    type Kernel = CpuKernel;
    type Image = CpuImage;

    fn name(&self) -> &'static str {
        "CPU"
    }

    fn platforms(&self) -> DriverResult<Vec<CpuPlatform>> {
        Ok(vec![CpuPlatform { name: "Host" }])
    }

    fn platform_name(&self, platform: &CpuPlatform) -> String {
        platform.name.to_string()
    }

    fn default_devices(&self, _platform: &CpuPlatform) -> DriverResult<Vec<CpuDevice>> {
        Ok(vec![CpuDevice {
            name: format!("Reference device ({} threads)", rayon::current_num_threads()),
            max_work_group_size: self.max_work_group_size,
            max_image_dim: self.max_image_dim,
        }])
    }

    fn device_name(&self, device: &CpuDevice) -> String {
        device.name.clone()
    }

    fn max_work_group_size(&self, device: &CpuDevice) -> DriverResult<usize> {
        Ok(device.max_work_group_size)
    }

    fn create_context(&self, device: &CpuDevice) -> DriverResult<CpuContext> {
        Ok(CpuContext { device: device.clone() })
    }

    fn create_queue(&self, context: &CpuContext, _device: &CpuDevice) -> DriverResult<CpuQueue> {
        Ok(CpuQueue { max_work_group_size: context.device.max_work_group_size })
    }

    fn create_program(&self, _context: &CpuContext, source: &str) -> DriverResult<CpuProgram> {
        if source.trim().is_empty() {
            return Err(DriverStatus::INVALID_VALUE);
        }
        Ok(CpuProgram {
            source: source.to_string(),
            kernels: &[],
            build_log: String::new(),
            built: false,
        })
    }

    fn build_program(
        &self,
        program: &mut CpuProgram,
        _device: &CpuDevice,
        _options: &str,
    ) -> DriverResult<()> {
        let result = scan_kernels(&program.source).and_then(|entry_points| {
            host_program(&program.source).ok_or_else(|| {
                format!(
                    "<source>: error: the reference device cannot execute arbitrary OpenCL C; \
                     no host implementation matches this source for kernel(s) {}\n",
                    entry_points.join(", ")
                )
            })
        });

        match result {
            Ok(kernels) => {
                program.kernels = kernels;
                program.build_log.clear();
                program.built = true;
                Ok(())
            }
            Err(log) => {
                program.kernels = &[];
                program.build_log = log;
                program.built = false;
                Err(DriverStatus::BUILD_PROGRAM_FAILURE)
            }
        }
    }

    fn build_log(&self, program: &CpuProgram, _device: &CpuDevice) -> String {
        program.build_log.clone()
    }

    fn create_kernel(&self, program: &CpuProgram, entry_point: &str) -> DriverResult<CpuKernel> {
        if !program.built {
            return Err(DriverStatus::INVALID_PROGRAM_EXECUTABLE);
        }
        let (_, body) = program
            .kernels
            .iter()
            .find(|(name, _)| *name == entry_point)
            .ok_or(DriverStatus::INVALID_KERNEL_NAME)?;
        Ok(CpuKernel {
            name: entry_point.to_string(),
            body: *body,
            args: Mutex::new([None, None]),
        })
    }

    fn create_image(
        &self,
        context: &CpuContext,
        access: ImageAccess,
        extent: ImageExtent,
        pixels: Option<&[u8]>,
    ) -> DriverResult<CpuImage> {
        let max_dim = context.device.max_image_dim;
        if extent.width() > max_dim || extent.height() > max_dim {
            return Err(DriverStatus::INVALID_IMAGE_SIZE);
        }
        let texels = match pixels {
            Some(data) if data.len() != extent.byte_len() => {
                return Err(DriverStatus::INVALID_VALUE);
            }
            Some(data) => data.to_vec(),
            None => vec![0; extent.byte_len()],
        };
        Ok(CpuImage {
            texels: Arc::new(RwLock::new(texels)),
            extent,
            access,
        })
    }

    fn set_image_arg(&self, kernel: &CpuKernel, index: u32, image: &CpuImage) -> DriverResult<()> {
        let mut args = kernel.args.lock().map_err(|_| DriverStatus::OUT_OF_RESOURCES)?;
        let slot = args
            .get_mut(index as usize)
            .ok_or(DriverStatus::INVALID_ARG_INDEX)?;
        *slot = Some(image.clone());
        Ok(())
    }

    fn enqueue_kernel(
        &self,
        queue: &CpuQueue,
        kernel: &CpuKernel,
        partition: &WorkPartition,
    ) -> DriverResult<()> {
        let [gx, gy] = partition.global;
        let [lx, ly] = partition.local;
        if lx == 0 || ly == 0 || gx % lx != 0 || gy % ly != 0 {
            return Err(DriverStatus::INVALID_WORK_GROUP_SIZE);
        }
        if lx * ly > queue.max_work_group_size {
            return Err(DriverStatus::INVALID_WORK_GROUP_SIZE);
        }

        let args = kernel.args.lock().map_err(|_| DriverStatus::OUT_OF_RESOURCES)?;
        let (Some(src), Some(dst)) = (&args[0], &args[1]) else {
            return Err(DriverStatus::INVALID_KERNEL_ARGS);
        };
        if src.access != ImageAccess::ReadOnly || dst.access != ImageAccess::WriteOnly {
            return Err(DriverStatus::INVALID_KERNEL_ARGS);
        }
        if Arc::ptr_eq(&src.texels, &dst.texels) {
            return Err(DriverStatus::INVALID_MEM_OBJECT);
        }
        if src.extent != dst.extent {
            return Err(DriverStatus::INVALID_IMAGE_SIZE);
        }

        let input = src.texels.read().map_err(|_| DriverStatus::OUT_OF_RESOURCES)?;
        let mut output = dst.texels.write().map_err(|_| DriverStatus::OUT_OF_RESOURCES)?;

        // Work-items outside the image write nothing.
        let row_bytes = src.extent.row_bytes();
        let cols = gx.min(src.extent.width() as usize);
        let rows = gy.min(src.extent.height() as usize);
        let body = kernel.body;

        trace!(
            kernel = %kernel.name,
            global = ?partition.global,
            local = ?partition.local,
            "cpu launch"
        );

        output
            .par_chunks_mut(row_bytes)
            .zip(input.par_chunks(row_bytes))
            .take(rows)
            .for_each(|(out_row, in_row)| {
                let texels = out_row.chunks_exact_mut(4).zip(in_row.chunks_exact(4));
                for (out, texel) in texels.take(cols) {
                    out.copy_from_slice(&body([texel[0], texel[1], texel[2], texel[3]]));
                }
            });

        Ok(())
    }

    fn finish(&self, _queue: &CpuQueue) -> DriverResult<()> {
        Ok(())
    }

    fn read_image(
        &self,
        _queue: &CpuQueue,
        image: &CpuImage,
        extent: ImageExtent,
        dst: &mut [u8],
    ) -> DriverResult<()> {
        if image.extent != extent || dst.len() != extent.byte_len() {
            return Err(DriverStatus::INVALID_VALUE);
        }
        let texels = image.texels.read().map_err(|_| DriverStatus::OUT_OF_RESOURCES)?;
        dst.copy_from_slice(&texels);
        Ok(())
    }
}

// =============================================================================
// Source scanning
// =============================================================================

/// Collect `__kernel void <name>(` entry points, rejecting unbalanced
/// delimiters. The error is a compiler-style log.
fn scan_kernels(source: &str) -> Result<Vec<String>, String> {
    let mut depth_brace = 0i64;
    let mut depth_paren = 0i64;
    for (line_no, line) in source.lines().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => depth_brace += 1,
                '}' => depth_brace -= 1,
                '(' => depth_paren += 1,
                ')' => depth_paren -= 1,
                _ => {}
            }
            if depth_brace < 0 {
                return Err(format!("<source>:{}: error: unmatched '}}'\n", line_no + 1));
            }
            if depth_paren < 0 {
                return Err(format!("<source>:{}: error: unmatched ')'\n", line_no + 1));
            }
        }
    }
    if depth_brace != 0 {
        return Err("<source>: error: expected '}' at end of input\n".to_string());
    }
    if depth_paren != 0 {
        return Err("<source>: error: expected ')' at end of input\n".to_string());
    }

    let tokens: Vec<&str> = source
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .collect();

    let entry_points: Vec<String> = tokens
        .windows(3)
        .filter(|w| (w[0] == "__kernel" || w[0] == "kernel") && w[1] == "void")
        .map(|w| w[2].to_string())
        .collect();

    if entry_points.is_empty() {
        return Err("<source>: error: no __kernel functions found\n".to_string());
    }
    Ok(entry_points)
}
