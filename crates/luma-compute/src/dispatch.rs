//! Kernel dispatch and the end-to-end grayscale pipeline.

use tracing::{debug, info, trace};

use crate::backend::{Backend, ComputeRuntime, CpuRuntime, select_best_backend};
use crate::context::ExecutionContext;
use crate::device::select_device;
use crate::image::{BoundKernel, DeviceImages, ImageExtent, ImageRole};
use crate::kernel::{KernelCompiler, KernelSource};
use crate::partition::{PartitionStrategy, WorkPartition};
use crate::{ComputeError, ComputeResult};

/// Per-run pipeline settings.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Kernel to compile and launch.
    pub kernel: KernelSource,
    /// Work-group search policy.
    pub strategy: PartitionStrategy,
}

/// Launch `bound` over `partition`, wait for completion and read the whole
/// output image back into a fresh host buffer.
pub fn dispatch<R: ComputeRuntime>(
    runtime: &R,
    exec: &ExecutionContext<R>,
    bound: &BoundKernel<R>,
    partition: &WorkPartition,
) -> ComputeResult<Vec<u8>> {
    let extent = bound.extent();

    runtime
        .enqueue_kernel(exec.queue(), bound.compiled().kernel(), partition)
        .map_err(|status| ComputeError::DispatchFailed { status })?;
    runtime
        .finish(exec.queue())
        .map_err(|status| ComputeError::DispatchFailed { status })?;
    debug!(entry_point = bound.compiled().entry_point(), "kernel completed");

    let mut pixels = vec![0u8; extent.byte_len()];
    runtime
        .read_image(exec.queue(), bound.images().image(ImageRole::Output), extent, &mut pixels)
        .map_err(|status| ComputeError::ReadbackFailed { status })?;
    debug!(bytes = pixels.len(), "output image read back");

    Ok(pixels)
}

/// Convert tightly packed RGBA8 `pixels` to grayscale on `runtime`.
///
/// Runs device selection, context creation, compilation, image upload,
/// partitioning and dispatch once. Device resources acquired along the way
/// are released before returning, on success and on every error path.
pub fn grayscale<R: ComputeRuntime>(
    runtime: &R,
    pixels: &[u8],
    extent: ImageExtent,
    options: &PipelineOptions,
) -> ComputeResult<Vec<u8>> {
    let device = select_device(runtime)?;
    let exec = ExecutionContext::new(runtime, &device)?;
    let kernel = KernelCompiler::new(runtime, &exec, &device).compile(&options.kernel)?;
    let images = DeviceImages::create(runtime, &exec, extent, pixels)?;
    let bound = images.bind(runtime, kernel)?;

    let partition = WorkPartition::compute(extent, device.max_work_group_size(), options.strategy)?;
    info!(
        %extent,
        local_size = ?partition.local,
        global_size = ?partition.global,
        strategy = %options.strategy,
        "Dispatching {}",
        bound.compiled().entry_point()
    );

    let output = dispatch(runtime, &exec, &bound, &partition)?;

    // Images, kernel and program first, then queue and context.
    drop(bound);
    drop(exec);
    trace!("device resources released");

    Ok(output)
}

/// Run [`grayscale`] on the runtime behind `backend`.
pub fn grayscale_with(
    backend: Backend,
    pixels: &[u8],
    extent: ImageExtent,
    options: &PipelineOptions,
) -> ComputeResult<Vec<u8>> {
    match backend {
        Backend::Auto => grayscale_with(select_best_backend(), pixels, extent, options),
        Backend::Cpu => grayscale(&CpuRuntime::new(), pixels, extent, options),
        Backend::OpenCl => {
            #[cfg(feature = "opencl")]
            {
                grayscale(&crate::backend::OpenClRuntime::new(), pixels, extent, options)
            }
            #[cfg(not(feature = "opencl"))]
            {
                Err(ComputeError::BackendNotAvailable(
                    "opencl feature not enabled".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_ramp() {
        let extent = ImageExtent::new(4, 1).unwrap();
        let pixels = [
            255, 0, 0, 10, //
            0, 255, 0, 20, //
            0, 0, 255, 30, //
            100, 100, 100, 40,
        ];
        let options = PipelineOptions::default();
        let out = grayscale(&CpuRuntime::new(), &pixels, extent, &options).unwrap();
        assert_eq!(
            out,
            vec![
                76, 76, 76, 255, //
                149, 149, 149, 255, //
                29, 29, 29, 255, //
                100, 100, 100, 255,
            ]
        );
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let extent = ImageExtent::new(2, 2).unwrap();
        let result = grayscale(&CpuRuntime::new(), &[0u8; 15], extent, &PipelineOptions::default());
        assert!(matches!(
            result,
            Err(ComputeError::BufferSizeMismatch { expected: 16, actual: 15 })
        ));
    }

    #[test]
    fn test_cpu_backend_via_enum() {
        let extent = ImageExtent::new(1, 1).unwrap();
        let options = PipelineOptions::default();
        let out = grayscale_with(Backend::Cpu, &[255; 4], extent, &options).unwrap();
        assert_eq!(out, vec![255, 255, 255, 255]);
    }

    #[cfg(not(feature = "opencl"))]
    #[test]
    fn test_opencl_unavailable_without_feature() {
        let extent = ImageExtent::new(1, 1).unwrap();
        let result = grayscale_with(Backend::OpenCl, &[0; 4], extent, &PipelineOptions::default());
        assert!(matches!(result, Err(ComputeError::BackendNotAvailable(_))));
    }
}
