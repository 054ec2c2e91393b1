//! Compute-dispatch pipeline for grayscale conversion.
//!
//! Drives a single data-parallel kernel over an RGBA8 image on a compute
//! device: device selection, context and queue creation, runtime kernel
//! compilation, device image allocation, work partitioning, dispatch and
//! blocking read-back.
//!
//! # Architecture
//!
//! ```text
//! grayscale()
//!     ├── select_device        -> DeviceDescriptor
//!     ├── ExecutionContext     -> context + in-order queue
//!     ├── KernelCompiler       -> CompiledKernel (program + entry point)
//!     ├── DeviceImages::bind   -> BoundKernel (arg 0 = input, arg 1 = output)
//!     ├── WorkPartition        -> global / local size
//!     └── dispatch             -> host pixels, then teardown
//!
//! ComputeRuntime trait
//!     ├── CpuRuntime    (rayon reference device)
//!     └── OpenClRuntime (opencl3, feature "opencl")
//! ```
//!
//! Every device resource is an owned handle released on drop, so an early
//! `?` return releases exactly what was acquired, in dependency order.
//!
//! # Example
//!
//! ```ignore
//! use luma_compute::{grayscale, CpuRuntime, ImageExtent, PipelineOptions};
//!
//! let extent = ImageExtent::new(1920, 1080)?;
//! let gray = grayscale(&CpuRuntime::new(), &pixels, extent, &PipelineOptions::default())?;
//! ```

pub mod backend;
pub mod context;
pub mod device;
pub mod dispatch;
pub mod image;
pub mod kernel;
pub mod partition;

pub use backend::{
    Backend, ComputeRuntime, CpuRuntime, DriverStatus, ImageAccess, describe_backends,
    select_best_backend,
};
#[cfg(feature = "opencl")]
pub use backend::OpenClRuntime;
pub use context::ExecutionContext;
pub use device::{DeviceDescriptor, select_device};
pub use dispatch::{PipelineOptions, dispatch, grayscale, grayscale_with};
pub use image::{BoundKernel, DeviceImages, ImageExtent, ImageRole};
pub use kernel::{CompiledKernel, KernelCompiler, KernelSource};
pub use partition::{PartitionStrategy, WorkPartition};

use thiserror::Error;

/// Pipeline errors. Every variant is fatal for the current run.
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("No compute platform available ({status})")]
    PlatformUnavailable { status: DriverStatus },

    #[error("No compute device available ({status})")]
    DeviceUnavailable { status: DriverStatus },

    #[error("Failed to query device work-group limit ({status})")]
    CapabilityQueryFailed { status: DriverStatus },

    #[error("Failed to create context ({status})")]
    ContextCreationFailed { status: DriverStatus },

    #[error("Failed to create command queue ({status})")]
    QueueCreationFailed { status: DriverStatus },

    #[error("Kernel compilation failed ({status}):\n{log}")]
    CompilationFailed { status: DriverStatus, log: String },

    #[error("Kernel entry point '{name}' not found ({status})")]
    EntryPointNotFound { name: String, status: DriverStatus },

    #[error("Failed to allocate {which} image ({status})")]
    ImageAllocationFailed { which: ImageRole, status: DriverStatus },

    #[error("Failed to bind kernel argument {index} ({status})")]
    ArgumentBindingFailed { index: u32, status: DriverStatus },

    #[error("Invalid dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),

    #[error(
        "No valid work partition for {width}x{height} (max work-group size {max_work_group_size})"
    )]
    NoValidPartition { width: u32, height: u32, max_work_group_size: usize },

    #[error("Kernel dispatch failed ({status})")]
    DispatchFailed { status: DriverStatus },

    #[error("Image read-back failed ({status})")]
    ReadbackFailed { status: DriverStatus },

    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },
}

pub type ComputeResult<T> = Result<T, ComputeError>;
