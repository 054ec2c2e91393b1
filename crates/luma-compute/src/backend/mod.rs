//! Compute runtimes for the grayscale pipeline.
//!
//! Provides a CPU (rayon) reference device and an OpenCL runtime with
//! automatic selection.

mod cpu_backend;

#[cfg(feature = "opencl")]
mod opencl_backend;

pub use cpu_backend::{
    CpuContext, CpuDevice, CpuImage, CpuKernel, CpuPlatform, CpuProgram, CpuQueue, CpuRuntime,
};

#[cfg(feature = "opencl")]
pub use opencl_backend::OpenClRuntime;

use std::fmt;

use crate::image::ImageExtent;
use crate::partition::WorkPartition;

/// Available compute backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Auto-select best available (OpenCL > CPU).
    #[default]
    Auto,
    /// Host reference device using rayon.
    Cpu,
    /// OpenCL device (GPU or whatever the default device class resolves to).
    OpenCl,
}

impl Backend {
    /// Concrete backends, most preferred first.
    pub const PREFERENCE: [Backend; 2] = [Backend::OpenCl, Backend::Cpu];

    /// Check if this backend is available on current system.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Auto => true,
            Self::Cpu => true,
            #[cfg(feature = "opencl")]
            Self::OpenCl => OpenClRuntime::is_available(),
            #[cfg(not(feature = "opencl"))]
            Self::OpenCl => false,
        }
    }

    /// Lowercase identifier used in logs and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::OpenCl => "opencl",
        }
    }

    /// One-line summary for `--list-backends`.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Auto => "first available of the backends below",
            Self::Cpu => "reference device on the host, rows split across rayon threads",
            #[cfg(feature = "opencl")]
            Self::OpenCl => "default device of the first OpenCL platform",
            #[cfg(not(feature = "opencl"))]
            Self::OpenCl => "not compiled in (build with --features opencl)",
        }
    }
}

/// Resolve [`Backend::Auto`]: the first available entry of
/// [`Backend::PREFERENCE`]. The CPU device is always available.
pub fn select_best_backend() -> Backend {
    Backend::PREFERENCE
        .into_iter()
        .find(|backend| backend.is_available())
        .unwrap_or(Backend::Cpu)
}

/// Availability table, one backend per line in preference order.
pub fn describe_backends() -> String {
    Backend::PREFERENCE
        .iter()
        .map(|backend| {
            let mark = if backend.is_available() { '+' } else { '-' };
            format!("[{}] {:<7} {}\n", mark, backend.as_str(), backend.description())
        })
        .collect()
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw status code reported by a compute driver.
///
/// Codes follow the OpenCL numbering so both runtimes report failures the
/// same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DriverStatus(pub i32);

impl DriverStatus {
    pub const DEVICE_NOT_FOUND: Self = Self(-1);
    pub const MEM_OBJECT_ALLOCATION_FAILURE: Self = Self(-4);
    pub const OUT_OF_RESOURCES: Self = Self(-5);
    pub const BUILD_PROGRAM_FAILURE: Self = Self(-11);
    pub const INVALID_VALUE: Self = Self(-30);
    pub const INVALID_MEM_OBJECT: Self = Self(-38);
    pub const INVALID_IMAGE_SIZE: Self = Self(-40);
    pub const INVALID_PROGRAM_EXECUTABLE: Self = Self(-45);
    pub const INVALID_KERNEL_NAME: Self = Self(-46);
    pub const INVALID_ARG_INDEX: Self = Self(-49);
    pub const INVALID_KERNEL_ARGS: Self = Self(-52);
    pub const INVALID_WORK_GROUP_SIZE: Self = Self(-54);
    pub const PLATFORM_NOT_FOUND: Self = Self(-1001);

    /// Symbolic name of well-known codes.
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::DEVICE_NOT_FOUND => "CL_DEVICE_NOT_FOUND",
            Self::MEM_OBJECT_ALLOCATION_FAILURE => "CL_MEM_OBJECT_ALLOCATION_FAILURE",
            Self::OUT_OF_RESOURCES => "CL_OUT_OF_RESOURCES",
            Self::BUILD_PROGRAM_FAILURE => "CL_BUILD_PROGRAM_FAILURE",
            Self::INVALID_VALUE => "CL_INVALID_VALUE",
            Self::INVALID_MEM_OBJECT => "CL_INVALID_MEM_OBJECT",
            Self::INVALID_IMAGE_SIZE => "CL_INVALID_IMAGE_SIZE",
            Self::INVALID_PROGRAM_EXECUTABLE => "CL_INVALID_PROGRAM_EXECUTABLE",
            Self::INVALID_KERNEL_NAME => "CL_INVALID_KERNEL_NAME",
            Self::INVALID_ARG_INDEX => "CL_INVALID_ARG_INDEX",
            Self::INVALID_KERNEL_ARGS => "CL_INVALID_KERNEL_ARGS",
            Self::INVALID_WORK_GROUP_SIZE => "CL_INVALID_WORK_GROUP_SIZE",
            Self::PLATFORM_NOT_FOUND => "CL_PLATFORM_NOT_FOUND_KHR",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "status {} {}", self.0, name),
            None => write!(f, "status {}", self.0),
        }
    }
}

/// Result of a single driver call.
pub type DriverResult<T> = Result<T, DriverStatus>;

/// Kernel-side access qualifier of a device image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAccess {
    ReadOnly,
    WriteOnly,
}

/// Driver primitives the pipeline is built from.
///
/// Handles are owned values that release their driver object on drop.
/// Methods report raw [`DriverStatus`] codes; the pipeline stages map them
/// onto [`crate::ComputeError`] variants.
pub trait ComputeRuntime {
    type Platform;
    type Device;
    type Context;
    type Queue;
    type Program;
    type Kernel;
    type Image;

    /// Backend name.
    fn name(&self) -> &'static str;

    /// Enumerate compute platforms.
    fn platforms(&self) -> DriverResult<Vec<Self::Platform>>;

    /// Platform display name.
    fn platform_name(&self, platform: &Self::Platform) -> String;

    /// Enumerate devices of the default class on a platform.
    fn default_devices(&self, platform: &Self::Platform) -> DriverResult<Vec<Self::Device>>;

    /// Device display name.
    fn device_name(&self, device: &Self::Device) -> String;

    /// Upper bound on the product of local work sizes.
    fn max_work_group_size(&self, device: &Self::Device) -> DriverResult<usize>;

    /// Create a context scoped to exactly one device.
    fn create_context(&self, device: &Self::Device) -> DriverResult<Self::Context>;

    /// Create an in-order command queue on the device.
    fn create_queue(
        &self,
        context: &Self::Context,
        device: &Self::Device,
    ) -> DriverResult<Self::Queue>;

    /// Create a program object from source text.
    fn create_program(&self, context: &Self::Context, source: &str) -> DriverResult<Self::Program>;

    /// Build the program for one device.
    fn build_program(
        &self,
        program: &mut Self::Program,
        device: &Self::Device,
        options: &str,
    ) -> DriverResult<()>;

    /// Compiler output of the last build.
    fn build_log(&self, program: &Self::Program, device: &Self::Device) -> String;

    /// Extract a kernel entry point from a built program.
    fn create_kernel(
        &self,
        program: &Self::Program,
        entry_point: &str,
    ) -> DriverResult<Self::Kernel>;

    /// Allocate an RGBA8 2D image, optionally copying `pixels` into it.
    fn create_image(
        &self,
        context: &Self::Context,
        access: ImageAccess,
        extent: ImageExtent,
        pixels: Option<&[u8]>,
    ) -> DriverResult<Self::Image>;

    /// Bind an image as positional kernel argument.
    fn set_image_arg(
        &self,
        kernel: &Self::Kernel,
        index: u32,
        image: &Self::Image,
    ) -> DriverResult<()>;

    /// Enqueue a 2D kernel launch.
    fn enqueue_kernel(
        &self,
        queue: &Self::Queue,
        kernel: &Self::Kernel,
        partition: &WorkPartition,
    ) -> DriverResult<()>;

    /// Block until all queued commands have completed.
    fn finish(&self, queue: &Self::Queue) -> DriverResult<()>;

    /// Blocking read of a whole image into `dst`.
    fn read_image(
        &self,
        queue: &Self::Queue,
        image: &Self::Image,
        extent: ImageExtent,
        dst: &mut [u8],
    ) -> DriverResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_always_available() {
        assert!(Backend::Cpu.is_available());
        assert!(Backend::PREFERENCE.contains(&Backend::Cpu));
        assert!(!Backend::PREFERENCE.contains(&Backend::Auto));
    }

    #[test]
    fn test_best_backend_is_concrete_and_available() {
        let best = select_best_backend();
        assert_ne!(best, Backend::Auto);
        assert!(best.is_available());
    }

    #[cfg(not(feature = "opencl"))]
    #[test]
    fn test_cpu_chosen_without_opencl() {
        assert_eq!(select_best_backend(), Backend::Cpu);
    }

    #[test]
    fn test_describe_lists_every_backend() {
        let desc = describe_backends();
        assert_eq!(desc.lines().count(), Backend::PREFERENCE.len());
        assert!(desc.contains("[+] cpu"));
        #[cfg(not(feature = "opencl"))]
        assert!(desc.contains("[-] opencl"));
    }

    #[test]
    fn test_driver_status_display() {
        assert_eq!(
            DriverStatus::BUILD_PROGRAM_FAILURE.to_string(),
            "status -11 CL_BUILD_PROGRAM_FAILURE"
        );
        assert_eq!(DriverStatus(-9999).to_string(), "status -9999");
    }
}
