//! Kernel sources and runtime compilation.

use tracing::{debug, warn};

use crate::backend::ComputeRuntime;
use crate::device::DeviceDescriptor;
use crate::context::ExecutionContext;
use crate::{ComputeError, ComputeResult};

/// RGBA to grayscale, BT.601 weights, alpha forced opaque.
///
/// Reads with integer coordinates, so the images must use an unsigned
/// integer channel type.
pub const GRAYSCALE_KERNEL: &str = r#"
__constant sampler_t nearest = CLK_NORMALIZED_COORDS_FALSE
                             | CLK_ADDRESS_CLAMP_TO_EDGE
                             | CLK_FILTER_NEAREST;

__kernel void color_to_gray(__read_only image2d_t img, __write_only image2d_t img_gray)
{
    int x = get_global_id(0);
    int y = get_global_id(1);

    uint4 pixel = read_imageui(img, nearest, (int2)(x, y));
    int red = pixel.x;
    int green = pixel.y;
    int blue = pixel.z;

    int gray = (int)(0.299f * red + 0.587f * green + 0.114f * blue);
    write_imageui(img_gray, (int2)(x, y), (uint4)(gray, gray, gray, 255));
}
"#;

/// Entry point of [`GRAYSCALE_KERNEL`].
pub const GRAYSCALE_ENTRY_POINT: &str = "color_to_gray";

/// Kernel source text and the entry point to extract from it.
///
/// Any kernel taking `(read-only image2d, write-only image2d)` of matching
/// dimensions can be substituted without touching the host pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSource {
    /// Entry point name.
    pub entry_point: String,
    /// OpenCL C source.
    pub source: String,
    /// Options passed to the device compiler.
    pub build_options: String,
}

impl KernelSource {
    pub fn new(entry_point: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
            source: source.into(),
            build_options: String::new(),
        }
    }

    /// The stock grayscale kernel.
    pub fn grayscale() -> Self {
        Self::new(GRAYSCALE_ENTRY_POINT, GRAYSCALE_KERNEL)
    }

    /// Set compiler options, e.g. `-cl-fast-relaxed-math`.
    pub fn with_build_options(mut self, options: impl Into<String>) -> Self {
        self.build_options = options.into();
        self
    }
}

impl Default for KernelSource {
    fn default() -> Self {
        Self::grayscale()
    }
}

/// Program and kernel entry point built for one device.
///
/// The kernel is declared first so it is released before its program.
pub struct CompiledKernel<R: ComputeRuntime> {
    kernel: R::Kernel,
    // Only held; the kernel must not outlive it.
    _program: R::Program,
    entry_point: String,
}

impl<R: ComputeRuntime> CompiledKernel<R> {
    /// Kernel handle.
    pub fn kernel(&self) -> &R::Kernel {
        &self.kernel
    }

    /// Entry point name.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

/// Compiles kernel source for the selected device.
pub struct KernelCompiler<'a, R: ComputeRuntime> {
    runtime: &'a R,
    exec: &'a ExecutionContext<R>,
    device: &'a DeviceDescriptor<R>,
}

impl<'a, R: ComputeRuntime> KernelCompiler<'a, R> {
    pub fn new(
        runtime: &'a R,
        exec: &'a ExecutionContext<R>,
        device: &'a DeviceDescriptor<R>,
    ) -> Self {
        Self { runtime, exec, device }
    }

    /// Create program, build it for the device, extract the entry point.
    ///
    /// A failed build reports the compiler log.
    pub fn compile(&self, source: &KernelSource) -> ComputeResult<CompiledKernel<R>> {
        let mut program = self
            .runtime
            .create_program(self.exec.context(), &source.source)
            .map_err(|status| ComputeError::CompilationFailed { status, log: String::new() })?;

        if let Err(status) = self
            .runtime
            .build_program(&mut program, self.device.handle(), &source.build_options)
        {
            let log = self.runtime.build_log(&program, self.device.handle());
            return Err(ComputeError::CompilationFailed { status, log });
        }

        let log = self.runtime.build_log(&program, self.device.handle());
        if !log.trim().is_empty() {
            warn!(
                entry_point = %source.entry_point,
                log = %log.trim(),
                "kernel build produced diagnostics"
            );
        }
        debug!(device = self.device.name(), options = %source.build_options, "program built");

        let kernel = self
            .runtime
            .create_kernel(&program, &source.entry_point)
            .map_err(|status| ComputeError::EntryPointNotFound {
                name: source.entry_point.clone(),
                status,
            })?;
        debug!(entry_point = %source.entry_point, "kernel created");

        Ok(CompiledKernel {
            kernel,
            _program: program,
            entry_point: source.entry_point.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CpuRuntime, select_device};

    fn compile(
        rt: &CpuRuntime,
        source: &KernelSource,
    ) -> ComputeResult<CompiledKernel<CpuRuntime>> {
        let device = select_device(rt)?;
        let exec = ExecutionContext::new(rt, &device)?;
        KernelCompiler::new(rt, &exec, &device).compile(source)
    }

    #[test]
    fn test_grayscale_compiles() {
        let rt = CpuRuntime::new();
        let kernel = compile(&rt, &KernelSource::grayscale()).unwrap();
        assert_eq!(kernel.entry_point(), "color_to_gray");
    }

    #[test]
    fn test_syntax_error_carries_log() {
        let rt = CpuRuntime::new();
        let broken =
            KernelSource::new("color_to_gray", "__kernel void color_to_gray(image2d_t a {");
        match compile(&rt, &broken) {
            Err(ComputeError::CompilationFailed { log, .. }) => assert!(log.contains("error")),
            _ => panic!("expected compilation failure"),
        }
    }

    #[test]
    fn test_missing_entry_point() {
        let rt = CpuRuntime::new();
        let source = KernelSource::new("invert", GRAYSCALE_KERNEL);
        match compile(&rt, &source) {
            Err(ComputeError::EntryPointNotFound { name, .. }) => assert_eq!(name, "invert"),
            _ => panic!("expected missing entry point"),
        }
    }

    #[test]
    fn test_empty_source() {
        let rt = CpuRuntime::new();
        let source = KernelSource::new("color_to_gray", "   ");
        assert!(matches!(compile(&rt, &source), Err(ComputeError::CompilationFailed { .. })));
    }

    #[test]
    fn test_build_options() {
        let source = KernelSource::grayscale().with_build_options("-cl-fast-relaxed-math");
        assert_eq!(source.build_options, "-cl-fast-relaxed-math");
        assert_eq!(source.entry_point, GRAYSCALE_ENTRY_POINT);
    }
}
