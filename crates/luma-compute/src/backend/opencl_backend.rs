//! OpenCL compute runtime.
//!
//! Requires the `opencl` feature and an installed OpenCL ICD. Every handle
//! is an `opencl3` wrapper that releases its `cl_*` object on drop.

use std::ffi::c_void;
use std::ptr;

use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::device::{CL_DEVICE_TYPE_DEFAULT, Device};
use opencl3::error_codes::ClError;
use opencl3::kernel::Kernel;
use opencl3::memory::{
    CL_MEM_COPY_HOST_PTR, CL_MEM_OBJECT_IMAGE2D, CL_MEM_READ_ONLY, CL_MEM_WRITE_ONLY, CL_RGBA,
    CL_UNSIGNED_INT8, ClMem, Image,
};
use opencl3::platform::{Platform, get_platforms};
use opencl3::program::Program;
use opencl3::types::{CL_BLOCKING, cl_image_desc, cl_image_format, cl_mem_flags};
use tracing::trace;

use super::{ComputeRuntime, DriverResult, DriverStatus, ImageAccess};
use crate::image::ImageExtent;
use crate::partition::WorkPartition;

fn status(err: ClError) -> DriverStatus {
    DriverStatus(err.0)
}

/// OpenCL implementation of [`ComputeRuntime`].
#[derive(Debug, Clone, Default)]
pub struct OpenClRuntime;

impl OpenClRuntime {
    pub fn new() -> Self {
        Self
    }

    /// Check if an OpenCL platform is reachable.
    pub fn is_available() -> bool {
        get_platforms().map(|p| !p.is_empty()).unwrap_or(false)
    }
}

impl ComputeRuntime for OpenClRuntime {
    type Platform = Platform;
    type Device = Device;
    type Context = Context;
    type Queue = CommandQueue;
    type Program = Program;
    type Kernel = Kernel;
    type Image = Image;

    fn name(&self) -> &'static str {
        "OpenCL"
    }

    fn platforms(&self) -> DriverResult<Vec<Platform>> {
        get_platforms().map_err(status)
    }

    fn platform_name(&self, platform: &Platform) -> String {
        platform.name().unwrap_or_default().trim().to_string()
    }

    fn default_devices(&self, platform: &Platform) -> DriverResult<Vec<Device>> {
        let ids = platform.get_devices(CL_DEVICE_TYPE_DEFAULT).map_err(status)?;
        Ok(ids.into_iter().map(Device::new).collect())
    }

    fn device_name(&self, device: &Device) -> String {
        device.name().unwrap_or_default().trim().to_string()
    }

    fn max_work_group_size(&self, device: &Device) -> DriverResult<usize> {
        device.max_work_group_size().map_err(status)
    }

    fn create_context(&self, device: &Device) -> DriverResult<Context> {
        Context::from_device(device).map_err(status)
    }

    fn create_queue(&self, context: &Context, _device: &Device) -> DriverResult<CommandQueue> {
        // OpenCL 1.2 entry point; the context holds exactly one device.
        #[allow(deprecated)]
        let queue = CommandQueue::create_default(context, 0).map_err(status)?;
        Ok(queue)
    }

    fn create_program(&self, context: &Context, source: &str) -> DriverResult<Program> {
        Program::create_from_source(context, source).map_err(status)
    }

    fn build_program(
        &self,
        program: &mut Program,
        device: &Device,
        options: &str,
    ) -> DriverResult<()> {
        program.build(&[device.id()], options).map_err(status)
    }

    fn build_log(&self, program: &Program, device: &Device) -> String {
        program.get_build_log(device.id()).unwrap_or_default()
    }

    fn create_kernel(&self, program: &Program, entry_point: &str) -> DriverResult<Kernel> {
        Kernel::create(program, entry_point).map_err(status)
    }

    fn create_image(
        &self,
        context: &Context,
        access: ImageAccess,
        extent: ImageExtent,
        pixels: Option<&[u8]>,
    ) -> DriverResult<Image> {
        let format = cl_image_format {
            image_channel_order: CL_RGBA,
            image_channel_data_type: CL_UNSIGNED_INT8,
        };
        let desc = cl_image_desc {
            image_type: CL_MEM_OBJECT_IMAGE2D,
            image_width: extent.width() as usize,
            image_height: extent.height() as usize,
            image_depth: 1,
            image_array_size: 1,
            image_row_pitch: 0,
            image_slice_pitch: 0,
            num_mip_levels: 0,
            num_samples: 0,
            buffer: ptr::null_mut(),
        };

        let (flags, host_ptr): (cl_mem_flags, *mut c_void) = match (access, pixels) {
            (_, Some(data)) if data.len() != extent.byte_len() => {
                return Err(DriverStatus::INVALID_VALUE);
            }
            (ImageAccess::ReadOnly, Some(data)) => {
                (CL_MEM_READ_ONLY | CL_MEM_COPY_HOST_PTR, data.as_ptr() as *mut c_void)
            }
            (ImageAccess::WriteOnly, Some(data)) => {
                (CL_MEM_WRITE_ONLY | CL_MEM_COPY_HOST_PTR, data.as_ptr() as *mut c_void)
            }
            (ImageAccess::ReadOnly, None) => (CL_MEM_READ_ONLY, ptr::null_mut()),
            (ImageAccess::WriteOnly, None) => (CL_MEM_WRITE_ONLY, ptr::null_mut()),
        };

        // SAFETY: format and desc outlive the call; with COPY_HOST_PTR the
        // driver copies `width * height * 4` bytes, which was checked above,
        // and never writes through the pointer.
        unsafe { Image::create(context, flags, &format, &desc, host_ptr) }.map_err(status)
    }

    fn set_image_arg(&self, kernel: &Kernel, index: u32, image: &Image) -> DriverResult<()> {
        let mem = image.get();
        // SAFETY: the argument is a cl_mem handle, matching image2d_t.
        unsafe { kernel.set_arg(index, &mem) }.map_err(status)
    }

    fn enqueue_kernel(
        &self,
        queue: &CommandQueue,
        kernel: &Kernel,
        partition: &WorkPartition,
    ) -> DriverResult<()> {
        let global = partition.global;
        let local = partition.local;
        trace!(global = ?global, local = ?local, "clEnqueueNDRangeKernel");

        // SAFETY: both arrays hold work_dim = 2 elements and outlive the call.
        let _event = unsafe {
            queue.enqueue_nd_range_kernel(
                kernel.get(),
                2,
                ptr::null(),
                global.as_ptr(),
                local.as_ptr(),
                &[],
            )
        }
        .map_err(status)?;
        Ok(())
    }

    fn finish(&self, queue: &CommandQueue) -> DriverResult<()> {
        queue.finish().map_err(status)
    }

    fn read_image(
        &self,
        queue: &CommandQueue,
        image: &Image,
        extent: ImageExtent,
        dst: &mut [u8],
    ) -> DriverResult<()> {
        if dst.len() != extent.byte_len() {
            return Err(DriverStatus::INVALID_VALUE);
        }
        let origin: [usize; 3] = [0, 0, 0];
        let region: [usize; 3] = [extent.width() as usize, extent.height() as usize, 1];

        // SAFETY: blocking read of exactly `dst.len()` bytes (tight rows,
        // row pitch 0) into a buffer that lives across the call.
        let _event = unsafe {
            queue.enqueue_read_image(
                image,
                CL_BLOCKING,
                origin.as_ptr(),
                region.as_ptr(),
                0,
                0,
                dst.as_mut_ptr() as *mut c_void,
                &[],
            )
        }
        .map_err(status)?;
        Ok(())
    }
}
