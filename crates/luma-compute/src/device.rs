//! Device selection.

use tracing::info;

use crate::backend::{ComputeRuntime, DriverStatus};
use crate::{ComputeError, ComputeResult};

/// The selected compute device and its limits. Immutable once resolved.
pub struct DeviceDescriptor<R: ComputeRuntime> {
    device: R::Device,
    name: String,
    platform_name: String,
    max_work_group_size: usize,
}

impl<R: ComputeRuntime> DeviceDescriptor<R> {
    /// Driver handle of the device.
    pub fn handle(&self) -> &R::Device {
        &self.device
    }

    /// Device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the platform the device belongs to.
    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    /// Upper bound on the product of local work sizes.
    pub fn max_work_group_size(&self) -> usize {
        self.max_work_group_size
    }
}

impl<R: ComputeRuntime> std::fmt::Debug for DeviceDescriptor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceDescriptor")
            .field("name", &self.name)
            .field("platform", &self.platform_name)
            .field("max_work_group_size", &self.max_work_group_size)
            .finish()
    }
}

/// Pick the first default-class device of the first platform.
pub fn select_device<R: ComputeRuntime>(runtime: &R) -> ComputeResult<DeviceDescriptor<R>> {
    let platform = runtime
        .platforms()
        .map_err(|status| ComputeError::PlatformUnavailable { status })?
        .into_iter()
        .next()
        .ok_or(ComputeError::PlatformUnavailable { status: DriverStatus::PLATFORM_NOT_FOUND })?;

    let device = runtime
        .default_devices(&platform)
        .map_err(|status| ComputeError::DeviceUnavailable { status })?
        .into_iter()
        .next()
        .ok_or(ComputeError::DeviceUnavailable { status: DriverStatus::DEVICE_NOT_FOUND })?;

    let max_work_group_size = runtime
        .max_work_group_size(&device)
        .map_err(|status| ComputeError::CapabilityQueryFailed { status })?;

    let descriptor = DeviceDescriptor {
        name: runtime.device_name(&device),
        platform_name: runtime.platform_name(&platform),
        device,
        max_work_group_size,
    };

    info!(
        backend = runtime.name(),
        platform = %descriptor.platform_name,
        device = %descriptor.name,
        max_work_group_size,
        "Selected compute device"
    );

    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CpuRuntime;

    #[test]
    fn test_select_cpu_device() {
        let rt = CpuRuntime::with_max_work_group_size(256);
        let device = select_device(&rt).unwrap();
        assert_eq!(device.max_work_group_size(), 256);
        assert_eq!(device.platform_name(), "Host");
        assert!(device.name().starts_with("Reference device"));
    }
}
