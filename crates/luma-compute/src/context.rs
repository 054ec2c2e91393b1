//! Execution context: compute context plus in-order command queue.

use tracing::debug;

use crate::backend::ComputeRuntime;
use crate::device::DeviceDescriptor;
use crate::{ComputeError, ComputeResult};

/// Context and queue bound to one device.
///
/// The queue is declared first so it is released before its context.
pub struct ExecutionContext<R: ComputeRuntime> {
    queue: R::Queue,
    context: R::Context,
}

impl<R: ComputeRuntime> ExecutionContext<R> {
    /// Create a context scoped to `device` and an in-order queue on it.
    ///
    /// If the queue cannot be created the context is released before
    /// returning.
    pub fn new(runtime: &R, device: &DeviceDescriptor<R>) -> ComputeResult<Self> {
        let context = runtime
            .create_context(device.handle())
            .map_err(|status| ComputeError::ContextCreationFailed { status })?;
        debug!(device = device.name(), "context created");

        let queue = runtime
            .create_queue(&context, device.handle())
            .map_err(|status| ComputeError::QueueCreationFailed { status })?;
        debug!(device = device.name(), "command queue created");

        Ok(Self { queue, context })
    }

    /// Context handle.
    pub fn context(&self) -> &R::Context {
        &self.context
    }

    /// Queue handle.
    pub fn queue(&self) -> &R::Queue {
        &self.queue
    }
}
