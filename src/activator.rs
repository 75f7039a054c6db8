//! Instance construction and destruction.

use std::sync::Arc;

use crate::error::{KernelError, KernelResult};
use crate::handler::Handler;
use crate::internal::{Burden, CreationContext};
use crate::kernel::KernelInner;
use crate::key::InstanceId;
use crate::resolver::DependencyResolver;

/// Resolves the model's dependencies, then asks its factory for a new instance.
///
/// The returned burden is not committed anywhere yet; the lifestyle decides
/// who owns it.
pub(crate) fn create(
    handler: &Arc<Handler>,
    kernel: &KernelInner,
    ctx: &mut CreationContext,
) -> KernelResult<Burden> {
    let model = &handler.model;
    let (dependencies, links) = DependencyResolver::resolve(model, kernel, ctx)?;

    match model.factory().create(&dependencies) {
        Ok(instance) => {
            let id = InstanceId::of(&instance);
            kernel.metrics.record_created();
            if kernel.observers.has_observers() {
                kernel.observers.instance_created(&model.service(), id);
            }
            tracing::trace!(
                service = %model.service(),
                implementation = model.implementation(),
                instance = %id,
                depth = ctx.depth(),
                "instance created"
            );
            Ok(Burden::new(instance, handler.clone(), links))
        }
        Err(source) => {
            tracing::warn!(
                service = %model.service(),
                implementation = model.implementation(),
                error = %source,
                "component factory failed"
            );
            kernel.unwind(&links);
            Err(KernelError::Activation {
                model: model.service(),
                implementation: model.implementation(),
                source,
            })
        }
    }
}

/// Tears down the burden's instance. Owned children must already be gone.
pub(crate) fn destroy(kernel: &KernelInner, burden: &Burden) {
    let model = &burden.handler.model;
    let id = burden.instance_id();
    if model.has_decommission() {
        model.factory().tear_down(&burden.instance);
    }
    kernel.metrics.record_destroyed();
    if kernel.observers.has_observers() {
        kernel.observers.instance_destroyed(&model.service(), id);
    }
    tracing::trace!(service = %model.service(), instance = %id, "instance destroyed");
}
