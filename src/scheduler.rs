//! Batching of component re-renders.

use crate::component::{Instance, InstanceInner};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
};
use std::rc::{Rc, Weak};
use tracing::trace;

/// Components waiting for a re-render.
///
/// A component is queued at most once until it renders, no matter how often its state changes.
/// The schedule hook fires once per batch, when the first component is queued.
/// It should arrange for [`Renderer::process`](`crate::Renderer::process`) to run soon, but not synchronously.
#[derive(Default)]
pub struct RenderQueue {
	pending: RefCell<Vec<Weak<InstanceInner>>>,
	count: Cell<usize>,
	schedule: RefCell<Option<Rc<dyn Fn()>>>,
}

impl RenderQueue {
	pub(crate) fn new() -> Rc<Self> {
		Rc::default()
	}

	/// Replaces the hook called when a batch starts.
	pub fn set_schedule(&self, schedule: impl Fn() + 'static) {
		*self.schedule.borrow_mut() = Some(Rc::new(schedule));
	}

	pub fn clear_schedule(&self) {
		*self.schedule.borrow_mut() = None;
	}

	/// How many components are queued.
	#[must_use]
	pub fn len(&self) -> usize {
		self.pending.borrow().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.pending.borrow().is_empty()
	}

	pub(crate) fn enqueue(&self, instance: &Instance) {
		if instance.is_dirty() {
			return;
		}
		instance.set_dirty(true);
		self.pending.borrow_mut().push(instance.downgrade());

		let count = self.count.get();
		self.count.set(count + 1);
		if count == 0 {
			trace!(component = instance.name(), "Scheduling render batch");
			let schedule = self.schedule.borrow().clone();
			if let Some(schedule) = schedule {
				schedule();
			}
		}
	}

	/// Takes all queued, still living components.
	///
	/// Components queued while the batch renders go into the next batch without triggering the hook again.
	pub(crate) fn take_batch(&self) -> Vec<Instance> {
		let batch: Vec<_> = self
			.pending
			.borrow_mut()
			.drain(..)
			.filter_map(|pending| pending.upgrade())
			.map(Instance)
			.collect();
		if !batch.is_empty() {
			self.count.set(batch.len());
		}
		batch
	}

	/// Puts components that are still dirty back into the queue, without calling the hook.
	pub(crate) fn requeue(&self, instances: impl IntoIterator<Item = Instance>) {
		self.pending
			.borrow_mut()
			.extend(instances.into_iter().filter(Instance::is_dirty).map(|instance| instance.downgrade()));
	}

	/// Ends a processing run, re-arming the hook.
	pub(crate) fn finish(&self) {
		self.count.set(0);
	}
}

impl Debug for RenderQueue {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("RenderQueue")
			.field("pending", &self.len())
			.field("count", &self.count.get())
			.finish()
	}
}
