//! Entry points: rendering into containers, hydration and batched re-renders.

use crate::{
	component::Instance,
	context::Globals,
	diff::{dom_sibling, update_parent_dom_pointers, Pass},
	error::Error,
	host::{Host, NodeId},
	memory::MemoryDom,
	scheduler::RenderQueue,
	vnode::{fragment, Child, VNode},
};
use core::iter;
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{info, instrument, trace, trace_span};

/// Tuning knobs for a [`Renderer`].
#[derive(Clone, Debug)]
pub struct Options {
	/// Maximum nesting of the tree, counting both elements and components.
	///
	/// Deeper trees abort the render with [`Error::DepthLimit`].
	pub depth_limit: usize,
	/// Whether declared prop types are checked before each render.
	pub validate_props: bool,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			depth_limit: 1024,
			validate_props: cfg!(debug_assertions),
		}
	}
}

/// Owns a [`Host`], the trees rendered into its containers and the queue of pending component re-renders.
///
/// State changes only mark components dirty.
/// Call [`Renderer::process`] (for example from the [`RenderQueue`] schedule hook) to re-render them.
pub struct Renderer<H: Host> {
	host: H,
	queue: Rc<RenderQueue>,
	roots: HashMap<NodeId, VNode>,
	options: Options,
}

impl<H: Host> Renderer<H> {
	pub fn new(host: H) -> Self {
		Self::with_options(host, Options::default())
	}

	pub fn with_options(host: H, options: Options) -> Self {
		Self {
			host,
			queue: RenderQueue::new(),
			roots: HashMap::new(),
			options,
		}
	}

	pub fn host(&self) -> &H {
		&self.host
	}

	/// Direct host access. Changes made here are invisible to the reconciler.
	pub fn host_mut(&mut self) -> &mut H {
		&mut self.host
	}

	pub fn into_host(self) -> H {
		self.host
	}

	pub fn queue(&self) -> &RenderQueue {
		&self.queue
	}

	pub fn options(&self) -> &Options {
		&self.options
	}

	/// The root node last rendered into `container`.
	pub fn root(&self, container: NodeId) -> Option<&VNode> {
		self.roots.get(&container)
	}

	/// Renders `tree` into `container`, diffing against what was rendered there before.
	///
	/// On the first render into a container, existing child nodes are reused where they match and removed otherwise.
	///
	/// # Errors
	///
	/// Errors no error boundary absorbed, prop validation failures and depth limit violations.
	/// The host may be left partially updated.
	#[instrument(skip(self, tree))]
	pub fn render(&mut self, tree: impl Into<Child>, container: NodeId) -> Result<(), Error> {
		self.render_root(tree.into(), container, false)
	}

	/// Adopts the existing markup in `container` (usually from [`render_to_string`]) instead of recreating it.
	///
	/// Attributes are assumed to match and only event listeners are attached.
	/// Text that differs is corrected. Unmatched nodes are removed.
	///
	/// # Errors
	///
	/// Like [`Renderer::render`].
	#[instrument(skip(self, tree))]
	pub fn hydrate(&mut self, tree: impl Into<Child>, container: NodeId) -> Result<(), Error> {
		self.render_root(tree.into(), container, true)
	}

	/// Unmounts whatever was rendered into `container`.
	///
	/// # Errors
	///
	/// Errors from unmount hooks that no boundary absorbed.
	#[instrument(skip(self))]
	pub fn unmount(&mut self, container: NodeId) -> Result<(), Error> {
		if !self.roots.contains_key(&container) {
			return Ok(());
		}
		let result = self.render_root(Child::Empty, container, false);
		self.roots.remove(&container);
		result
	}

	fn render_root(&mut self, tree: Child, container: NodeId, hydrating: bool) -> Result<(), Error> {
		let old = if hydrating { None } else { self.roots.get(&container).cloned() };
		let root = fragment(vec![tree]);
		self.roots.insert(container, root.clone());

		let mut excess: Option<Vec<Option<NodeId>>> = match old {
			Some(_) => None,
			None => {
				let existing = self.host.child_nodes(container);
				if existing.is_empty() {
					None
				} else {
					trace!(count = existing.len(), "Reusing existing markup");
					Some(existing.into_iter().map(Some).collect())
				}
			}
		};
		let old_dom = match &old {
			Some(old) => old.dom(),
			None => self.host.first_child(container),
		};
		let svg = self.host.is_svg(container);

		let mut pass = Pass::new(&mut self.host, &self.queue, &self.options);
		pass.diff(container, &root, old.as_ref(), &Globals::default(), svg, excess.as_mut(), old_dom, hydrating, self.options.depth_limit)?;
		pass.commit()?;
		let boundaries = pass.into_boundaries();

		if let Some(excess) = excess {
			for unclaimed in excess.into_iter().flatten() {
				trace!(?unclaimed, "Removing unclaimed markup");
				self.host.remove(unclaimed);
			}
		}

		self.recover(boundaries)
	}

	/// Re-renders all dirty components, shallowest first, until none are left.
	///
	/// # Errors
	///
	/// The first error no boundary absorbed. Components that were still waiting stay queued for the next call.
	#[instrument(skip(self))]
	pub fn process(&mut self) -> Result<(), Error> {
		let result = self.drain();
		self.queue.finish();
		result
	}

	fn drain(&mut self) -> Result<(), Error> {
		let mut rendered = 0_usize;
		loop {
			let mut batch = self.queue.take_batch();
			if batch.is_empty() {
				info!("Re-rendered {} component(s)", rendered);
				return Ok(());
			}
			batch.sort_by_key(Instance::depth);
			let mut batch = batch.into_iter();
			while let Some(instance) = batch.next() {
				if instance.is_dirty() {
					if let Err(error) = self.render_component(&instance) {
						// The rest of the batch stays queued.
						self.queue.requeue(iter::once(instance).chain(batch));
						return Err(error);
					}
					rendered += 1;
				}
			}
		}
	}

	/// Re-renders boundaries that absorbed an error during the last pass.
	fn recover(&mut self, boundaries: Vec<Instance>) -> Result<(), Error> {
		for boundary in boundaries {
			if boundary.is_dirty() {
				self.render_component(&boundary)?;
			}
		}
		Ok(())
	}

	fn render_component(&mut self, instance: &Instance) -> Result<(), Error> {
		let (vnode, parent_dom) = match (instance.vnode(), instance.parent_dom()) {
			(Some(vnode), Some(parent_dom)) => (vnode, parent_dom),
			_ => {
				trace!(component = instance.name(), "Skipping unmounted component");
				return Ok(());
			}
		};
		let span = trace_span!("Re-rendering", component = instance.name());
		let _enter = span.enter();

		let old_dom = vnode.dom();
		// Interrupted hydration carries over through the snapshot.
		let old = vnode.snapshot();
		let anchor = old_dom.or_else(|| dom_sibling(&vnode, None));

		let mut pass = Pass::new(&mut self.host, &self.queue, &self.options);
		pass.diff(parent_dom, &vnode, Some(&old), &instance.globals(), instance.svg(), None, anchor, false, self.options.depth_limit)?;
		pass.commit()?;
		let boundaries = pass.into_boundaries();

		if vnode.dom() != old_dom {
			update_parent_dom_pointers(&vnode);
		}
		self.recover(boundaries)
	}
}

/// Renders `tree` into a fresh [`MemoryDom`] and serializes the result.
///
/// # Errors
///
/// Like [`Renderer::render`].
pub fn render_to_string(tree: impl Into<Child>) -> Result<String, Error> {
	let mut host = MemoryDom::new();
	host.set_recording(false);
	let mut renderer = Renderer::new(host);
	let root = renderer.host().root();
	renderer.render(tree, root)?;
	Ok(renderer.host().inner_html(root))
}
