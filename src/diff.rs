//! The reconciler: diffs a new [`VNode`] tree against the previous one and patches a [`Host`] to match.

use crate::{
	component::{Callback, ComponentType, Instance, Phase},
	context::Globals,
	error::Error,
	host::{Host, NodeId},
	props::{Props, Ref, RefValue, Value},
	renderer::Options,
	scheduler::RenderQueue,
	vnode::{fragment, Child, NodeType, VNode},
};
use core::mem;
use std::rc::Rc;
use tracing::{error, trace, trace_span, warn};

/// An error on its way up the tree.
enum Fault {
	/// Raised by the node being diffed. Not yet offered to any boundary.
	Thrown(Error),
	/// Already walked up from a descendant without being absorbed.
	Escaped(Error),
}

impl From<Error> for Fault {
	fn from(error: Error) -> Self {
		Self::Thrown(error)
	}
}

/// A previous child, before and after it is matched up with a new one.
enum Slot {
	Hole,
	Live(VNode),
	Taken,
}

impl Slot {
	fn matches(&self, vnode: &VNode) -> bool {
		match self {
			Self::Live(old) => old.matches(vnode),
			Self::Hole | Self::Taken => false,
		}
	}

	fn take(&mut self) -> Option<VNode> {
		match mem::replace(self, Self::Taken) {
			Self::Live(old) => Some(old),
			Self::Hole | Self::Taken => None,
		}
	}
}

/// Host nodes available for adoption while hydrating or rendering over existing markup.
type Excess = Vec<Option<NodeId>>;

/// Props that are never applied to host elements directly.
fn is_reserved(name: &str) -> bool {
	matches!(name, "children" | "key" | "ref" | "dangerously_set_inner_html")
}

fn inner_html(props: &Props) -> Option<Rc<str>> {
	match props.get("dangerously_set_inner_html")? {
		Value::Str(html) => Some(html.clone()),
		Value::Map(map) => match map.get("__html")? {
			Value::Str(html) => Some(html.clone()),
			_ => None,
		},
		_ => None,
	}
}

/// One synchronous diff of a subtree, plus the work it defers until the tree is consistent.
pub(crate) struct Pass<'a, H: Host> {
	host: &'a mut H,
	queue: &'a Rc<RenderQueue>,
	options: &'a Options,
	/// Instances with lifecycle callbacks to run on commit, in completion order.
	commit_queue: Vec<Instance>,
	/// Error boundaries that absorbed an error and must re-render.
	boundaries: Vec<Instance>,
}

impl<'a, H: Host> Pass<'a, H> {
	pub(crate) fn new(host: &'a mut H, queue: &'a Rc<RenderQueue>, options: &'a Options) -> Self {
		Self {
			host,
			queue,
			options,
			commit_queue: Vec::new(),
			boundaries: Vec::new(),
		}
	}

	pub(crate) fn into_boundaries(self) -> Vec<Instance> {
		self.boundaries
	}

	/// Diffs `new` against `old` (or against nothing) inside `parent_dom`.
	///
	/// `old_dom` is the host node `new`'s output should end up in front of, if it has to be inserted.
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn diff(
		&mut self,
		parent_dom: NodeId,
		new: &VNode,
		old: Option<&VNode>,
		globals: &Globals,
		svg: bool,
		excess: Option<&mut Excess>,
		old_dom: Option<NodeId>,
		hydrating: bool,
		depth_limit: usize,
	) -> Result<(), Error> {
		if depth_limit == 0 {
			error!("Depth limit reached");
			return Err(Error::DepthLimit(self.options.depth_limit));
		}

		let mut old_dom = old_dom;
		let mut hydrating = hydrating;
		let mut resumed: Excess;
		let mut excess: Option<&mut Excess> = excess;
		if let Some(resume) = old.and_then(VNode::hydrating) {
			trace!(resume, "Resuming interrupted hydration");
			hydrating = resume;
			old_dom = old.and_then(VNode::dom);
			new.set_dom(old_dom);
			new.set_hydrating(None);
			resumed = vec![old_dom];
			excess = Some(&mut resumed);
		}
		new.set_bailed_out(false);

		let outcome = match new.kind() {
			NodeType::Component(ty) => self.diff_component(parent_dom, new, old, ty, globals, svg, excess.as_deref_mut(), old_dom, hydrating, depth_limit),
			NodeType::Fragment => self.diff_fragment(parent_dom, new, old, globals, svg, excess.as_deref_mut(), old_dom, hydrating, depth_limit),
			_ if excess.is_none() && old.map_or(false, |old| old.original() == new.original()) => {
				trace!("Reusing identical node");
				if let Some(old) = old {
					new.adopt_children(old);
					new.set_dom(old.dom());
				}
				Ok(())
			}
			NodeType::Text(data) => {
				let dom = self.diff_text(old.and_then(VNode::dom), data, old, excess.as_deref_mut(), hydrating);
				new.set_dom(Some(dom));
				Ok(())
			}
			NodeType::Element(tag) => self
				.diff_element_nodes(old.and_then(VNode::dom), new, tag, old, globals, svg, excess.as_deref_mut(), hydrating, depth_limit)
				.map(|dom| new.set_dom(Some(dom))),
		};

		match outcome {
			Ok(()) => Ok(()),
			Err(Fault::Escaped(error)) => Err(error),
			Err(Fault::Thrown(error)) => {
				new.set_original(0);
				if hydrating || excess.is_some() {
					// Keep the markup this node would have claimed, so that a retry can resume hydrating it.
					new.set_dom(old_dom);
					new.set_hydrating(Some(hydrating));
					if let (Some(excess), Some(old_dom)) = (excess, old_dom) {
						if let Some(slot) = excess.iter_mut().find(|slot| **slot == Some(old_dom)) {
							*slot = None;
						}
					}
				} else if let Some(old) = old {
					// The old subtree stays mounted until the boundary's re-render replaces it.
					new.set_dom(old.dom());
					new.adopt_children(old);
				}
				self.catch_error(error, new)
			}
		}
	}

	#[allow(clippy::too_many_arguments)]
	#[allow(clippy::too_many_lines)]
	fn diff_component(
		&mut self,
		parent_dom: NodeId,
		new: &VNode,
		old: Option<&VNode>,
		ty: &ComponentType,
		globals: &Globals,
		svg: bool,
		excess: Option<&mut Excess>,
		old_dom: Option<NodeId>,
		hydrating: bool,
		depth_limit: usize,
	) -> Result<(), Fault> {
		let span = trace_span!("Diffing component", name = ty.name());
		let _enter = span.enter();

		let new_props = ty.prepare_props(new.props(), self.options.validate_props)?;

		let provider = ty.consumes().and_then(|context| globals.get(context.id()).cloned());
		let context = match (ty.consumes(), &provider) {
			(Some(_), Some(provider)) => provider.provided_value(),
			(Some(context), None) => context.default_value(),
			(None, _) => Value::Null,
		};

		let (instance, is_new, clear_processing) = match old.and_then(VNode::component) {
			Some(instance) => {
				let pending_error = instance.pending_error();
				instance.set_processing_exception(pending_error);
				(instance, false, pending_error)
			}
			None => {
				trace!("Constructing instance");
				let instance = Instance::new(ty.clone(), new_props.clone(), context.clone(), self.queue);
				if let Some(provider) = &provider {
					provider.subscribe(&instance);
				}
				instance.set_dirty(true);
				(instance, true, false)
			}
		};
		new.set_component(Some(instance.clone()));

		let mut next_state = instance.pending_state();
		if let Some(derived) = instance.component().derived_state_from_props(&new_props, &next_state) {
			next_state.merge(&derived);
		}
		let old_props = instance.props();
		let old_state = instance.state();

		if is_new {
			instance.push_callback(Callback::DidMount);
		} else {
			let should_update = instance.forced() || instance.component().should_update(&instance, &new_props, &next_state, &context);
			let identical = old.map_or(false, |old| old.original() == new.original());
			if !should_update || identical {
				trace!(identical, "Bailing out");
				instance.set_props(new_props);
				instance.commit_state(next_state);
				if !identical {
					instance.set_dirty(false);
				}
				instance.set_vnode(new);
				if let Some(old) = old {
					new.set_dom(old.dom());
					new.adopt_children(old);
				}
				new.set_bailed_out(true);
				if instance.has_callbacks() {
					self.commit_queue.push(instance);
				}
				return Ok(());
			}
		}

		instance.set_context(context);
		instance.set_props(new_props);
		instance.set_vnode(new);
		instance.set_parent_dom(Some(parent_dom));
		instance.set_svg(svg);
		instance.set_globals(globals.clone());
		instance.commit_state(next_state);
		instance.set_dirty(false);
		if !is_new {
			instance.set_phase(Phase::Updating);
		}

		let rendered = {
			let span = trace_span!("render");
			let _enter = span.enter();
			instance.component().render(&instance)?
		};
		instance.fold_pending_state();

		let globals = match ty.provides() {
			Some(provides) => globals.with(provides.id, instance.clone()),
			None => globals.clone(),
		};

		if !is_new {
			let snapshot = instance.component().snapshot_before_update(&instance, &old_props, &old_state);
			instance.push_callback(Callback::DidUpdate {
				props: old_props,
				state: old_state,
				snapshot,
			});
		}

		// An unkeyed top-level fragment is flattened into the component's own children.
		let children = match rendered {
			Child::Node(ref node) if matches!(node.kind(), NodeType::Fragment) && node.key().is_none() => node.props().children(),
			other => other,
		};
		self.diff_children(parent_dom, children.into_list(), new, old, &globals, svg, excess, old_dom, hydrating, depth_limit - 1)
			.map_err(Fault::Escaped)?;

		instance.set_base(new.dom());
		new.set_hydrating(None);
		if instance.has_callbacks() {
			self.commit_queue.push(instance.clone());
		}
		if clear_processing {
			instance.set_pending_error(false);
			instance.set_processing_exception(false);
		}
		instance.set_forced(false);
		Ok(())
	}

	#[allow(clippy::too_many_arguments)]
	fn diff_fragment(
		&mut self,
		parent_dom: NodeId,
		new: &VNode,
		old: Option<&VNode>,
		globals: &Globals,
		svg: bool,
		excess: Option<&mut Excess>,
		old_dom: Option<NodeId>,
		hydrating: bool,
		depth_limit: usize,
	) -> Result<(), Fault> {
		if let Some(old) = old.filter(|old| old.original() == new.original()) {
			trace!("Fragment unchanged");
			new.set_dom(old.dom());
			new.adopt_children(old);
			new.set_bailed_out(true);
			return Ok(());
		}
		let children = new.props().children().into_list();
		self.diff_children(parent_dom, children, new, old, globals, svg, excess, old_dom, hydrating, depth_limit - 1)
			.map_err(Fault::Escaped)?;
		new.set_hydrating(None);
		Ok(())
	}

	/// Takes the first reusable node out of `excess`: an element with a matching tag or, for `tag == None`, a text node.
	fn claim(&self, excess: Option<&mut Excess>, tag: Option<&str>) -> Option<NodeId> {
		for slot in excess?.iter_mut() {
			if let Some(candidate) = *slot {
				let reusable = match tag {
					Some(tag) => self.host.tag_name(candidate).map_or(false, |name| name.eq_ignore_ascii_case(tag)),
					None => self.host.is_text(candidate),
				};
				if reusable {
					*slot = None;
					return Some(candidate);
				}
			}
		}
		None
	}

	fn diff_text(&mut self, dom: Option<NodeId>, data: &Rc<str>, old: Option<&VNode>, excess: Option<&mut Excess>, hydrating: bool) -> NodeId {
		let dom = match self.claim(excess, None).or(dom) {
			Some(dom) => dom,
			None => {
				trace!("Creating text node");
				return self.host.create_text(data);
			}
		};
		let old_data = old.and_then(|old| match old.kind() {
			NodeType::Text(old_data) => Some(old_data.clone()),
			_ => None,
		});
		// While hydrating, only text that differs from the markup is written.
		if old_data.as_deref() != Some(&**data) && (!hydrating || self.host.text(dom).as_deref() != Some(&**data)) {
			if cfg!(feature = "dangerous-logging") {
				trace!(data = &**data, "Updating text");
			} else {
				trace!("Updating text");
			}
			self.host.set_text(dom, data);
		}
		dom
	}

	#[allow(clippy::too_many_arguments)]
	fn diff_element_nodes(
		&mut self,
		dom: Option<NodeId>,
		new: &VNode,
		tag: &str,
		old: Option<&VNode>,
		globals: &Globals,
		svg: bool,
		excess: Option<&mut Excess>,
		hydrating: bool,
		depth_limit: usize,
	) -> Result<NodeId, Fault> {
		let span = trace_span!("Diffing element", tag);
		let _enter = span.enter();

		let svg = svg || tag == "svg";
		let mut hydrating = hydrating;
		let mut inherited = excess;
		let mut reusing_markup = inherited.is_some();
		let dom = match self.claim(inherited.as_deref_mut(), Some(tag)).or(dom) {
			Some(dom) => dom,
			None => {
				trace!(svg, "Creating element");
				reusing_markup = false;
				hydrating = false;
				self.host.create_element(tag, svg)?
			}
		};

		let mut excess: Option<Excess> = if reusing_markup { Some(self.host.child_nodes(dom).into_iter().map(Some).collect()) } else { None };

		let new_props = new.props();
		let mut old_props = old.map(|old| old.props().clone()).unwrap_or_default();
		let new_html = inner_html(new_props);
		let old_html = inner_html(&old_props);

		if !hydrating {
			if excess.is_some() {
				// Rendering over foreign markup: diff against what is actually there.
				old_props = Props::new();
				for (name, value) in self.host.attributes(dom) {
					old_props.insert(name, value);
				}
			}
			if new_html.is_some() || old_html.is_some() {
				match &new_html {
					Some(html) if old_html.as_ref() == Some(html) || self.host.inner_html(dom) == **html => (),
					Some(html) => self.host.set_inner_html(dom, html),
					None => self.host.set_inner_html(dom, ""),
				}
			}
		}

		self.diff_props(dom, new_props, &old_props, svg, hydrating);

		if new_html.is_some() {
			// The host already dropped these nodes along with the old markup.
			for child in old.map(VNode::rendered).unwrap_or_default() {
				self.unmount(&child, &child, true).map_err(Fault::Escaped)?;
			}
			new.set_children(Vec::new());
		} else {
			let children = new_props.children().into_list();
			let first = match &excess {
				Some(excess) => excess.first().copied().flatten(),
				None => old.filter(|old| old.has_children()).and_then(|old| dom_sibling(old, Some(0))),
			};
			self.diff_children(dom, children, new, old, globals, svg && tag != "foreignObject", excess.as_mut(), first, hydrating, depth_limit - 1)
				.map_err(Fault::Escaped)?;

			if let Some(excess) = excess {
				for unclaimed in excess.into_iter().rev().flatten() {
					trace!(?unclaimed, "Removing unclaimed node");
					self.host.remove(unclaimed);
				}
			}
		}

		if !hydrating {
			self.sync_live_property(dom, tag, "value", new_props, &old_props);
			self.sync_live_property(dom, tag, "checked", new_props, &old_props);
		}
		Ok(dom)
	}

	/// Applies `value` and `checked` against the host's live state rather than against the previous props.
	fn sync_live_property(&mut self, dom: NodeId, tag: &str, name: &str, new: &Props, old: &Props) {
		let value = match new.get(name) {
			Some(value) if !value.is_null() => value,
			_ => return,
		};
		let old_value = old.get(name).unwrap_or(&Value::Null);
		let stale = *value != self.host.property(dom, name)
			|| (name == "value" && tag == "progress" && value.as_float() == Some(0.0))
			|| (name == "value" && tag == "option" && value != old_value);
		if stale {
			trace!(name, "Syncing live property");
			self.host.set_property(dom, name, value, old_value, false);
		}
	}

	fn diff_props(&mut self, dom: NodeId, new: &Props, old: &Props, svg: bool, hydrating: bool) {
		for (name, old_value) in old.iter() {
			if !is_reserved(name) && !new.contains(name) {
				self.host.set_property(dom, name, &Value::Null, old_value, svg);
			}
		}
		for (name, value) in new.iter() {
			if is_reserved(name) || name == "value" || name == "checked" {
				continue;
			}
			// Hydration only attaches listeners. Attributes are assumed to match the markup.
			if hydrating && !matches!(value, Value::Handler(_)) {
				continue;
			}
			let old_value = old.get(name).unwrap_or(&Value::Null);
			if old_value != value {
				self.host.set_property(dom, name, value, old_value, svg);
			}
		}
	}

	/// Reconciles `rendered` against the children `old_parent` rendered last time and places the resulting host nodes.
	#[allow(clippy::too_many_arguments)]
	#[allow(clippy::too_many_lines)]
	pub(crate) fn diff_children(
		&mut self,
		parent_dom: NodeId,
		rendered: Vec<Child>,
		new_parent: &VNode,
		old_parent: Option<&VNode>,
		globals: &Globals,
		svg: bool,
		excess: Option<&mut Excess>,
		old_dom: Option<NodeId>,
		hydrating: bool,
		depth_limit: usize,
	) -> Result<(), Error> {
		if depth_limit == 0 {
			error!("Depth limit reached");
			return Err(Error::DepthLimit(self.options.depth_limit));
		}

		let mut excess = excess;
		let mut old_dom = old_dom;
		let mut old_children: Vec<Slot> = old_parent
			.map(VNode::children)
			.unwrap_or_default()
			.into_iter()
			.map(|old| old.map_or(Slot::Hole, Slot::Live))
			.collect();
		let old_len = old_children.len();
		let mut refs: Vec<(Ref, Option<RefValue>, VNode)> = Vec::new();
		let mut first_child_dom = None;
		new_parent.set_children(Vec::with_capacity(rendered.len()));

		for (i, child) in rendered.into_iter().enumerate() {
			let child = match normalize(child) {
				Some(child) => child,
				None => {
					new_parent.push_child(None);
					continue;
				}
			};
			child.set_parent(new_parent);
			new_parent.push_child(Some(child.clone()));

			// Same position first, then a linear scan.
			let matched = if matches!(old_children.get(i), Some(Slot::Hole)) {
				old_children[i] = Slot::Taken;
				None
			} else if old_children.get(i).map_or(false, |slot| slot.matches(&child)) {
				old_children[i].take()
			} else {
				old_children
					.iter()
					.position(|slot| slot.matches(&child))
					.and_then(|j| old_children[j].take())
			};

			self.diff(parent_dom, &child, matched.as_ref(), globals, svg, excess.as_deref_mut(), old_dom, hydrating, depth_limit - 1)?;

			let new_dom = child.dom();
			if let Some(r) = child.node_ref() {
				let old_ref = matched.as_ref().and_then(VNode::node_ref);
				if !old_ref.map_or(false, |old_ref| old_ref.ptr_eq(r)) {
					if let Some(old_ref) = old_ref {
						refs.push((old_ref.clone(), None, child.clone()));
					}
					let value = match child.component() {
						Some(instance) => Some(RefValue::Component(instance)),
						None => new_dom.map(RefValue::Node),
					};
					refs.push((r.clone(), value, child.clone()));
				}
			} else if let Some(old_ref) = matched.as_ref().and_then(VNode::node_ref) {
				refs.push((old_ref.clone(), None, child.clone()));
			}

			match new_dom {
				Some(new_dom) => {
					first_child_dom.get_or_insert(new_dom);
					old_dom = if child.kind().is_composite() && child.take_bailed_out() {
						let next = self.reorder_children(&child, old_dom, parent_dom);
						child.set_next_dom(Some(next));
						next
					} else {
						self.place_child(parent_dom, &child, old_len, new_dom, old_dom)
					};
					if new_parent.kind().is_composite() {
						new_parent.set_next_dom(Some(old_dom));
					}
				}
				None => {
					// The child rendered nothing. Skip past its old host node if that was moved elsewhere.
					if let (Some(current), Some(matched)) = (old_dom, &matched) {
						if matched.dom() == Some(current) && self.host.parent(current) != Some(parent_dom) {
							old_dom = dom_sibling(matched, None);
						}
					}
				}
			}
		}

		new_parent.set_dom(first_child_dom);

		for slot in old_children.into_iter().rev() {
			if let Slot::Live(old) = slot {
				if new_parent.kind().is_composite() && old.dom().is_some() && new_parent.next_dom() == Some(old.dom()) {
					new_parent.set_next_dom(Some(dom_sibling(new_parent, None)));
				}
				self.unmount(&old, &old, false)?;
			}
		}

		for (r, value, vnode) in refs {
			self.apply_ref(&r, value, &vnode)?;
		}
		Ok(())
	}

	/// Moves `new_dom` into place before `old_dom` if it isn't there already and returns the next anchor.
	fn place_child(&mut self, parent_dom: NodeId, child: &VNode, old_len: usize, new_dom: NodeId, old_dom: Option<NodeId>) -> Option<NodeId> {
		if let Some(next_dom) = child.take_next_dom() {
			// A composite child already placed its host nodes.
			return next_dom;
		}

		if Some(new_dom) == old_dom && self.host.parent(new_dom).is_some() {
			return self.host.next_sibling(new_dom);
		}

		match old_dom {
			Some(anchor) if self.host.parent(anchor) == Some(parent_dom) => {
				// Look ahead a little: if `new_dom` follows shortly, the nodes in between will move instead.
				let mut sibling = anchor;
				let mut j = 0;
				while let Some(next) = self.host.next_sibling(sibling) {
					if j >= old_len {
						break;
					}
					if next == new_dom {
						return self.host.next_sibling(new_dom);
					}
					sibling = next;
					j += 2;
				}
				trace!(?new_dom, ?anchor, "Moving node");
				self.host.insert_before(parent_dom, new_dom, Some(anchor));
				Some(anchor)
			}
			_ => {
				trace!(?new_dom, "Appending node");
				self.host.insert_before(parent_dom, new_dom, None);
				None
			}
		}
	}

	/// Re-places the host nodes of a bailed-out composite, which may have moved as a whole.
	fn reorder_children(&mut self, vnode: &VNode, old_dom: Option<NodeId>, parent_dom: NodeId) -> Option<NodeId> {
		let children = vnode.rendered();
		let len = children.len();
		let mut old_dom = old_dom;
		for child in children {
			child.set_parent(vnode);
			if child.kind().is_composite() {
				old_dom = self.reorder_children(&child, old_dom, parent_dom);
			} else if let Some(dom) = child.dom() {
				old_dom = self.place_child(parent_dom, &child, len, dom, old_dom);
			}
		}
		old_dom
	}

	/// Tears down `vnode` and its subtree: refs, unmount hooks, host nodes.
	///
	/// Errors from unmount hooks are offered to boundaries above `parent`.
	pub(crate) fn unmount(&mut self, vnode: &VNode, parent: &VNode, skip_remove: bool) -> Result<(), Error> {
		let span = trace_span!("Unmounting", kind = ?vnode.kind());
		let _enter = span.enter();

		if let Some(r) = vnode.node_ref() {
			let attached_here = match r.current() {
				None => true,
				Some(RefValue::Node(node)) => Some(node) == vnode.dom(),
				Some(RefValue::Component(instance)) => vnode.component().map_or(false, |own| own.ptr_eq(&instance)),
			};
			if attached_here {
				if let Err(error) = r.apply(None) {
					self.catch_error(error, parent)?;
				}
			}
		}

		if let Some(instance) = vnode.component() {
			instance.unsubscribe();
			let result = instance.component().will_unmount(&instance);
			instance.set_base(None);
			instance.set_parent_dom(None);
			instance.set_phase(Phase::Unmounted);
			if let Err(error) = result {
				self.catch_error(error, parent)?;
			}
		}

		let composite = vnode.kind().is_composite();
		for child in vnode.rendered() {
			self.unmount(&child, parent, skip_remove || !composite)?;
		}

		if !skip_remove {
			if let Some(dom) = vnode.dom() {
				self.host.remove(dom);
			}
		}
		vnode.detach();
		Ok(())
	}

	fn apply_ref(&mut self, r: &Ref, value: Option<RefValue>, vnode: &VNode) -> Result<(), Error> {
		match r.apply(value) {
			Ok(()) => Ok(()),
			Err(error) => self.catch_error(error, vnode),
		}
	}

	/// Offers `error` to the error boundaries above `vnode`, innermost first.
	///
	/// # Errors
	///
	/// If no boundary absorbs it, or it isn't recoverable.
	pub(crate) fn catch_error(&mut self, error: Error, vnode: &VNode) -> Result<(), Error> {
		if !error.is_recoverable() {
			return Err(error);
		}

		let mut error = error;
		let mut cursor = vnode.parent();
		while let Some(ancestor) = cursor {
			cursor = ancestor.parent();
			let instance = match ancestor.component() {
				Some(instance) if !instance.processing_exception() => instance,
				_ => continue,
			};
			let boundary = match instance.component().as_error_boundary() {
				Some(boundary) => boundary,
				None => continue,
			};

			let span = trace_span!("Offering error to boundary", component = instance.name());
			let _enter = span.enter();
			if let Some(state) = boundary.derived_state_from_error(&error) {
				instance.set_state(state);
			}
			match boundary.did_catch(&instance, &error) {
				Ok(()) if instance.is_dirty() => {
					trace!("Error absorbed");
					instance.set_pending_error(true);
					self.boundaries.push(instance.clone());
					return Ok(());
				}
				Ok(()) => trace!("Boundary did not schedule a re-render"),
				Err(rethrown) => error = rethrown,
			}
		}

		warn!(%error, "Unhandled error");
		Err(error)
	}

	/// Runs queued lifecycle callbacks in completion order.
	pub(crate) fn commit(&mut self) -> Result<(), Error> {
		let queue = mem::take(&mut self.commit_queue);
		for instance in queue {
			for callback in instance.take_callbacks() {
				let result = match callback {
					Callback::DidMount => {
						instance.set_phase(Phase::Mounted);
						instance.component().did_mount(&instance)
					}
					Callback::DidUpdate { props, state, snapshot } => {
						instance.set_phase(Phase::Mounted);
						instance.component().did_update(&instance, &props, &state, snapshot.as_ref())
					}
					Callback::Then(then) => then(&instance),
				};
				if let Err(error) = result {
					// Remaining callbacks of this instance are dropped.
					match instance.vnode() {
						Some(vnode) => self.catch_error(error, &vnode)?,
						None => return Err(error),
					}
					break;
				}
			}
		}
		Ok(())
	}
}

/// Turns a rendered child into a node, or [`None`] for holes.
fn normalize(child: Child) -> Option<VNode> {
	match child {
		Child::Empty | Child::Bool(_) => None,
		Child::Text(text) => Some(VNode::text(text)),
		Child::Int(int) => Some(VNode::text(int.to_string())),
		Child::Float(float) => Some(VNode::text(float.to_string())),
		Child::List(list) => Some(fragment(list)),
		Child::Node(vnode) if vnode.depth() > 0 => {
			// Already part of the tree. Mount a copy that keeps its identity.
			Some(vnode.clone_for_reuse())
		}
		Child::Node(vnode) => Some(vnode),
	}
}

/// The first host node belonging to a sibling after `vnode`, or after its `from`th child.
///
/// Climbs through composite ancestors, since their siblings' nodes share the same host parent.
pub(crate) fn dom_sibling(vnode: &VNode, from: Option<usize>) -> Option<NodeId> {
	let from = match from {
		Some(from) => from,
		None => {
			let parent = vnode.parent()?;
			let from = parent.child_index(vnode).map_or(0, |index| index + 1);
			return dom_sibling(&parent, Some(from));
		}
	};

	if let Some(dom) = vnode.children().into_iter().skip(from).flatten().find_map(|child| child.dom()) {
		return Some(dom);
	}
	if vnode.kind().is_composite() {
		dom_sibling(vnode, None)
	} else {
		None
	}
}

/// Refreshes the cached first host node of composite ancestors after a re-render changed it.
pub(crate) fn update_parent_dom_pointers(vnode: &VNode) {
	let mut cursor = vnode.parent();
	while let Some(parent) = cursor {
		if !parent.kind().is_composite() {
			break;
		}
		let first = parent.rendered().into_iter().find_map(|child| child.dom());
		parent.set_dom(first);
		if let Some(instance) = parent.component() {
			instance.set_base(first);
		}
		cursor = parent.parent();
	}
}
