//! Stateful components and their lifecycle.

use crate::{
	context::{Context, Globals, Provides},
	error::Error,
	host::NodeId,
	props::{PropDecl, PropTypes, Props, State, Value},
	scheduler::RenderQueue,
	vnode::{Child, VNode, VNodeInner},
};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
};
use std::{
	borrow::Cow,
	rc::{Rc, Weak},
};
use tracing::trace;

/// A user-defined component.
///
/// Only [`Component::render`] is required. Every hook receives the [`Instance`] it runs for,
/// which gives access to the current props, state and context and to [`Instance::set_state`].
#[allow(unused_variables)]
pub trait Component: 'static {
	/// # Errors
	///
	/// Errors are offered to the nearest enclosing [`ErrorBoundary`].
	fn render(&self, this: &Instance) -> Result<Child, Error>;

	/// Runs before every render with the incoming props and pending state.
	/// The returned partial state is merged into the state used for that render.
	fn derived_state_from_props(&self, props: &Props, state: &State) -> Option<State> {
		None
	}

	/// Consulted for updates of a mounted instance unless a re-render was forced.
	/// Returning `false` skips rendering, but props and state are still committed.
	fn should_update(&self, this: &Instance, next_props: &Props, next_state: &State, next_context: &Value) -> bool {
		true
	}

	/// Captured after rendering an update but before its changes are committed, then passed to [`Component::did_update`].
	fn snapshot_before_update(&self, this: &Instance, prev_props: &Props, prev_state: &State) -> Option<Value> {
		None
	}

	/// # Errors
	///
	/// Errors are offered to the nearest enclosing [`ErrorBoundary`].
	fn did_mount(&self, this: &Instance) -> Result<(), Error> {
		Ok(())
	}

	/// # Errors
	///
	/// Errors are offered to the nearest enclosing [`ErrorBoundary`].
	fn did_update(&self, this: &Instance, prev_props: &Props, prev_state: &State, snapshot: Option<&Value>) -> Result<(), Error> {
		Ok(())
	}

	/// # Errors
	///
	/// Errors are offered to boundaries above the unmounted node.
	fn will_unmount(&self, this: &Instance) -> Result<(), Error> {
		Ok(())
	}

	/// Opts this component into absorbing errors from its subtree.
	fn as_error_boundary(&self) -> Option<&dyn ErrorBoundary> {
		None
	}
}

/// Error handling hooks of a component that returns itself from [`Component::as_error_boundary`].
///
/// A boundary absorbs an error only if it is dirty once its hooks ran,
/// i.e. if it scheduled a re-render of itself through state changes.
#[allow(unused_variables)]
pub trait ErrorBoundary {
	/// Partial state to merge in response to `error`.
	fn derived_state_from_error(&self, error: &Error) -> Option<State> {
		None
	}

	/// # Errors
	///
	/// Returning an error passes it on to the next boundary up instead.
	fn did_catch(&self, this: &Instance, error: &Error) -> Result<(), Error> {
		Ok(())
	}
}

type Factory = dyn Fn(&Props, &Value) -> Box<dyn Component>;

/// A component class: a name, a constructor, prop declarations and optionally a consumed [`Context`].
///
/// Equality is identity.
#[derive(Clone)]
pub struct ComponentType(Rc<ComponentTypeInner>);

struct ComponentTypeInner {
	name: Cow<'static, str>,
	factory: Box<Factory>,
	consumes: Option<Context>,
	provides: Option<Provides>,
	prop_types: PropTypes,
}

impl ComponentType {
	/// `factory` receives the initial props and context.
	pub fn new<C: Component>(name: impl Into<Cow<'static, str>>, factory: impl Fn(&Props, &Value) -> C + 'static) -> Self {
		Self::builder(name, factory).build()
	}

	pub fn builder<C: Component>(
		name: impl Into<Cow<'static, str>>,
		factory: impl Fn(&Props, &Value) -> C + 'static,
	) -> ComponentTypeBuilder {
		ComponentTypeBuilder {
			name: name.into(),
			factory: Box::new(move |props: &Props, context: &Value| -> Box<dyn Component> { Box::new(factory(props, context)) }),
			consumes: None,
			provides: None,
			prop_types: PropTypes::default(),
		}
	}

	/// A stateless component that only renders.
	pub fn function(name: impl Into<Cow<'static, str>>, render: impl Fn(&Props) -> Result<Child, Error> + 'static) -> Self {
		let render: Rc<dyn Fn(&Props) -> Result<Child, Error>> = Rc::new(render);
		Self::new(name, move |_: &Props, _: &Value| FunctionComponent(render.clone()))
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.0.name
	}

	#[must_use]
	pub fn prop_types(&self) -> &PropTypes {
		&self.0.prop_types
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	pub(crate) fn consumes(&self) -> Option<&Context> {
		self.0.consumes.as_ref()
	}

	pub(crate) fn provides(&self) -> Option<&Provides> {
		self.0.provides.as_ref()
	}

	pub(crate) fn construct(&self, props: &Props, context: &Value) -> Box<dyn Component> {
		(self.0.factory)(props, context)
	}

	/// Applies declared defaults, then validates if requested.
	pub(crate) fn prepare_props(&self, props: &Props, validate: bool) -> Result<Props, Error> {
		if self.0.prop_types.is_empty() {
			return Ok(props.clone());
		}
		let props = self.0.prop_types.apply_defaults(props);
		if validate {
			self.0.prop_types.validate(self.name(), &props)?;
		}
		Ok(props)
	}
}

impl PartialEq for ComponentType {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}

impl Debug for ComponentType {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ComponentType").field(&self.name()).finish()
	}
}

pub struct ComponentTypeBuilder {
	name: Cow<'static, str>,
	factory: Box<Factory>,
	consumes: Option<Context>,
	provides: Option<Provides>,
	prop_types: PropTypes,
}

impl ComponentTypeBuilder {
	/// Subscribes instances to the nearest provider of `context`.
	#[must_use]
	pub fn consumes(self, context: &Context) -> Self {
		Self {
			consumes: Some(context.clone()),
			..self
		}
	}

	#[must_use]
	pub fn prop(mut self, name: impl Into<std::rc::Rc<str>>, decl: PropDecl) -> Self {
		self.prop_types.declare(name, decl);
		self
	}

	pub(crate) fn provides(self, provides: Provides) -> Self {
		Self {
			provides: Some(provides),
			..self
		}
	}

	#[must_use]
	pub fn build(self) -> ComponentType {
		ComponentType(Rc::new(ComponentTypeInner {
			name: self.name,
			factory: self.factory,
			consumes: self.consumes,
			provides: self.provides,
			prop_types: self.prop_types,
		}))
	}
}

struct FunctionComponent(Rc<dyn Fn(&Props) -> Result<Child, Error>>);

impl Component for FunctionComponent {
	fn render(&self, this: &Instance) -> Result<Child, Error> {
		(self.0)(&this.props())
	}
}

/// Where an [`Instance`] is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
	/// Constructed, not yet committed.
	Constructing,
	Mounted,
	/// Rendering an update that has not been committed yet.
	Updating,
	Unmounted,
}

pub(crate) enum Callback {
	DidMount,
	DidUpdate { props: Props, state: State, snapshot: Option<Value> },
	Then(Box<dyn FnOnce(&Instance) -> Result<(), Error>>),
}

/// A live component: the user's [`Component`] plus its props, state and reconciler bookkeeping.
///
/// Cloning clones the handle.
#[derive(Clone)]
pub struct Instance(pub(crate) Rc<InstanceInner>);

pub(crate) struct InstanceInner {
	ty: ComponentType,
	component: Box<dyn Component>,
	props: RefCell<Props>,
	state: RefCell<State>,
	next_state: RefCell<Option<State>>,
	context: RefCell<Value>,
	dirty: Cell<bool>,
	force: Cell<bool>,
	pending_error: Cell<bool>,
	processing_exception: Cell<bool>,
	phase: Cell<Phase>,
	callbacks: RefCell<Vec<Callback>>,
	vnode: RefCell<Weak<VNodeInner>>,
	parent_dom: Cell<Option<NodeId>>,
	base: Cell<Option<NodeId>>,
	svg: Cell<bool>,
	globals: RefCell<Globals>,
	queue: Weak<RenderQueue>,
	provider: RefCell<Weak<InstanceInner>>,
	subscribers: RefCell<Vec<Weak<InstanceInner>>>,
}

impl Instance {
	pub(crate) fn new(ty: ComponentType, props: Props, context: Value, queue: &Rc<RenderQueue>) -> Self {
		let component = ty.construct(&props, &context);
		Self(Rc::new(InstanceInner {
			ty,
			component,
			props: RefCell::new(props),
			state: RefCell::default(),
			next_state: RefCell::default(),
			context: RefCell::new(context),
			dirty: Cell::new(false),
			force: Cell::new(false),
			pending_error: Cell::new(false),
			processing_exception: Cell::new(false),
			phase: Cell::new(Phase::Constructing),
			callbacks: RefCell::default(),
			vnode: RefCell::default(),
			parent_dom: Cell::new(None),
			base: Cell::new(None),
			svg: Cell::new(false),
			globals: RefCell::default(),
			queue: Rc::downgrade(queue),
			provider: RefCell::default(),
			subscribers: RefCell::default(),
		}))
	}

	#[must_use]
	pub fn name(&self) -> &str {
		self.0.ty.name()
	}

	#[must_use]
	pub fn component_type(&self) -> &ComponentType {
		&self.0.ty
	}

	#[must_use]
	pub fn props(&self) -> Props {
		self.0.props.borrow().clone()
	}

	#[must_use]
	pub fn state(&self) -> State {
		self.0.state.borrow().clone()
	}

	/// The value of the consumed context, or [`Value::Null`] if this component type consumes none.
	#[must_use]
	pub fn context(&self) -> Value {
		self.0.context.borrow().clone()
	}

	#[must_use]
	pub fn phase(&self) -> Phase {
		self.0.phase.get()
	}

	#[must_use]
	pub fn is_dirty(&self) -> bool {
		self.0.dirty.get()
	}

	/// The first host node this component rendered.
	#[must_use]
	pub fn base(&self) -> Option<NodeId> {
		self.0.base.get()
	}

	/// The node currently describing this instance.
	#[must_use]
	pub fn vnode(&self) -> Option<VNode> {
		self.0.vnode.borrow().upgrade().map(VNode)
	}

	#[must_use]
	pub fn depth(&self) -> usize {
		self.vnode().map_or(0, |vnode| vnode.depth())
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	/// Merges `partial` into the pending state and schedules a re-render.
	///
	/// Updates made before the first render or after unmounting are dropped.
	/// Several updates before the next render are merged and render once.
	pub fn set_state(&self, partial: State) {
		self.accumulate(|_, _| Some(partial), None);
	}

	/// Like [`Instance::set_state`], running `then` once the resulting update is committed.
	pub fn set_state_then(&self, partial: State, then: impl FnOnce(&Instance) -> Result<(), Error> + 'static) {
		self.accumulate(|_, _| Some(partial), Some(Box::new(then)));
	}

	/// Computes a partial state from the pending state and current props.
	/// Returning [`None`] cancels the update.
	pub fn update_state(&self, update: impl FnOnce(&State, &Props) -> Option<State>) {
		self.accumulate(update, None);
	}

	/// Schedules a re-render that skips [`Component::should_update`].
	pub fn force_update(&self) {
		self.force(None);
	}

	pub fn force_update_then(&self, then: impl FnOnce(&Instance) -> Result<(), Error> + 'static) {
		self.force(Some(Box::new(then)));
	}

	fn is_attached(&self) -> bool {
		self.phase() != Phase::Unmounted && self.vnode().is_some()
	}

	fn accumulate(&self, update: impl FnOnce(&State, &Props) -> Option<State>, then: Option<Box<dyn FnOnce(&Instance) -> Result<(), Error>>>) {
		if !self.is_attached() {
			trace!(component = self.name(), "Dropping state update of detached component");
			return;
		}
		let mut pending = self.pending_state();
		let partial = match update(&pending, &self.props()) {
			Some(partial) => partial,
			None => return,
		};
		pending.merge(&partial);
		*self.0.next_state.borrow_mut() = Some(pending);
		if let Some(then) = then {
			self.push_callback(Callback::Then(then));
		}
		self.enqueue();
	}

	fn force(&self, then: Option<Box<dyn FnOnce(&Instance) -> Result<(), Error>>>) {
		if !self.is_attached() {
			trace!(component = self.name(), "Dropping forced update of detached component");
			return;
		}
		self.0.force.set(true);
		if let Some(then) = then {
			self.push_callback(Callback::Then(then));
		}
		self.enqueue();
	}

	fn enqueue(&self) {
		if let Some(queue) = self.0.queue.upgrade() {
			queue.enqueue(self);
		}
	}

	pub(crate) fn component(&self) -> &dyn Component {
		&*self.0.component
	}

	pub(crate) fn downgrade(&self) -> Weak<InstanceInner> {
		Rc::downgrade(&self.0)
	}

	/// The state the next render will see.
	pub(crate) fn pending_state(&self) -> State {
		self.0
			.next_state
			.borrow()
			.clone()
			.unwrap_or_else(|| self.state())
	}

	pub(crate) fn commit_state(&self, state: State) {
		*self.0.state.borrow_mut() = state;
		*self.0.next_state.borrow_mut() = None;
	}

	/// Folds updates made during render into the committed state.
	pub(crate) fn fold_pending_state(&self) {
		if let Some(next) = self.0.next_state.borrow_mut().take() {
			*self.0.state.borrow_mut() = next;
		}
	}

	pub(crate) fn set_props(&self, props: Props) {
		*self.0.props.borrow_mut() = props;
	}

	pub(crate) fn set_context(&self, context: Value) {
		*self.0.context.borrow_mut() = context;
	}

	pub(crate) fn set_dirty(&self, dirty: bool) {
		self.0.dirty.set(dirty);
	}

	pub(crate) fn forced(&self) -> bool {
		self.0.force.get()
	}

	pub(crate) fn set_forced(&self, force: bool) {
		self.0.force.set(force);
	}

	pub(crate) fn pending_error(&self) -> bool {
		self.0.pending_error.get()
	}

	pub(crate) fn set_pending_error(&self, pending: bool) {
		self.0.pending_error.set(pending);
	}

	pub(crate) fn processing_exception(&self) -> bool {
		self.0.processing_exception.get()
	}

	pub(crate) fn set_processing_exception(&self, processing: bool) {
		self.0.processing_exception.set(processing);
	}

	pub(crate) fn set_phase(&self, phase: Phase) {
		self.0.phase.set(phase);
	}

	pub(crate) fn push_callback(&self, callback: Callback) {
		self.0.callbacks.borrow_mut().push(callback);
	}

	pub(crate) fn has_callbacks(&self) -> bool {
		!self.0.callbacks.borrow().is_empty()
	}

	pub(crate) fn take_callbacks(&self) -> Vec<Callback> {
		core::mem::take(&mut *self.0.callbacks.borrow_mut())
	}

	pub(crate) fn set_vnode(&self, vnode: &VNode) {
		*self.0.vnode.borrow_mut() = Rc::downgrade(&vnode.0);
	}

	pub(crate) fn parent_dom(&self) -> Option<NodeId> {
		self.0.parent_dom.get()
	}

	pub(crate) fn set_parent_dom(&self, parent_dom: Option<NodeId>) {
		self.0.parent_dom.set(parent_dom);
	}

	pub(crate) fn set_base(&self, base: Option<NodeId>) {
		self.0.base.set(base);
	}

	pub(crate) fn svg(&self) -> bool {
		self.0.svg.get()
	}

	pub(crate) fn set_svg(&self, svg: bool) {
		self.0.svg.set(svg);
	}

	pub(crate) fn globals(&self) -> Globals {
		self.0.globals.borrow().clone()
	}

	pub(crate) fn set_globals(&self, globals: Globals) {
		*self.0.globals.borrow_mut() = globals;
	}

	/// The value a provider instance currently hands to its consumers.
	pub(crate) fn provided_value(&self) -> Value {
		match (self.props().get("value"), self.0.ty.provides()) {
			(Some(value), _) => value.clone(),
			(None, Some(provides)) => provides.default_value(),
			(None, None) => Value::Null,
		}
	}

	pub(crate) fn subscribe(&self, consumer: &Instance) {
		self.0.subscribers.borrow_mut().push(consumer.downgrade());
		*consumer.0.provider.borrow_mut() = self.downgrade();
	}

	pub(crate) fn unsubscribe(&self) {
		let provider = core::mem::take(&mut *self.0.provider.borrow_mut());
		if let Some(provider) = provider.upgrade() {
			let me = self.downgrade();
			provider
				.subscribers
				.borrow_mut()
				.retain(|subscriber| !subscriber.ptr_eq(&me) && subscriber.strong_count() > 0);
		}
	}

	/// Force-updates every live consumer.
	pub(crate) fn notify_subscribers(&self) {
		let subscribers: Vec<_> = self.0.subscribers.borrow().iter().filter_map(Weak::upgrade).collect();
		trace!(count = subscribers.len(), "Notifying context consumers");
		for subscriber in subscribers {
			Self(subscriber).force_update();
		}
	}

	#[cfg(test)]
	pub(crate) fn subscriber_count(&self) -> usize {
		self.0.subscribers.borrow().iter().filter(|s| s.strong_count() > 0).count()
	}
}

impl Debug for Instance {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Instance")
			.field("name", &self.name())
			.field("phase", &self.phase())
			.field("dirty", &self.is_dirty())
			.finish()
	}
}
