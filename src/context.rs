//! Values passed down the component tree without threading them through props.

use crate::{
	component::{Component, ComponentType, Instance},
	error::Error,
	props::{Props, State, Value},
	vnode::{create_element, Child, VNode},
};
use core::{
	cell::RefCell,
	sync::atomic::{AtomicU64, Ordering},
};
use hashbrown::HashMap;
use std::rc::Rc;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ContextId(u64);

/// A context with a mutable default value and its own provider component type.
///
/// Component types opt into consuming it with [`ComponentTypeBuilder::consumes`](`crate::component::ComponentTypeBuilder::consumes`).
/// Consumers see the `value` prop of their nearest enclosing provider, or the default if there is none,
/// and are force-updated whenever that prop changes.
#[derive(Clone)]
pub struct Context(Rc<ContextInner>);

struct ContextInner {
	id: ContextId,
	default: Rc<RefCell<Value>>,
	provider: ComponentType,
}

/// Marks a component type as the provider of a context.
pub(crate) struct Provides {
	pub(crate) id: ContextId,
	default: Rc<RefCell<Value>>,
}

impl Provides {
	pub(crate) fn default_value(&self) -> Value {
		self.default.borrow().clone()
	}
}

impl Context {
	pub fn new(default: impl Into<Value>) -> Self {
		let id = ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed));
		let default = Rc::new(RefCell::new(default.into()));
		let provider = ComponentType::builder("Provider", |_: &Props, _: &Value| Provider)
			.provides(Provides {
				id,
				default: default.clone(),
			})
			.build();
		Self(Rc::new(ContextInner { id, default, provider }))
	}

	#[must_use]
	pub fn id(&self) -> ContextId {
		self.0.id
	}

	/// The component type rendering providers of this context.
	#[must_use]
	pub fn provider(&self) -> &ComponentType {
		&self.0.provider
	}

	#[must_use]
	pub fn default_value(&self) -> Value {
		self.0.default.borrow().clone()
	}

	/// Affects consumers without provider the next time they render.
	pub fn set_default_value(&self, value: impl Into<Value>) {
		*self.0.default.borrow_mut() = value.into();
	}

	/// A provider node handing `value` to consumers among `children`.
	pub fn provide(&self, value: impl Into<Value>, children: impl Into<Child>) -> VNode {
		create_element(self.provider(), Props::new().with("value", value), children)
	}
}

struct Provider;

impl Component for Provider {
	fn render(&self, this: &Instance) -> Result<Child, Error> {
		Ok(this.props().children())
	}

	fn should_update(&self, this: &Instance, next_props: &Props, _: &State, _: &Value) -> bool {
		let props = this.props();
		if props.get("value") != next_props.get("value") {
			this.notify_subscribers();
		}
		true
	}
}

/// The providers visible at a point in the tree, by context.
#[derive(Clone, Default)]
pub(crate) struct Globals(Rc<HashMap<ContextId, Instance>>);

impl Globals {
	pub(crate) fn get(&self, id: ContextId) -> Option<&Instance> {
		self.0.get(&id)
	}

	/// A copy with `provider` shadowing any outer provider of the same context.
	pub(crate) fn with(&self, id: ContextId, provider: Instance) -> Self {
		let mut map = (*self.0).clone();
		map.insert(id, provider);
		Self(Rc::new(map))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{host::Host, memory::MemoryDom, renderer::Renderer, vnode::fragment};

	struct Reader;

	impl Component for Reader {
		fn render(&self, this: &Instance) -> Result<Child, Error> {
			Ok(this.context().as_str().unwrap_or("none").to_owned().into())
		}
	}

	#[test]
	fn unmounted_consumers_unsubscribe() {
		let theme = Context::new("light");
		let reader = ComponentType::builder("Reader", |_: &Props, _: &Value| Reader)
			.consumes(&theme)
			.build();
		let mut renderer = Renderer::new(MemoryDom::new());
		let root = renderer.host().root();

		renderer
			.render(theme.provide("dark", create_element(&reader, Props::new(), ())), root)
			.unwrap();
		assert_eq!(renderer.host().inner_html(root), "dark");

		let provider = renderer.root(root).unwrap().rendered()[0].component().unwrap();
		assert_eq!(provider.subscriber_count(), 1);

		renderer.render(theme.provide("dark", fragment(())), root).unwrap();
		assert_eq!(provider.subscriber_count(), 0);
		assert_eq!(renderer.host().inner_html(root), "");
	}

	#[test]
	fn default_value_without_provider() {
		let theme = Context::new("light");
		let reader = ComponentType::builder("Reader", |_: &Props, _: &Value| Reader)
			.consumes(&theme)
			.build();
		let mut renderer = Renderer::new(MemoryDom::new());
		let root = renderer.host().root();

		renderer.render(create_element(&reader, Props::new(), ()), root).unwrap();
		assert_eq!(renderer.host().inner_html(root), "light");

		theme.set_default_value("sepia");
		renderer.render(create_element(&reader, Props::new(), ()), root).unwrap();
		assert_eq!(renderer.host().inner_html(root), "sepia");
	}
}
