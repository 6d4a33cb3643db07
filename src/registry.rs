//! Looking up component types by name, for trees described as data.

use crate::{
	component::ComponentType,
	error::Error,
	props::Props,
	vnode::{create_element, Child, VNode},
};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::warn;

#[derive(Clone, Debug, Default)]
pub struct Registry {
	components: HashMap<Rc<str>, ComponentType>,
}

impl Registry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `ty` under its own name, returning any type it replaces.
	pub fn register(&mut self, ty: ComponentType) -> Option<ComponentType> {
		let name: Rc<str> = ty.name().into();
		self.register_as(name, ty)
	}

	pub fn register_as(&mut self, name: impl Into<Rc<str>>, ty: ComponentType) -> Option<ComponentType> {
		let name = name.into();
		let replaced = self.components.insert(name.clone(), ty);
		if replaced.is_some() {
			warn!(%name, "Replacing registered component type");
		}
		replaced
	}

	/// # Errors
	///
	/// [`Error::UnknownComponent`] if nothing is registered as `name`.
	pub fn resolve(&self, name: &str) -> Result<&ComponentType, Error> {
		self.components.get(name).ok_or_else(|| Error::UnknownComponent(name.into()))
	}

	/// Creates a node for the component registered as `name`.
	///
	/// # Errors
	///
	/// [`Error::UnknownComponent`] if nothing is registered as `name`.
	pub fn element(&self, name: &str, props: Props, children: impl Into<Child>) -> Result<VNode, Error> {
		Ok(create_element(self.resolve(name)?, props, children))
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.components.keys().map(|name| &**name)
	}
}
