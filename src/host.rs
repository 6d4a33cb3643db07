//! The seam between the reconciler and an actual document.

use crate::{error::Error, props::Value};
use std::borrow::Cow;

/// A host node handle, allocated by a [`Host`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(u32);

impl NodeId {
	#[must_use]
	pub fn new(id: u32) -> Self {
		Self(id)
	}

	#[must_use]
	pub fn get(self) -> u32 {
		self.0
	}
}

/// A document the reconciler can read and mutate.
///
/// Handles passed in are always ones this host handed out.
/// Mutations of nodes that have disappeared in the meantime should be logged and ignored.
pub trait Host {
	/// # Errors
	///
	/// Iff the host rejects `tag`.
	fn create_element(&mut self, tag: &str, svg: bool) -> Result<NodeId, Error>;
	fn create_text(&mut self, data: &str) -> NodeId;

	/// The element's local name, or [`None`] for text nodes.
	fn tag_name(&self, node: NodeId) -> Option<String>;
	/// The text node's data, or [`None`] for elements.
	fn text(&self, node: NodeId) -> Option<String>;
	fn set_text(&mut self, node: NodeId, data: &str);

	fn is_text(&self, node: NodeId) -> bool {
		self.text(node).is_some()
	}

	fn parent(&self, node: NodeId) -> Option<NodeId>;
	fn first_child(&self, node: NodeId) -> Option<NodeId>;
	fn next_sibling(&self, node: NodeId) -> Option<NodeId>;

	fn child_nodes(&self, node: NodeId) -> Vec<NodeId> {
		let mut children = Vec::new();
		let mut next = self.first_child(node);
		while let Some(child) = next {
			children.push(child);
			next = self.next_sibling(child);
		}
		children
	}

	/// Inserts (or moves) `child` into `parent` before `before`, or at the end.
	fn insert_before(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>);
	/// Detaches `node` from its parent, if any.
	fn remove(&mut self, node: NodeId);

	/// The element's current attributes as `(name, value)` pairs.
	fn attributes(&self, node: NodeId) -> Vec<(String, String)>;

	/// Applies one prop to an element. See [`PropTarget`] for how names are interpreted.
	fn set_property(&mut self, node: NodeId, name: &str, value: &Value, old: &Value, svg: bool);

	/// The live value of a property such as `value` or `checked`.
	fn property(&self, node: NodeId, name: &str) -> Value;

	fn inner_html(&self, node: NodeId) -> String;
	fn set_inner_html(&mut self, node: NodeId, html: &str);

	/// Whether `node` is an SVG element, so that its children are created in the SVG namespace.
	fn is_svg(&self, node: NodeId) -> bool {
		let _ = node;
		false
	}
}

/// How a prop name is applied to an element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropTarget<'a> {
	Style,
	/// `on_{name}` or `on_{name}_capture`.
	Listener { event: &'a str, capture: bool },
	/// Live properties that must not be set as attributes.
	Property(&'a str),
	Attribute(Cow<'a, str>),
}

impl<'a> PropTarget<'a> {
	#[must_use]
	pub fn of(name: &'a str, svg: bool) -> Self {
		if name == "style" {
			return Self::Style;
		}
		if let Some(event) = name.strip_prefix("on_") {
			return match event.strip_suffix("_capture") {
				Some(event) => Self::Listener { event, capture: true },
				None => Self::Listener { event, capture: false },
			};
		}
		match name {
			"value" | "checked" | "selected" => Self::Property(name),
			_ => Self::Attribute(attribute_name(name, svg)),
		}
	}
}

/// Maps prop names to attribute names.
#[must_use]
pub fn attribute_name(name: &str, svg: bool) -> Cow<'_, str> {
	match name {
		"class_name" | "className" => "class".into(),
		"html_for" | "htmlFor" => "for".into(),
		"xlink_href" | "xlinkHref" | "xlink:href" if svg => "href".into(),
		_ => name.into(),
	}
}

/// Whether a removed value should remove the attribute rather than set it to `"false"`.
#[must_use]
pub fn removes_attribute(name: &str, value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::Bool(false) => !name.starts_with("aria-"),
		_ => false,
	}
}

/// The attribute text for `value`, including `aria-*="false"`.
#[must_use]
pub fn attribute_text(name: &str, value: &Value) -> Option<String> {
	if removes_attribute(name, value) {
		None
	} else if let Value::Bool(false) = value {
		Some("false".to_owned())
	} else {
		value.to_attribute()
	}
}

/// Serializes a style prop as CSS text.
///
/// Maps turn into `property: value;` declarations in name order, with `_` in names replaced by `-`.
#[must_use]
pub fn style_text(value: &Value) -> String {
	match value {
		Value::Str(css) => css.to_string(),
		Value::Map(declarations) => {
			let mut declarations: Vec<_> = declarations
				.iter()
				.filter_map(|(name, value)| Some((name.replace('_', "-"), value.to_attribute()?)))
				.collect();
			declarations.sort();
			declarations
				.into_iter()
				.map(|(name, value)| format!("{}: {};", name, value))
				.collect::<Vec<_>>()
				.join(" ")
		}
		_ => String::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::props::Props;

	#[test]
	fn prop_targets() {
		assert_eq!(PropTarget::of("style", false), PropTarget::Style);
		assert_eq!(
			PropTarget::of("on_click", false),
			PropTarget::Listener { event: "click", capture: false }
		);
		assert_eq!(
			PropTarget::of("on_focus_capture", false),
			PropTarget::Listener { event: "focus", capture: true }
		);
		assert_eq!(PropTarget::of("checked", false), PropTarget::Property("checked"));
		assert_eq!(PropTarget::of("class_name", false), PropTarget::Attribute("class".into()));
		assert_eq!(PropTarget::of("xlink_href", true), PropTarget::Attribute("href".into()));
		assert_eq!(PropTarget::of("xlink_href", false), PropTarget::Attribute("xlink_href".into()));
	}

	#[test]
	fn attribute_values() {
		assert_eq!(attribute_text("hidden", &Value::Bool(true)), Some(String::new()));
		assert_eq!(attribute_text("hidden", &Value::Bool(false)), None);
		assert_eq!(attribute_text("aria-hidden", &Value::Bool(false)), Some("false".to_owned()));
		assert_eq!(attribute_text("tabindex", &Value::Int(-1)), Some("-1".to_owned()));
	}

	#[test]
	fn style_maps() {
		let style = Props::new().with("font_size", "12px").with("color", "red");
		assert_eq!(style_text(&Value::Map(style)), "color: red; font-size: 12px;");
	}
}
