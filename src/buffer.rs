//! Building children imperatively, element by element.

use crate::{
	props::Props,
	vnode::{create_element, Child, NodeType, VNode},
};
use tracing::trace;

/// Collects children for an element whose content is produced by a closure.
///
/// ```
/// use isodom::{buffer::build, render_to_string, Props};
///
/// let list = build("ul", Props::new(), |ul| {
/// 	for item in &["a", "b"] {
/// 		ul.element("li", Props::new(), |_| *item);
/// 	}
/// });
/// assert_eq!(render_to_string(list).unwrap(), "<ul><li>a</li><li>b</li></ul>");
/// ```
#[derive(Debug, Default)]
pub struct ChildBuffer {
	children: Vec<Child>,
}

impl ChildBuffer {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `child` if it [is renderable](`Child::is_renderable`).
	pub fn push(&mut self, child: impl Into<Child>) -> bool {
		let child = child.into();
		if child.is_renderable() {
			self.children.push(child);
			true
		} else {
			trace!("Discarding non-renderable child");
			false
		}
	}

	/// Appends an element built with [`build`].
	pub fn element<R: Into<Child>>(&mut self, kind: impl Into<NodeType>, props: Props, block: impl FnOnce(&mut ChildBuffer) -> R) {
		let vnode = build(kind, props, block);
		self.children.push(Child::Node(vnode));
	}

	pub fn text(&mut self, text: &str) {
		self.children.push(Child::from(text));
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.children.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.children.is_empty()
	}

	#[must_use]
	pub fn into_child(self) -> Child {
		if self.children.is_empty() {
			Child::Empty
		} else {
			Child::List(self.children)
		}
	}
}

/// Creates an element whose children are whatever `block` appends to the buffer,
/// followed by `block`'s result if that is renderable.
pub fn build<R: Into<Child>>(kind: impl Into<NodeType>, props: Props, block: impl FnOnce(&mut ChildBuffer) -> R) -> VNode {
	let mut buffer = ChildBuffer::new();
	let result = block(&mut buffer);
	buffer.push(result);
	create_element(kind, props, buffer.into_child())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::props::Value;

	#[test]
	fn non_renderable_results_are_dropped() {
		let div = build("div", Props::new(), |div| {
			div.element("span", Props::new(), |_| ());
			false
		});
		let children = div.props().children();
		match children {
			Child::List(list) => {
				assert_eq!(list.len(), 1);
				assert!(matches!(&list[0], Child::Node(span) if span.props().get("children").is_none()));
			}
			other => panic!("unexpected children: {:?}", other),
		}
	}

	#[test]
	fn renderable_result_comes_last() {
		let p = build("p", Props::new().with("class", "x"), |p| {
			p.text("a");
			"b"
		});
		assert_eq!(p.props().get("class"), Some(&Value::from("x")));
		assert_eq!(p.props().children(), Child::List(vec![Child::from("a"), Child::from("b")]));
	}
}
