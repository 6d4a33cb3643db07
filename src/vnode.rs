//! The virtual node model.

use crate::{
	component::{ComponentType, Instance},
	host::NodeId,
	props::{Key, Props, Ref, Value},
};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	sync::atomic::{AtomicU64, Ordering},
};
use std::rc::{Rc, Weak};

/// `0` marks a node whose render threw.
static NEXT_ORIGINAL: AtomicU64 = AtomicU64::new(1);

fn next_original() -> u64 {
	NEXT_ORIGINAL.fetch_add(1, Ordering::Relaxed)
}

/// What a [`VNode`] describes.
#[derive(Clone)]
pub enum NodeType {
	Text(Rc<str>),
	Element(Rc<str>),
	/// A list of children without host node of its own.
	Fragment,
	Component(ComponentType),
}

impl NodeType {
	/// Whether two nodes may be reconciled with each other rather than replaced.
	#[must_use]
	pub fn same_type(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Text(_), Self::Text(_)) | (Self::Fragment, Self::Fragment) => true,
			(Self::Element(a), Self::Element(b)) => a == b,
			(Self::Component(a), Self::Component(b)) => a == b,
			_ => false,
		}
	}

	/// Fragments and components have no host node of their own.
	#[must_use]
	pub fn is_composite(&self) -> bool {
		matches!(self, Self::Fragment | Self::Component(_))
	}
}

impl Debug for NodeType {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Text(_) if !cfg!(feature = "dangerous-logging") => f.write_str("#text"),
			Self::Text(text) => write!(f, "#text {:?}", text),
			Self::Element(tag) => f.write_str(tag),
			Self::Fragment => f.write_str("#fragment"),
			Self::Component(ty) => write!(f, "<{}>", ty.name()),
		}
	}
}

impl From<&str> for NodeType {
	fn from(tag: &str) -> Self {
		Self::Element(tag.into())
	}
}

impl From<ComponentType> for NodeType {
	fn from(ty: ComponentType) -> Self {
		Self::Component(ty)
	}
}

impl From<&ComponentType> for NodeType {
	fn from(ty: &ComponentType) -> Self {
		Self::Component(ty.clone())
	}
}

/// Anything a render method or `children` prop may produce.
///
/// [`Child::Empty`] and [`Child::Bool`] render nothing.
/// Nested lists become (unkeyed) fragments.
#[derive(Clone, Debug, PartialEq)]
pub enum Child {
	Empty,
	Bool(bool),
	Text(Rc<str>),
	Int(i64),
	Float(f64),
	Node(VNode),
	List(Vec<Child>),
}

impl Child {
	/// Whether this produces visible output.
	///
	/// Lists qualify if their first entry does.
	#[must_use]
	pub fn is_renderable(&self) -> bool {
		match self {
			Self::Empty | Self::Bool(_) => false,
			Self::Text(_) | Self::Int(_) | Self::Float(_) | Self::Node(_) => true,
			Self::List(list) => list.first().map_or(false, Self::is_renderable),
		}
	}

	pub(crate) fn into_list(self) -> Vec<Self> {
		match self {
			Self::List(list) => list,
			Self::Empty => Vec::new(),
			other => vec![other],
		}
	}

	pub(crate) fn from_value(value: &Value) -> Self {
		match value {
			Value::Null => Self::Empty,
			Value::Bool(bool) => Self::Bool(*bool),
			Value::Int(int) => Self::Int(*int),
			Value::Float(float) => Self::Float(*float),
			Value::Str(str) => Self::Text(str.clone()),
			Value::List(list) => Self::List(list.iter().map(Self::from_value).collect()),
			Value::Children(children) => children.clone(),
			Value::Map(_) | Value::Handler(_) | Value::Ref(_) | Value::Any(_) => Self::Empty,
		}
	}
}

impl Default for Child {
	fn default() -> Self {
		Self::Empty
	}
}

impl From<()> for Child {
	fn from((): ()) -> Self {
		Self::Empty
	}
}

impl From<bool> for Child {
	fn from(bool: bool) -> Self {
		Self::Bool(bool)
	}
}

impl From<&str> for Child {
	fn from(text: &str) -> Self {
		Self::Text(text.into())
	}
}

impl From<String> for Child {
	fn from(text: String) -> Self {
		Self::Text(text.into())
	}
}

impl From<Rc<str>> for Child {
	fn from(text: Rc<str>) -> Self {
		Self::Text(text)
	}
}

impl From<i32> for Child {
	fn from(int: i32) -> Self {
		Self::Int(int.into())
	}
}

impl From<i64> for Child {
	fn from(int: i64) -> Self {
		Self::Int(int)
	}
}

impl From<f64> for Child {
	fn from(float: f64) -> Self {
		Self::Float(float)
	}
}

impl From<VNode> for Child {
	fn from(vnode: VNode) -> Self {
		Self::Node(vnode)
	}
}

impl<T: Into<Child>> From<Vec<T>> for Child {
	fn from(list: Vec<T>) -> Self {
		Self::List(list.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<Child>> From<Option<T>> for Child {
	fn from(child: Option<T>) -> Self {
		child.map_or(Self::Empty, Into::into)
	}
}

/// An immutable description of a piece of UI, plus the bookkeeping the reconciler attaches to it.
///
/// Cloning a [`VNode`] clones the handle, not the node.
#[derive(Clone)]
pub struct VNode(pub(crate) Rc<VNodeInner>);

pub(crate) struct VNodeInner {
	kind: NodeType,
	props: Props,
	key: Option<Key>,
	r#ref: Option<Ref>,
	original: Cell<u64>,
	tree: RefCell<Tree>,
}

/// Reconciler-owned state. Borrows of this never outlive a single accessor call.
#[derive(Default)]
struct Tree {
	parent: Weak<VNodeInner>,
	depth: usize,
	dom: Option<NodeId>,
	/// Outer [`None`]: unset.
	next_dom: Option<Option<NodeId>>,
	children: Option<Vec<Option<VNode>>>,
	component: Option<Instance>,
	/// Set when a render threw mid-hydration, so the next diff of this node resumes hydrating.
	hydrating: Option<bool>,
	bailed_out: bool,
}

impl VNode {
	pub(crate) fn new(kind: NodeType, props: Props, key: Option<Key>, r#ref: Option<Ref>) -> Self {
		Self(Rc::new(VNodeInner {
			kind,
			props,
			key,
			r#ref,
			original: Cell::new(next_original()),
			tree: RefCell::default(),
		}))
	}

	pub(crate) fn text(text: impl Into<Rc<str>>) -> Self {
		Self::new(NodeType::Text(text.into()), Props::new(), None, None)
	}

	#[must_use]
	pub fn kind(&self) -> &NodeType {
		&self.0.kind
	}

	#[must_use]
	pub fn props(&self) -> &Props {
		&self.0.props
	}

	#[must_use]
	pub fn key(&self) -> Option<&Key> {
		self.0.key.as_ref()
	}

	#[must_use]
	pub fn node_ref(&self) -> Option<&Ref> {
		self.0.r#ref.as_ref()
	}

	/// The first host node this subtree rendered, if mounted.
	#[must_use]
	pub fn dom(&self) -> Option<NodeId> {
		self.0.tree.borrow().dom
	}

	/// The component instance backing this node, if it is a mounted component node.
	#[must_use]
	pub fn component(&self) -> Option<Instance> {
		self.0.tree.borrow().component.clone()
	}

	/// The rendered children from the last diff of this node.
	#[must_use]
	pub fn rendered(&self) -> Vec<VNode> {
		self.children().into_iter().flatten().collect()
	}

	#[must_use]
	pub fn depth(&self) -> usize {
		self.0.tree.borrow().depth
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	/// Same type and key, so one can be reconciled into the other.
	pub(crate) fn matches(&self, other: &Self) -> bool {
		self.key() == other.key() && self.kind().same_type(other.kind())
	}

	pub(crate) fn original(&self) -> u64 {
		self.0.original.get()
	}

	pub(crate) fn set_original(&self, original: u64) {
		self.0.original.set(original);
	}

	pub(crate) fn parent(&self) -> Option<VNode> {
		self.0.tree.borrow().parent.upgrade().map(Self)
	}

	pub(crate) fn set_parent(&self, parent: &VNode) {
		let depth = parent.depth() + 1;
		let mut tree = self.0.tree.borrow_mut();
		tree.parent = Rc::downgrade(&parent.0);
		tree.depth = depth;
	}

	pub(crate) fn set_dom(&self, dom: Option<NodeId>) {
		self.0.tree.borrow_mut().dom = dom;
	}

	pub(crate) fn next_dom(&self) -> Option<Option<NodeId>> {
		self.0.tree.borrow().next_dom
	}

	pub(crate) fn set_next_dom(&self, next_dom: Option<Option<NodeId>>) {
		self.0.tree.borrow_mut().next_dom = next_dom;
	}

	pub(crate) fn take_next_dom(&self) -> Option<Option<NodeId>> {
		self.0.tree.borrow_mut().next_dom.take()
	}

	pub(crate) fn children(&self) -> Vec<Option<VNode>> {
		self.0.tree.borrow().children.clone().unwrap_or_default()
	}

	pub(crate) fn has_children(&self) -> bool {
		self.0.tree.borrow().children.is_some()
	}

	pub(crate) fn set_children(&self, children: Vec<Option<VNode>>) {
		self.0.tree.borrow_mut().children = Some(children);
	}

	pub(crate) fn push_child(&self, child: Option<VNode>) {
		self.0
			.tree
			.borrow_mut()
			.children
			.get_or_insert_with(Vec::new)
			.push(child);
	}

	pub(crate) fn child_index(&self, child: &VNode) -> Option<usize> {
		self.0.tree.borrow().children.as_ref()?.iter().position(|slot| {
			slot.as_ref()
				.map_or(false, |candidate| candidate.ptr_eq(child))
		})
	}

	/// Takes over `old`'s rendered children without diffing them.
	pub(crate) fn adopt_children(&self, old: &VNode) {
		let children = old.children();
		for child in children.iter().flatten() {
			child.set_parent(self);
		}
		self.set_children(children);
	}

	pub(crate) fn set_component(&self, component: Option<Instance>) {
		self.0.tree.borrow_mut().component = component;
	}

	pub(crate) fn hydrating(&self) -> Option<bool> {
		self.0.tree.borrow().hydrating
	}

	pub(crate) fn set_hydrating(&self, hydrating: Option<bool>) {
		self.0.tree.borrow_mut().hydrating = hydrating;
	}

	pub(crate) fn set_bailed_out(&self, bailed_out: bool) {
		self.0.tree.borrow_mut().bailed_out = bailed_out;
	}

	pub(crate) fn take_bailed_out(&self) -> bool {
		core::mem::take(&mut self.0.tree.borrow_mut().bailed_out)
	}

	/// Clears the host pointers after unmounting.
	pub(crate) fn detach(&self) {
		let mut tree = self.0.tree.borrow_mut();
		tree.parent = Weak::new();
		tree.dom = None;
		tree.next_dom = None;
	}

	/// A fresh node with the same description and identity, for a [`VNode`] that is already in use elsewhere.
	pub(crate) fn clone_for_reuse(&self) -> Self {
		Self(Rc::new(VNodeInner {
			kind: self.0.kind.clone(),
			props: self.0.props.clone(),
			key: self.0.key.clone(),
			r#ref: self.0.r#ref.clone(),
			original: Cell::new(self.original()),
			tree: RefCell::default(),
		}))
	}

	/// A shallow copy of the current tree state that never counts as identical to `self`.
	pub(crate) fn snapshot(&self) -> Self {
		let tree = self.0.tree.borrow();
		Self(Rc::new(VNodeInner {
			kind: self.0.kind.clone(),
			props: self.0.props.clone(),
			key: self.0.key.clone(),
			r#ref: self.0.r#ref.clone(),
			original: Cell::new(self.original() + 1),
			tree: RefCell::new(Tree {
				parent: tree.parent.clone(),
				depth: tree.depth,
				dom: tree.dom,
				next_dom: None,
				children: tree.children.clone(),
				component: tree.component.clone(),
				hydrating: tree.hydrating,
				bailed_out: false,
			}),
		}))
	}
}

impl PartialEq for VNode {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
			|| (self.kind().same_type(other.kind())
				&& match (self.kind(), other.kind()) {
					(NodeType::Text(a), NodeType::Text(b)) => a == b,
					_ => true,
				} && self.key() == other.key()
				&& self.node_ref() == other.node_ref()
				&& self.original() == other.original()
				&& self.props() == other.props())
	}
}

impl Debug for VNode {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut debug = f.debug_struct("VNode");
		debug.field("kind", self.kind());
		if let Some(key) = self.key() {
			debug.field("key", key);
		}
		debug.field("dom", &self.dom()).finish()
	}
}

/// Creates a [`VNode`].
///
/// `key` and `ref` are taken out of `props`.
/// `children` replaces any `children` prop unless it is [`Child::Empty`].
pub fn create_element(kind: impl Into<NodeType>, props: Props, children: impl Into<Child>) -> VNode {
	let mut props = props;
	let key = props.remove("key").and_then(Key::from_value);
	let r#ref = match props.remove("ref") {
		Some(Value::Ref(r)) => Some(r),
		_ => None,
	};
	let children = children.into();
	if children != Child::Empty {
		props.insert("children", Value::Children(children));
	}
	VNode::new(kind.into(), props, key, r#ref)
}

/// Shorthand for [`create_element`].
pub fn h(kind: impl Into<NodeType>, props: Props, children: impl Into<Child>) -> VNode {
	create_element(kind, props, children)
}

pub fn text(text: impl Into<Rc<str>>) -> VNode {
	VNode::text(text)
}

pub fn fragment(children: impl Into<Child>) -> VNode {
	create_element(NodeType::Fragment, Props::new(), children)
}

/// Copies `vnode` with `props` merged over its own and optionally new children.
///
/// `key` and `ref` are taken from `props` if present there and from `vnode` otherwise.
pub fn clone_element(vnode: &VNode, props: Option<Props>, children: impl Into<Child>) -> VNode {
	let mut merged = vnode.props().clone();
	let mut key = None;
	let mut r#ref = None;
	if let Some(overrides) = props {
		merged.merge(&overrides);
		key = merged.remove("key").and_then(Key::from_value);
		r#ref = match merged.remove("ref") {
			Some(Value::Ref(r)) => Some(r),
			_ => None,
		};
	}
	let children = children.into();
	if children != Child::Empty {
		merged.insert("children", Value::Children(children));
	}
	VNode::new(
		vnode.kind().clone(),
		merged,
		key.or_else(|| vnode.key().cloned()),
		r#ref.or_else(|| vnode.node_ref().cloned()),
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn key_and_ref_leave_props() {
		let r = Ref::cell();
		let vnode = create_element("li", Props::new().key("a").r#ref(r.clone()).with("class", "x"), "text");
		assert_eq!(vnode.key(), Some(&Key::from("a")));
		assert!(vnode.node_ref().unwrap().ptr_eq(&r));
		assert!(!vnode.props().contains("key"));
		assert!(!vnode.props().contains("ref"));
		assert_eq!(vnode.props().children(), Child::from("text"));
	}

	#[test]
	fn clone_keeps_key_unless_overridden() {
		let vnode = create_element("li", Props::new().key(1).with("class", "x"), ());
		let same = clone_element(&vnode, Some(Props::new().with("class", "y")), ());
		assert_eq!(same.key(), Some(&Key::Int(1)));
		assert_eq!(same.props().get("class"), Some(&Value::from("y")));

		let rekeyed = clone_element(&vnode, Some(Props::new().key(2)), ());
		assert_eq!(rekeyed.key(), Some(&Key::Int(2)));
		assert_ne!(vnode, rekeyed);
	}

	#[test]
	fn renderability() {
		assert!(!Child::Empty.is_renderable());
		assert!(!Child::Bool(true).is_renderable());
		assert!(Child::from(0).is_renderable());
		assert!(Child::from(vec!["a"]).is_renderable());
		assert!(!Child::from(vec![Child::Empty, Child::from("a")]).is_renderable());
	}

	#[test]
	fn reuse_keeps_identity() {
		let vnode = text("a");
		let reused = vnode.clone_for_reuse();
		assert!(!vnode.ptr_eq(&reused));
		assert_eq!(vnode, reused);
		assert_ne!(vnode, vnode.snapshot());
	}
}
