//! An in-memory document, for server rendering and tests.

use crate::{
	error::Error,
	host::{attribute_text, style_text, Host, NodeId, PropTarget},
	props::{Event, Handler, Value},
};
use core::fmt::Write as _;
use hashbrown::HashMap;
use std::{collections::BTreeMap, rc::Rc};
use tracing::{error, trace, warn};

/// A host mutation, as recorded by [`MemoryDom`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
	CreateElement(NodeId),
	CreateText(NodeId),
	Insert { parent: NodeId, node: NodeId, before: Option<NodeId> },
	Remove(NodeId),
	SetText(NodeId),
	SetProperty(NodeId, String),
	SetInnerHtml(NodeId),
}

#[derive(Clone)]
struct MemoryNode {
	data: NodeData,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
}

#[derive(Clone)]
enum NodeData {
	Element(ElementData),
	Text(String),
}

#[derive(Clone, Default)]
struct ElementData {
	tag: Rc<str>,
	svg: bool,
	attributes: BTreeMap<String, String>,
	properties: BTreeMap<String, Value>,
	listeners: BTreeMap<(String, bool), Handler>,
	inner_html: Option<String>,
}

/// A simple document tree implementing [`Host`].
///
/// Every mutation made through [`Host`] is recorded and can be inspected with [`MemoryDom::mutations`].
/// The log grows until it is taken, so long-lived documents should call [`MemoryDom::take_mutations`] regularly
/// or turn recording off with [`MemoryDom::set_recording`].
///
/// Removed nodes are dropped along with their descendants. Their ids are not handed out again.
#[derive(Clone)]
pub struct MemoryDom {
	nodes: HashMap<NodeId, MemoryNode>,
	next_id: u32,
	root: NodeId,
	mutations: Vec<Mutation>,
	recording: bool,
}

impl Default for MemoryDom {
	fn default() -> Self {
		Self::new()
	}
}

const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

fn valid_tag(tag: &str) -> bool {
	let mut chars = tag.chars();
	chars.next().map_or(false, |first| first.is_ascii_alphabetic())
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':' || c == '.' || c == '_')
}

fn escape_text(text: &str, quotes: bool, out: &mut String) {
	for c in text.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' if quotes => out.push_str("&quot;"),
			c => out.push(c),
		}
	}
}

impl MemoryDom {
	/// A document with an empty `body` element as [`MemoryDom::root`].
	#[must_use]
	pub fn new() -> Self {
		let root = NodeId::new(0);
		let mut nodes = HashMap::new();
		nodes.insert(
			root,
			MemoryNode {
				data: NodeData::Element(ElementData {
					tag: "body".into(),
					..ElementData::default()
				}),
				parent: None,
				children: Vec::new(),
			},
		);
		Self {
			nodes,
			next_id: 1,
			root,
			mutations: Vec::new(),
			recording: true,
		}
	}

	#[must_use]
	pub fn root(&self) -> NodeId {
		self.root
	}

	#[must_use]
	pub fn mutations(&self) -> &[Mutation] {
		&self.mutations
	}

	pub fn take_mutations(&mut self) -> Vec<Mutation> {
		core::mem::take(&mut self.mutations)
	}

	/// Turns the mutation log on or off. It is on by default.
	pub fn set_recording(&mut self, recording: bool) {
		self.recording = recording;
	}

	/// How many nodes are alive, whether attached or not. Includes the root.
	#[must_use]
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	#[must_use]
	pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
		self.element(node)?.attributes.get(name).map(String::as_str)
	}

	#[must_use]
	pub fn has_listener(&self, node: NodeId, event: &str, capture: bool) -> bool {
		self.element(node)
			.map_or(false, |element| element.listeners.contains_key(&(event.to_owned(), capture)))
	}

	/// The element with this tag that comes first in document order.
	#[must_use]
	pub fn find(&self, tag: &str) -> Option<NodeId> {
		self.find_in(self.root, tag)
	}

	fn find_in(&self, node: NodeId, tag: &str) -> Option<NodeId> {
		self.node(node)?
			.children
			.iter()
			.find_map(|&child| match self.element(child) {
				Some(element) if &*element.tag == tag => Some(child),
				_ => self.find_in(child, tag),
			})
	}

	/// Dispatches an event at `target`, first to capturing listeners from the root down, then bubbling up.
	///
	/// Returns how many listeners ran.
	pub fn dispatch(&self, target: NodeId, event: &str) -> usize {
		let mut path = vec![target];
		while let Some(parent) = path.last().and_then(|&node| self.parent(node)) {
			path.push(parent);
		}

		// Handlers may mutate state but not this document, so cloning them out is sufficient.
		let handlers: Vec<Handler> = path
			.iter()
			.rev()
			.map(|&node| (node, true))
			.chain(path.iter().map(|&node| (node, false)))
			.filter_map(|(node, capture)| self.element(node)?.listeners.get(&(event.to_owned(), capture)).cloned())
			.collect();
		let event = Event::new(event, Some(target));
		for handler in &handlers {
			handler.call(&event);
		}
		handlers.len()
	}

	/// Serializes `node` including itself.
	#[must_use]
	pub fn outer_html(&self, node: NodeId) -> String {
		let mut html = String::new();
		self.write_html(node, &mut html);
		html
	}

	fn write_html(&self, node: NodeId, out: &mut String) {
		match self.node(node).map(|node| &node.data) {
			None => (),
			Some(NodeData::Text(text)) => escape_text(text, false, out),
			Some(NodeData::Element(element)) => {
				out.push('<');
				out.push_str(&element.tag);
				for (name, value) in &element.attributes {
					let _ = write!(out, " {}=\"", name);
					escape_text(value, true, out);
					out.push('"');
				}
				if VOID_ELEMENTS.contains(&&*element.tag) {
					out.push_str(" />");
					return;
				}
				out.push('>');
				self.write_children(node, out);
				let _ = write!(out, "</{}>", element.tag);
			}
		}
	}

	fn write_children(&self, node: NodeId, out: &mut String) {
		match self.node(node) {
			Some(MemoryNode {
				data: NodeData::Element(ElementData {
					inner_html: Some(html), ..
				}),
				..
			}) => out.push_str(html),
			Some(node) => {
				for &child in &node.children {
					self.write_html(child, out);
				}
			}
			None => (),
		}
	}

	fn node(&self, node: NodeId) -> Option<&MemoryNode> {
		let found = self.nodes.get(&node);
		if found.is_none() {
			error!(?node, "Unknown node");
		}
		found
	}

	fn node_mut(&mut self, node: NodeId) -> Option<&mut MemoryNode> {
		let found = self.nodes.get_mut(&node);
		if found.is_none() {
			error!(?node, "Unknown node");
		}
		found
	}

	fn element(&self, node: NodeId) -> Option<&ElementData> {
		match &self.node(node)?.data {
			NodeData::Element(element) => Some(element),
			NodeData::Text(_) => None,
		}
	}

	fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
		match &mut self.node_mut(node)?.data {
			NodeData::Element(element) => Some(element),
			NodeData::Text(_) => {
				warn!(?node, "Expected element, found text");
				None
			}
		}
	}

	fn push(&mut self, data: NodeData) -> NodeId {
		let id = NodeId::new(self.next_id);
		self.next_id += 1;
		self.nodes.insert(
			id,
			MemoryNode {
				data,
				parent: None,
				children: Vec::new(),
			},
		);
		id
	}

	fn record(&mut self, mutation: Mutation) {
		if self.recording {
			self.mutations.push(mutation);
		}
	}

	/// Drops `node` and its descendants.
	fn release(&mut self, node: NodeId) {
		if let Some(released) = self.nodes.remove(&node) {
			for child in released.children {
				self.release(child);
			}
		}
	}

	fn detach(&mut self, node: NodeId) {
		let parent = match self.node_mut(node) {
			Some(node) => node.parent.take(),
			None => return,
		};
		if let Some(parent) = parent.and_then(|parent| self.node_mut(parent)) {
			parent.children.retain(|&child| child != node);
		}
	}
}

impl Host for MemoryDom {
	fn create_element(&mut self, tag: &str, svg: bool) -> Result<NodeId, Error> {
		if !valid_tag(tag) {
			return Err(Error::InvalidTag(tag.into()));
		}
		let id = self.push(NodeData::Element(ElementData {
			tag: tag.into(),
			svg,
			..ElementData::default()
		}));
		self.record(Mutation::CreateElement(id));
		Ok(id)
	}

	fn create_text(&mut self, data: &str) -> NodeId {
		let id = self.push(NodeData::Text(data.to_owned()));
		self.record(Mutation::CreateText(id));
		id
	}

	fn tag_name(&self, node: NodeId) -> Option<String> {
		self.element(node).map(|element| element.tag.to_string())
	}

	fn text(&self, node: NodeId) -> Option<String> {
		match &self.node(node)?.data {
			NodeData::Text(text) => Some(text.clone()),
			NodeData::Element(_) => None,
		}
	}

	fn set_text(&mut self, node: NodeId, data: &str) {
		match self.node_mut(node).map(|node| &mut node.data) {
			Some(NodeData::Text(text)) => {
				*text = data.to_owned();
				self.record(Mutation::SetText(node));
			}
			Some(NodeData::Element(_)) => warn!(?node, "Expected text, found element"),
			None => (),
		}
	}

	fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.node(node)?.parent
	}

	fn first_child(&self, node: NodeId) -> Option<NodeId> {
		self.node(node)?.children.first().copied()
	}

	fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
		let siblings = &self.node(self.node(node)?.parent?)?.children;
		let index = siblings.iter().position(|&sibling| sibling == node)?;
		siblings.get(index + 1).copied()
	}

	fn child_nodes(&self, node: NodeId) -> Vec<NodeId> {
		self.node(node).map(|node| node.children.clone()).unwrap_or_default()
	}

	fn insert_before(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
		if parent == child || self.node(parent).is_none() || self.node(child).is_none() {
			error!(?parent, ?child, "Invalid insertion");
			return;
		}
		self.detach(child);
		if let Some(parent_node) = self.node_mut(parent) {
			let index = before
				.and_then(|before| parent_node.children.iter().position(|&sibling| sibling == before))
				.unwrap_or(parent_node.children.len());
			parent_node.children.insert(index, child);
		}
		if let Some(child_node) = self.node_mut(child) {
			child_node.parent = Some(parent);
		}
		trace!(?parent, ?child, ?before, "Inserted node");
		self.record(Mutation::Insert {
			parent,
			node: child,
			before,
		});
	}

	fn remove(&mut self, node: NodeId) {
		if !self.nodes.contains_key(&node) {
			trace!(?node, "Already removed");
			return;
		}
		self.detach(node);
		self.release(node);
		self.record(Mutation::Remove(node));
	}

	fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
		self.element(node)
			.map(|element| element.attributes.iter().map(|(name, value)| (name.clone(), value.clone())).collect())
			.unwrap_or_default()
	}

	fn set_property(&mut self, node: NodeId, name: &str, value: &Value, _old: &Value, svg: bool) {
		let element = match self.element_mut(node) {
			Some(element) => element,
			None => return,
		};
		match PropTarget::of(name, svg) {
			PropTarget::Style => {
				let css = style_text(value);
				if css.is_empty() {
					element.attributes.remove("style");
				} else {
					element.attributes.insert("style".to_owned(), css);
				}
			}
			PropTarget::Listener { event, capture } => match value {
				Value::Handler(handler) => {
					element.listeners.insert((event.to_owned(), capture), handler.clone());
				}
				_ => {
					element.listeners.remove(&(event.to_owned(), capture));
				}
			},
			PropTarget::Property(property) => {
				element.properties.insert(property.to_owned(), value.clone());
			}
			PropTarget::Attribute(attribute) => match attribute_text(&attribute, value) {
				Some(text) => {
					element.attributes.insert(attribute.into_owned(), text);
				}
				None => {
					element.attributes.remove(&*attribute);
				}
			},
		}
		self.record(Mutation::SetProperty(node, name.to_owned()));
	}

	fn property(&self, node: NodeId, name: &str) -> Value {
		let element = match self.element(node) {
			Some(element) => element,
			None => return Value::Null,
		};
		match (element.properties.get(name), element.attributes.get(name)) {
			(Some(value), _) => value.clone(),
			(None, Some(_)) if name == "checked" || name == "selected" => Value::Bool(true),
			(None, Some(attribute)) => Value::Str(attribute.as_str().into()),
			(None, None) => Value::Null,
		}
	}

	fn inner_html(&self, node: NodeId) -> String {
		let mut html = String::new();
		self.write_children(node, &mut html);
		html
	}

	fn set_inner_html(&mut self, node: NodeId, html: &str) {
		let children = match self.node_mut(node) {
			Some(node) => core::mem::take(&mut node.children),
			None => return,
		};
		for child in children {
			self.release(child);
		}
		if let Some(element) = self.element_mut(node) {
			element.inner_html = if html.is_empty() { None } else { Some(html.to_owned()) };
		}
		self.record(Mutation::SetInnerHtml(node));
	}

	fn is_svg(&self, node: NodeId) -> bool {
		self.element(node).map_or(false, |element| element.svg)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn serialization_escapes() {
		let mut dom = MemoryDom::new();
		let root = dom.root();
		let a = dom.create_element("a", false).unwrap();
		dom.set_property(a, "href", &Value::from("?x=1&y=\"2\""), &Value::Null, false);
		let text = dom.create_text("<b>");
		dom.insert_before(a, text, None);
		let br = dom.create_element("br", false).unwrap();
		dom.insert_before(root, a, None);
		dom.insert_before(root, br, None);
		assert_eq!(
			dom.inner_html(root),
			"<a href=\"?x=1&amp;y=&quot;2&quot;\">&lt;b&gt;</a><br />"
		);
	}

	#[test]
	fn insertion_moves() {
		let mut dom = MemoryDom::new();
		let root = dom.root();
		let a = dom.create_text("a");
		let b = dom.create_text("b");
		dom.insert_before(root, a, None);
		dom.insert_before(root, b, None);
		dom.insert_before(root, b, Some(a));
		assert_eq!(dom.child_nodes(root), vec![b, a]);
		assert_eq!(dom.next_sibling(b), Some(a));
		assert_eq!(dom.next_sibling(a), None);
	}

	#[test]
	fn invalid_tags_are_rejected() {
		let mut dom = MemoryDom::new();
		assert!(matches!(dom.create_element("<script>", false), Err(Error::InvalidTag(_))));
		assert!(dom.mutations().is_empty());
	}

	#[test]
	fn removal_releases_subtrees() {
		let mut dom = MemoryDom::new();
		let root = dom.root();
		let p = dom.create_element("p", false).unwrap();
		let text = dom.create_text("x");
		dom.insert_before(p, text, None);
		dom.insert_before(root, p, None);
		assert_eq!(dom.node_count(), 3);

		dom.remove(p);
		assert_eq!(dom.node_count(), 1);
		assert_eq!(dom.inner_html(root), "");

		// Removing twice is a no-op, and ids stay unique.
		dom.remove(p);
		assert_eq!(dom.mutations().iter().filter(|mutation| matches!(mutation, Mutation::Remove(_))).count(), 1);
		let next = dom.create_text("y");
		assert!(next != p && next != text);
	}

	#[test]
	fn recording_can_be_turned_off() {
		let mut dom = MemoryDom::new();
		dom.set_recording(false);
		let text = dom.create_text("x");
		dom.insert_before(dom.root(), text, None);
		assert!(dom.mutations().is_empty());
		assert_eq!(dom.inner_html(dom.root()), "x");
	}

	#[test]
	fn events_capture_then_bubble() {
		use std::cell::RefCell;

		let order = Rc::new(RefCell::new(Vec::new()));
		let mut dom = MemoryDom::new();
		let root = dom.root();
		let button = dom.create_element("button", false).unwrap();
		dom.insert_before(root, button, None);
		for (node, name, label) in [
			(root, "on_click", "root bubble"),
			(root, "on_click_capture", "root capture"),
			(button, "on_click", "button"),
		] {
			let order = order.clone();
			dom.set_property(node, name, &Handler::new(move |_| order.borrow_mut().push(label)).into(), &Value::Null, false);
		}
		assert_eq!(dom.dispatch(button, "click"), 3);
		assert_eq!(*order.borrow(), vec!["root capture", "button", "root bubble"]);
	}
}
