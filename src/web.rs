//! A [`Host`] backed by a browser document through [`web_sys`].

use crate::{
	error::Error,
	host::{attribute_text, style_text, Host, NodeId, PropTarget},
	props::{Event, Handler, Value},
	renderer::Renderer,
};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	sync::atomic::{AtomicU32, Ordering},
};
use hashbrown::HashMap;
use js_sys::{Function, Reflect};
use std::rc::Rc;
use tracing::{error, instrument, trace, trace_span, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

static NEXT_INSTANCE: AtomicU32 = AtomicU32::new(0);

struct Listener {
	handler: Handler,
	function: Function,
}

type Listeners = Rc<RefCell<HashMap<(NodeId, String, bool), Listener>>>;

/// Maps [`NodeId`]s to live DOM nodes of one document.
///
/// Node ids are stored on the DOM nodes themselves under an expando property unique to this instance,
/// so that nodes found by traversal (for example server-rendered markup during hydration) can be adopted.
///
/// Event listeners go through a single proxy [`Closure`] and start throwing into JavaScript once this instance is dropped.
pub struct WebDom {
	document: web_sys::Document,
	expando: JsValue,
	nodes: RefCell<HashMap<NodeId, web_sys::Node>>,
	next_id: Cell<u32>,
	listeners: Listeners,
	common_handler: Closure<dyn Fn(JsValue, JsValue, web_sys::Event)>,
}

impl WebDom {
	#[must_use]
	#[instrument(skip(document))]
	pub fn new(document: web_sys::Document) -> Self {
		let instance = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
		let listeners = Listeners::default();
		Self {
			document,
			expando: JsValue::from_str(&format!("__isodom{}", instance)),
			nodes: RefCell::default(),
			next_id: Cell::new(0),
			common_handler: Self::common_handler(listeners.clone()),
			listeners,
		}
	}

	/// The current window's document.
	#[must_use]
	pub fn for_window() -> Option<Self> {
		web_sys::window()?.document().map(Self::new)
	}

	fn common_handler(listeners: Listeners) -> Closure<dyn Fn(JsValue, JsValue, web_sys::Event)> {
		Closure::wrap(Box::new(move |id: JsValue, capture: JsValue, event: web_sys::Event| {
			let span = trace_span!("common_handler", ?id, event = %event.type_());
			let _enter = span.enter();

			#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
			let target = match id.as_f64() {
				Some(id) => NodeId::new(id as u32),
				None => return error!("isodom bug: Invalid bound node id"),
			};
			let capture = capture.as_bool().unwrap_or(false);
			let handler = listeners
				.borrow()
				.get(&(target, event.type_(), capture))
				.map(|listener| listener.handler.clone());
			match handler {
				Some(handler) => handler.call(&Event::new(event.type_(), Some(target)).with_native(Rc::new(event))),
				None => warn!("Event fired for a listener that was already removed"),
			}
		}) as Box<dyn Fn(JsValue, JsValue, web_sys::Event)>)
	}

	/// Registers `node` (if necessary) and returns its id.
	pub fn adopt(&self, node: &web_sys::Node) -> NodeId {
		if let Some(id) = self.id_of(node) {
			return id;
		}
		let id = NodeId::new(self.next_id.get());
		self.next_id.set(id.get() + 1);
		if let Err(error) = Reflect::set(node, &self.expando, &JsValue::from(id.get())) {
			error!(?error, "Failed to tag node");
		}
		self.nodes.borrow_mut().insert(id, node.clone());
		id
	}

	/// The DOM node behind `id`.
	#[must_use]
	pub fn node(&self, id: NodeId) -> Option<web_sys::Node> {
		let node = self.nodes.borrow().get(&id).cloned();
		if node.is_none() {
			error!(?id, "Unknown node");
		}
		node
	}

	fn id_of(&self, node: &web_sys::Node) -> Option<NodeId> {
		#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
		let id = NodeId::new(Reflect::get(node, &self.expando).ok()?.as_f64()? as u32);
		self.nodes.borrow().contains_key(&id).then(|| id)
	}

	fn element(&self, id: NodeId) -> Option<web_sys::Element> {
		match self.node(id)?.dyn_into::<web_sys::Element>() {
			Ok(element) => Some(element),
			Err(node) => {
				warn!(?node, "Expected element");
				None
			}
		}
	}

	/// Drops `node` and its descendants from the id map, along with their listeners.
	fn forget(&self, node: &web_sys::Node) {
		if let Some(id) = self.id_of(node) {
			self.nodes.borrow_mut().remove(&id);
			self.listeners.borrow_mut().retain(|(listener, _, _), _| *listener != id);
		}
		let children = node.child_nodes();
		for i in 0..children.length() {
			if let Some(child) = children.get(i) {
				self.forget(&child);
			}
		}
	}

	fn set_listener(&mut self, element: &web_sys::Element, id: NodeId, event: &str, capture: bool, value: &Value) {
		let key = (id, event.to_owned(), capture);
		let removed = self.listeners.borrow_mut().remove(&key);
		if let Some(removed) = &removed {
			if let Err(error) = element.remove_event_listener_with_callback_and_bool(event, &removed.function, capture) {
				error!(?error, "Failed to remove event listener");
			}
		}

		if let Value::Handler(handler) = value {
			let function = self
				.common_handler
				.as_ref()
				.unchecked_ref::<Function>()
				.bind2(&JsValue::UNDEFINED, &JsValue::from(id.get()), &JsValue::from_bool(capture))
				.unchecked_into::<Function>();
			if let Err(error) = element.add_event_listener_with_callback_and_bool(event, &function, capture) {
				return error!(?error, "Failed to add event listener");
			}
			self.listeners.borrow_mut().insert(
				key,
				Listener {
					handler: handler.clone(),
					function,
				},
			);
		}
	}
}

impl Debug for WebDom {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("WebDom")
			.field("nodes", &self.nodes.borrow().len())
			.field("listeners", &self.listeners.borrow().len())
			.finish()
	}
}

fn js_value(value: &Value) -> JsValue {
	match value {
		Value::Null => JsValue::from_str(""),
		Value::Bool(bool) => JsValue::from_bool(*bool),
		#[allow(clippy::cast_precision_loss)]
		Value::Int(int) => JsValue::from_f64(*int as f64),
		Value::Float(float) => JsValue::from_f64(*float),
		Value::Str(str) => JsValue::from_str(str),
		_ => JsValue::UNDEFINED,
	}
}

fn from_js_value(value: &JsValue) -> Value {
	if let Some(bool) = value.as_bool() {
		Value::Bool(bool)
	} else if let Some(float) = value.as_f64() {
		Value::Float(float)
	} else if let Some(string) = value.as_string() {
		Value::Str(string.into())
	} else {
		Value::Null
	}
}

impl Host for WebDom {
	fn create_element(&mut self, tag: &str, svg: bool) -> Result<NodeId, Error> {
		let element = if svg {
			self.document.create_element_ns(Some(SVG_NAMESPACE), tag)
		} else {
			self.document.create_element(tag)
		};
		match element {
			Ok(element) => Ok(self.adopt(&element)),
			Err(error) => {
				error!(?error, tag, "Failed to create element");
				Err(Error::InvalidTag(tag.into()))
			}
		}
	}

	fn create_text(&mut self, data: &str) -> NodeId {
		let text = self.document.create_text_node(data);
		self.adopt(&text)
	}

	fn tag_name(&self, node: NodeId) -> Option<String> {
		self.node(node)?.dyn_ref::<web_sys::Element>().map(web_sys::Element::local_name)
	}

	fn text(&self, node: NodeId) -> Option<String> {
		self.node(node)?.dyn_ref::<web_sys::Text>().map(|text| text.data())
	}

	fn set_text(&mut self, node: NodeId, data: &str) {
		match self.node(node).as_ref().and_then(|node| node.dyn_ref::<web_sys::Text>()) {
			Some(text) => text.set_data(data),
			None => warn!(?node, "Expected text node"),
		}
	}

	fn parent(&self, node: NodeId) -> Option<NodeId> {
		let parent = self.node(node)?.parent_node()?;
		self.id_of(&parent)
	}

	fn first_child(&self, node: NodeId) -> Option<NodeId> {
		let child = self.node(node)?.first_child()?;
		Some(self.adopt(&child))
	}

	fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
		let sibling = self.node(node)?.next_sibling()?;
		Some(self.adopt(&sibling))
	}

	fn insert_before(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
		let (parent, child) = match (self.node(parent), self.node(child)) {
			(Some(parent), Some(child)) => (parent, child),
			_ => return,
		};
		let before = before.and_then(|before| self.node(before));
		trace!("Inserting node");
		if let Err(error) = parent.insert_before(&child, before.as_ref()) {
			error!(?error, "Failed to insert node");
		}
	}

	fn remove(&mut self, node: NodeId) {
		let node = match self.node(node) {
			Some(node) => node,
			None => return,
		};
		if let Some(parent) = node.parent_node() {
			if let Err(error) = parent.remove_child(&node) {
				error!(?error, "Failed to remove node");
			}
		}
		self.forget(&node);
	}

	fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
		let attributes = match self.element(node) {
			Some(element) => element.attributes(),
			None => return Vec::new(),
		};
		(0..attributes.length())
			.filter_map(|i| attributes.item(i))
			.map(|attr| (attr.name(), attr.value()))
			.collect()
	}

	fn set_property(&mut self, node: NodeId, name: &str, value: &Value, _old: &Value, svg: bool) {
		let element = match self.element(node) {
			Some(element) => element,
			None => return,
		};
		match PropTarget::of(name, svg) {
			PropTarget::Style => {
				let css = style_text(value);
				match element.dyn_ref::<web_sys::HtmlElement>() {
					Some(html_element) if !css.is_empty() => html_element.style().set_css_text(&css),
					_ => {
						let result = if css.is_empty() { element.remove_attribute("style") } else { element.set_attribute("style", &css) };
						if let Err(error) = result {
							error!(?error, "Failed to update style attribute");
						}
					}
				}
			}
			PropTarget::Listener { event, capture } => self.set_listener(&element, node, event, capture, value),
			PropTarget::Property(property) => {
				if let Err(error) = Reflect::set(&element, &JsValue::from_str(property), &js_value(value)) {
					error!(?error, property, "Failed to set property");
				}
			}
			PropTarget::Attribute(attribute) => {
				let result = match attribute_text(&attribute, value) {
					Some(text) => element.set_attribute(&attribute, &text),
					None => element.remove_attribute(&attribute),
				};
				if let Err(error) = result {
					error!(?error, %attribute, "Failed to update attribute");
				}
			}
		}
	}

	fn property(&self, node: NodeId, name: &str) -> Value {
		self.node(node)
			.and_then(|node| Reflect::get(&node, &JsValue::from_str(name)).ok())
			.map_or(Value::Null, |value| from_js_value(&value))
	}

	fn inner_html(&self, node: NodeId) -> String {
		self.element(node).map(|element| element.inner_html()).unwrap_or_default()
	}

	fn set_inner_html(&mut self, node: NodeId, html: &str) {
		if let Some(element) = self.element(node) {
			let children = element.child_nodes();
			for i in 0..children.length() {
				if let Some(child) = children.get(i) {
					self.forget(&child);
				}
			}
			element.set_inner_html(html);
		}
	}

	fn is_svg(&self, node: NodeId) -> bool {
		self.element(node)
			.and_then(|element| element.namespace_uri())
			.map_or(false, |namespace| namespace == SVG_NAMESPACE)
	}
}

/// Runs `callback` on a later turn of the event loop.
///
/// # Errors
///
/// Iff there is no window or the timeout could not be set.
pub fn defer(callback: impl FnOnce() + 'static) -> Result<(), Error> {
	let window = web_sys::window().ok_or_else(|| Error::Host("no window".into()))?;
	let callback = Closure::once_into_js(callback);
	window
		.set_timeout_with_callback(callback.unchecked_ref())
		.map(drop)
		.map_err(|error| Error::Host(format!("{:?}", error).into()))
}

/// Makes state changes re-render on a later turn of the event loop, like a browser application expects.
pub fn process_on_timeout<H: Host + 'static>(renderer: &Rc<RefCell<Renderer<H>>>) {
	let weak = Rc::downgrade(renderer);
	renderer.borrow().queue().set_schedule(move || {
		let weak = weak.clone();
		let deferred = defer(move || {
			let renderer = match weak.upgrade() {
				Some(renderer) => renderer,
				None => return trace!("Renderer dropped before scheduled render"),
			};
			let mut renderer = match renderer.try_borrow_mut() {
				Ok(renderer) => renderer,
				Err(_) => return error!("Renderer busy during scheduled render"),
			};
			if let Err(error) = renderer.process() {
				error!(%error, "Scheduled render failed");
			}
		});
		if let Err(error) = deferred {
			error!(%error, "Failed to schedule render");
		}
	});
}
