//! Prop bags, dynamic values, keys, refs and event handlers.

use crate::{component::Instance, error::Error, host::NodeId, vnode::Child, VNode};
use core::{
	any::Any,
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use hashbrown::HashMap;
use std::rc::Rc;

/// Identifies a child among its siblings across renders.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Key {
	Int(i64),
	Str(Rc<str>),
}

impl Key {
	pub(crate) fn from_value(value: Value) -> Option<Self> {
		match value {
			Value::Int(int) => Some(Self::Int(int)),
			Value::Str(str) => Some(Self::Str(str)),
			_ => None,
		}
	}
}

impl From<i64> for Key {
	fn from(int: i64) -> Self {
		Self::Int(int)
	}
}

impl From<i32> for Key {
	fn from(int: i32) -> Self {
		Self::Int(int.into())
	}
}

impl From<&str> for Key {
	fn from(str: &str) -> Self {
		Self::Str(str.into())
	}
}

impl From<String> for Key {
	fn from(string: String) -> Self {
		Self::Str(string.into())
	}
}

impl From<Key> for Value {
	fn from(key: Key) -> Self {
		match key {
			Key::Int(int) => Self::Int(int),
			Key::Str(str) => Self::Str(str),
		}
	}
}

/// A dynamically typed prop or state value.
///
/// [`Handler`], [`Ref`] and [`Value::Any`] compare by identity, everything else structurally.
#[derive(Clone)]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(Rc<str>),
	List(Rc<[Value]>),
	Map(Props),
	Handler(Handler),
	Ref(Ref),
	Children(Child),
	Any(Rc<dyn Any>),
}

impl Value {
	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Str(str) => Some(str),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_bool(&self) -> Option<bool> {
		match *self {
			Self::Bool(bool) => Some(bool),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_int(&self) -> Option<i64> {
		match *self {
			Self::Int(int) => Some(int),
			_ => None,
		}
	}

	#[must_use]
	#[allow(clippy::cast_precision_loss)]
	pub fn as_float(&self) -> Option<f64> {
		match *self {
			Self::Int(int) => Some(int as f64),
			Self::Float(float) => Some(float),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_map(&self) -> Option<&Props> {
		match self {
			Self::Map(map) => Some(map),
			_ => None,
		}
	}

	/// Downcasts an opaque [`Value::Any`].
	#[must_use]
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		match self {
			Self::Any(any) => any.downcast_ref(),
			_ => None,
		}
	}

	#[must_use]
	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	/// The textual form this value takes as an element attribute.
	///
	/// [`None`] means the attribute should be absent.
	#[must_use]
	pub fn to_attribute(&self) -> Option<String> {
		match self {
			Self::Null | Self::Bool(false) => None,
			Self::Bool(true) => Some(String::new()),
			Self::Int(int) => Some(int.to_string()),
			Self::Float(float) => Some(float.to_string()),
			Self::Str(str) => Some(str.to_string()),
			Self::List(list) => Some(
				list.iter()
					.filter_map(Self::to_attribute)
					.collect::<Vec<_>>()
					.join(" "),
			),
			Self::Map(_) | Self::Handler(_) | Self::Ref(_) | Self::Children(_) | Self::Any(_) => {
				None
			}
		}
	}

	pub(crate) fn kind(&self) -> ValueKind {
		match self {
			Self::Null => ValueKind::Null,
			Self::Bool(_) => ValueKind::Bool,
			Self::Int(_) => ValueKind::Int,
			Self::Float(_) => ValueKind::Float,
			Self::Str(_) => ValueKind::Str,
			Self::List(_) => ValueKind::List,
			Self::Map(_) => ValueKind::Map,
			Self::Handler(_) => ValueKind::Handler,
			Self::Ref(_) => ValueKind::Ref,
			Self::Children(_) => ValueKind::Children,
			Self::Any(_) => ValueKind::Any,
		}
	}
}

impl Default for Value {
	fn default() -> Self {
		Self::Null
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Int(a), Self::Int(b)) => a == b,
			#[allow(clippy::float_cmp)]
			(Self::Float(a), Self::Float(b)) => a == b,
			(Self::Str(a), Self::Str(b)) => a == b,
			(Self::List(a), Self::List(b)) => a == b,
			(Self::Map(a), Self::Map(b)) => a == b,
			(Self::Handler(a), Self::Handler(b)) => a == b,
			(Self::Ref(a), Self::Ref(b)) => a == b,
			(Self::Children(a), Self::Children(b)) => a == b,
			(Self::Any(a), Self::Any(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}
}

impl Debug for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Null => f.write_str("Null"),
			Self::Bool(bool) => Debug::fmt(bool, f),
			Self::Int(int) => Debug::fmt(int, f),
			Self::Float(float) => Debug::fmt(float, f),
			Self::Str(str) => Debug::fmt(str, f),
			Self::List(list) => f.debug_list().entries(list.iter()).finish(),
			Self::Map(map) => Debug::fmt(map, f),
			Self::Handler(handler) => Debug::fmt(handler, f),
			Self::Ref(r) => Debug::fmt(r, f),
			Self::Children(children) => Debug::fmt(children, f),
			Self::Any(_) => f.write_str("Any(..)"),
		}
	}
}

macro_rules! value_from {
	($($ty:ty => |$v:ident| $e:expr),*$(,)?) => {$(
		impl From<$ty> for Value {
			fn from($v: $ty) -> Self {
				$e
			}
		}
	)*};
}

value_from! {
	bool => |v| Value::Bool(v),
	i32 => |v| Value::Int(v.into()),
	i64 => |v| Value::Int(v),
	u32 => |v| Value::Int(v.into()),
	f64 => |v| Value::Float(v),
	&str => |v| Value::Str(v.into()),
	String => |v| Value::Str(v.into()),
	Rc<str> => |v| Value::Str(v),
	Vec<Value> => |v| Value::List(v.into()),
	Props => |v| Value::Map(v),
	Handler => |v| Value::Handler(v),
	Ref => |v| Value::Ref(v),
	Child => |v| Value::Children(v),
	VNode => |v| Value::Children(Child::Node(v)),
}

impl From<usize> for Value {
	#[allow(clippy::cast_possible_wrap)]
	fn from(v: usize) -> Self {
		Self::Int(v as i64)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(v: Option<T>) -> Self {
		v.map_or(Self::Null, Into::into)
	}
}

/// An immutable-by-default bag of named [`Value`]s.
///
/// Cloning is cheap. Mutation copies the underlying map only if it is shared.
#[derive(Clone, Default)]
pub struct Props(Rc<HashMap<Rc<str>, Value>>);

/// Component state uses the same representation as props.
pub type State = Props;

impl Props {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with(mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
		self.insert(name, value);
		self
	}

	/// Sets the reserved `key` entry, which [`create_element`](`crate::create_element`) moves onto the [`VNode`].
	#[must_use]
	pub fn key(self, key: impl Into<Key>) -> Self {
		self.with("key", Value::from(key.into()))
	}

	/// Sets the reserved `ref` entry, which [`create_element`](`crate::create_element`) moves onto the [`VNode`].
	#[must_use]
	pub fn r#ref(self, r: Ref) -> Self {
		self.with("ref", r)
	}

	/// Registers an event handler as `on_{event}`.
	#[must_use]
	pub fn on(self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
		self.with(format!("on_{}", event), Handler::new(handler))
	}

	pub fn insert(&mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Option<Value> {
		Rc::make_mut(&mut self.0).insert(name.into(), value.into())
	}

	pub fn remove(&mut self, name: &str) -> Option<Value> {
		if self.0.contains_key(name) {
			Rc::make_mut(&mut self.0).remove(name)
		} else {
			None
		}
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.0.get(name)
	}

	#[must_use]
	pub fn contains(&self, name: &str) -> bool {
		self.0.contains_key(name)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.0.iter().map(|(name, value)| (&**name, value))
	}

	/// Shallow merge. Entries in `other` win.
	pub fn merge(&mut self, other: &Props) {
		if other.is_empty() {
			return;
		}
		let map = Rc::make_mut(&mut self.0);
		for (name, value) in other.0.iter() {
			map.insert(name.clone(), value.clone());
		}
	}

	#[must_use]
	pub fn merged(&self, other: &Props) -> Self {
		let mut merged = self.clone();
		merged.merge(other);
		merged
	}

	/// The `children` entry, as [`Child`].
	#[must_use]
	pub fn children(&self) -> Child {
		self.get("children").map_or(Child::Empty, Child::from_value)
	}

	pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl PartialEq for Props {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other) || *self.0 == *other.0
	}
}

impl Debug for Props {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut entries: Vec<_> = self.iter().collect();
		entries.sort_unstable_by_key(|(name, _)| *name);
		f.debug_map().entries(entries).finish()
	}
}

/// An event passed to [`Handler`]s.
#[derive(Clone)]
pub struct Event {
	name: Rc<str>,
	target: Option<NodeId>,
	native: Option<Rc<dyn Any>>,
}

impl Event {
	pub fn new(name: impl Into<Rc<str>>, target: Option<NodeId>) -> Self {
		Self {
			name: name.into(),
			target,
			native: None,
		}
	}

	/// Attaches the host's own event object.
	#[must_use]
	pub fn with_native(self, native: Rc<dyn Any>) -> Self {
		Self {
			native: Some(native),
			..self
		}
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn target(&self) -> Option<NodeId> {
		self.target
	}

	#[must_use]
	pub fn native<T: Any>(&self) -> Option<&T> {
		self.native.as_ref()?.downcast_ref()
	}
}

impl Debug for Event {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Event")
			.field("name", &self.name)
			.field("target", &self.target)
			.finish()
	}
}

/// An event listener. Equality is identity.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&Event)>);

impl Handler {
	pub fn new(handler: impl Fn(&Event) + 'static) -> Self {
		Self(Rc::new(handler))
	}

	pub fn call(&self, event: &Event) {
		(self.0)(event);
	}
}

impl PartialEq for Handler {
	fn eq(&self, other: &Self) -> bool {
		Rc::as_ptr(&self.0).cast::<()>() == Rc::as_ptr(&other.0).cast::<()>()
	}
}

impl Debug for Handler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "Handler({:p})", Rc::as_ptr(&self.0).cast::<()>())
	}
}

/// What a [`Ref`] points at while attached.
#[derive(Clone, Debug)]
pub enum RefValue {
	Node(NodeId),
	Component(Instance),
}

impl PartialEq for RefValue {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Node(a), Self::Node(b)) => a == b,
			(Self::Component(a), Self::Component(b)) => a.ptr_eq(b),
			_ => false,
		}
	}
}

type RefCallback = dyn Fn(Option<RefValue>) -> Result<(), Error>;

/// A handle that receives the host node or component instance of a [`VNode`] on attach,
/// and [`None`] on detach.
///
/// Equality is identity.
#[derive(Clone)]
pub enum Ref {
	Callback(Rc<RefCallback>),
	Cell(Rc<RefCell<Option<RefValue>>>),
}

impl Ref {
	pub fn callback(callback: impl Fn(Option<RefValue>) -> Result<(), Error> + 'static) -> Self {
		Self::Callback(Rc::new(callback))
	}

	/// A fresh, empty holder.
	#[must_use]
	pub fn cell() -> Self {
		Self::Cell(Rc::default())
	}

	/// The current value of a holder. Always [`None`] for callbacks.
	#[must_use]
	pub fn current(&self) -> Option<RefValue> {
		match self {
			Self::Callback(_) => None,
			Self::Cell(cell) => cell.borrow().clone(),
		}
	}

	pub(crate) fn apply(&self, value: Option<RefValue>) -> Result<(), Error> {
		match self {
			Self::Callback(callback) => callback(value),
			Self::Cell(cell) => {
				*cell.borrow_mut() = value;
				Ok(())
			}
		}
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Callback(a), Self::Callback(b)) => {
				Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
			}
			(Self::Cell(a), Self::Cell(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}
}

impl PartialEq for Ref {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}

impl Debug for Ref {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Callback(callback) => {
				write!(f, "Ref::Callback({:p})", Rc::as_ptr(callback).cast::<()>())
			}
			Self::Cell(cell) => f.debug_tuple("Ref::Cell").field(&cell.borrow()).finish(),
		}
	}
}

/// The kind of value a declared prop must hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
	Null,
	Bool,
	Int,
	Float,
	/// [`ValueKind::Int`] or [`ValueKind::Float`].
	Number,
	Str,
	List,
	Map,
	Handler,
	Ref,
	Children,
	Any,
}

impl ValueKind {
	#[must_use]
	pub fn matches(self, value: &Value) -> bool {
		let actual = value.kind();
		actual == self || (self == Self::Number && matches!(actual, Self::Int | Self::Float))
	}
}

/// Declaration of a single prop.
#[derive(Clone, Debug)]
pub struct PropDecl {
	required: bool,
	kind: Option<ValueKind>,
	default: Option<Value>,
}

impl PropDecl {
	#[must_use]
	pub fn required() -> Self {
		Self {
			required: true,
			kind: None,
			default: None,
		}
	}

	#[must_use]
	pub fn optional() -> Self {
		Self {
			required: false,
			kind: None,
			default: None,
		}
	}

	#[must_use]
	pub fn of(self, kind: ValueKind) -> Self {
		Self {
			kind: Some(kind),
			..self
		}
	}

	/// A default implies [`PropDecl::optional`].
	#[must_use]
	pub fn default_value(self, default: impl Into<Value>) -> Self {
		Self {
			required: false,
			default: Some(default.into()),
			..self
		}
	}
}

/// Prop declarations of a component type, checked before each render.
#[derive(Clone, Debug, Default)]
pub struct PropTypes(Vec<(Rc<str>, PropDecl)>);

impl PropTypes {
	pub fn declare(&mut self, name: impl Into<Rc<str>>, decl: PropDecl) {
		let name = name.into();
		self.0.retain(|(existing, _)| *existing != name);
		self.0.push((name, decl));
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Fills in declared defaults for absent props.
	#[must_use]
	pub fn apply_defaults(&self, props: &Props) -> Props {
		let mut props = props.clone();
		for (name, decl) in &self.0 {
			if let Some(default) = &decl.default {
				if !props.contains(name) {
					props.insert(name.clone(), default.clone());
				}
			}
		}
		props
	}

	/// # Errors
	///
	/// [`Error::InvalidProps`] naming the first offending prop.
	pub fn validate(&self, component: &str, props: &Props) -> Result<(), Error> {
		let invalid = |message: String| Error::InvalidProps {
			component: component.into(),
			message: message.into(),
		};
		for (name, decl) in &self.0 {
			match props.get(name) {
				None | Some(Value::Null) if decl.required => {
					return Err(invalid(format!("required prop `{}` not given", name)))
				}
				None | Some(Value::Null) => (),
				Some(value) => {
					if let Some(kind) = decl.kind {
						if !kind.matches(value) {
							return Err(invalid(format!(
								"prop `{}` must be {:?}, but is {:?}",
								name,
								kind,
								value.kind()
							)));
						}
					}
				}
			}
		}
		Ok(())
	}
}
