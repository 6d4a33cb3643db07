use std::{error::Error as StdError, rc::Rc};
use thiserror::Error;

/// Everything that can go wrong during a render pass.
///
/// Errors are [`Clone`] so that they can be offered to several error boundaries in turn
/// while walking up the component tree.
#[derive(Debug, Clone, Error)]
pub enum Error {
	/// An error raised by application code (a render method, lifecycle hook or ref callback).
	#[error("{0}")]
	Thrown(Rc<str>),

	/// An application error with an underlying source.
	#[error("{0}")]
	Custom(Rc<dyn StdError>),

	/// A required prop is missing or a declared prop has the wrong kind of value.
	///
	/// This is never offered to error boundaries.
	#[error("invalid props for `{component}`: {message}")]
	InvalidProps { component: Rc<str>, message: Rc<str> },

	/// The host refused to create an element with this name.
	#[error("`{0}` is not a valid element name")]
	InvalidTag(Rc<str>),

	#[error("no component registered as `{0}`")]
	UnknownComponent(Rc<str>),

	/// The tree was nested more deeply than [`Options::depth_limit`](`crate::Options::depth_limit`).
	#[error("depth limit ({0}) reached")]
	DepthLimit(usize),

	#[error("host operation failed: {0}")]
	Host(Rc<str>),
}

impl Error {
	pub fn thrown(message: impl Into<Rc<str>>) -> Self {
		Self::Thrown(message.into())
	}

	pub fn custom(error: impl StdError + 'static) -> Self {
		Self::Custom(Rc::new(error))
	}

	/// Whether error boundaries may absorb this error.
	///
	/// Prop validation failures and depth limit violations always abort the pass.
	#[must_use]
	pub fn is_recoverable(&self) -> bool {
		!matches!(self, Self::InvalidProps { .. } | Self::DepthLimit(_))
	}
}
