#![doc(html_root_url = "https://docs.rs/isodom/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! A virtual DOM reconciler with stateful components, lifecycle hooks, context and hydration.
//!
//! Trees of [`VNode`]s are rendered into a [`Host`] by a [`Renderer`], which diffs each new tree
//! against the previous one and applies the minimal set of host mutations.
//! [`MemoryDom`] renders in memory (see [`render_to_string`]), [`web::WebDom`] into a browser document.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod buffer;
pub mod component;
pub mod context;
mod diff;
pub mod error;
pub mod host;
pub mod memory;
pub mod props;
pub mod registry;
pub mod renderer;
pub mod scheduler;
pub mod vnode;
pub mod web;

pub use crate::{
	buffer::ChildBuffer,
	component::{Component, ComponentType, ErrorBoundary, Instance, Phase},
	context::Context,
	error::Error,
	host::{Host, NodeId},
	memory::MemoryDom,
	props::{Event, Handler, Key, PropDecl, Props, Ref, RefValue, State, Value, ValueKind},
	registry::Registry,
	renderer::{render_to_string, Options, Renderer},
	vnode::{clone_element, create_element, fragment, h, text, Child, NodeType, VNode},
};
