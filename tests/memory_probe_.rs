#![allow(dead_code)]

use isodom::{Child, Component, ComponentType, Error, Instance, MemoryDom, NodeId, Props, Ref, RefValue, Renderer, State, Value};
use std::{cell::RefCell, rc::Rc};

pub type Log = Rc<RefCell<Vec<String>>>;

pub fn setup() -> (Renderer<MemoryDom>, NodeId) {
	let renderer = Renderer::new(MemoryDom::new());
	let root = renderer.host().root();
	(renderer, root)
}

pub fn log() -> Log {
	Log::default()
}

/// Takes the entries logged so far.
pub fn drain(log: &Log) -> Vec<String> {
	log.replace(Vec::new())
}

pub fn instance(r: &Ref) -> Instance {
	match r.current() {
		Some(RefValue::Component(instance)) => instance,
		other => panic!("expected a component instance, found {:?}", other),
	}
}

type Render = Rc<dyn Fn(&Instance) -> Result<Child, Error>>;

/// Logs its lifecycle and renders through a closure.
///
/// Skips updates while its incoming props contain `frozen: true`.
pub struct Probe {
	name: &'static str,
	log: Log,
	render: Render,
}

pub fn probe(name: &'static str, log: &Log, render: impl Fn(&Instance) -> Result<Child, Error> + 'static) -> ComponentType {
	let log = log.clone();
	let render: Render = Rc::new(render);
	ComponentType::new(name, move |_: &Props, _: &Value| Probe {
		name,
		log: log.clone(),
		render: render.clone(),
	})
}

impl Probe {
	fn push(&self, event: &str) {
		self.log.borrow_mut().push(format!("{} {}", self.name, event));
	}
}

impl Component for Probe {
	fn render(&self, this: &Instance) -> Result<Child, Error> {
		self.push("render");
		(self.render)(this)
	}

	fn should_update(&self, _: &Instance, next_props: &Props, _: &State, _: &Value) -> bool {
		next_props.get("frozen") != Some(&Value::Bool(true))
	}

	fn did_mount(&self, _: &Instance) -> Result<(), Error> {
		self.push("did_mount");
		Ok(())
	}

	fn did_update(&self, _: &Instance, _: &Props, _: &State, _: Option<&Value>) -> Result<(), Error> {
		self.push("did_update");
		Ok(())
	}

	fn will_unmount(&self, _: &Instance) -> Result<(), Error> {
		self.push("will_unmount");
		Ok(())
	}
}
