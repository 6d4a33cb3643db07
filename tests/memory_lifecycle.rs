use isodom::Host;
use isodom::{create_element, h, Child, Component, ComponentType, Error, Instance, Phase, Props, Ref, State, Value};
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};

mod memory_probe_;
use memory_probe_::{drain, instance, log, probe, setup};

#[test]
fn mount_update_unmount_order() {
	let log = log();
	let child = probe("Child", &log, |this| Ok(this.props().children()));
	let parent = {
		let child = child.clone();
		probe("Parent", &log, move |this| Ok(h("div", Props::new(), create_element(&child, Props::new(), this.props().children())).into()))
	};
	let (mut r, root) = setup();

	r.render(create_element(&parent, Props::new(), "x"), root).unwrap();
	assert_eq!(drain(&log), ["Parent render", "Child render", "Child did_mount", "Parent did_mount"]);
	assert_eq!(r.host().inner_html(root), "<div>x</div>");

	r.render(create_element(&parent, Props::new(), "y"), root).unwrap();
	assert_eq!(drain(&log), ["Parent render", "Child render", "Child did_update", "Parent did_update"]);
	assert_eq!(r.host().inner_html(root), "<div>y</div>");

	r.unmount(root).unwrap();
	assert_eq!(drain(&log), ["Parent will_unmount", "Child will_unmount"]);
	assert_eq!(r.host().inner_html(root), "");
}

struct Counter {
	renders: Rc<Cell<usize>>,
}

impl Component for Counter {
	fn render(&self, this: &Instance) -> Result<Child, Error> {
		self.renders.set(self.renders.get() + 1);
		let state = this.state();
		let get = |name: &str| state.get(name).and_then(Value::as_int).unwrap_or(0);
		Ok(format!("{}-{}", get("a"), get("b")).into())
	}
}

fn counter(renders: &Rc<Cell<usize>>) -> ComponentType {
	let renders = renders.clone();
	ComponentType::new("Counter", move |_: &Props, _: &Value| Counter { renders: renders.clone() })
}

#[test]
fn state_updates_merge_into_one_render() {
	let renders = Rc::default();
	let counter = counter(&renders);
	let r#ref = Ref::cell();
	let scheduled = Rc::new(Cell::new(0));
	let (mut r, root) = setup();
	{
		let scheduled = scheduled.clone();
		r.queue().set_schedule(move || scheduled.set(scheduled.get() + 1));
	}

	r.render(create_element(&counter, Props::new().r#ref(r#ref.clone()), ()), root).unwrap();
	assert_eq!(renders.get(), 1);
	let counter = instance(&r#ref);
	assert_eq!(counter.phase(), Phase::Mounted);

	counter.set_state(State::new().with("a", 1));
	counter.set_state(State::new().with("b", 2));
	assert_eq!(scheduled.get(), 1);
	assert_eq!(r.queue().len(), 1);
	assert!(counter.is_dirty());
	assert_eq!(r.host().inner_html(root), "0-0");

	r.process().unwrap();
	assert_eq!(renders.get(), 2);
	assert!(!counter.is_dirty());
	assert_eq!(r.host().inner_html(root), "1-2");

	counter.update_state(|state, _| Some(State::new().with("a", state.get("a").and_then(Value::as_int).unwrap_or(0) + 1)));
	assert_eq!(scheduled.get(), 2);
	r.process().unwrap();
	assert_eq!(r.host().inner_html(root), "2-2");
}

#[test]
fn cancelled_and_detached_updates_are_dropped() {
	let renders = Rc::default();
	let counter = counter(&renders);
	let r#ref = Ref::cell();
	let (mut r, root) = setup();

	r.render(create_element(&counter, Props::new().r#ref(r#ref.clone()), ()), root).unwrap();
	let counter = instance(&r#ref);

	counter.update_state(|_, _| None);
	assert!(r.queue().is_empty());

	r.unmount(root).unwrap();
	assert!(r#ref.current().is_none());
	assert_eq!(counter.phase(), Phase::Unmounted);

	counter.set_state(State::new().with("a", 1));
	counter.force_update();
	assert!(r.queue().is_empty());
	r.process().unwrap();
	assert_eq!(renders.get(), 1);
}

#[test]
fn set_state_then_runs_after_commit() {
	let renders = Rc::default();
	let counter = counter(&renders);
	let r#ref = Ref::cell();
	let (mut r, root) = setup();
	r.render(create_element(&counter, Props::new().r#ref(r#ref.clone()), ()), root).unwrap();

	let seen = Rc::new(RefCell::new(None));
	{
		let seen = seen.clone();
		instance(&r#ref).set_state_then(State::new().with("b", 5), move |this| {
			*seen.borrow_mut() = this.state().get("b").cloned();
			Ok(())
		});
	}
	assert!(seen.borrow().is_none());
	r.process().unwrap();
	assert_eq!(*seen.borrow(), Some(Value::Int(5)));
	assert_eq!(r.host().inner_html(root), "0-5");
}

#[test]
fn should_update_false_commits_without_rendering() {
	let log = log();
	let frozen = probe("Frozen", &log, |this| Ok(this.props().get("label").and_then(Value::as_str).unwrap_or_default().to_owned().into()));
	let r#ref = Ref::cell();
	let (mut r, root) = setup();

	r.render(create_element(&frozen, Props::new().r#ref(r#ref.clone()).with("label", "a"), ()), root).unwrap();
	drain(&log);

	instance(&r#ref).set_state(State::new().with("seen", 1));
	r.render(create_element(&frozen, Props::new().r#ref(r#ref.clone()).with("label", "b").with("frozen", true), ()), root).unwrap();
	assert!(drain(&log).is_empty());
	assert_eq!(r.host().inner_html(root), "a");
	let frozen = instance(&r#ref);
	assert_eq!(frozen.props().get("label"), Some(&Value::from("b")));
	assert_eq!(frozen.state().get("seen"), Some(&Value::Int(1)));
	assert!(!frozen.is_dirty());

	// Forced updates skip `should_update`.
	frozen.force_update();
	r.process().unwrap();
	assert_eq!(drain(&log), ["Frozen render", "Frozen did_update"]);
	assert_eq!(r.host().inner_html(root), "b");
}

#[test]
fn identical_vnodes_skip_rendering() {
	let log = log();
	let child = probe("Child", &log, |_| Ok(h("b", Props::new(), "memo").into()));
	let memo = create_element(&child, Props::new(), ());
	let parent_ref = Ref::cell();
	let parent = {
		let memo = memo.clone();
		probe("Parent", &log, move |_| Ok(h("div", Props::new(), memo.clone()).into()))
	};
	let (mut r, root) = setup();
	r.render(create_element(&parent, Props::new().r#ref(parent_ref.clone()), ()), root).unwrap();
	assert_eq!(r.host().inner_html(root), "<div><b>memo</b></div>");
	drain(&log);
	r.host_mut().take_mutations();

	// `Child` would accept the update, but it is handed the node it rendered last time.
	instance(&parent_ref).force_update();
	r.process().unwrap();
	assert_eq!(drain(&log), ["Parent render", "Parent did_update"]);
	assert!(r.host().mutations().is_empty(), "{:?}", r.host().mutations());

	let (mut r, root) = setup();
	r.render(memo.clone(), root).unwrap();
	drain(&log);
	r.host_mut().take_mutations();
	r.render(memo, root).unwrap();
	assert!(drain(&log).is_empty());
	assert!(r.host().mutations().is_empty(), "{:?}", r.host().mutations());
}

#[test]
fn failed_processing_keeps_the_rest_queued() {
	let log = log();
	let a_ref = Ref::cell();
	let b_ref = Ref::cell();
	let a = probe("A", &log, |this| {
		if this.state().contains("explode") {
			Err(Error::thrown("exploded"))
		} else {
			Ok("a".into())
		}
	});
	let b = probe("B", &log, |this| Ok(this.state().get("n").and_then(Value::as_int).unwrap_or(0).into()));
	let (mut r, root) = setup();
	r.render(
		h(
			"div",
			Props::new(),
			vec![
				Child::from(create_element(&a, Props::new().r#ref(a_ref.clone()), ())),
				h("p", Props::new(), create_element(&b, Props::new().r#ref(b_ref.clone()), ())).into(),
			],
		),
		root,
	)
	.unwrap();
	assert_eq!(r.host().inner_html(root), "<div>a<p>0</p></div>");
	drain(&log);

	let b = instance(&b_ref);
	instance(&a_ref).set_state(State::new().with("explode", true));
	b.set_state(State::new().with("n", 1));
	assert!(matches!(r.process(), Err(Error::Thrown(_))));
	assert_eq!(drain(&log), ["A render"]);
	assert_eq!(r.queue().len(), 1);

	b.set_state(State::new().with("n", 2));
	r.process().unwrap();
	assert_eq!(drain(&log), ["B render", "B did_update"]);
	assert_eq!(r.host().inner_html(root), "<div>a<p>2</p></div>");
}

#[test]
fn queue_renders_shallowest_first() {
	let log = log();
	let inner_ref = Ref::cell();
	let outer_ref = Ref::cell();
	let inner = probe("Inner", &log, |_| Ok("inner".into()));
	let outer = {
		let inner = inner.clone();
		let inner_ref = inner_ref.clone();
		probe("Outer", &log, move |_| Ok(h("section", Props::new(), create_element(&inner, Props::new().r#ref(inner_ref.clone()), ())).into()))
	};
	let (mut r, root) = setup();
	r.render(create_element(&outer, Props::new().r#ref(outer_ref.clone()), ()), root).unwrap();
	drain(&log);

	instance(&inner_ref).force_update();
	instance(&outer_ref).force_update();
	r.process().unwrap();

	// The outer re-render already covers the inner component.
	assert_eq!(drain(&log), ["Outer render", "Inner render", "Inner did_update", "Outer did_update"]);
}

#[test]
fn unmounting_preempts_queued_render() {
	let log = log();
	let child_ref = Ref::cell();
	let child = probe("Child", &log, |_| Ok("child".into()));
	let parent_ref = Ref::cell();
	let parent = {
		let child = child.clone();
		let child_ref = child_ref.clone();
		probe("Parent", &log, move |this| {
			Ok(if this.state().get("hidden").is_some() {
				Child::Empty
			} else {
				create_element(&child, Props::new().r#ref(child_ref.clone()), ()).into()
			})
		})
	};
	let (mut r, root) = setup();
	r.render(create_element(&parent, Props::new().r#ref(parent_ref.clone()), ()), root).unwrap();
	drain(&log);

	instance(&child_ref).force_update();
	instance(&parent_ref).set_state(State::new().with("hidden", true));
	r.process().unwrap();

	assert_eq!(drain(&log), ["Parent render", "Child will_unmount", "Parent did_update"]);
	assert_eq!(r.host().inner_html(root), "");
}

struct Mirror;

impl Component for Mirror {
	fn render(&self, this: &Instance) -> Result<Child, Error> {
		Ok(match this.state().get("seen") {
			Some(Value::Int(int)) => Child::Int(*int),
			Some(Value::Str(str)) => Child::Text(str.clone()),
			_ => Child::Empty,
		})
	}

	fn derived_state_from_props(&self, props: &Props, _: &State) -> Option<State> {
		props.get("value").map(|value| State::new().with("seen", value.clone()))
	}
}

#[test]
fn derived_state_is_merged_before_render() {
	let mirror = ComponentType::new("Mirror", |_: &Props, _: &Value| Mirror);
	let (mut r, root) = setup();
	r.render(create_element(&mirror, Props::new().with("value", 1), ()), root).unwrap();
	assert_eq!(r.host().inner_html(root), "1");
	r.render(create_element(&mirror, Props::new().with("value", "two"), ()), root).unwrap();
	assert_eq!(r.host().inner_html(root), "two");
}

struct Snapshotting {
	log: Rc<RefCell<Vec<(i64, i64)>>>,
}

impl Component for Snapshotting {
	fn render(&self, this: &Instance) -> Result<Child, Error> {
		Ok(this.props().get("n").and_then(Value::as_int).unwrap_or(0).into())
	}

	fn snapshot_before_update(&self, _: &Instance, prev_props: &Props, _: &State) -> Option<Value> {
		prev_props.get("n").cloned()
	}

	fn did_update(&self, this: &Instance, prev_props: &Props, _: &State, snapshot: Option<&Value>) -> Result<(), Error> {
		assert_eq!(snapshot, prev_props.get("n"));
		let now = this.props().get("n").and_then(Value::as_int).unwrap_or(0);
		self.log.borrow_mut().push((snapshot.and_then(Value::as_int).unwrap_or(-1), now));
		Ok(())
	}
}

#[test]
fn did_update_receives_snapshot_of_previous_props() {
	let updates = Rc::new(RefCell::new(Vec::new()));
	let snapshotting = {
		let updates = updates.clone();
		ComponentType::new("Snapshotting", move |_: &Props, _: &Value| Snapshotting { log: updates.clone() })
	};
	let (mut r, root) = setup();
	for n in 1..=3 {
		r.render(create_element(&snapshotting, Props::new().with("n", n), ()), root).unwrap();
	}
	assert_eq!(*updates.borrow(), vec![(1, 2), (2, 3)]);
	assert_eq!(r.host().inner_html(root), "3");
}
