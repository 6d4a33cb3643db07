use isodom::{create_element, h, Host, Props, Ref, RefValue, Value};

mod memory_probe_;
use memory_probe_::{drain, instance, log, probe, setup, Log};

fn logging_ref(log: &Log, name: &'static str) -> Ref {
	let log = log.clone();
	Ref::callback(move |value| {
		let event = match value {
			Some(RefValue::Node(_)) => "node",
			Some(RefValue::Component(_)) => "component",
			None => "detach",
		};
		log.borrow_mut().push(format!("{} {}", name, event));
		Ok(())
	})
}

#[test]
fn cells_follow_the_node() {
	let r#ref = Ref::cell();
	let (mut r, root) = setup();

	r.render(h("input", Props::new().r#ref(r#ref.clone()), ()), root).unwrap();
	let input = r.host().first_child(root).unwrap();
	assert_eq!(r#ref.current(), Some(RefValue::Node(input)));

	r.render(h("input", Props::new().r#ref(r#ref.clone()).with("value", "x"), ()), root).unwrap();
	assert_eq!(r#ref.current(), Some(RefValue::Node(input)));

	r.render(h("p", Props::new(), ()), root).unwrap();
	assert_eq!(r#ref.current(), None);
}

#[test]
fn swapped_refs_detach_first() {
	let log = log();
	let (mut r, root) = setup();

	r.render(h("div", Props::new().r#ref(logging_ref(&log, "1")), ()), root).unwrap();
	assert_eq!(drain(&log), ["1 node"]);

	let second = logging_ref(&log, "2");
	r.render(h("div", Props::new().r#ref(second.clone()), ()), root).unwrap();
	assert_eq!(drain(&log), ["1 detach", "2 node"]);

	// Same ref, nothing to do.
	r.render(h("div", Props::new().r#ref(second).with("title", "t"), ()), root).unwrap();
	assert!(drain(&log).is_empty());
}

#[test]
fn dropped_refs_detach() {
	let log = log();
	let cell = Ref::cell();
	let (mut r, root) = setup();

	r.render(
		h("div", Props::new(), vec![h("input", Props::new().r#ref(cell.clone()), ()), h("i", Props::new().r#ref(logging_ref(&log, "i")), ())]),
		root,
	)
	.unwrap();
	assert!(cell.current().is_some());
	drain(&log);

	r.render(h("div", Props::new(), vec![h("input", Props::new(), ()), h("i", Props::new(), ())]), root).unwrap();
	assert_eq!(cell.current(), None);
	assert_eq!(drain(&log), ["i detach"]);
	assert_eq!(r.host().inner_html(root), "<div><input /><i></i></div>");
}

#[test]
fn unmounted_siblings_detach_before_new_refs_attach() {
	let log = log();
	let (mut r, root) = setup();

	r.render(h("ul", Props::new(), h("li", Props::new().key("a").r#ref(logging_ref(&log, "a")), ())), root).unwrap();
	drain(&log);

	r.render(h("ul", Props::new(), h("li", Props::new().key("b").r#ref(logging_ref(&log, "b")), ())), root).unwrap();
	assert_eq!(drain(&log), ["a detach", "b node"]);
}

#[test]
fn component_refs_hold_the_instance() {
	let log = log();
	let r#ref = Ref::cell();
	let widget = probe("Widget", &log, |_| Ok(h("span", Props::new(), "w").into()));
	let (mut r, root) = setup();

	r.render(create_element(&widget, Props::new().r#ref(r#ref.clone()).with("size", 3), ()), root).unwrap();
	let widget = instance(&r#ref);
	assert_eq!(widget.name(), "Widget");
	assert_eq!(widget.props().get("size"), Some(&Value::Int(3)));
	assert_eq!(widget.base(), r.host().first_child(root));

	r.unmount(root).unwrap();
	assert!(r#ref.current().is_none());
}
