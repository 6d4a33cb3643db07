#![cfg(target_arch = "wasm32")]

use isodom::{h, Event, Props};
use std::{cell::RefCell, rc::Rc};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, HtmlElement};

use web_container_::container;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn click() {
	let (mut r, root, _container) = container();
	let click_count = Rc::new(RefCell::new(0));

	let button = {
		let click_count = click_count.clone();
		h(
			"button",
			Props::new().with("id", "test-button").on("click", move |event| {
				event.native::<web_sys::Event>().expect("Expected Event but received something else.");
				*click_count.borrow_mut() += 1;
			}),
			(),
		)
	};

	assert_eq!(*click_count.borrow(), 0);
	r.render(button, root).unwrap();
	assert_eq!(*click_count.borrow(), 0);

	let button: HtmlElement = window().unwrap().document().unwrap().get_element_by_id("test-button").unwrap().dyn_into().unwrap();
	button.click();
	assert_eq!(*click_count.borrow(), 1);

	r.unmount(root).unwrap();
	button.click();
	assert_eq!(*click_count.borrow(), 1);
}

#[wasm_bindgen_test]
fn capture_runs_first() {
	let (mut r, root, _container) = container();
	let order = Rc::new(RefCell::new(Vec::new()));
	let logger = |label: &'static str| {
		let order = order.clone();
		move |_: &Event| order.borrow_mut().push(label)
	};

	r.render(
		h(
			"div",
			Props::new().on("click", logger("outer bubble")).on("click_capture", logger("outer capture")),
			h("span", Props::new().with("id", "capture-target").on("click", logger("inner")), "x"),
		),
		root,
	)
	.unwrap();

	let span: HtmlElement = window().unwrap().document().unwrap().get_element_by_id("capture-target").unwrap().dyn_into().unwrap();
	span.click();
	assert_eq!(*order.borrow(), vec!["outer capture", "inner", "outer bubble"]);
}
