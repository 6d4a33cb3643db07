use isodom::{fragment, h, memory::Mutation, Handler, Host, MemoryDom, Props, Renderer, VNode};
use std::{cell::Cell, rc::Rc};

mod memory_probe_;
use memory_probe_::setup;

fn app(handler: Option<&Handler>) -> VNode {
	let button = match handler {
		Some(handler) => Props::new().with("on_click", handler.clone()),
		None => Props::new(),
	};
	h(
		"div",
		Props::new().with("id", "app"),
		vec![h("button", button, "go"), h("span", Props::new().with("class_name", "tail"), "tail")],
	)
}

/// Renders `tree` the way a server would and hands over the resulting document.
fn server_markup(tree: VNode) -> Renderer<MemoryDom> {
	let (mut server, root) = setup();
	server.render(tree, root).unwrap();
	let mut host = server.into_host();
	host.take_mutations();
	Renderer::new(host)
}

#[test]
fn hydration_only_attaches_listeners() {
	let clicks = Rc::new(Cell::new(0));
	let handler = {
		let clicks = clicks.clone();
		Handler::new(move |_| clicks.set(clicks.get() + 1))
	};
	let mut r = server_markup(app(None));
	let root = r.host().root();
	let html = r.host().inner_html(root);
	let button = r.host().find("button").unwrap();

	r.hydrate(app(Some(&handler)), root).unwrap();
	assert_eq!(r.host_mut().take_mutations(), vec![Mutation::SetProperty(button, "on_click".to_owned())]);
	assert_eq!(r.host().inner_html(root), html);
	assert_eq!(r.host().find("button"), Some(button));

	assert_eq!(r.host().dispatch(button, "click"), 1);
	assert_eq!(clicks.get(), 1);

	r.render(app(Some(&handler)), root).unwrap();
	assert!(r.host().mutations().is_empty(), "{:?}", r.host().mutations());
}

#[test]
fn split_text_gets_its_own_node() {
	let mut r = server_markup(h("p", Props::new(), "ab"));
	let root = r.host().root();

	r.hydrate(h("p", Props::new(), vec!["a", "b"]), root).unwrap();
	let p = r.host().first_child(root).unwrap();
	assert_eq!(r.host().child_nodes(p).len(), 2);
	assert_eq!(r.host().inner_html(root), "<p>ab</p>");
}

#[test]
fn differing_text_is_corrected() {
	let mut r = server_markup(h("p", Props::new(), "server"));
	let root = r.host().root();

	r.hydrate(h("p", Props::new(), "client"), root).unwrap();
	let p = r.host().first_child(root).unwrap();
	let text = r.host().first_child(p).unwrap();
	assert_eq!(r.host_mut().take_mutations(), vec![Mutation::SetText(text)]);
	assert_eq!(r.host().inner_html(root), "<p>client</p>");
}

#[test]
fn unmatched_markup_is_removed() {
	let mut r = server_markup(fragment(vec![
		h("div", Props::new(), vec![h("span", Props::new(), "x"), h("em", Props::new(), "y")]),
		h("p", Props::new(), "stray"),
	]));
	let root = r.host().root();

	r.hydrate(h("div", Props::new(), h("em", Props::new(), "y")), root).unwrap();
	assert_eq!(r.host().inner_html(root), "<div><em>y</em></div>");
}

#[test]
fn first_render_adopts_existing_markup() {
	let mut r = server_markup(h("div", Props::new().with("class", "old").with("title", "gone"), "x"));
	let root = r.host().root();
	let div = r.host().first_child(root).unwrap();

	r.render(h("div", Props::new().with("class", "new"), "x"), root).unwrap();
	assert_eq!(r.host().first_child(root), Some(div));
	assert_eq!(r.host().inner_html(root), r#"<div class="new">x</div>"#);
}
