use pretty_assertions::assert_eq;
use serde_json::json;
use stagehand::adapters::template;
use stagehand::testing::{render_document, Call, RecordingAdapter};
use stagehand::{
    from_fn, Composition, CompositionOutcome, Director, DirectorConfig, DirectorOptions, Document,
    Error, Markup, MiddlewareError, RenderOutcome, Request, StaticViewOptions, SubViewOptions,
    Template, ViewOptions, ViewOwner,
};
use std::rc::Rc;
use tracing_test::traced_test;

fn document() -> Document {
    let document = Document::new();
    let body = document.body();
    body.append_markup(&Markup::element("header").id("top"));
    body.append_markup(&Markup::element("main").id("main"));
    document
}

fn recorded(name: &str) -> ViewOptions {
    ViewOptions::new(name)
        .template(Template::new(()))
        .holder("#main")
        .adapter("recording")
}

fn director_with(options: DirectorOptions) -> (Director, Rc<RecordingAdapter>) {
    let adapter = RecordingAdapter::new("recording");
    let director = stagehand::director_with_builtins(options.adapter(adapter.clone())).unwrap();
    (director, adapter)
}

#[tokio::test]
async fn current_view_renders_with_given_data() {
    let (director, adapter) = director_with(DirectorOptions::new(document()).view(recorded("home")));

    let outcome = director.set_current_view("home", json!({"x": 1})).await.unwrap();

    assert_eq!(outcome, RenderOutcome::Rendered);
    assert_eq!(
        adapter.calls(),
        vec![Call::Render {
            view: "home".into(),
            data: json!({"x": 1}),
            had_existing: false,
        }]
    );
    let view = director.current_view().unwrap();
    let main = director.document().query_selector("#main").unwrap().unwrap();
    assert_eq!(main.children(), vec![view.element().unwrap()]);
}

#[tokio::test]
async fn declared_sub_view_renders_into_parent_slot() {
    let parent = ViewOptions::new("page")
        .template(Template::new(
            Markup::element("article").child(Markup::element("div").class("slot")),
        ))
        .holder("#main")
        .adapter("recording")
        .sub_view(SubViewOptions::new("child", "widget", ".slot"));
    let (director, _) = director_with(
        DirectorOptions::new(document())
            .view(parent)
            .view(recorded("widget")),
    );

    director.set_current_view("page", json!({})).await.unwrap();

    let page = director.current_view().unwrap();
    let child = page.sub_view("child").unwrap();
    let slot = page.element().unwrap().query_selector(".slot").unwrap().unwrap();
    assert!(slot.contains(&child.element().unwrap()));
    assert_eq!(child.holder(), Some(slot));
}

#[tokio::test]
async fn switching_hides_previous_view_first() {
    let (director, _) = director_with(
        DirectorOptions::new(document())
            .view(recorded("a"))
            .view(
                recorded("b").data(from_fn(|req: Request| async move { Ok(req.into_data()) })),
            ),
    );
    director.set_current_view("a", json!({})).await.unwrap();
    let a = director.current_view().unwrap();

    let switching = director.set_current_view("b", json!({}));
    futures::pin_mut!(switching);
    assert!(futures::poll!(switching.as_mut()).is_ready());

    assert!(a.is_hidden());
    let b = director.current_view().unwrap();
    assert_eq!(b.name(), "b");
    assert!(!b.is_hidden());
}

#[tokio::test]
async fn previous_view_is_hidden_while_next_one_loads() {
    let (gate_tx, gate_rx) = futures::channel::oneshot::channel::<()>();
    let gate = Rc::new(std::cell::RefCell::new(Some(gate_rx)));
    let slow = recorded("b").data(from_fn(move |req: Request| {
        let gate = gate.borrow_mut().take();
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(req.into_data())
        }
    }));
    let (director, adapter) =
        director_with(DirectorOptions::new(document()).view(recorded("a")).view(slow));
    director.set_current_view("a", json!({})).await.unwrap();
    let a = director.current_view().unwrap();

    let switching = director.set_current_view("b", json!({}));
    futures::pin_mut!(switching);
    assert!(futures::poll!(switching.as_mut()).is_pending());

    assert!(a.is_hidden());
    assert_eq!(director.current_view().unwrap().name(), "b");
    assert_eq!(adapter.render_count(), 1);

    gate_tx.send(()).unwrap();
    assert_eq!(switching.await.unwrap(), RenderOutcome::Rendered);
    assert_eq!(adapter.render_count(), 2);
}

#[tokio::test]
async fn security_rejection_is_swallowed() {
    let (director, adapter) = director_with(
        DirectorOptions::new(document())
            .security(from_fn(|req: Request| async move {
                if req.data()["session"].is_null() {
                    return Err(MiddlewareError::new("login required"));
                }
                Ok(req.into_data())
            }))
            .view(recorded("account")),
    );

    let outcome = director.set_current_view("account", json!({})).await.unwrap();

    assert_eq!(outcome, RenderOutcome::Denied);
    let view = director.current_view().unwrap();
    assert!(view.element().is_none());
    assert_eq!(adapter.render_count(), 0);

    let outcome = director
        .set_current_view("account", json!({"session": {"user": "ada"}}))
        .await
        .unwrap();
    assert_eq!(outcome, RenderOutcome::Rendered);
    assert!(!view.is_hidden());
}

#[tokio::test]
#[traced_test]
async fn data_rejection_is_logged_with_view_name() {
    let (director, _) = director_with(DirectorOptions::new(document()).view(
        recorded("reports").data(from_fn(|_req: Request| async {
            Err(MiddlewareError::new("reports service unavailable"))
        })),
    ));

    let outcome = director.set_current_view("reports", json!({})).await.unwrap();

    assert_eq!(outcome, RenderOutcome::DataUnavailable);
    assert!(director.current_view().unwrap().element().is_none());
    assert!(logs_contain("data middleware failed"));
    assert!(logs_contain("reports"));
    assert!(logs_contain("reports service unavailable"));
}

#[tokio::test]
async fn static_views_render_concurrently_and_fail_soft() {
    let broken = ViewOptions::new("broken")
        .template(Template::new(()))
        .holder("#top")
        .adapter("template");
    let (director, _) = director_with(
        DirectorOptions::new(document())
            .view(recorded("nav"))
            .view(broken)
            .static_view(StaticViewOptions::new("nav", "nav").holder("#top"))
            .static_view(StaticViewOptions::new("broken", "broken")),
    );

    let err = director
        .set_static_views(["nav", "broken"], json!({}))
        .await
        .err();

    assert!(matches!(err, Some(Error::Adapter { .. })));
    let nav = director.static_view("nav").unwrap();
    assert!(nav.element().is_some());
    assert!(!nav.view().is_hidden());
    assert_eq!(director.current_static_views().len(), 2);
}

#[tokio::test]
async fn static_views_default_holder_comes_from_config() {
    let config = DirectorConfig::from_json(r##"{"static_view_defaults": {"holder": "#top"}}"##).unwrap();
    let (director, _) = director_with(
        DirectorOptions::new(document())
            .config(config)
            .view(ViewOptions::new("nav").template(Template::new(())).adapter("recording"))
            .static_view(StaticViewOptions::new("nav", "nav")),
    );

    director.set_static_views(["nav"], json!({})).await.unwrap();

    let top = director.document().query_selector("#top").unwrap().unwrap();
    let nav = director.static_view("nav").unwrap();
    assert_eq!(nav.element().unwrap().parent(), Some(top));
}

#[tokio::test]
async fn register_static_view_twice_fails() {
    let (director, _) = director_with(DirectorOptions::new(document()).view(recorded("nav")));
    director
        .register_static_view(StaticViewOptions::new("nav", "nav"))
        .unwrap();
    let err = director
        .register_static_view(StaticViewOptions::new("nav", "nav"))
        .err();
    assert!(matches!(err, Some(Error::DuplicateName { .. })));
}

#[tokio::test]
async fn compositions_switch_everything_together() {
    let (director, adapter) = director_with(
        DirectorOptions::new(document())
            .view(recorded("home"))
            .view(recorded("about"))
            .view(recorded("nav"))
            .static_view(StaticViewOptions::new("nav", "nav").holder("#top"))
            .composition(Composition::named("landing").view("home").static_views(["nav"]))
            .composition(Composition::named("info").view("about").static_views(Vec::<String>::new())),
    );

    let outcome = director.set_composition("landing", json!({"user": "ada"})).await.unwrap();
    assert_eq!(
        outcome,
        CompositionOutcome {
            view: Some(RenderOutcome::Rendered),
            static_views: vec![("nav".to_string(), RenderOutcome::Rendered)],
        }
    );
    let home = director.current_view().unwrap();
    let nav = director.static_view("nav").unwrap();

    director.set_composition("info", json!({})).await.unwrap();

    assert!(home.is_hidden());
    assert!(nav.view().is_hidden());
    assert_eq!(director.current_view().unwrap().name(), "about");
    assert!(director.current_static_views().is_empty());
    assert_eq!(adapter.render_count(), 3);

    let outcome = director
        .set_composition(Composition::new().static_views(["nav"]), json!({}))
        .await
        .unwrap();
    assert_eq!(outcome.view, None);
    assert_eq!(outcome.static_views, vec![("nav".to_string(), RenderOutcome::Synced)]);
    assert_eq!(director.current_view().unwrap().name(), "about");
    assert!(!nav.view().is_hidden());
}

#[tokio::test]
async fn builtin_template_adapter_drives_the_preview() {
    let director = stagehand::director_with_builtins(
        DirectorOptions::new(document()).view(
            ViewOptions::new("home")
                .holder("#main")
                .adapter("template")
                .template(template(|data| {
                    Markup::element("h1").content(format!(
                        "Welcome {}",
                        data["user"].as_str().unwrap_or("guest")
                    ))
                })),
        ),
    )
    .unwrap();

    director.set_current_view("home", json!({"user": "ada"})).await.unwrap();
    assert_eq!(render_document(director.document(), 30, 3), "  Welcome ada");

    director.sync(json!({"user": "grace"})).await.unwrap();
    assert_eq!(render_document(director.document(), 30, 3), "  Welcome grace");

    director.hide_current_view();
    assert_eq!(render_document(director.document(), 30, 3), "");
}
