//! Navigate between pages of a small app and print a text preview of the
//! document after every step.
//!
//! Run with `RUST_LOG=stagehand_core=debug cargo run --example navigation`.

use serde_json::json;
use stagehand::adapters::{component, template, Component, TagLibrary};
use stagehand::testing::render_document;
use stagehand::{
    from_fn, Composition, DirectorOptions, Document, Markup, MiddlewareError, Request,
    StaticViewOptions, SubViewOptions, Template, ViewOptions,
};
use tracing_subscriber::EnvFilter;

struct Clock;

impl Component for Clock {
    fn render(&self, data: &serde_json::Value) -> Markup {
        Markup::element("span")
            .class("clock")
            .content(format!("time: {}", data["time"].as_str().unwrap_or("--:--")))
    }
}

fn page(title: &'static str) -> Template {
    template(move |data| {
        Markup::element("article")
            .child(Markup::element("h1").content(title))
            .child(Markup::element("p").content(format!(
                "signed in as {}",
                data["user"].as_str().unwrap_or("nobody")
            )))
            .child(Markup::element("div").class("sidebar"))
    })
}

fn preview(label: &str, document: &Document) {
    println!("--- {label}");
    println!("{}", render_document(document, 48, 12));
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let document = Document::new();
    let body = document.body();
    body.append_markup(&Markup::element("header").id("top"));
    body.append_markup(&Markup::element("main").id("main"));

    let tags = TagLibrary::new().define("menu", |opts| {
        opts["links"]
            .as_array()
            .map(|links| {
                links
                    .iter()
                    .map(|l| Markup::element("a").content(l.as_str().unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default()
    });

    let options = DirectorOptions::new(document.clone())
        .security(from_fn(|req: Request| async move {
            if req.view_name() == "admin" && req.data()["user"] != "root" {
                return Err(MiddlewareError::new("root only"));
            }
            Ok(req.into_data())
        }))
        .view(
            ViewOptions::new("home")
                .holder("#main")
                .adapter("template")
                .template(page("Home"))
                .sub_view(SubViewOptions::new("clock", "clock", ".sidebar")),
        )
        .view(
            ViewOptions::new("admin")
                .holder("#main")
                .adapter("template")
                .template(page("Admin")),
        )
        .view(
            ViewOptions::new("clock")
                .adapter("component")
                .template(component(Clock)),
        )
        .view(
            ViewOptions::new("menu")
                .adapter("tag")
                .template(Template::new("menu")),
        )
        .static_view(StaticViewOptions::new("menu", "menu").holder("#top"))
        .composition(Composition::named("home").view("home").static_views(["menu"]));

    let director = stagehand::director_with_tags(options, tags)?;

    let data = json!({"user": "ada", "time": "09:00", "links": ["home", "admin"]});
    director.set_composition("home", data).await?;
    preview("home", &document);

    director.sync(json!({"time": "09:01"})).await?;
    preview("clock ticked", &document);

    let outcome = director.set_current_view("admin", json!({"user": "ada"})).await?;
    preview(&format!("admin as ada: {outcome:?}"), &document);

    director.set_current_view("home", json!({})).await?;
    preview("back home", &document);

    Ok(())
}
