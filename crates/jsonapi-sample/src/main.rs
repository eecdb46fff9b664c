//! # JSON:API Sample
//!
//! Drives the blog and dealership resources through the service layer the way a web
//! transport would: decoded query parameters in, typed models and error documents out.
//!
//! - **model**: plain structs (people, articles, tags, dealerships, cars).
//! - **lifecycle**: the resource graph and the [`BlogSystem`] that wires everything.
//! - **hooks** and **definitions**: business rules per resource type.

use jsonapi_core::tracing::setup_tracing;
use jsonapi_core::{ErrorDocument, RequestContext};
use jsonapi_sample::lifecycle::{ids, BlogSystem};
use jsonapi_sample::model::Article;
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    info!("Starting JSON:API sample");

    let system = BlogSystem::new().map_err(|e| e.to_string())?;
    system.seed_demo_data().await.map_err(|e| e.to_string())?;

    let articles = system.articles().map_err(|e| e.to_string())?;
    let span = tracing::info_span!("list_articles");
    let listed = async {
        let mut request = RequestContext::new().with_query(&[("include", "author"), ("sort", "-title")]);
        let found = articles.get_all(&mut request).await.map_err(|e| e.to_string())?;
        if let Some(links) = system
            .context
            .link_builder()
            .top_level_links(articles.resource_type(), &request)
        {
            info!(links = ?links, "Top-level links");
        }
        Ok::<_, String>(found)
    }
    .instrument(span)
    .await?;
    for article in &listed {
        let article = article.read();
        let author = article.author.as_ref().map(|a| a.read().name.clone()).unwrap_or_default();
        info!(id = article.id, title = %article.title, %author, "Article");
    }

    let span = tracing::info_span!("create_article");
    let created = async {
        let mut request = RequestContext::new();
        articles
            .create(Article::new(0, "  Traits  ").written_by(2), &mut request)
            .await
            .map_err(|e| e.to_string())
    }
    .instrument(span)
    .await?;
    if let Some(article) = created {
        let article = article.read();
        info!(id = article.id, title = %article.title, "Article created");
    }

    let dealerships = system.dealerships().map_err(|e| e.to_string())?;
    let span = tracing::info_span!("restock");
    async {
        let mut request = RequestContext::new();
        dealerships
            .add_to_to_many(&1, "inventory", ids(["carZ"]), &mut request)
            .await
            .map_err(|e| e.to_string())
    }
    .instrument(span)
    .await?;
    info!(calls = system.repository.write_calls(), "Dealership restocked");

    // Invalid paging surfaces as an error document.
    let people = system.people().map_err(|e| e.to_string())?;
    let mut request = RequestContext::new().with_query(&[("page[number]", "-1")]);
    match people.get_all(&mut request).await {
        Ok(found) => info!(count = found.len(), "People listed"),
        Err(e) => {
            let document = ErrorDocument::from(&e);
            let body = serde_json::to_string(&document).map_err(|e| e.to_string())?;
            error!(status = document.status(), %body, "Request rejected");
        }
    }

    let mut request = RequestContext::new().with_query(&[("include", "friends")]);
    if let Ok(ada) = people.get(&1, &mut request).await {
        let ada = ada.read();
        info!(name = %ada.name, friends = ada.friends.len(), "Person loaded");
    }

    info!("Sample completed");
    Ok(())
}
