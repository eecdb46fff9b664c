use jsonapi_core::mock::Operation;
use jsonapi_core::{
    shared, ErrorSource, JsonApiError, RequestContext, ResourceHook, ResourcePipeline, TargetedFields,
};
use jsonapi_sample::lifecycle::BlogSystem;
use jsonapi_sample::model::{Article, ArticleTag, Tag};

async fn seeded() -> BlogSystem {
    let system = BlogSystem::new().expect("system");
    system.seed_demo_data().await.expect("seed");
    system
}

fn targeted(system: &BlogSystem, resource: &str, names: &[&str]) -> TargetedFields {
    let resource = system
        .context
        .graph()
        .get_resource_type(resource)
        .expect("resource type");
    TargetedFields::of(resource, names)
}

fn names(people: &[jsonapi_core::Shared<jsonapi_sample::model::Person>]) -> Vec<String> {
    people.iter().map(|p| p.read().name.clone()).collect()
}

#[tokio::test]
async fn test_soft_deleted_people_stay_hidden() {
    let system = seeded().await;
    let people = system.people().expect("service");

    let mut request = RequestContext::new();
    let listed = people.get_all(&mut request).await.expect("people");
    assert_eq!(names(&listed), vec!["Ada", "Grace"]);
    assert_eq!(request.pagination.total_resource_count, Some(2));

    let mut request = RequestContext::new().with_query(&[("filter[name]", "Linus")]);
    assert!(people.get_all(&mut request).await.expect("people").is_empty());

    let error = people.get(&3, &mut RequestContext::new()).await.unwrap_err();
    assert_eq!(error.status(), 404);

    let mut request = RequestContext::new().with_query(&[("filter[deleted]", "true")]);
    let error = people.get_all(&mut request).await.unwrap_err();
    assert_eq!(error.status(), 400);
}

#[tokio::test]
async fn test_filter_operators_are_parsed_from_values() {
    let system = seeded().await;
    let people = system.people().expect("service");

    let mut request = RequestContext::new().with_query(&[("filter[name]", "like:Gr")]);
    assert_eq!(names(&people.get_all(&mut request).await.expect("like")), vec!["Grace"]);

    let mut request = RequestContext::new().with_query(&[("filter[name]", "ne:Ada")]);
    assert_eq!(names(&people.get_all(&mut request).await.expect("ne")), vec!["Grace"]);

    // Digits before a colon belong to the literal.
    let mut request = RequestContext::new().with_query(&[("filter[name]", "12:30")]);
    assert!(people.get_all(&mut request).await.expect("literal").is_empty());

    let mut request = RequestContext::new().with_query(&[("filter[name]", "between:A,Z")]);
    let error = people.get_all(&mut request).await.unwrap_err();
    assert!(matches!(error, JsonApiError::InvalidFilterOperator { .. }));
    assert_eq!(error.status(), 400);

    let articles = system.articles().expect("service");
    let mut request = RequestContext::new().with_query(&[("filter[author.name]", "Grace")]);
    let found = articles.get_all(&mut request).await.expect("chain");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].read().title, "Compilers");
}

#[tokio::test]
async fn test_page_number_below_one_is_rejected() {
    let system = seeded().await;
    let people = system.people().expect("service");

    let mut request = RequestContext::new().with_query(&[("page[number]", "-1")]);
    let error = people.get_all(&mut request).await.unwrap_err();
    let objects = error.to_error_objects();

    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].status, "400");
    assert_eq!(
        objects[0].detail.as_deref(),
        Some("Page number cannot be negative or zero.")
    );
    assert_eq!(objects[0].source, Some(ErrorSource::parameter("page[number]")));
    assert_eq!(system.repository.calls().len(), 0);
}

#[tokio::test]
async fn test_page_size_zero_disables_paging_but_negative_is_rejected() {
    let system = seeded().await;
    let articles = system.articles().expect("service");

    let mut request = RequestContext::new().with_query(&[("page[size]", "0")]);
    assert_eq!(articles.get_all(&mut request).await.expect("unpaged").len(), 3);

    let mut request = RequestContext::new().with_query(&[("page[size]", "-1")]);
    let error = articles.get_all(&mut request).await.unwrap_err();
    assert!(matches!(error, JsonApiError::InvalidPageSize { .. }));
    assert_eq!(error.source_parameter().as_deref(), Some("page[size]"));
}

#[tokio::test]
async fn test_cyclic_friendships_visit_each_person_once() {
    let system = seeded().await;
    let people = system.people().expect("service");

    let mut request = RequestContext::new().with_query(&[("include", "friends.friends")]);
    let ada = people.get(&1, &mut request).await.expect("ada");

    assert_eq!(ada.read().friends.len(), 1);
    assert_eq!(system.audit.ids("people", ResourceHook::AfterRead), vec!["1", "2"]);
    let depths: Vec<usize> = system.audit.entries().iter().map(|e| e.depth).collect();
    assert_eq!(depths, vec![0, 1]);
}

#[tokio::test]
async fn test_secondary_read_runs_primary_hooks_before_returning_related() {
    let system = seeded().await;
    let people = system.people().expect("service");

    let articles = people
        .get_secondary(&1, "articles", &mut RequestContext::new())
        .await
        .expect("articles");
    assert_eq!(articles.ids(), vec!["1", "2"]);

    let sequence = system.audit.sequence();
    assert_eq!(sequence[0], ("people", ResourceHook::AfterRead, "1".to_string()));
    assert_eq!(system.audit.ids("people", ResourceHook::AfterRead), vec!["1"]);
    assert_eq!(system.audit.ids("articles", ResourceHook::OnReturn), vec!["1", "2"]);
    assert_eq!(sequence.len(), 3);

    let entries = system.audit.entries();
    assert!(entries.iter().all(|e| e.pipeline == ResourcePipeline::GetRelationship));
    assert!(entries.iter().all(|e| e.depth == 0));
}

#[tokio::test]
async fn test_relationship_read_reaches_related_people_through_primary() {
    let system = seeded().await;
    let people = system.people().expect("service");

    let friends = people
        .get_relationship(&1, "friends", &mut RequestContext::new())
        .await
        .expect("friends");
    assert_eq!(friends.ids(), vec!["2"]);

    let entries = system.audit.entries();
    let reads: Vec<(String, usize)> = entries
        .iter()
        .filter(|e| e.hook == ResourceHook::AfterRead)
        .map(|e| (e.id.clone(), e.depth))
        .collect();
    assert_eq!(reads, vec![("1".to_string(), 0), ("2".to_string(), 1)]);
    assert!(entries.iter().all(|e| e.pipeline == ResourcePipeline::GetRelationship));
}

#[tokio::test]
async fn test_to_one_secondary_read_audits_the_article_not_its_author() {
    let system = seeded().await;
    let articles = system.articles().expect("service");

    let author = articles
        .get_secondary(&3, "author", &mut RequestContext::new())
        .await
        .expect("author");
    assert_eq!(author.ids(), vec!["2"]);

    // The article is the primary; its author is reached one layer down.
    assert_eq!(system.audit.ids("people", ResourceHook::AfterRead), vec!["2"]);
    let depths: Vec<usize> = system
        .audit
        .entries()
        .iter()
        .filter(|e| e.resource == "people")
        .map(|e| e.depth)
        .collect();
    assert_eq!(depths, vec![1]);
}

#[tokio::test]
async fn test_update_of_missing_article_is_not_found() {
    let system = seeded().await;
    let articles = system.articles().expect("service");

    let mut request = RequestContext::new().with_targeted(targeted(&system, "articles", &["title"]));
    let error = articles
        .update(&42, Article::new(0, "Renamed"), &mut request)
        .await
        .unwrap_err();

    match &error {
        JsonApiError::ResourceNotFound { id, resource } => {
            assert_eq!(id, "42");
            assert_eq!(resource, "articles");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(system.repository.count_of(Operation::Update), 0);
}

#[tokio::test]
async fn test_update_with_blank_title_is_rejected_by_hook() {
    let system = seeded().await;
    let articles = system.articles().expect("service");

    let mut request = RequestContext::new().with_targeted(targeted(&system, "articles", &["title"]));
    let error = articles
        .update(&1, Article::new(0, "   "), &mut request)
        .await
        .unwrap_err();

    assert_eq!(error.status(), 422);
    assert_eq!(system.repository.count_of(Operation::Update), 0);
    assert_eq!(system.repository.find::<Article>("1").expect("article").read().title, "Ownership");
}

#[tokio::test]
async fn test_create_with_missing_author_reports_single_error() {
    let system = seeded().await;
    let articles = system.articles().expect("service");

    let mut request =
        RequestContext::new().with_targeted(targeted(&system, "articles", &["title", "author"]));
    let error = articles
        .create(Article::new(0, "Drafts").written_by(6), &mut request)
        .await
        .unwrap_err();

    let objects = error.to_error_objects();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].status, "404");
    let detail = objects[0].detail.as_deref().unwrap_or_default();
    assert!(detail.contains("'6'"), "{detail}");
    assert!(detail.contains("'author'"), "{detail}");
    assert_eq!(system.repository.len_of::<Article>(), 3);
}

#[tokio::test]
async fn test_create_trims_title_and_drops_blank_articles() {
    let system = seeded().await;
    let articles = system.articles().expect("service");

    let mut request =
        RequestContext::new().with_targeted(targeted(&system, "articles", &["title", "author"]));
    let created = articles
        .create(Article::new(0, "  Traits  ").written_by(2), &mut request)
        .await
        .expect("create")
        .expect("generated id is returned");
    assert_eq!(created.read().id, 4);
    assert_eq!(created.read().title, "Traits");
    assert_eq!(system.audit.ids("articles", ResourceHook::AfterCreate), vec!["4"]);

    let mut request = RequestContext::new().with_targeted(targeted(&system, "articles", &["title"]));
    let dropped = articles
        .create(Article::new(0, "   "), &mut request)
        .await
        .expect("create");
    assert!(dropped.is_none());
    assert_eq!(system.repository.len_of::<Article>(), 4);
}

#[tokio::test]
async fn test_duplicate_tags_in_create_are_stored_once() {
    let system = seeded().await;
    let articles = system.articles().expect("service");
    let join = |tag: i64| {
        shared(ArticleTag {
            tag: Some(Tag::stub(tag)),
            ..ArticleTag::default()
        })
    };

    let mut request =
        RequestContext::new().with_targeted(targeted(&system, "articles", &["title", "tags"]));
    let article = Article {
        article_tags: vec![join(2), join(2), join(3)],
        ..Article::new(0, "Pinning")
    };
    articles.create(article, &mut request).await.expect("create");

    let stored = system.repository.find::<Article>("4").expect("article");
    assert_eq!(stored.read().article_tags.len(), 2);
    let tags = articles
        .get_relationship(&4, "tags", &mut RequestContext::new())
        .await
        .expect("tags")
        .ids();
    assert_eq!(tags, vec!["2", "3"]);
}

#[tokio::test]
async fn test_options_load_from_json() {
    let system = BlogSystem::from_config(r#"{ "defaultPageSize": 1, "namespace": "api" }"#).expect("system");
    system.seed_demo_data().await.expect("seed");
    let articles = system.articles().expect("service");

    let mut request = RequestContext::new().with_query(&[("page[number]", "2")]);
    let page = articles.get_all(&mut request).await.expect("page");
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].read().id, 2);

    let links = system
        .context
        .link_builder()
        .top_level_links(articles.resource_type(), &request)
        .expect("links");
    assert_eq!(
        links.last.as_deref(),
        Some("http://localhost/api/articles?page[size]=1&page[number]=3")
    );

    assert!(BlogSystem::from_config("{ \"defaultPageSize\": \"ten\" }").is_err());
}

#[tokio::test]
async fn test_create_names_only_the_missing_tag() {
    let system = seeded().await;
    let articles = system.articles().expect("service");
    let join = |tag: i64| {
        shared(ArticleTag {
            tag: Some(Tag::stub(tag)),
            ..ArticleTag::default()
        })
    };

    let mut request =
        RequestContext::new().with_targeted(targeted(&system, "articles", &["title", "tags"]));
    let article = Article {
        article_tags: vec![join(2), join(6)],
        ..Article::new(0, "Borrowing")
    };
    let error = articles.create(article, &mut request).await.unwrap_err();

    match &error {
        JsonApiError::ResourcesInRelationshipsNotFound(missing) => {
            assert_eq!(missing.len(), 1);
            assert_eq!(missing[0].id, "6");
            assert_eq!(missing[0].relationship, "tags");
            assert_eq!(missing[0].resource_type, "tags");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
