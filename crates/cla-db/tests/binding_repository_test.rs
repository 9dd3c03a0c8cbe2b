//! Integration tests for the binding repository.

use cla_core::error::ClaError;
use cla_core::models::binding::{ApplyTo, BindingFilter, BindingScope, CreateBinding, UpdateBinding};
use cla_core::models::manager::{CreateCorporationManager, ManagerRole};
use cla_core::repository::{BindingRepository, CorporationManagerRepository};
use cla_core::resolution::ResolutionQuery;
use cla_db::repository::{SurrealBindingRepository, SurrealCorporationManagerRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cla_db::run_migrations(&db).await.unwrap();
    db
}

fn new_binding(repo_id: &str, apply_to: ApplyTo) -> CreateBinding {
    CreateBinding {
        platform: "github".into(),
        org_id: "acme".into(),
        repo_id: repo_id.into(),
        apply_to,
        cla_id: "cla-1".into(),
        cla_language: "english".into(),
        org_email: "CLA@Acme.org".into(),
        submitter: "owner".into(),
    }
}

#[tokio::test]
async fn create_and_get_binding() {
    let repo = SurrealBindingRepository::new(setup().await);

    let created = repo
        .create(new_binding("widgets", ApplyTo::Individual))
        .await
        .unwrap();
    assert!(created.enabled);
    assert!(created.individuals.is_empty());
    assert_eq!(created.org_email, "cla@acme.org");

    let fetched = repo.get_by_id(created.id).await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.scope(), BindingScope::new("github", "acme", "widgets"));
    assert_eq!(fetched.apply_to, ApplyTo::Individual);
    assert!(fetched.corporations.is_empty());
}

#[tokio::test]
async fn create_rejects_missing_fields() {
    let repo = SurrealBindingRepository::new(setup().await);

    let mut input = new_binding("", ApplyTo::Individual);
    input.org_id = "  ".into();
    assert!(matches!(
        repo.create(input).await,
        Err(ClaError::InvalidParameter { .. })
    ));

    let mut input = new_binding("", ApplyTo::Individual);
    input.org_email = "not-an-email".into();
    assert!(matches!(
        repo.create(input).await,
        Err(ClaError::InvalidParameter { .. })
    ));
}

#[tokio::test]
async fn get_missing_binding_is_not_found() {
    let repo = SurrealBindingRepository::new(setup().await);
    let result = repo.get_by_id(uuid::Uuid::new_v4()).await;
    assert!(matches!(result, Err(ClaError::NotFound { .. })));
}

#[tokio::test]
async fn update_binding_fields() {
    let repo = SurrealBindingRepository::new(setup().await);
    let created = repo
        .create(new_binding("", ApplyTo::Corporation))
        .await
        .unwrap();

    let updated = repo
        .update(
            created.id,
            UpdateBinding {
                enabled: Some(false),
                org_signature_uploaded: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.enabled);
    assert!(updated.org_signature_uploaded);
    assert_eq!(updated.org_email, created.org_email);

    let missing = repo
        .update(uuid::Uuid::new_v4(), UpdateBinding::default())
        .await;
    assert!(matches!(missing, Err(ClaError::NotFound { .. })));
}

#[tokio::test]
async fn list_bindings_with_filters() {
    let repo = SurrealBindingRepository::new(setup().await);
    repo.create(new_binding("", ApplyTo::Individual)).await.unwrap();
    repo.create(new_binding("", ApplyTo::Corporation)).await.unwrap();
    repo.create(new_binding("widgets", ApplyTo::Individual))
        .await
        .unwrap();

    let all = repo.list(BindingFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);

    let individual = repo
        .list(BindingFilter {
            apply_to: Some(ApplyTo::Individual),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(individual.len(), 2);

    let org_wide = repo
        .list(BindingFilter::for_scope(&BindingScope::new("github", "acme", "")))
        .await
        .unwrap();
    assert_eq!(org_wide.len(), 2);
    assert!(org_wide.iter().all(|b| b.is_org_wide()));
}

#[tokio::test]
async fn find_candidates_respects_mode_and_enabled() {
    let repo = SurrealBindingRepository::new(setup().await);
    let org = repo.create(new_binding("", ApplyTo::Individual)).await.unwrap();
    let widgets = repo
        .create(new_binding("widgets", ApplyTo::Individual))
        .await
        .unwrap();
    let disabled = repo
        .create(new_binding("widgets", ApplyTo::Individual))
        .await
        .unwrap();
    repo.update(
        disabled.id,
        UpdateBinding {
            enabled: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    repo.create(new_binding("gadgets", ApplyTo::Individual))
        .await
        .unwrap();
    repo.create(new_binding("widgets", ApplyTo::Corporation))
        .await
        .unwrap();

    let scope = BindingScope::new("github", "acme", "widgets");

    let cared = repo
        .find_candidates(&ResolutionQuery::org_cared(scope.clone(), ApplyTo::Individual))
        .await
        .unwrap();
    let ids: Vec<_> = cared.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![org.id, widgets.id]);

    let exact = repo
        .find_candidates(&ResolutionQuery::exact(scope, ApplyTo::Individual))
        .await
        .unwrap();
    let ids: Vec<_> = exact.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![widgets.id]);
}

#[tokio::test]
async fn delete_binding_removes_managers() {
    let db = setup().await;
    let repo = SurrealBindingRepository::new(db.clone());
    let managers = SurrealCorporationManagerRepository::new(db);

    let binding = repo
        .create(new_binding("", ApplyTo::Corporation))
        .await
        .unwrap();
    managers
        .add(CreateCorporationManager {
            binding_id: binding.id,
            email: "admin@corp.com".into(),
            name: "Admin".into(),
            role: ManagerRole::Admin,
        })
        .await
        .unwrap();

    repo.delete(binding.id).await.unwrap();

    assert!(matches!(
        repo.get_by_id(binding.id).await,
        Err(ClaError::NotFound { .. })
    ));
    assert!(
        managers
            .list(binding.id, "corp.com", None)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(matches!(
        repo.delete(binding.id).await,
        Err(ClaError::NotFound { .. })
    ));
}

#[tokio::test]
async fn failed_manager_cleanup_keeps_the_binding() {
    let db = setup().await;
    let repo = SurrealBindingRepository::new(db.clone());
    let managers = SurrealCorporationManagerRepository::new(db.clone());

    let binding = repo
        .create(new_binding("", ApplyTo::Corporation))
        .await
        .unwrap();
    managers
        .add(CreateCorporationManager {
            binding_id: binding.id,
            email: "admin@corp.com".into(),
            name: "Admin".into(),
            role: ManagerRole::Admin,
        })
        .await
        .unwrap();

    db.query(
        "DEFINE EVENT hold_managers ON TABLE corporation_manager \
         WHEN $event = 'DELETE' THEN { THROW 'manager records are held' };",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    assert!(repo.delete(binding.id).await.is_err());

    let kept = repo.get_by_id(binding.id).await.unwrap();
    assert_eq!(kept.id, binding.id);
    assert_eq!(
        managers.list(binding.id, "corp.com", None).await.unwrap().len(),
        1
    );
}
