//! Integration tests for the corporation manager repository.

use cla_core::error::ClaError;
use cla_core::models::manager::{CreateCorporationManager, ManagerRole};
use cla_core::repository::CorporationManagerRepository;
use cla_db::repository::SurrealCorporationManagerRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> SurrealCorporationManagerRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cla_db::run_migrations(&db).await.unwrap();
    SurrealCorporationManagerRepository::new(db)
}

fn manager(binding_id: Uuid, email: &str, role: ManagerRole) -> CreateCorporationManager {
    CreateCorporationManager {
        binding_id,
        email: email.into(),
        name: "Someone".into(),
        role,
    }
}

#[tokio::test]
async fn add_and_get_manager() {
    let repo = setup().await;
    let binding_id = Uuid::new_v4();

    let added = repo
        .add(manager(binding_id, "Admin@Corp.com", ManagerRole::Admin))
        .await
        .unwrap();
    assert_eq!(added.email, "admin@corp.com");
    assert_eq!(added.corp_id, "corp.com");

    let fetched = repo.get_by_email(binding_id, "ADMIN@corp.com").await.unwrap();
    assert_eq!(fetched.id, added.id);
    assert_eq!(fetched.role, ManagerRole::Admin);
}

#[tokio::test]
async fn duplicate_manager_is_already_exists() {
    let repo = setup().await;
    let binding_id = Uuid::new_v4();

    repo.add(manager(binding_id, "m@corp.com", ManagerRole::Manager))
        .await
        .unwrap();
    assert!(matches!(
        repo.add(manager(binding_id, "M@corp.com", ManagerRole::Manager))
            .await,
        Err(ClaError::AlreadyExists { .. })
    ));

    // Same email under another binding is a different manager.
    repo.add(manager(Uuid::new_v4(), "m@corp.com", ManagerRole::Manager))
        .await
        .unwrap();
}

#[tokio::test]
async fn list_by_corporation_and_role() {
    let repo = setup().await;
    let binding_id = Uuid::new_v4();

    repo.add(manager(binding_id, "admin@corp.com", ManagerRole::Admin))
        .await
        .unwrap();
    repo.add(manager(binding_id, "m1@corp.com", ManagerRole::Manager))
        .await
        .unwrap();
    repo.add(manager(binding_id, "m2@corp.com", ManagerRole::Manager))
        .await
        .unwrap();
    repo.add(manager(binding_id, "boss@other.com", ManagerRole::Admin))
        .await
        .unwrap();

    let all = repo.list(binding_id, "corp.com", None).await.unwrap();
    assert_eq!(all.len(), 3);

    let managers = repo
        .list(binding_id, "corp.com", Some(ManagerRole::Manager))
        .await
        .unwrap();
    assert_eq!(managers.len(), 2);
    assert!(managers.iter().all(|m| m.role == ManagerRole::Manager));
}

#[tokio::test]
async fn remove_manager() {
    let repo = setup().await;
    let binding_id = Uuid::new_v4();

    repo.add(manager(binding_id, "m@corp.com", ManagerRole::Manager))
        .await
        .unwrap();
    repo.remove(binding_id, "m@corp.com").await.unwrap();

    assert!(matches!(
        repo.get_by_email(binding_id, "m@corp.com").await,
        Err(ClaError::NotFound { .. })
    ));
    assert!(matches!(
        repo.remove(binding_id, "m@corp.com").await,
        Err(ClaError::NotFound { .. })
    ));
}
