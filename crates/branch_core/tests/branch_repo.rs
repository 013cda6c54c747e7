use branch_core::store::ID_FIELD;
use branch_core::{
    open_branch_store, validate_branch, BranchRepository, CoreConfig, DocumentStore, Filter,
    RepoError, SqliteDocumentStore, StoreError, ValidatedBranch,
};
use serde_json::{json, Value};

fn repository() -> BranchRepository<SqliteDocumentStore> {
    BranchRepository::new(open_branch_store(&CoreConfig::default()).unwrap())
}

fn branch(entity_code: &str, parent: &str) -> Value {
    json!({
        "tenantId": "IVL",
        "entityCode": entity_code,
        "name": entity_code,
        "level": 2,
        "description": format!("{entity_code} branch"),
        "processingStatus": "authorized",
        "createdBy": "SYSTEM",
        "createdDate": "2024-03-01T10:00:00Z",
        "parent": parent,
        "contact": { "city": "Pune", "zipCode": "411001" }
    })
}

fn validated(entity_code: &str, parent: &str) -> ValidatedBranch {
    validate_branch(Some(&branch(entity_code, parent))).unwrap()
}

async fn seed(repo: &BranchRepository<SqliteDocumentStore>, codes: &[&str]) {
    for code in codes {
        repo.save(validated(code, "hq")).await.unwrap();
    }
}

#[tokio::test]
async fn save_assigns_id_and_fills_enable_default() {
    let repo = repository();
    let saved = repo.save(validated("entity1", "hq")).await.unwrap();

    assert_eq!(saved.branch.entity_code, "entity1");
    assert!(saved.branch.enable);

    let raw = repo
        .store()
        .find_by_id(&saved.id.to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(raw[ID_FIELD], saved.id.to_string());
    assert_eq!(raw["enable"], true);
}

#[tokio::test]
async fn duplicate_entity_code_is_a_constraint_violation() {
    let repo = repository();
    repo.save(validated("entity1", "hq")).await.unwrap();

    let err = repo.save(validated("entity1", "other")).await.unwrap_err();
    assert!(matches!(
        err,
        RepoError::Store(StoreError::ConstraintViolation { .. })
    ));
    assert_eq!(repo.find_all(0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn find_all_applies_positive_limits_only() {
    let repo = repository();
    assert!(repo.find_all(5).await.unwrap().is_empty());

    seed(&repo, &["entity1", "entity2", "entity3", "entity4"]).await;

    let first_two = repo.find_all(2).await.unwrap();
    assert_eq!(first_two.len(), 2);
    assert_eq!(first_two[0].branch.entity_code, "entity1");
    assert_eq!(first_two[1].branch.entity_code, "entity2");

    assert_eq!(repo.find_all(10).await.unwrap().len(), 4);
    assert_eq!(repo.find_all(0).await.unwrap().len(), 4);
    assert_eq!(repo.find_all(-7).await.unwrap().len(), 4);
}

#[tokio::test]
async fn find_one_and_find_many_match_on_attribute() {
    let repo = repository();
    repo.save(validated("entity1", "hq")).await.unwrap();
    repo.save(validated("entity2", "hq")).await.unwrap();
    repo.save(validated("entity3", "regional")).await.unwrap();

    let one = repo
        .find_one("entityCode", &json!("entity2"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one.branch.entity_code, "entity2");
    assert!(repo
        .find_one("entityCode", &json!("doesNotExist"))
        .await
        .unwrap()
        .is_none());

    let children = repo.find_many("parent", &json!("hq")).await.unwrap();
    let codes: Vec<_> = children
        .iter()
        .map(|record| record.branch.entity_code.as_str())
        .collect();
    assert_eq!(codes, vec!["entity1", "entity2"]);
    assert!(repo
        .find_many("parent", &json!("nowhere"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn find_by_id_separates_missing_from_malformed() {
    let repo = repository();
    let saved = repo.save(validated("entity1", "hq")).await.unwrap();

    let found = repo.find_by_id(&saved.id.to_string()).await.unwrap();
    assert_eq!(found, Some(saved));

    let missing = repo
        .find_by_id("00000000-0000-4000-8000-000000000000")
        .await
        .unwrap();
    assert!(missing.is_none());

    let err = repo.find_by_id("not-an-id").await.unwrap_err();
    assert!(matches!(
        err,
        RepoError::Store(StoreError::MalformedIdentifier(_))
    ));
}

#[tokio::test]
async fn filter_by_query_combines_keys_and_nested_paths() {
    let repo = repository();
    seed(&repo, &["entity1", "entity2"]).await;
    repo.save(validated("entity3", "regional")).await.unwrap();

    let mut filter = Filter::new();
    filter.insert("parent".to_string(), json!("hq"));
    filter.insert("contact.city".to_string(), json!("Pune"));
    filter.insert("level".to_string(), json!(2));
    assert_eq!(repo.filter_by_query(&filter).await.unwrap().len(), 2);

    filter.insert("enable".to_string(), json!(false));
    assert!(repo.filter_by_query(&filter).await.unwrap().is_empty());

    assert_eq!(repo.filter_by_query(&Filter::new()).await.unwrap().len(), 3);
}

#[tokio::test]
async fn unsupported_filter_key_is_rejected() {
    let repo = repository();
    let mut filter = Filter::new();
    filter.insert("$where".to_string(), json!("1"));

    let err = repo.filter_by_query(&filter).await.unwrap_err();
    assert!(matches!(
        err,
        RepoError::Store(StoreError::UnsupportedFilter(_))
    ));
}

#[tokio::test]
async fn undecodable_stored_document_is_invalid_data() {
    let repo = repository();
    let mut document = validated("entity1", "hq").into_document();
    document.insert("level".to_string(), json!("two"));
    repo.store().insert(document).await.unwrap();

    let err = repo.find_all(0).await.unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[tokio::test]
async fn delete_all_resets_the_collection() {
    let repo = repository();
    seed(&repo, &["entity1", "entity2", "entity3"]).await;

    assert_eq!(repo.delete_all().await.unwrap(), 3);
    assert!(repo.find_all(0).await.unwrap().is_empty());

    repo.save(validated("entity1", "hq")).await.unwrap();
    assert_eq!(repo.find_all(0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn file_backed_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig {
        db_path: Some(dir.path().join("branches.db")),
        ..CoreConfig::default()
    };

    let first = BranchRepository::new(open_branch_store(&config).unwrap());
    first.save(validated("entity1", "hq")).await.unwrap();
    drop(first);

    let reopened = BranchRepository::new(open_branch_store(&config).unwrap());
    let all = reopened.find_all(0).await.unwrap();
    assert_eq!(all.len(), 1);

    let err = reopened
        .save(validated("entity1", "hq"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Store(StoreError::ConstraintViolation { .. })
    ));
}
