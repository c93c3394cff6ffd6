use std::sync::Arc;
use std::time::Duration;

use shelf_db::{MemoryStore, RecordId, RecordSet, StoreError, StoreOp, TenantId};

use super::*;
use crate::domain::{Book, BookPatch, BookStatus, CollectionPatch, NewBook, NewCollection};

fn setup() -> (Arc<MemoryStore>, Repository) {
    let store = Arc::new(MemoryStore::new());
    let repository = Repository::new(store.clone());
    (store, repository)
}

fn tenant(raw: &str) -> TenantId {
    TenantId::parse(raw).unwrap()
}

fn new_book(title: &str, collection: &Collection) -> NewBook {
    NewBook {
        title: title.to_string(),
        author: "Ursula K. Le Guin".to_string(),
        review: Some("Loved it".to_string()),
        rating: 4,
        status: BookStatus::Reading,
        collection_id: collection.id.to_string(),
    }
}

async fn collection(repo: &TenantRepository<'_>, title: &str) -> Collection {
    repo.create_collection(NewCollection::new(title, ""))
        .await
        .unwrap()
}

#[tokio::test]
async fn books_are_isolated_between_tenants() {
    let (_store, repository) = setup();
    let t1 = repository.tenant(tenant("tenant-one"));
    let t2 = repository.tenant(tenant("tenant-two"));

    let shelf = collection(&t1, "General").await;
    let book = t1.create_book(new_book("The Dispossessed", &shelf)).await.unwrap();

    assert_eq!(t1.list_books().await.unwrap().len(), 1);
    assert!(t2.list_books().await.unwrap().is_empty());
    assert!(matches!(
        t2.get_book(&book.id).await,
        Err(RepositoryError::NotFound { kind: RecordKind::Book, .. })
    ));
    assert!(!t2.delete_book(&book.id).await.unwrap());
    assert!(matches!(
        t2.update_book(&book.id, BookPatch::default()).await,
        Err(RepositoryError::NotFound { .. })
    ));
    assert_eq!(t1.get_book(&book.id).await.unwrap(), book);
}

#[tokio::test]
async fn duplicate_collection_titles_are_rejected_per_tenant() {
    let (_store, repository) = setup();
    let t1 = repository.tenant(tenant("tenant-one"));
    let t2 = repository.tenant(tenant("tenant-two"));

    collection(&t1, "Sci-Fi").await;
    let error = t1
        .create_collection(NewCollection::new("  sci-fi ", ""))
        .await
        .unwrap_err();
    assert!(matches!(error, RepositoryError::DuplicateName(_)));

    collection(&t2, "Sci-Fi").await;
    assert_eq!(t1.list_collections().await.unwrap().len(), 1);
}

#[tokio::test]
async fn renaming_collection_checks_other_titles_only() {
    let (_store, repository) = setup();
    let repo = repository.tenant(tenant("tenant-one"));
    let general = collection(&repo, "General").await;
    collection(&repo, "Fantasy").await;

    let renamed = repo
        .update_collection(
            &general.id,
            CollectionPatch {
                title: Some("GENERAL".into()),
                description: Some("everything".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.title, "GENERAL");
    assert_eq!(renamed.description, "everything");
    assert!(renamed.updated_at > general.updated_at);
    assert_eq!(renamed.created_at, general.created_at);

    let error = repo
        .update_collection(
            &general.id,
            CollectionPatch {
                title: Some("fantasy".into()),
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(error, RepositoryError::DuplicateName(_)));

    let missing = repo
        .update_collection(&RecordId::new(), CollectionPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(
        missing,
        RepositoryError::NotFound { kind: RecordKind::Collection, .. }
    ));
}

#[tokio::test]
async fn last_collection_cannot_be_deleted() {
    let (store, repository) = setup();
    let repo = repository.tenant(tenant("tenant-one"));
    let only = collection(&repo, "General").await;
    let book = repo.create_book(new_book("Lathe of Heaven", &only)).await.unwrap();

    let error = repo.delete_collection(&only.id).await.unwrap_err();
    assert!(matches!(error, RepositoryError::LastCollection(id) if id == only.id));

    assert_eq!(repo.list_collections().await.unwrap(), vec![only]);
    assert_eq!(repo.get_book(&book.id).await.unwrap(), book);
    assert_eq!(store.len(RecordSet::Collections).await, 1);
}

#[tokio::test]
async fn deleting_collection_moves_books_to_first_remaining() {
    let (_store, repository) = setup();
    let repo = repository.tenant(tenant("tenant-one"));
    let general = collection(&repo, "General").await;
    let fantasy = collection(&repo, "Fantasy").await;
    let classics = collection(&repo, "Classics").await;

    let moved = repo.create_book(new_book("Earthsea", &fantasy)).await.unwrap();
    repo.create_book(new_book("Tehanu", &fantasy)).await.unwrap();
    let untouched = repo.create_book(new_book("Beowulf", &classics)).await.unwrap();

    assert!(repo.delete_collection(&fantasy.id).await.unwrap());

    let books = repo.list_books().await.unwrap();
    assert_eq!(books.len(), 3);
    assert!(books.iter().all(|b| b.collection_id != fantasy.id));
    assert_eq!(repo.books_in_collection(&general.id).await.unwrap().len(), 2);

    let moved_now = repo.get_book(&moved.id).await.unwrap();
    assert!(moved_now.updated_at > moved.updated_at);
    assert_eq!(repo.get_book(&untouched.id).await.unwrap(), untouched);

    let titles: Vec<_> = repo
        .list_collections()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.title)
        .collect();
    assert_eq!(titles, vec!["General", "Classics"]);
}

#[tokio::test]
async fn deleting_missing_collection_returns_false() {
    let (_store, repository) = setup();
    let repo = repository.tenant(tenant("tenant-one"));
    collection(&repo, "General").await;
    assert!(!repo.delete_collection(&RecordId::new()).await.unwrap());
}

#[tokio::test]
async fn collection_delete_failure_after_moves_is_reported_as_incomplete() {
    let (store, repository) = setup();
    let repo = repository.tenant(tenant("tenant-one"));
    let general = collection(&repo, "General").await;
    let doomed = collection(&repo, "Doomed").await;
    let book = repo.create_book(new_book("Always Coming Home", &doomed)).await.unwrap();

    store.fail_on(StoreOp::Delete, RecordSet::Collections).await;
    let error = repo.delete_collection(&doomed.id).await.unwrap_err();
    match error {
        RepositoryError::IncompleteCollectionDelete {
            collection_id,
            target,
            reassigned,
            ..
        } => {
            assert_eq!(collection_id, doomed.id);
            assert_eq!(target, general.id);
            assert_eq!(reassigned, 1);
        }
        other => panic!("expected incomplete delete, got {other:?}"),
    }

    // Books moved, collection still present.
    store.clear_failures().await;
    assert_eq!(repo.get_book(&book.id).await.unwrap().collection_id, general.id);
    assert_eq!(repo.list_collections().await.unwrap().len(), 2);
}

#[tokio::test]
async fn collection_delete_failure_before_moves_is_a_store_error() {
    let (store, repository) = setup();
    let repo = repository.tenant(tenant("tenant-one"));
    collection(&repo, "General").await;
    let empty = collection(&repo, "Empty").await;

    store.fail_on(StoreOp::Delete, RecordSet::Collections).await;
    let error = repo.delete_collection(&empty.id).await.unwrap_err();
    assert!(matches!(
        error,
        RepositoryError::Store(StoreError::Unavailable(_))
    ));
}

#[tokio::test]
async fn update_book_refreshes_updated_at_only() {
    let (_store, repository) = setup();
    let repo = repository.tenant(tenant("tenant-one"));
    let shelf = collection(&repo, "General").await;
    let book = repo.create_book(new_book("The Word for World", &shelf)).await.unwrap();

    let patch = BookPatch {
        status: Some(BookStatus::Read),
        ..BookPatch::default()
    };
    repo.update_book(&book.id, patch).await.unwrap();

    let fetched = repo.get_book(&book.id).await.unwrap();
    assert_eq!(fetched.status, BookStatus::Read);
    assert!(fetched.updated_at > book.updated_at);
    assert_eq!(fetched.created_at, book.created_at);
    assert_eq!(fetched.title, book.title);
}

#[tokio::test]
async fn update_book_validates_fields_and_collection() {
    let (_store, repository) = setup();
    let repo = repository.tenant(tenant("tenant-one"));
    let shelf = collection(&repo, "General").await;
    let book = repo.create_book(new_book("Rocannon's World", &shelf)).await.unwrap();

    let bad_rating = BookPatch {
        rating: Some(9),
        ..BookPatch::default()
    };
    assert!(matches!(
        repo.update_book(&book.id, bad_rating).await,
        Err(RepositoryError::Validation(_))
    ));

    let dangling = BookPatch {
        collection_id: Some(RecordId::new().to_string()),
        ..BookPatch::default()
    };
    assert!(matches!(
        repo.update_book(&book.id, dangling).await,
        Err(RepositoryError::Validation(errors)) if errors[0].field == "collectionId"
    ));

    let other = collection(&repo, "Other").await;
    let clear_review = BookPatch {
        review: Some(Some(String::new())),
        collection_id: Some(other.id.to_string()),
        ..BookPatch::default()
    };
    let updated = repo.update_book(&book.id, clear_review).await.unwrap();
    assert_eq!(updated.review, None);
    assert_eq!(updated.collection_id, other.id);
    assert_eq!(repo.get_book(&book.id).await.unwrap(), updated);
}

#[tokio::test]
async fn create_book_rating_bounds() {
    let (_store, repository) = setup();
    let repo = repository.tenant(tenant("tenant-one"));
    let shelf = collection(&repo, "General").await;

    for rating in [6, -1] {
        let input = NewBook {
            rating,
            ..new_book("Out of range", &shelf)
        };
        assert!(matches!(
            repo.create_book(input).await,
            Err(RepositoryError::Validation(_))
        ));
    }
    for rating in 0..=5 {
        let input = NewBook {
            rating,
            ..new_book("In range", &shelf)
        };
        assert_eq!(repo.create_book(input).await.unwrap().rating as i64, rating);
    }
    // Same title many times is allowed.
    assert_eq!(repo.list_books().await.unwrap().len(), 6);
}

#[tokio::test]
async fn create_book_requires_existing_collection() {
    let (_store, repository) = setup();
    let t1 = repository.tenant(tenant("tenant-one"));
    let t2 = repository.tenant(tenant("tenant-two"));
    let foreign = collection(&t2, "Theirs").await;

    let error = t1
        .create_book(new_book("Planet of Exile", &foreign))
        .await
        .unwrap_err();
    assert!(matches!(error, RepositoryError::Validation(_)));

    let malformed = NewBook {
        collection_id: "collection-1".into(),
        ..new_book("Planet of Exile", &foreign)
    };
    assert!(matches!(
        t1.create_book(malformed).await,
        Err(RepositoryError::Validation(_))
    ));
    assert!(t1.list_books().await.unwrap().is_empty());
}

#[tokio::test]
async fn create_then_get_round_trips() {
    let (_store, repository) = setup();
    let repo = repository.tenant(tenant("tenant-one"));
    let shelf = collection(&repo, "General").await;

    let created = repo.create_book(new_book("  The Left Hand of Darkness ", &shelf)).await.unwrap();
    let fetched: Book = repo.get_book(&created.id).await.unwrap();

    assert_eq!(fetched, created);
    assert_eq!(fetched.title, "The Left Hand of Darkness");
    assert_eq!(fetched.author, "Ursula K. Le Guin");
    assert_eq!(fetched.review.as_deref(), Some("Loved it"));
    assert_eq!(fetched.rating, 4);
    assert_eq!(fetched.status, BookStatus::Reading);
    assert_eq!(fetched.collection_id, shelf.id);
    assert_eq!(fetched.created_at, fetched.updated_at);
}

#[tokio::test]
async fn general_scifi_scenario() {
    let (_store, repository) = setup();
    let repo = repository.tenant(tenant("t1-db"));
    let general = collection(&repo, "General").await;
    let book = repo.create_book(new_book("Dune", &general)).await.unwrap();

    assert!(matches!(
        repo.create_collection(NewCollection::new("general", "")).await,
        Err(RepositoryError::DuplicateName(_))
    ));
    let scifi = collection(&repo, "Sci-Fi").await;

    assert!(repo.delete_collection(&general.id).await.unwrap());
    assert_eq!(repo.list_collections().await.unwrap(), vec![scifi.clone()]);
    assert_eq!(repo.get_book(&book.id).await.unwrap().collection_id, scifi.id);
}

#[tokio::test]
async fn delete_book_twice() {
    let (_store, repository) = setup();
    let repo = repository.tenant(tenant("tenant-one"));
    let shelf = collection(&repo, "General").await;
    let book = repo.create_book(new_book("Lavinia", &shelf)).await.unwrap();

    assert!(repo.delete_book(&book.id).await.unwrap());
    assert!(!repo.delete_book(&book.id).await.unwrap());
}

#[tokio::test]
async fn create_database_seeds_default_collection() {
    let (_store, repository) = setup();

    let generated = repository.create_database(None).await.unwrap();
    assert!(repository.database_exists(&generated).await.unwrap());
    let collections = repository
        .tenant(generated.clone())
        .list_collections()
        .await
        .unwrap();
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0].title, "My Books");
    assert_eq!(collections[0].description, "Default collection for all books");

    let custom = tenant("my-reading");
    assert!(!repository.database_exists(&custom).await.unwrap());
    repository.create_database(Some(custom.clone())).await.unwrap();
    assert!(matches!(
        repository.create_database(Some(custom)).await,
        Err(RepositoryError::DatabaseExists(_))
    ));
}

#[tokio::test]
async fn stats_count_every_status() {
    let (_store, repository) = setup();
    let repo = repository.tenant(tenant("tenant-one"));
    let shelf = collection(&repo, "General").await;
    repo.create_book(new_book("A", &shelf)).await.unwrap();
    let finished = NewBook {
        status: BookStatus::Read,
        ..new_book("B", &shelf)
    };
    repo.create_book(finished).await.unwrap();

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.total_books, 2);
    assert_eq!(stats.collections.len(), 1);
    assert_eq!(stats.status_counts.len(), 5);
    assert_eq!(stats.status_counts[&BookStatus::Reading], 1);
    assert_eq!(stats.status_counts[&BookStatus::Read], 1);
    assert_eq!(stats.status_counts[&BookStatus::Dnf], 0);

    assert_eq!(repo.books_with_status(BookStatus::Read).await.unwrap().len(), 1);
}

#[tokio::test]
async fn store_outage_surfaces_as_store_error() {
    let (store, repository) = setup();
    let repo = repository.tenant(tenant("tenant-one"));
    store.fail_on(StoreOp::Find, RecordSet::Books).await;

    assert!(matches!(
        repo.list_books().await,
        Err(RepositoryError::Store(StoreError::Unavailable(_)))
    ));
}

#[tokio::test]
async fn collection_delete_completes_after_caller_gives_up() {
    let (store, repository) = setup();
    let id = tenant("tenant-one");
    let scoped = repository.tenant(id.clone());
    let general = collection(&scoped, "General").await;
    let scifi = collection(&scoped, "Sci-Fi").await;
    let book = scoped.create_book(new_book("Dune", &scifi)).await.unwrap();

    store
        .stall_on(StoreOp::Delete, RecordSet::Collections, Duration::from_millis(200))
        .await;
    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        repository.delete_collection(id.clone(), scifi.id),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(scoped.list_collections().await.unwrap(), vec![general.clone()]);
    assert_eq!(scoped.get_book(&book.id).await.unwrap().collection_id, general.id);
    assert!(repository.locks.is_empty());
}

#[tokio::test]
async fn rejected_writes_leave_no_lock_entries() {
    let (_store, repository) = setup();
    let scoped = repository.tenant(tenant("fresh-tenant"));

    let dangling = NewBook {
        title: "Dune".to_string(),
        author: "Frank Herbert".to_string(),
        review: None,
        rating: 3,
        status: BookStatus::Tbr,
        collection_id: RecordId::new().to_string(),
    };
    assert!(matches!(
        scoped.create_book(dangling).await,
        Err(RepositoryError::Validation(_))
    ));
    repository.create_database(None).await.unwrap();

    assert!(repository.locks.is_empty());
}
