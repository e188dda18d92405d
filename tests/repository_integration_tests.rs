use sqlx::PgPool;
use sta_clara::{
    models::{
        CreateNoteRequest, CreatePokemonRequest, CreateReviewRequest, CreateTaskRequest,
        ListQuery, SortOrder, UpdateNoteRequest, UpdateReviewRequest, UpdateTaskRequest,
    },
    repository::{InMemoryRepository, PostgresRepository, Repository},
};
use tokio::test;
use uuid::Uuid;

// --- Shared Contract ---
//
// Every check runs against the in-memory store; the Postgres suite at the bottom runs the
// same checks against a real database when one is available.

fn task(title: &str) -> CreateTaskRequest {
    CreateTaskRequest {
        title: title.to_string(),
        description: None,
    }
}

fn query(search: Option<&str>, sort: Option<SortOrder>) -> ListQuery {
    ListQuery {
        search: search.map(str::to_string),
        sort,
    }
}

async fn check_owner_scoping(repo: &dyn Repository) {
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let mine = repo.create_task(alice, task("Alice's task")).await.unwrap();
    repo.create_task(bob, task("Bob's task")).await.unwrap();

    let listed = repo.list_tasks(alice, &ListQuery::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, mine.id);

    let hijack = UpdateTaskRequest {
        title: Some("Bob was here".to_string()),
        description: None,
    };
    assert!(repo.update_task(mine.id, bob, hijack).await.unwrap().is_none());
    assert!(!repo.delete_task(mine.id, bob).await.unwrap());
    assert!(repo.delete_task(mine.id, alice).await.unwrap());
    assert!(!repo.delete_task(mine.id, alice).await.unwrap());
}

async fn check_search_and_sort(repo: &dyn Repository) {
    let owner = Uuid::new_v4();
    for title in ["beta release", "Alpha launch", "gamma 100%_done"] {
        repo.create_task(owner, task(title)).await.unwrap();
    }

    let titles = |tasks: Vec<sta_clara::models::Task>| -> Vec<String> {
        tasks.into_iter().map(|t| t.title).collect()
    };

    let by_name = repo
        .list_tasks(owner, &query(None, Some(SortOrder::NameAsc)))
        .await
        .unwrap();
    assert_eq!(
        titles(by_name),
        vec!["Alpha launch", "beta release", "gamma 100%_done"]
    );

    let by_name_desc = repo
        .list_tasks(owner, &query(None, Some(SortOrder::NameDesc)))
        .await
        .unwrap();
    assert_eq!(titles(by_name_desc)[0], "gamma 100%_done");

    // Default order is newest first; ids break ties between equal timestamps.
    let newest = repo.list_tasks(owner, &ListQuery::default()).await.unwrap();
    assert_eq!(newest[0].title, "gamma 100%_done");
    let oldest = repo
        .list_tasks(owner, &query(None, Some(SortOrder::DateAsc)))
        .await
        .unwrap();
    assert_eq!(oldest[0].title, "beta release");

    let hits = repo
        .list_tasks(owner, &query(Some("ALPHA"), None))
        .await
        .unwrap();
    assert_eq!(titles(hits), vec!["Alpha launch"]);

    // Wildcard characters in the term match literally.
    let hits = repo
        .list_tasks(owner, &query(Some("%_"), None))
        .await
        .unwrap();
    assert_eq!(titles(hits), vec!["gamma 100%_done"]);

    let blank = repo
        .list_tasks(owner, &query(Some("   "), None))
        .await
        .unwrap();
    assert_eq!(blank.len(), 3);
}

async fn check_partial_updates(repo: &dyn Repository) {
    let owner = Uuid::new_v4();
    let note = repo
        .create_note(
            owner,
            CreateNoteRequest {
                title: "Draft".to_string(),
                content: Some("# Heading".to_string()),
            },
        )
        .await
        .unwrap();

    let updated = repo
        .update_note(
            note.id,
            owner,
            UpdateNoteRequest {
                title: Some("Final".to_string()),
                content: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "Final");
    assert_eq!(updated.content.as_deref(), Some("# Heading"));
}

async fn check_upload_rows(repo: &dyn Repository) {
    let owner = Uuid::new_v4();
    let photo = repo
        .create_photo(owner, "Beach".to_string(), "http://blob/a.jpg".to_string())
        .await
        .unwrap();

    let moved = repo
        .update_photo(photo.id, owner, None, Some("http://blob/b.jpg".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.name, "Beach");
    assert_eq!(moved.url, "http://blob/b.jpg");

    assert!(repo.delete_photo(photo.id, Uuid::new_v4()).await.unwrap().is_none());
    let deleted = repo.delete_photo(photo.id, owner).await.unwrap().unwrap();
    assert_eq!(deleted.url, "http://blob/b.jpg");
    assert!(repo.get_photo(photo.id, owner).await.unwrap().is_none());
}

async fn check_food_reviews_cascade(repo: &dyn Repository) {
    let owner = Uuid::new_v4();
    let food = repo
        .create_food(owner, "Halo-halo".to_string(), None)
        .await
        .unwrap();

    let review = repo
        .create_review(
            food.id,
            owner,
            CreateReviewRequest {
                content: "Sweet".to_string(),
                rating: Some(4),
            },
        )
        .await
        .unwrap();

    // Only the author edits a review.
    let edit = UpdateReviewRequest {
        content: None,
        rating: Some(5),
    };
    assert!(
        repo.update_review(review.id, Uuid::new_v4(), edit.clone())
            .await
            .unwrap()
            .is_none()
    );
    let edited = repo.update_review(review.id, owner, edit).await.unwrap().unwrap();
    assert_eq!(edited.rating, Some(5));
    assert_eq!(edited.content, "Sweet");

    assert_eq!(repo.list_reviews(&[food.id]).await.unwrap().len(), 1);
    repo.delete_food(food.id, owner).await.unwrap();
    assert!(repo.list_reviews(&[food.id]).await.unwrap().is_empty());
}

async fn check_pokemon_dex_lookup(repo: &dyn Repository) {
    let owner = Uuid::new_v4();
    let entry = repo
        .create_pokemon(
            owner,
            CreatePokemonRequest {
                pokemon_id: 133,
                pokemon_name: "eevee".to_string(),
                pokemon_image_url: "https://img.example/133.png".to_string(),
            },
        )
        .await
        .unwrap();

    let found = repo.find_pokemon_by_dex(owner, 133).await.unwrap().unwrap();
    assert_eq!(found.id, entry.id);
    assert!(repo.find_pokemon_by_dex(Uuid::new_v4(), 133).await.unwrap().is_none());
    assert!(repo.find_pokemon_by_dex(owner, 134).await.unwrap().is_none());
}

async fn check_profiles(repo: &dyn Repository) {
    let id = Uuid::new_v4();
    assert!(repo.get_profile(id).await.unwrap().is_none());

    repo.create_profile(id, "First Name").await.unwrap();
    let profile = repo.create_profile(id, "Second Name").await.unwrap();
    assert_eq!(profile.fullname.as_deref(), Some("Second Name"));
    assert_eq!(
        repo.get_profile(id).await.unwrap().unwrap().fullname.as_deref(),
        Some("Second Name")
    );
}

// --- In-Memory Repository ---

#[test]
async fn test_memory_owner_scoping() {
    check_owner_scoping(&InMemoryRepository::new()).await;
}

#[test]
async fn test_memory_search_and_sort() {
    check_search_and_sort(&InMemoryRepository::new()).await;
}

#[test]
async fn test_memory_partial_updates() {
    check_partial_updates(&InMemoryRepository::new()).await;
}

#[test]
async fn test_memory_upload_rows() {
    check_upload_rows(&InMemoryRepository::new()).await;
}

#[test]
async fn test_memory_food_reviews_cascade() {
    check_food_reviews_cascade(&InMemoryRepository::new()).await;
}

#[test]
async fn test_memory_pokemon_dex_lookup() {
    check_pokemon_dex_lookup(&InMemoryRepository::new()).await;
}

#[test]
async fn test_memory_profiles() {
    check_profiles(&InMemoryRepository::new()).await;
}

// --- Postgres Repository ---
//
// Run with `cargo test -- --ignored` against a scratch database.

async fn postgres() -> PostgresRepository {
    dotenv::dotenv().ok();
    let db_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set to run integration tests");
    let pool = PgPool::connect(&db_url)
        .await
        .expect("Failed to connect to database for integration tests.");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations.");
    PostgresRepository::new(pool)
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_repository_contract() {
    let repo = postgres().await;
    check_owner_scoping(&repo).await;
    check_search_and_sort(&repo).await;
    check_partial_updates(&repo).await;
    check_upload_rows(&repo).await;
    check_food_reviews_cascade(&repo).await;
    check_pokemon_dex_lookup(&repo).await;
    check_profiles(&repo).await;
}
