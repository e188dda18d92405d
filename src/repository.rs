use crate::models::{
    CreatePokemonRequest, CreateReviewRequest, CreateTaskRequest, CreateNoteRequest, Food,
    ListQuery, Note, Photo, Pokemon, PokemonReview, Profile, Review, SortOrder, Task,
    UpdateNoteRequest, UpdatePokemonRequest, UpdateReviewRequest, UpdateTaskRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, postgres::PgRow, query_builder::QueryBuilder};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, sqlx::Error>;

/// Repository Trait
///
/// Persistence contract for every feature area. All reads and writes on owned rows take
/// the caller's id and filter on the owner column, so a row belonging to someone else is
/// indistinguishable from a missing one (`None` / `false`).
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across Axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Profiles ---
    async fn get_profile(&self, id: Uuid) -> RepoResult<Option<Profile>>;
    // Upsert: registering twice with the same id keeps one row.
    async fn create_profile(&self, id: Uuid, fullname: &str) -> RepoResult<Profile>;

    // --- Tasks ---
    async fn list_tasks(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Task>>;
    async fn create_task(&self, owner: Uuid, req: CreateTaskRequest) -> RepoResult<Task>;
    async fn update_task(&self, id: i64, owner: Uuid, req: UpdateTaskRequest) -> RepoResult<Option<Task>>;
    async fn delete_task(&self, id: i64, owner: Uuid) -> RepoResult<bool>;

    // --- Notes ---
    async fn list_notes(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Note>>;
    async fn create_note(&self, owner: Uuid, req: CreateNoteRequest) -> RepoResult<Note>;
    async fn update_note(&self, id: i64, owner: Uuid, req: UpdateNoteRequest) -> RepoResult<Option<Note>>;
    async fn delete_note(&self, id: i64, owner: Uuid) -> RepoResult<bool>;

    // --- Photos ---
    async fn list_photos(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Photo>>;
    async fn get_photo(&self, id: i64, owner: Uuid) -> RepoResult<Option<Photo>>;
    async fn create_photo(&self, owner: Uuid, name: String, url: String) -> RepoResult<Photo>;
    async fn update_photo(&self, id: i64, owner: Uuid, name: Option<String>, url: Option<String>) -> RepoResult<Option<Photo>>;
    // Returns the deleted row so the caller can drop its blob.
    async fn delete_photo(&self, id: i64, owner: Uuid) -> RepoResult<Option<Photo>>;

    // --- Foods & Reviews ---
    async fn list_foods(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Food>>;
    async fn get_food(&self, id: i64, owner: Uuid) -> RepoResult<Option<Food>>;
    async fn create_food(&self, owner: Uuid, name: String, url: Option<String>) -> RepoResult<Food>;
    async fn update_food(&self, id: i64, owner: Uuid, name: Option<String>, url: Option<String>) -> RepoResult<Option<Food>>;
    async fn delete_food(&self, id: i64, owner: Uuid) -> RepoResult<Option<Food>>;
    // Reviews for any of the given foods, newest first.
    async fn list_reviews(&self, food_ids: &[i64]) -> RepoResult<Vec<Review>>;
    async fn create_review(&self, food_id: i64, owner: Uuid, req: CreateReviewRequest) -> RepoResult<Review>;
    async fn update_review(&self, id: i64, owner: Uuid, req: UpdateReviewRequest) -> RepoResult<Option<Review>>;
    async fn delete_review(&self, id: i64, owner: Uuid) -> RepoResult<bool>;

    // --- Pokemon & Reviews ---
    async fn list_pokemon(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Pokemon>>;
    async fn get_pokemon(&self, id: i64, owner: Uuid) -> RepoResult<Option<Pokemon>>;
    async fn find_pokemon_by_dex(&self, owner: Uuid, dex_number: i64) -> RepoResult<Option<Pokemon>>;
    async fn create_pokemon(&self, owner: Uuid, req: CreatePokemonRequest) -> RepoResult<Pokemon>;
    async fn update_pokemon(&self, id: i64, owner: Uuid, req: UpdatePokemonRequest) -> RepoResult<Option<Pokemon>>;
    async fn delete_pokemon(&self, id: i64, owner: Uuid) -> RepoResult<bool>;
    async fn list_pokemon_reviews(&self, pokemon_ids: &[i64]) -> RepoResult<Vec<PokemonReview>>;
    async fn create_pokemon_review(&self, pokemon_id: i64, owner: Uuid, req: CreateReviewRequest) -> RepoResult<PokemonReview>;
    async fn update_pokemon_review(&self, id: i64, owner: Uuid, req: UpdateReviewRequest) -> RepoResult<Option<PokemonReview>>;
    async fn delete_pokemon_review(&self, id: i64, owner: Uuid) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the Supabase Postgres
/// database. Table names are capitalised in the schema, hence the quoted identifiers.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// list_owned
    ///
    /// Shared listing query: owner filter, optional `ILIKE` search on `name_column`,
    /// and the requested ordering. Search input is always bound, never interpolated.
    async fn list_owned<T>(
        &self,
        table: &str,
        owner_column: &str,
        name_column: &str,
        owner: Uuid,
        query: &ListQuery,
    ) -> RepoResult<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT * FROM \"{}\" WHERE {} = ", table, owner_column));
        builder.push_bind(owner);

        if let Some(term) = query.search_term() {
            builder.push(format!(" AND {} ILIKE ", name_column));
            builder.push_bind(like_pattern(term));
        }

        builder.push(order_clause(name_column, query.sort_order()));

        builder.build_query_as::<T>().fetch_all(&self.pool).await
    }

    async fn delete_owned(&self, table: &str, owner_column: &str, id: i64, owner: Uuid) -> RepoResult<bool> {
        let sql = format!("DELETE FROM \"{}\" WHERE id = $1 AND {} = $2", table, owner_column);
        let result = sqlx::query(&sql).bind(id).bind(owner).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

/// `%term%` with LIKE metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn order_clause(name_column: &str, sort: SortOrder) -> String {
    match sort {
        SortOrder::DateDesc => " ORDER BY created_at DESC, id DESC".to_string(),
        SortOrder::DateAsc => " ORDER BY created_at ASC, id ASC".to_string(),
        SortOrder::NameAsc => format!(" ORDER BY lower({}) ASC, id ASC", name_column),
        SortOrder::NameDesc => format!(" ORDER BY lower({}) DESC, id DESC", name_column),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_profile(&self, id: Uuid) -> RepoResult<Option<Profile>> {
        sqlx::query_as::<_, Profile>(r#"SELECT id, fullname, created_at FROM "Profile" WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_profile(&self, id: Uuid, fullname: &str) -> RepoResult<Profile> {
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO "Profile" (id, fullname) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET fullname = EXCLUDED.fullname
            RETURNING id, fullname, created_at
            "#,
        )
        .bind(id)
        .bind(fullname)
        .fetch_one(&self.pool)
        .await
    }

    // --- TASKS ---

    async fn list_tasks(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Task>> {
        self.list_owned("Task", "created_by", "title", owner, query).await
    }

    async fn create_task(&self, owner: Uuid, req: CreateTaskRequest) -> RepoResult<Task> {
        sqlx::query_as::<_, Task>(
            r#"INSERT INTO "Task" (title, description, created_by) VALUES ($1, $2, $3) RETURNING *"#,
        )
        .bind(req.title)
        .bind(req.description)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
    }

    /// update_task
    ///
    /// `COALESCE` keeps the current value for every field the request leaves out.
    async fn update_task(&self, id: i64, owner: Uuid, req: UpdateTaskRequest) -> RepoResult<Option<Task>> {
        sqlx::query_as::<_, Task>(
            r#"
            UPDATE "Task"
            SET title = COALESCE($3, title),
                description = COALESCE($4, description)
            WHERE id = $1 AND created_by = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(req.title)
        .bind(req.description)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_task(&self, id: i64, owner: Uuid) -> RepoResult<bool> {
        self.delete_owned("Task", "created_by", id, owner).await
    }

    // --- NOTES ---

    async fn list_notes(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Note>> {
        self.list_owned("Note", "created_by", "title", owner, query).await
    }

    async fn create_note(&self, owner: Uuid, req: CreateNoteRequest) -> RepoResult<Note> {
        sqlx::query_as::<_, Note>(
            r#"INSERT INTO "Note" (title, content, created_by) VALUES ($1, $2, $3) RETURNING *"#,
        )
        .bind(req.title)
        .bind(req.content)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_note(&self, id: i64, owner: Uuid, req: UpdateNoteRequest) -> RepoResult<Option<Note>> {
        sqlx::query_as::<_, Note>(
            r#"
            UPDATE "Note"
            SET title = COALESCE($3, title),
                content = COALESCE($4, content)
            WHERE id = $1 AND created_by = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(req.title)
        .bind(req.content)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_note(&self, id: i64, owner: Uuid) -> RepoResult<bool> {
        self.delete_owned("Note", "created_by", id, owner).await
    }

    // --- PHOTOS ---

    async fn list_photos(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Photo>> {
        self.list_owned("Photo", "uploaded_by", "name", owner, query).await
    }

    async fn get_photo(&self, id: i64, owner: Uuid) -> RepoResult<Option<Photo>> {
        sqlx::query_as::<_, Photo>(r#"SELECT * FROM "Photo" WHERE id = $1 AND uploaded_by = $2"#)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_photo(&self, owner: Uuid, name: String, url: String) -> RepoResult<Photo> {
        sqlx::query_as::<_, Photo>(
            r#"INSERT INTO "Photo" (name, url, uploaded_by) VALUES ($1, $2, $3) RETURNING *"#,
        )
        .bind(name)
        .bind(url)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_photo(&self, id: i64, owner: Uuid, name: Option<String>, url: Option<String>) -> RepoResult<Option<Photo>> {
        sqlx::query_as::<_, Photo>(
            r#"
            UPDATE "Photo"
            SET name = COALESCE($3, name),
                url = COALESCE($4, url)
            WHERE id = $1 AND uploaded_by = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(name)
        .bind(url)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_photo(&self, id: i64, owner: Uuid) -> RepoResult<Option<Photo>> {
        sqlx::query_as::<_, Photo>(
            r#"DELETE FROM "Photo" WHERE id = $1 AND uploaded_by = $2 RETURNING *"#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
    }

    // --- FOODS ---

    async fn list_foods(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Food>> {
        self.list_owned("Food", "uploaded_by", "name", owner, query).await
    }

    async fn get_food(&self, id: i64, owner: Uuid) -> RepoResult<Option<Food>> {
        sqlx::query_as::<_, Food>(r#"SELECT * FROM "Food" WHERE id = $1 AND uploaded_by = $2"#)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_food(&self, owner: Uuid, name: String, url: Option<String>) -> RepoResult<Food> {
        sqlx::query_as::<_, Food>(
            r#"INSERT INTO "Food" (name, url, uploaded_by) VALUES ($1, $2, $3) RETURNING *"#,
        )
        .bind(name)
        .bind(url)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_food(&self, id: i64, owner: Uuid, name: Option<String>, url: Option<String>) -> RepoResult<Option<Food>> {
        sqlx::query_as::<_, Food>(
            r#"
            UPDATE "Food"
            SET name = COALESCE($3, name),
                url = COALESCE($4, url)
            WHERE id = $1 AND uploaded_by = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(name)
        .bind(url)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_food(&self, id: i64, owner: Uuid) -> RepoResult<Option<Food>> {
        sqlx::query_as::<_, Food>(
            r#"DELETE FROM "Food" WHERE id = $1 AND uploaded_by = $2 RETURNING *"#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_reviews(&self, food_ids: &[i64]) -> RepoResult<Vec<Review>> {
        sqlx::query_as::<_, Review>(
            r#"SELECT * FROM "Review" WHERE food_id = ANY($1) ORDER BY created_at DESC, id DESC"#,
        )
        .bind(food_ids.to_vec())
        .fetch_all(&self.pool)
        .await
    }

    async fn create_review(&self, food_id: i64, owner: Uuid, req: CreateReviewRequest) -> RepoResult<Review> {
        sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO "Review" (food_id, content, rating, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(food_id)
        .bind(req.content)
        .bind(req.rating)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_review(&self, id: i64, owner: Uuid, req: UpdateReviewRequest) -> RepoResult<Option<Review>> {
        sqlx::query_as::<_, Review>(
            r#"
            UPDATE "Review"
            SET content = COALESCE($3, content),
                rating = COALESCE($4, rating)
            WHERE id = $1 AND created_by = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(req.content)
        .bind(req.rating)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_review(&self, id: i64, owner: Uuid) -> RepoResult<bool> {
        self.delete_owned("Review", "created_by", id, owner).await
    }

    // --- POKEMON ---

    async fn list_pokemon(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Pokemon>> {
        self.list_owned("Pokemon", "created_by", "pokemon_name", owner, query).await
    }

    async fn get_pokemon(&self, id: i64, owner: Uuid) -> RepoResult<Option<Pokemon>> {
        sqlx::query_as::<_, Pokemon>(r#"SELECT * FROM "Pokemon" WHERE id = $1 AND created_by = $2"#)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_pokemon_by_dex(&self, owner: Uuid, dex_number: i64) -> RepoResult<Option<Pokemon>> {
        sqlx::query_as::<_, Pokemon>(
            r#"SELECT * FROM "Pokemon" WHERE pokemon_id = $1 AND created_by = $2 LIMIT 1"#,
        )
        .bind(dex_number)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_pokemon(&self, owner: Uuid, req: CreatePokemonRequest) -> RepoResult<Pokemon> {
        sqlx::query_as::<_, Pokemon>(
            r#"
            INSERT INTO "Pokemon" (pokemon_id, pokemon_name, pokemon_image_url, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(req.pokemon_id)
        .bind(req.pokemon_name)
        .bind(req.pokemon_image_url)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_pokemon(&self, id: i64, owner: Uuid, req: UpdatePokemonRequest) -> RepoResult<Option<Pokemon>> {
        sqlx::query_as::<_, Pokemon>(
            r#"
            UPDATE "Pokemon"
            SET pokemon_name = COALESCE($3, pokemon_name),
                pokemon_image_url = COALESCE($4, pokemon_image_url)
            WHERE id = $1 AND created_by = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(req.pokemon_name)
        .bind(req.pokemon_image_url)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_pokemon(&self, id: i64, owner: Uuid) -> RepoResult<bool> {
        self.delete_owned("Pokemon", "created_by", id, owner).await
    }

    async fn list_pokemon_reviews(&self, pokemon_ids: &[i64]) -> RepoResult<Vec<PokemonReview>> {
        sqlx::query_as::<_, PokemonReview>(
            r#"SELECT * FROM "PokemonReview" WHERE pokemon_id = ANY($1) ORDER BY created_at DESC, id DESC"#,
        )
        .bind(pokemon_ids.to_vec())
        .fetch_all(&self.pool)
        .await
    }

    async fn create_pokemon_review(&self, pokemon_id: i64, owner: Uuid, req: CreateReviewRequest) -> RepoResult<PokemonReview> {
        sqlx::query_as::<_, PokemonReview>(
            r#"
            INSERT INTO "PokemonReview" (pokemon_id, content, rating, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(pokemon_id)
        .bind(req.content)
        .bind(req.rating)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_pokemon_review(&self, id: i64, owner: Uuid, req: UpdateReviewRequest) -> RepoResult<Option<PokemonReview>> {
        sqlx::query_as::<_, PokemonReview>(
            r#"
            UPDATE "PokemonReview"
            SET content = COALESCE($3, content),
                rating = COALESCE($4, rating)
            WHERE id = $1 AND created_by = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(req.content)
        .bind(req.rating)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_pokemon_review(&self, id: i64, owner: Uuid) -> RepoResult<bool> {
        self.delete_owned("PokemonReview", "created_by", id, owner).await
    }
}

// --- In-memory implementation ---

/// Rows that can appear in a list view.
trait Listed: Clone {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
}

macro_rules! listed {
    ($ty:ty, $name:ident) => {
        impl Listed for $ty {
            fn id(&self) -> i64 {
                self.id
            }
            fn name(&self) -> &str {
                &self.$name
            }
            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }
        }
    };
}

listed!(Task, title);
listed!(Note, title);
listed!(Photo, name);
listed!(Food, name);
listed!(Pokemon, pokemon_name);

/// Same semantics as the SQL listing: case-insensitive substring search, then ordering
/// with `id` as the tie-breaker.
fn apply_list<'a, T, I>(rows: I, query: &ListQuery) -> Vec<T>
where
    T: Listed + 'a,
    I: Iterator<Item = &'a T>,
{
    let needle = query.search_term().map(str::to_lowercase);
    let mut out: Vec<T> = rows
        .filter(|row| match &needle {
            Some(needle) => row.name().to_lowercase().contains(needle.as_str()),
            None => true,
        })
        .cloned()
        .collect();

    match query.sort_order() {
        SortOrder::DateDesc => out.sort_by(|a, b| (b.created_at(), b.id()).cmp(&(a.created_at(), a.id()))),
        SortOrder::DateAsc => out.sort_by(|a, b| (a.created_at(), a.id()).cmp(&(b.created_at(), b.id()))),
        SortOrder::NameAsc => out.sort_by(|a, b| {
            (a.name().to_lowercase(), a.id()).cmp(&(b.name().to_lowercase(), b.id()))
        }),
        SortOrder::NameDesc => out.sort_by(|a, b| {
            (b.name().to_lowercase(), b.id()).cmp(&(a.name().to_lowercase(), a.id()))
        }),
    }
    out
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    profiles: Vec<Profile>,
    tasks: Vec<Task>,
    notes: Vec<Note>,
    photos: Vec<Photo>,
    foods: Vec<Food>,
    reviews: Vec<Review>,
    pokemon: Vec<Pokemon>,
    pokemon_reviews: Vec<PokemonReview>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// InMemoryRepository
///
/// `Repository` backed by plain vectors behind a mutex. Used by the test suite and for
/// running the service without a database. Never fails.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        // A poisoned lock only means another test thread panicked mid-write.
        let mut tables = self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut tables)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_profile(&self, id: Uuid) -> RepoResult<Option<Profile>> {
        Ok(self.with(|t| t.profiles.iter().find(|p| p.id == id).cloned()))
    }

    async fn create_profile(&self, id: Uuid, fullname: &str) -> RepoResult<Profile> {
        Ok(self.with(|t| {
            if let Some(existing) = t.profiles.iter_mut().find(|p| p.id == id) {
                existing.fullname = Some(fullname.to_string());
                return existing.clone();
            }
            let profile = Profile {
                id,
                fullname: Some(fullname.to_string()),
                created_at: Utc::now(),
            };
            t.profiles.push(profile.clone());
            profile
        }))
    }

    async fn list_tasks(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Task>> {
        Ok(self.with(|t| apply_list(t.tasks.iter().filter(|r| r.created_by == owner), query)))
    }

    async fn create_task(&self, owner: Uuid, req: CreateTaskRequest) -> RepoResult<Task> {
        Ok(self.with(|t| {
            let task = Task {
                id: t.next_id(),
                title: req.title,
                description: req.description,
                created_by: owner,
                created_at: Utc::now(),
            };
            t.tasks.push(task.clone());
            task
        }))
    }

    async fn update_task(&self, id: i64, owner: Uuid, req: UpdateTaskRequest) -> RepoResult<Option<Task>> {
        Ok(self.with(|t| {
            let task = t.tasks.iter_mut().find(|r| r.id == id && r.created_by == owner)?;
            if let Some(title) = req.title {
                task.title = title;
            }
            if let Some(description) = req.description {
                task.description = Some(description);
            }
            Some(task.clone())
        }))
    }

    async fn delete_task(&self, id: i64, owner: Uuid) -> RepoResult<bool> {
        Ok(self.with(|t| {
            let before = t.tasks.len();
            t.tasks.retain(|r| !(r.id == id && r.created_by == owner));
            t.tasks.len() < before
        }))
    }

    async fn list_notes(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Note>> {
        Ok(self.with(|t| apply_list(t.notes.iter().filter(|r| r.created_by == Some(owner)), query)))
    }

    async fn create_note(&self, owner: Uuid, req: CreateNoteRequest) -> RepoResult<Note> {
        Ok(self.with(|t| {
            let note = Note {
                id: t.next_id(),
                title: req.title,
                content: req.content,
                created_by: Some(owner),
                created_at: Utc::now(),
            };
            t.notes.push(note.clone());
            note
        }))
    }

    async fn update_note(&self, id: i64, owner: Uuid, req: UpdateNoteRequest) -> RepoResult<Option<Note>> {
        Ok(self.with(|t| {
            let note = t.notes.iter_mut().find(|r| r.id == id && r.created_by == Some(owner))?;
            if let Some(title) = req.title {
                note.title = title;
            }
            if let Some(content) = req.content {
                note.content = Some(content);
            }
            Some(note.clone())
        }))
    }

    async fn delete_note(&self, id: i64, owner: Uuid) -> RepoResult<bool> {
        Ok(self.with(|t| {
            let before = t.notes.len();
            t.notes.retain(|r| !(r.id == id && r.created_by == Some(owner)));
            t.notes.len() < before
        }))
    }

    async fn list_photos(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Photo>> {
        Ok(self.with(|t| apply_list(t.photos.iter().filter(|r| r.uploaded_by == Some(owner)), query)))
    }

    async fn get_photo(&self, id: i64, owner: Uuid) -> RepoResult<Option<Photo>> {
        Ok(self.with(|t| {
            t.photos
                .iter()
                .find(|r| r.id == id && r.uploaded_by == Some(owner))
                .cloned()
        }))
    }

    async fn create_photo(&self, owner: Uuid, name: String, url: String) -> RepoResult<Photo> {
        Ok(self.with(|t| {
            let photo = Photo {
                id: t.next_id(),
                name,
                url,
                uploaded_by: Some(owner),
                created_at: Utc::now(),
            };
            t.photos.push(photo.clone());
            photo
        }))
    }

    async fn update_photo(&self, id: i64, owner: Uuid, name: Option<String>, url: Option<String>) -> RepoResult<Option<Photo>> {
        Ok(self.with(|t| {
            let photo = t
                .photos
                .iter_mut()
                .find(|r| r.id == id && r.uploaded_by == Some(owner))?;
            if let Some(name) = name {
                photo.name = name;
            }
            if let Some(url) = url {
                photo.url = url;
            }
            Some(photo.clone())
        }))
    }

    async fn delete_photo(&self, id: i64, owner: Uuid) -> RepoResult<Option<Photo>> {
        Ok(self.with(|t| {
            let index = t
                .photos
                .iter()
                .position(|r| r.id == id && r.uploaded_by == Some(owner))?;
            Some(t.photos.remove(index))
        }))
    }

    async fn list_foods(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Food>> {
        Ok(self.with(|t| apply_list(t.foods.iter().filter(|r| r.uploaded_by == Some(owner)), query)))
    }

    async fn get_food(&self, id: i64, owner: Uuid) -> RepoResult<Option<Food>> {
        Ok(self.with(|t| {
            t.foods
                .iter()
                .find(|r| r.id == id && r.uploaded_by == Some(owner))
                .cloned()
        }))
    }

    async fn create_food(&self, owner: Uuid, name: String, url: Option<String>) -> RepoResult<Food> {
        Ok(self.with(|t| {
            let food = Food {
                id: t.next_id(),
                name,
                url,
                uploaded_by: Some(owner),
                created_at: Utc::now(),
            };
            t.foods.push(food.clone());
            food
        }))
    }

    async fn update_food(&self, id: i64, owner: Uuid, name: Option<String>, url: Option<String>) -> RepoResult<Option<Food>> {
        Ok(self.with(|t| {
            let food = t
                .foods
                .iter_mut()
                .find(|r| r.id == id && r.uploaded_by == Some(owner))?;
            if let Some(name) = name {
                food.name = name;
            }
            if url.is_some() {
                food.url = url;
            }
            Some(food.clone())
        }))
    }

    async fn delete_food(&self, id: i64, owner: Uuid) -> RepoResult<Option<Food>> {
        Ok(self.with(|t| {
            let index = t
                .foods
                .iter()
                .position(|r| r.id == id && r.uploaded_by == Some(owner))?;
            let food = t.foods.remove(index);
            // Mirrors ON DELETE CASCADE on "Review".food_id.
            t.reviews.retain(|r| r.food_id != food.id);
            Some(food)
        }))
    }

    async fn list_reviews(&self, food_ids: &[i64]) -> RepoResult<Vec<Review>> {
        Ok(self.with(|t| {
            let mut reviews: Vec<Review> = t
                .reviews
                .iter()
                .filter(|r| food_ids.contains(&r.food_id))
                .cloned()
                .collect();
            reviews.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            reviews
        }))
    }

    async fn create_review(&self, food_id: i64, owner: Uuid, req: CreateReviewRequest) -> RepoResult<Review> {
        Ok(self.with(|t| {
            let review = Review {
                id: t.next_id(),
                food_id,
                content: req.content,
                rating: req.rating,
                created_by: Some(owner),
                created_at: Utc::now(),
            };
            t.reviews.push(review.clone());
            review
        }))
    }

    async fn update_review(&self, id: i64, owner: Uuid, req: UpdateReviewRequest) -> RepoResult<Option<Review>> {
        Ok(self.with(|t| {
            let review = t
                .reviews
                .iter_mut()
                .find(|r| r.id == id && r.created_by == Some(owner))?;
            if let Some(content) = req.content {
                review.content = content;
            }
            if req.rating.is_some() {
                review.rating = req.rating;
            }
            Some(review.clone())
        }))
    }

    async fn delete_review(&self, id: i64, owner: Uuid) -> RepoResult<bool> {
        Ok(self.with(|t| {
            let before = t.reviews.len();
            t.reviews.retain(|r| !(r.id == id && r.created_by == Some(owner)));
            t.reviews.len() < before
        }))
    }

    async fn list_pokemon(&self, owner: Uuid, query: &ListQuery) -> RepoResult<Vec<Pokemon>> {
        Ok(self.with(|t| apply_list(t.pokemon.iter().filter(|r| r.created_by == owner), query)))
    }

    async fn get_pokemon(&self, id: i64, owner: Uuid) -> RepoResult<Option<Pokemon>> {
        Ok(self.with(|t| {
            t.pokemon
                .iter()
                .find(|r| r.id == id && r.created_by == owner)
                .cloned()
        }))
    }

    async fn find_pokemon_by_dex(&self, owner: Uuid, dex_number: i64) -> RepoResult<Option<Pokemon>> {
        Ok(self.with(|t| {
            t.pokemon
                .iter()
                .find(|r| r.created_by == owner && r.pokemon_id == dex_number)
                .cloned()
        }))
    }

    async fn create_pokemon(&self, owner: Uuid, req: CreatePokemonRequest) -> RepoResult<Pokemon> {
        Ok(self.with(|t| {
            let pokemon = Pokemon {
                id: t.next_id(),
                pokemon_id: req.pokemon_id,
                pokemon_name: req.pokemon_name,
                pokemon_image_url: req.pokemon_image_url,
                created_by: owner,
                created_at: Utc::now(),
            };
            t.pokemon.push(pokemon.clone());
            pokemon
        }))
    }

    async fn update_pokemon(&self, id: i64, owner: Uuid, req: UpdatePokemonRequest) -> RepoResult<Option<Pokemon>> {
        Ok(self.with(|t| {
            let pokemon = t
                .pokemon
                .iter_mut()
                .find(|r| r.id == id && r.created_by == owner)?;
            if let Some(name) = req.pokemon_name {
                pokemon.pokemon_name = name;
            }
            if let Some(url) = req.pokemon_image_url {
                pokemon.pokemon_image_url = url;
            }
            Some(pokemon.clone())
        }))
    }

    async fn delete_pokemon(&self, id: i64, owner: Uuid) -> RepoResult<bool> {
        Ok(self.with(|t| {
            let before = t.pokemon.len();
            t.pokemon.retain(|r| !(r.id == id && r.created_by == owner));
            let deleted = t.pokemon.len() < before;
            if deleted {
                t.pokemon_reviews.retain(|r| r.pokemon_id != id);
            }
            deleted
        }))
    }

    async fn list_pokemon_reviews(&self, pokemon_ids: &[i64]) -> RepoResult<Vec<PokemonReview>> {
        Ok(self.with(|t| {
            let mut reviews: Vec<PokemonReview> = t
                .pokemon_reviews
                .iter()
                .filter(|r| pokemon_ids.contains(&r.pokemon_id))
                .cloned()
                .collect();
            reviews.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            reviews
        }))
    }

    async fn create_pokemon_review(&self, pokemon_id: i64, owner: Uuid, req: CreateReviewRequest) -> RepoResult<PokemonReview> {
        Ok(self.with(|t| {
            let review = PokemonReview {
                id: t.next_id(),
                pokemon_id,
                content: req.content,
                rating: req.rating,
                created_by: Some(owner),
                created_at: Utc::now(),
            };
            t.pokemon_reviews.push(review.clone());
            review
        }))
    }

    async fn update_pokemon_review(&self, id: i64, owner: Uuid, req: UpdateReviewRequest) -> RepoResult<Option<PokemonReview>> {
        Ok(self.with(|t| {
            let review = t
                .pokemon_reviews
                .iter_mut()
                .find(|r| r.id == id && r.created_by == Some(owner))?;
            if let Some(content) = req.content {
                review.content = content;
            }
            if req.rating.is_some() {
                review.rating = req.rating;
            }
            Some(review.clone())
        }))
    }

    async fn delete_pokemon_review(&self, id: i64, owner: Uuid) -> RepoResult<bool> {
        Ok(self.with(|t| {
            let before = t.pokemon_reviews.len();
            t.pokemon_reviews.retain(|r| !(r.id == id && r.created_by == Some(owner)));
            t.pokemon_reviews.len() < before
        }))
    }
}
