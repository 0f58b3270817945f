use sqlx::{Pool, Postgres};

use super::error::QueryError;
use crate::error::Error;

/// Ordered schema steps. Applied once each, tracked in `schema_migrations`;
/// never edit an applied step, append a new one.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_user_role_type",
        "DO $$ BEGIN
            CREATE TYPE user_role AS ENUM ('user', 'admin');
        EXCEPTION WHEN duplicate_object THEN NULL;
        END $$",
    ),
    (
        "0002_users",
        "CREATE TABLE IF NOT EXISTS users (
            id SERIAL PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            username TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            password TEXT NOT NULL,
            role user_role NOT NULL DEFAULT 'user'
        )",
    ),
    (
        "0003_tags",
        "CREATE TABLE IF NOT EXISTS tags (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            color TEXT NOT NULL UNIQUE,
            slug TEXT NOT NULL UNIQUE
        )",
    ),
    (
        "0004_ingredients",
        "CREATE TABLE IF NOT EXISTS ingredients (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            measurement_unit TEXT NOT NULL,
            UNIQUE (name, measurement_unit)
        )",
    ),
    (
        "0005_recipes",
        "CREATE TABLE IF NOT EXISTS recipes (
            id SERIAL PRIMARY KEY,
            author_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            image TEXT NOT NULL,
            text TEXT NOT NULL,
            cooking_time INTEGER NOT NULL CHECK (cooking_time BETWEEN 1 AND 32000),
            pub_date TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    ),
    (
        "0006_recipe_ingredients",
        "CREATE TABLE IF NOT EXISTS recipe_ingredients (
            recipe_id INTEGER NOT NULL REFERENCES recipes (id) ON DELETE CASCADE,
            ingredient_id INTEGER NOT NULL REFERENCES ingredients (id) ON DELETE CASCADE,
            amount INTEGER NOT NULL CHECK (amount BETWEEN 1 AND 32000),
            PRIMARY KEY (recipe_id, ingredient_id)
        )",
    ),
    (
        "0007_recipe_tags",
        "CREATE TABLE IF NOT EXISTS recipe_tags (
            recipe_id INTEGER NOT NULL REFERENCES recipes (id) ON DELETE CASCADE,
            tag_id INTEGER NOT NULL REFERENCES tags (id) ON DELETE CASCADE,
            PRIMARY KEY (recipe_id, tag_id)
        )",
    ),
    (
        "0008_favorites",
        "CREATE TABLE IF NOT EXISTS favorites (
            user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            recipe_id INTEGER NOT NULL REFERENCES recipes (id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, recipe_id)
        )",
    ),
    (
        "0009_checklist",
        "CREATE TABLE IF NOT EXISTS checklist (
            user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            recipe_id INTEGER NOT NULL REFERENCES recipes (id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, recipe_id)
        )",
    ),
    (
        "0010_follows",
        "CREATE TABLE IF NOT EXISTS follows (
            subscriber_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            author_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            PRIMARY KEY (subscriber_id, author_id)
        )",
    ),
    (
        "0011_follows_no_self",
        "ALTER TABLE follows
            ADD CONSTRAINT follows_no_self CHECK (subscriber_id <> author_id)",
    ),
    (
        "0012_recipes_pub_date_idx",
        "CREATE INDEX IF NOT EXISTS recipes_pub_date_idx ON recipes (pub_date DESC)",
    ),
];

pub async fn run_migrations(pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            name TEXT PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    for (name, ddl) in MIGRATIONS {
        let applied: Option<(String,)> =
            sqlx::query_as("SELECT name FROM schema_migrations WHERE name = $1")
                .bind(name)
                .fetch_optional(pool)
                .await
                .map_err(|e| QueryError::from(e).into())?;

        if applied.is_some() {
            continue;
        }

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| QueryError::from(e).into())?;

        sqlx::query(ddl)
            .execute(&mut *tx)
            .await
            .map_err(|e| QueryError::from(e).into())?;

        sqlx::query("INSERT INTO schema_migrations (name) VALUES ($1)")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| QueryError::from(e).into())?;

        tx.commit()
            .await
            .map_err(|e| QueryError::from(e).into())?;

        log::info!("applied migration {name}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_names_are_ordered_and_unique() {
        let names: Vec<&str> = MIGRATIONS.iter().map(|(name, _)| *name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(names, sorted);
    }
}
