use sqlx::{Pool, Postgres};

use crate::database::error::QueryError;
use crate::database::schema::{Id, Ingredient};
use crate::error::{Error, HttpError};

pub async fn list_ingredients(pool: &Pool<Postgres>) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

/// Case-insensitive name-prefix search over the catalog.
pub async fn search_ingredients(
    pool: &Pool<Postgres>,
    name: &str,
) -> Result<Vec<Ingredient>, Error> {
    let pattern = format!("{}%", name.replace('%', "\\%").replace('_', "\\_"));

    let rows: Vec<Ingredient> =
        sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name")
            .bind(pattern)
            .fetch_all(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn get_ingredient(pool: &Pool<Postgres>, id: Id) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Asserts that every id in the list exists in the catalog.
pub async fn assert_ingredients_exist(pool: &Pool<Postgres>, ids: &[Id]) -> Result<(), Error> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if found.len() != ids.len() {
        return Err(HttpError::InvalidRequest.new("Unknown ingredient id in list"));
    }

    Ok(())
}
