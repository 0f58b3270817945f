use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::database::error::QueryError;
use crate::database::schema::Id;
use crate::error::{Error, HttpError};

use super::recipes::get_recipe;

pub async fn is_favorite(
    pool: &Pool<Postgres>,
    user_id: Id,
    recipe_id: Id,
) -> Result<bool, Error> {
    let result: Option<(Id,)> = sqlx::query_as(
        "
        SELECT recipe_id FROM favorites WHERE recipe_id = $1 AND user_id = $2
    ",
    )
    .bind(recipe_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(result.is_some())
}

/// Membership lookup for a page of recipes, one round trip.
pub async fn favorite_recipe_ids(
    pool: &Pool<Postgres>,
    user_id: Id,
    recipe_ids: &[Id],
) -> Result<HashSet<Id>, Error> {
    let rows: Vec<(Id,)> = sqlx::query_as(
        "SELECT recipe_id FROM favorites WHERE user_id = $1 AND recipe_id = ANY($2)",
    )
    .bind(user_id)
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

pub async fn add_to_favorites(
    pool: &Pool<Postgres>,
    user_id: Id,
    recipe_id: Id,
) -> Result<(), Error> {
    if get_recipe(pool, recipe_id).await?.is_none() {
        return Err(HttpError::InvalidRequest.new("No recipe exists with specified id"));
    }

    let result = sqlx::query(
        "INSERT INTO favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(HttpError::InvalidRequest.new("Recipe is already in favorites"));
    }

    Ok(())
}

pub async fn remove_from_favorites(
    pool: &Pool<Postgres>,
    user_id: Id,
    recipe_id: Id,
) -> Result<(), Error> {
    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(HttpError::InvalidRequest.new("Recipe is not in favorites"));
    }

    Ok(())
}
