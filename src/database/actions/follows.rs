use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::constants::{MAX_PAGE_LIMIT, SUBSCRIPTION_COUNT_PER_PAGE};
use crate::database::error::QueryError;
use crate::database::pagination::{clamp_limit, PageContext};
use crate::database::schema::{AuthorWithRecipes, FollowedAuthorRow, Id, User};
use crate::error::{Error, HttpError};

use super::recipes::{author_recipe_cards, count_author_recipes};
use super::users::get_user_by_id;

/// Which of `author_ids` the viewer follows, one round trip.
pub async fn subscribed_author_ids(
    pool: &Pool<Postgres>,
    subscriber_id: Id,
    author_ids: &[Id],
) -> Result<HashSet<Id>, Error> {
    let rows: Vec<(Id,)> = sqlx::query_as(
        "SELECT author_id FROM follows WHERE subscriber_id = $1 AND author_id = ANY($2)",
    )
    .bind(subscriber_id)
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

pub async fn follow_author(
    pool: &Pool<Postgres>,
    subscriber_id: Id,
    author_id: Id,
) -> Result<User, Error> {
    if subscriber_id == author_id {
        return Err(HttpError::InvalidRequest.new("You cannot subscribe to yourself"));
    }

    let author = match get_user_by_id(pool, author_id).await? {
        Some(author) => author,
        None => return Err(HttpError::NotFound.new("No user exists with specified id")),
    };

    let result = sqlx::query(
        "INSERT INTO follows (subscriber_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(subscriber_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(HttpError::InvalidRequest.new("Already subscribed to this user"));
    }

    Ok(author)
}

pub async fn unfollow_author(
    pool: &Pool<Postgres>,
    subscriber_id: Id,
    author_id: Id,
) -> Result<(), Error> {
    let result = sqlx::query("DELETE FROM follows WHERE subscriber_id = $1 AND author_id = $2")
        .bind(subscriber_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(HttpError::InvalidRequest.new("No such subscription"));
    }

    Ok(())
}

/// Builds the subscription representation of one author: profile plus
/// an optionally truncated recipe list and the full recipe count.
pub async fn author_with_recipes(
    pool: &Pool<Postgres>,
    author: &User,
    recipes_limit: Option<i64>,
    is_subscribed: bool,
) -> Result<AuthorWithRecipes, Error> {
    let recipes = author_recipe_cards(pool, author.id, recipes_limit).await?;
    let recipes_count = count_author_recipes(pool, author.id).await?;

    Ok(AuthorWithRecipes {
        email: author.email.clone(),
        id: author.id,
        username: author.username.clone(),
        first_name: author.first_name.clone(),
        last_name: author.last_name.clone(),
        is_subscribed,
        recipes,
        recipes_count,
    })
}

pub async fn fetch_subscriptions(
    pool: &Pool<Postgres>,
    subscriber_id: Id,
    offset: i64,
    limit: Option<i64>,
    recipes_limit: Option<i64>,
) -> Result<PageContext<AuthorWithRecipes>, Error> {
    let limit = clamp_limit(limit, SUBSCRIPTION_COUNT_PER_PAGE, MAX_PAGE_LIMIT);

    let rows: Vec<FollowedAuthorRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name, COUNT(*) OVER() AS count
        FROM follows f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.subscriber_id = $1
        ORDER BY u.first_name, u.last_name, u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(subscriber_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);

    let mut authors = Vec::with_capacity(rows.len());
    for row in rows {
        let recipes = author_recipe_cards(pool, row.id, recipes_limit).await?;
        let recipes_count = count_author_recipes(pool, row.id).await?;

        authors.push(AuthorWithRecipes {
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: true,
            recipes,
            recipes_count,
        });
    }

    Ok(PageContext::from_rows(authors, total_count, limit, offset))
}
