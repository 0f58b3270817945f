use redis::aio::MultiplexedConnection;
use serde::Deserialize;
use sqlx::{Pool, Postgres};
use warp::{reject::Rejection, Filter, Reply};

use crate::cache::cache::{cached_list, CacheKey};
use crate::database::actions::ingredients;
use crate::database::schema::Id;
use crate::error::HttpError;

use super::routes::{with_cache, with_pool};

#[derive(Debug, Default, Deserialize)]
struct IngredientQuery {
    name: Option<String>,
}

pub fn routes(
    pool: Pool<Postgres>,
    cache: MultiplexedConnection,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("ingredients")
        .and(warp::get())
        .and(warp::query::<IngredientQuery>())
        .and(with_pool(pool.clone()))
        .and(with_cache(cache))
        .and_then(list_ingredients);

    let get = warp::path!("ingredients" / Id)
        .and(warp::get())
        .and(with_pool(pool))
        .and_then(get_ingredient);

    list.or(get)
}

/// The unfiltered catalog is served from the cache; prefix searches go
/// straight to the database.
async fn list_ingredients(
    query: IngredientQuery,
    pool: Pool<Postgres>,
    mut cache: MultiplexedConnection,
) -> Result<impl Reply, Rejection> {
    let rows = match query.name.as_deref().filter(|name| !name.is_empty()) {
        Some(name) => ingredients::search_ingredients(&pool, name)
            .await
            .map_err(|e| e.reject())?,
        None => cached_list(CacheKey::IngredientCatalog, &mut cache, || async {
            ingredients::list_ingredients(&pool).await
        })
        .await
        .map_err(|e| e.reject())?,
    };

    Ok(warp::reply::json(&rows))
}

async fn get_ingredient(id: Id, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let row = ingredients::get_ingredient(&pool, id)
        .await
        .map_err(|e| e.reject())?;

    match row {
        Some(ingredient) => Ok(warp::reply::json(&ingredient)),
        None => Err(HttpError::NotFound
            .new("No ingredient exists with specified id")
            .reject()),
    }
}
