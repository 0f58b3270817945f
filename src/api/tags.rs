use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres};
use warp::{reject::Rejection, Filter, Reply};

use crate::cache::cache::{cached_list, CacheKey};
use crate::database::actions::tags;
use crate::database::schema::Id;
use crate::error::HttpError;

use super::routes::{with_cache, with_pool};

pub fn routes(
    pool: Pool<Postgres>,
    cache: MultiplexedConnection,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("tags")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and(with_cache(cache))
        .and_then(list_tags);

    let get = warp::path!("tags" / Id)
        .and(warp::get())
        .and(with_pool(pool))
        .and_then(get_tag);

    list.or(get)
}

async fn list_tags(
    pool: Pool<Postgres>,
    mut cache: MultiplexedConnection,
) -> Result<impl Reply, Rejection> {
    let tags = cached_list(CacheKey::Tags, &mut cache, || async {
        tags::list_tags(&pool).await
    })
    .await
    .map_err(|e| e.reject())?;

    Ok(warp::reply::json(&tags))
}

async fn get_tag(id: Id, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let tag = tags::get_tag(&pool, id).await.map_err(|e| e.reject())?;

    match tag {
        Some(tag) => Ok(warp::reply::json(&tag)),
        None => Err(HttpError::NotFound.new("No tag exists with specified id").reject()),
    }
}
