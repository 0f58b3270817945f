use std::convert::Infallible;
use std::path::PathBuf;

use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres};
use warp::{reject::Rejection, Filter, Reply};

use super::{ingredients, recipes, tags, users};

pub(crate) fn with_pool(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (Pool<Postgres>,), Error = Infallible> + Clone {
    warp::any().map(move || pool.clone())
}

pub(crate) fn with_cache(
    cache: MultiplexedConnection,
) -> impl Filter<Extract = (MultiplexedConnection,), Error = Infallible> + Clone {
    warp::any().map(move || cache.clone())
}

pub(crate) fn with_media_root(
    media_root: PathBuf,
) -> impl Filter<Extract = (PathBuf,), Error = Infallible> + Clone {
    warp::any().map(move || media_root.clone())
}

/// The complete filter tree: the JSON API under `/api`, stored recipe
/// images under `/media`.
pub fn routes(
    pool: Pool<Postgres>,
    cache: MultiplexedConnection,
    media_root: PathBuf,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let api = warp::path("api").and(
        tags::routes(pool.clone(), cache.clone())
            .or(ingredients::routes(pool.clone(), cache))
            .or(recipes::routes(pool.clone(), media_root.clone()))
            .or(users::routes(pool)),
    );

    let media = warp::path("media").and(warp::fs::dir(media_root));

    api.or(media)
}
