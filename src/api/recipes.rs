use std::path::PathBuf;

use serde::Deserialize;
use sqlx::{Pool, Postgres};
use warp::http::StatusCode;
use warp::{reject::Rejection, Filter, Reply};

use crate::authentication::jwt::SessionData;
use crate::authentication::middleware::{with_possible_session, with_session};
use crate::authentication::permissions::ActionType;
use crate::constants::SHOPPING_LIST_FILENAME;
use crate::database::actions::{checklist, favorites, recipes};
use crate::database::pagination::{clamp_offset, PageContext};
use crate::database::schema::{Id, RecipeFull, RecipeInput};
use crate::error::HttpError;

use super::images::{decode_base64_image, store_image};
use super::routes::{with_media_root, with_pool};

const RECIPE_BODY_LIMIT: u64 = 16 * 1024 * 1024;

/// Listing parameters, collected from raw query pairs because `tags`
/// may be repeated.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecipeQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeQuery {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut query = Self::default();

        for (key, value) in pairs {
            match key.as_str() {
                "limit" => query.limit = value.parse().ok(),
                "offset" => query.offset = value.parse().ok(),
                "author" => query.author = value.parse().ok(),
                "tags" => query.tags.push(value.clone()),
                "is_favorited" => query.is_favorited = flag(value),
                "is_in_shopping_cart" => query.is_in_shopping_cart = flag(value),
                _ => {}
            }
        }

        query
    }
}

fn flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "True")
}

#[derive(Debug, Default, Deserialize)]
struct DownloadQuery {
    format: Option<String>,
}

pub fn routes(
    pool: Pool<Postgres>,
    media_root: PathBuf,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("recipes")
        .and(warp::get())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session())
        .and(warp::body::content_length_limit(RECIPE_BODY_LIMIT))
        .and(warp::body::json::<RecipeInput>())
        .and(with_pool(pool.clone()))
        .and(with_media_root(media_root.clone()))
        .and_then(create_recipe);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(warp::query::<DownloadQuery>())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(download_shopping_cart);

    let get = warp::path!("recipes" / Id)
        .and(warp::get())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(get_recipe);

    let update = warp::path!("recipes" / Id)
        .and(warp::patch())
        .and(with_session())
        .and(warp::body::content_length_limit(RECIPE_BODY_LIMIT))
        .and(warp::body::json::<RecipeInput>())
        .and(with_pool(pool.clone()))
        .and(with_media_root(media_root))
        .and_then(update_recipe);

    let delete = warp::path!("recipes" / Id)
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(delete_recipe);

    let favorite = warp::path!("recipes" / Id / "favorite")
        .and(warp::post())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(add_favorite);

    let unfavorite = warp::path!("recipes" / Id / "favorite")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(remove_favorite);

    let cart_add = warp::path!("recipes" / Id / "shopping_cart")
        .and(warp::post())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(add_to_cart);

    let cart_remove = warp::path!("recipes" / Id / "shopping_cart")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool))
        .and_then(remove_from_cart);

    list.or(create)
        .or(download)
        .or(get)
        .or(update)
        .or(delete)
        .or(favorite)
        .or(unfavorite)
        .or(cart_add)
        .or(cart_remove)
}

async fn list_recipes(
    pairs: Vec<(String, String)>,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let query = RecipeQuery::from_pairs(&pairs);
    let viewer = session.as_ref().map(|s| s.user_id);

    // The per-user flags never match without a session.
    if (query.is_favorited || query.is_in_shopping_cart) && viewer.is_none() {
        return Ok(warp::reply::json(&PageContext::<RecipeFull>::no_rows()));
    }

    let filters = recipes::RecipeFilters {
        author: query.author,
        tags: query.tags,
        favorited_by: match (query.is_favorited, viewer) {
            (true, Some(viewer)) => Some(viewer),
            _ => None,
        },
        in_checklist_of: match (query.is_in_shopping_cart, viewer) {
            (true, Some(viewer)) => Some(viewer),
            _ => None,
        },
    };

    let page = recipes::fetch_recipes(
        &pool,
        filters,
        viewer,
        clamp_offset(query.offset),
        query.limit,
    )
    .await
    .map_err(|e| e.reject())?;

    Ok(warp::reply::json(&page))
}

async fn get_recipe(
    id: Id,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let full = recipes::get_recipe_full(&pool, id, viewer)
        .await
        .map_err(|e| e.reject())?;

    match full {
        Some(recipe) => Ok(warp::reply::json(&recipe)),
        None => Err(HttpError::NotFound
            .new("No recipe exists with specified id")
            .reject()),
    }
}

async fn create_recipe(
    session: SessionData,
    input: RecipeInput,
    pool: Pool<Postgres>,
    media_root: PathBuf,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::CreateRecipes)
        .map_err(|e| e.reject())?;
    recipes::validate_recipe_input(&input).map_err(|e| e.reject())?;

    let image_data = match input.image.as_deref().filter(|i| !i.is_empty()) {
        Some(image) => image,
        None => return Err(HttpError::InvalidRequest.new("Image must not be empty").reject()),
    };

    let (bytes, ext) = decode_base64_image(image_data).map_err(|e| e.reject())?;
    let image_url = store_image(&media_root, &bytes, ext)
        .await
        .map_err(|e| e.reject())?;

    let recipe_id = recipes::create_recipe(&pool, session.user_id, &input, &image_url)
        .await
        .map_err(|e| e.reject())?;

    let full = recipes::get_recipe_full(&pool, recipe_id, Some(session.user_id))
        .await
        .map_err(|e| e.reject())?
        .ok_or_else(|| HttpError::InternalServerError.default().reject())?;

    Ok(warp::reply::with_status(
        warp::reply::json(&full),
        StatusCode::CREATED,
    ))
}

async fn update_recipe(
    id: Id,
    session: SessionData,
    input: RecipeInput,
    pool: Pool<Postgres>,
    media_root: PathBuf,
) -> Result<impl Reply, Rejection> {
    let recipe = recipes::get_recipe_mut(&pool, id, &session)
        .await
        .map_err(|e| e.reject())?;
    recipes::validate_recipe_input(&input).map_err(|e| e.reject())?;

    let image_url = match input.image.as_deref().filter(|i| !i.is_empty()) {
        Some(image) => {
            let (bytes, ext) = decode_base64_image(image).map_err(|e| e.reject())?;
            Some(
                store_image(&media_root, &bytes, ext)
                    .await
                    .map_err(|e| e.reject())?,
            )
        }
        None => None,
    };

    recipes::update_recipe(&pool, recipe.id, &input, image_url.as_deref())
        .await
        .map_err(|e| e.reject())?;

    let full = recipes::get_recipe_full(&pool, recipe.id, Some(session.user_id))
        .await
        .map_err(|e| e.reject())?
        .ok_or_else(|| HttpError::InternalServerError.default().reject())?;

    Ok(warp::reply::json(&full))
}

async fn delete_recipe(
    id: Id,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let recipe = recipes::get_recipe_mut(&pool, id, &session)
        .await
        .map_err(|e| e.reject())?;

    recipes::delete_recipe(&pool, recipe.id)
        .await
        .map_err(|e| e.reject())?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn add_favorite(
    id: Id,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnFavorites)
        .map_err(|e| e.reject())?;

    favorites::add_to_favorites(&pool, session.user_id, id)
        .await
        .map_err(|e| e.reject())?;

    let card = recipes::recipe_card(&pool, id).await.map_err(|e| e.reject())?;

    Ok(warp::reply::with_status(
        warp::reply::json(&card),
        StatusCode::CREATED,
    ))
}

async fn remove_favorite(
    id: Id,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnFavorites)
        .map_err(|e| e.reject())?;

    favorites::remove_from_favorites(&pool, session.user_id, id)
        .await
        .map_err(|e| e.reject())?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn add_to_cart(
    id: Id,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnChecklist)
        .map_err(|e| e.reject())?;

    checklist::add_to_checklist(&pool, session.user_id, id)
        .await
        .map_err(|e| e.reject())?;

    let card = recipes::recipe_card(&pool, id).await.map_err(|e| e.reject())?;

    Ok(warp::reply::with_status(
        warp::reply::json(&card),
        StatusCode::CREATED,
    ))
}

async fn remove_from_cart(
    id: Id,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnChecklist)
        .map_err(|e| e.reject())?;

    checklist::remove_from_checklist(&pool, session.user_id, id)
        .await
        .map_err(|e| e.reject())?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn download_shopping_cart(
    query: DownloadQuery,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let items = checklist::shopping_list(&pool, session.user_id)
        .await
        .map_err(|e| e.reject())?;

    let (body, content_type, ext) = match query.format.as_deref() {
        Some("csv") => (
            checklist::render_shopping_list_csv(&items).map_err(|e| e.reject())?,
            "text/csv; charset=utf-8",
            "csv",
        ),
        _ => (
            checklist::render_shopping_list_txt(&items),
            "text/plain; charset=utf-8",
            "txt",
        ),
    };

    let response = warp::http::Response::builder()
        .header("Content-Type", content_type)
        .header(
            "Content-Disposition",
            format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}.{ext}\""),
        )
        .body(body)
        .map_err(|_| HttpError::InternalServerError.default().reject())?;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn repeated_tags_accumulate() {
        let query = RecipeQuery::from_pairs(&pairs(&[
            ("tags", "breakfast"),
            ("tags", "dinner"),
            ("author", "3"),
        ]));

        assert_eq!(query.tags, vec!["breakfast", "dinner"]);
        assert_eq!(query.author, Some(3));
        assert!(!query.is_favorited);
    }

    #[test]
    fn flags_accept_one_and_true() {
        let query = RecipeQuery::from_pairs(&pairs(&[
            ("is_favorited", "1"),
            ("is_in_shopping_cart", "true"),
        ]));

        assert!(query.is_favorited);
        assert!(query.is_in_shopping_cart);
    }

    #[test]
    fn zero_flag_is_off() {
        let query = RecipeQuery::from_pairs(&pairs(&[("is_favorited", "0")]));
        assert!(!query.is_favorited);
    }

    #[test]
    fn unknown_keys_and_garbage_numbers_are_ignored() {
        let query = RecipeQuery::from_pairs(&pairs(&[
            ("author", "abc"),
            ("limit", "12"),
            ("page_size", "5"),
        ]));

        assert_eq!(query.author, None);
        assert_eq!(query.limit, Some(12));
    }
}
