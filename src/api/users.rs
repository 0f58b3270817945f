use serde::Deserialize;
use serde_json::json;
use sqlx::{Pool, Postgres};
use warp::http::StatusCode;
use warp::{reject::Rejection, Filter, Reply};

use crate::authentication::jwt::SessionData;
use crate::authentication::middleware::{with_possible_session, with_session};
use crate::authentication::permissions::ActionType;
use crate::database::actions::{follows, users};
use crate::database::form::{Form, FormData};
use crate::database::pagination::clamp_offset;
use crate::database::schema::{Id, Profile};
use crate::error::HttpError;

use super::routes::with_pool;

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct SubscribeQuery {
    recipes_limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct SubscriptionsQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    recipes_limit: Option<i64>,
}

pub fn routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let register = warp::path!("users")
        .and(warp::post())
        .and(warp::body::json::<FormData>())
        .and(with_pool(pool.clone()))
        .and_then(register);

    let list = warp::path!("users")
        .and(warp::get())
        .and(warp::query::<PageQuery>())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(list_users);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(me);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(warp::query::<SubscriptionsQuery>())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(list_subscriptions);

    let set_password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_session())
        .and(warp::body::json::<FormData>())
        .and(with_pool(pool.clone()))
        .and_then(set_password);

    let get = warp::path!("users" / Id)
        .and(warp::get())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(get_user);

    let subscribe = warp::path!("users" / Id / "subscribe")
        .and(warp::post())
        .and(warp::query::<SubscribeQuery>())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(subscribe);

    let unsubscribe = warp::path!("users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(unsubscribe);

    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(warp::body::json::<FormData>())
        .and(with_pool(pool))
        .and_then(login);

    let logout = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session())
        .and_then(logout);

    register
        .or(list)
        .or(me)
        .or(subscriptions)
        .or(set_password)
        .or(get)
        .or(subscribe)
        .or(unsubscribe)
        .or(login)
        .or(logout)
}

async fn register(data: FormData, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let form = Form::from_data(data);
    let email = form.get_str("email")?;
    let username = form.get_str("username")?;
    let first_name = form.get_str("first_name")?;
    let last_name = form.get_str("last_name")?;
    let password = form.get_str("password")?;

    let user = users::register_user(&pool, &email, &username, &first_name, &last_name, &password)
        .await
        .map_err(|e| e.reject())?;

    Ok(warp::reply::with_status(
        warp::reply::json(&Profile::from_user(&user, false)),
        StatusCode::CREATED,
    ))
}

async fn list_users(
    query: PageQuery,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let page = users::fetch_users(&pool, viewer, clamp_offset(query.offset), query.limit)
        .await
        .map_err(|e| e.reject())?;

    Ok(warp::reply::json(&page))
}

async fn me(session: SessionData, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let profile = users::get_profile(&pool, session.user_id, Some(session.user_id))
        .await
        .map_err(|e| e.reject())?;

    match profile {
        Some(profile) => Ok(warp::reply::json(&profile)),
        None => Err(HttpError::NotFound
            .new("No user exists with specified id")
            .reject()),
    }
}

async fn get_user(
    id: Id,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let profile = users::get_profile(&pool, id, viewer)
        .await
        .map_err(|e| e.reject())?;

    match profile {
        Some(profile) => Ok(warp::reply::json(&profile)),
        None => Err(HttpError::NotFound
            .new("No user exists with specified id")
            .reject()),
    }
}

async fn set_password(
    session: SessionData,
    data: FormData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let form = Form::from_data(data);
    let current_password = form.get_str("current_password")?;
    let new_password = form.get_str("new_password")?;

    users::set_password(&pool, session.user_id, &current_password, &new_password)
        .await
        .map_err(|e| e.reject())?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn subscribe(
    id: Id,
    query: SubscribeQuery,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnSubscriptions)
        .map_err(|e| e.reject())?;

    let author = follows::follow_author(&pool, session.user_id, id)
        .await
        .map_err(|e| e.reject())?;

    let body = follows::author_with_recipes(&pool, &author, query.recipes_limit, true)
        .await
        .map_err(|e| e.reject())?;

    Ok(warp::reply::with_status(
        warp::reply::json(&body),
        StatusCode::CREATED,
    ))
}

async fn unsubscribe(
    id: Id,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnSubscriptions)
        .map_err(|e| e.reject())?;

    follows::unfollow_author(&pool, session.user_id, id)
        .await
        .map_err(|e| e.reject())?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn list_subscriptions(
    query: SubscriptionsQuery,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let page = follows::fetch_subscriptions(
        &pool,
        session.user_id,
        clamp_offset(query.offset),
        query.limit,
        query.recipes_limit,
    )
    .await
    .map_err(|e| e.reject())?;

    Ok(warp::reply::json(&page))
}

async fn login(data: FormData, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let form = Form::from_data(data);
    let email = form.get_str("email")?;
    let password = form.get_str("password")?;

    let token = users::login_user(&pool, &email, &password)
        .await
        .map_err(|e| e.reject())?;

    Ok(warp::reply::json(&json!({ "auth_token": token })))
}

/// Sessions are stateless JWTs; the reply only confirms the token was
/// valid. It expires on its own.
async fn logout(_session: SessionData) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}
