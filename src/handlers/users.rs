use actix_web::{delete, get, post, web, HttpMessage, HttpRequest, HttpResponse};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::FindOptions,
    Database,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    errors::ApiError,
    middleware::auth::require_auth,
    models::user::User,
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<i64>,
}

fn parse_user_id(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid user id".to_string()))
}

async fn find_user(db: &Database, id: ObjectId) -> Result<User, ApiError> {
    db.collection::<User>("users")
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

#[get("/profile/{user_id}")]
pub async fn get_profile(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_auth(&req.extensions())?;

    let user_id = parse_user_id(&path)?;
    let user = find_user(&db, user_id).await?;
    Ok(HttpResponse::Ok().json(user.public_json()))
}

#[get("/search")]
pub async fn search_users(
    db: web::Data<Database>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let pattern = query.query.trim();
    if pattern.is_empty() {
        return Ok(HttpResponse::Ok().json(json!([])));
    }

    let filter = doc! {
        "$or": [
            { "nombre": { "$regex": pattern, "$options": "i" } },
            { "apellido": { "$regex": pattern, "$options": "i" } },
            { "email": { "$regex": pattern, "$options": "i" } },
        ]
    };

    let users = db.collection::<User>("users");
    let matches: Vec<User> = users.find(filter, None).await?.try_collect().await?;
    let projected: Vec<_> = matches.iter().map(User::search_json).collect();
    Ok(HttpResponse::Ok().json(projected))
}

#[get("")]
pub async fn list_users(
    db: web::Data<Database>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let options = FindOptions::builder()
        .sort(doc! { "fechaRegistro": -1 })
        .skip((page - 1) * limit as u64)
        .limit(limit)
        .build();

    let users = db.collection::<User>("users");
    let listed: Vec<User> = users.find(doc! {}, options).await?.try_collect().await?;
    let projected: Vec<_> = listed.iter().map(User::search_json).collect();
    Ok(HttpResponse::Ok().json(projected))
}

#[post("/{user_id}/follow")]
pub async fn follow_user(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let auth_user = require_auth(&req.extensions())?;
    let target_id = parse_user_id(&path)?;

    if target_id == auth_user.id {
        return Err(ApiError::BadRequest("You cannot follow yourself".to_string()));
    }

    let actor = find_user(&db, auth_user.id).await?;
    find_user(&db, target_id).await?;

    if actor.seguidos.contains(&target_id) {
        return Err(ApiError::Conflict("Already following this user".to_string()));
    }

    // Two writes on two documents, no transaction. A failure between them
    // leaves the edge half-applied.
    let users = db.collection::<User>("users");
    users
        .update_one(
            doc! { "_id": auth_user.id },
            doc! { "$push": { "seguidos": target_id } },
            None,
        )
        .await?;
    users
        .update_one(
            doc! { "_id": target_id },
            doc! { "$push": { "seguidores": auth_user.id } },
            None,
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "User followed" })))
}

#[delete("/{user_id}/follow")]
pub async fn unfollow_user(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let auth_user = require_auth(&req.extensions())?;
    let target_id = parse_user_id(&path)?;

    let actor = find_user(&db, auth_user.id).await?;
    find_user(&db, target_id).await?;

    if !actor.seguidos.contains(&target_id) {
        return Err(ApiError::BadRequest("Not following this user".to_string()));
    }

    let users = db.collection::<User>("users");
    users
        .update_one(
            doc! { "_id": auth_user.id },
            doc! { "$pull": { "seguidos": target_id } },
            None,
        )
        .await?;
    users
        .update_one(
            doc! { "_id": target_id },
            doc! { "$pull": { "seguidores": auth_user.id } },
            None,
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "User unfollowed" })))
}

#[get("/{user_id}/following")]
pub async fn list_following(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_auth(&req.extensions())?;

    let user_id = parse_user_id(&path)?;
    let user = find_user(&db, user_id).await?;
    let cards = load_cards(&db, &user.seguidos).await?;
    Ok(HttpResponse::Ok().json(cards))
}

#[get("/{user_id}/followers")]
pub async fn list_followers(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_auth(&req.extensions())?;

    let user_id = parse_user_id(&path)?;
    let user = find_user(&db, user_id).await?;
    let cards = load_cards(&db, &user.seguidores).await?;
    Ok(HttpResponse::Ok().json(cards))
}

async fn load_cards(
    db: &Database,
    ids: &[ObjectId],
) -> Result<Vec<serde_json::Value>, ApiError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let users = db.collection::<User>("users");
    let found: Vec<User> = users
        .find(doc! { "_id": { "$in": ids.to_vec() } }, None)
        .await?
        .try_collect()
        .await?;
    Ok(found.iter().map(User::card_json).collect())
}
