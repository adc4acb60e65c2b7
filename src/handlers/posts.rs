use actix_web::{delete, get, post, web, HttpMessage, HttpRequest, HttpResponse};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, to_bson, DateTime},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Database,
};
use serde_json::json;
use std::collections::HashMap;
use validator::Validate;

use crate::{
    errors::ApiError,
    middleware::auth::require_auth,
    models::post::{Comment, CreateCommentDto, CreatePostDto, Post, PostType, Privacy},
    models::user::User,
};

use super::users::SearchQuery;

fn parse_post_id(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid post id".to_string()))
}

fn newest_first() -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "fechaPublicacion": -1 })
        .build()
}

fn updated_post() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

#[post("")]
pub async fn create_post(
    req: HttpRequest,
    db: web::Data<Database>,
    body: web::Json<CreatePostDto>,
) -> Result<HttpResponse, ApiError> {
    let auth_user = require_auth(&req.extensions())?;

    if let Err(errors) = body.validate() {
        return Err(ApiError::BadRequest(errors.to_string()));
    }
    if body.contenido.trim().is_empty() {
        return Err(ApiError::BadRequest("Content is required".to_string()));
    }

    let mut new_post = Post {
        id: None,
        usuario: auth_user.id,
        contenido: body.contenido.clone(),
        imagen: body.imagen.clone(),
        tipo: body.tipo.clone().unwrap_or(PostType::Text),
        privacidad: body.privacidad.clone().unwrap_or(Privacy::Public),
        etiquetas: body.etiquetas.clone().unwrap_or_default(),
        likes: Vec::new(),
        comentarios: Vec::new(),
        fecha_publicacion: DateTime::now(),
    };

    let posts = db.collection::<Post>("posts");
    let result = posts.insert_one(&new_post, None).await?;
    let post_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::Internal("Insert returned no id".to_string()))?;
    new_post.id = Some(post_id);

    // Denormalized backreference on the author; kept in sync on delete.
    db.collection::<User>("users")
        .update_one(
            doc! { "_id": auth_user.id },
            doc! { "$push": { "posts": post_id } },
            None,
        )
        .await?;

    Ok(HttpResponse::Created().json(new_post.to_json(None)))
}

#[get("/feed")]
pub async fn get_feed(
    req: HttpRequest,
    db: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
    let auth_user = require_auth(&req.extensions())?;

    let viewer = db
        .collection::<User>("users")
        .find_one(doc! { "_id": auth_user.id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    // Following nobody means an empty feed; own posts are never included.
    if viewer.seguidos.is_empty() {
        return Ok(HttpResponse::Ok().json(json!([])));
    }

    let posts: Vec<Post> = db
        .collection::<Post>("posts")
        .find(
            doc! { "usuario": { "$in": viewer.seguidos.clone() } },
            newest_first(),
        )
        .await?
        .try_collect()
        .await?;

    let authors = load_author_cards(&db, &posts).await?;
    let feed: Vec<_> = posts
        .iter()
        .map(|post| post.to_json(authors.get(&post.usuario)))
        .collect();
    Ok(HttpResponse::Ok().json(feed))
}

#[get("/user/{user_id}")]
pub async fn get_user_posts(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_auth(&req.extensions())?;

    let user_id = ObjectId::parse_str(path.as_str())
        .map_err(|_| ApiError::BadRequest("Invalid user id".to_string()))?;

    db.collection::<User>("users")
        .find_one(doc! { "_id": user_id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let posts: Vec<Post> = db
        .collection::<Post>("posts")
        .find(doc! { "usuario": user_id }, newest_first())
        .await?
        .try_collect()
        .await?;

    let listed: Vec<_> = posts.iter().map(|post| post.to_json(None)).collect();
    Ok(HttpResponse::Ok().json(listed))
}

#[get("/search")]
pub async fn search_posts(
    db: web::Data<Database>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let pattern = query.query.trim();
    if pattern.is_empty() {
        return Ok(HttpResponse::Ok().json(json!([])));
    }

    let filter = doc! {
        "$or": [
            { "contenido": { "$regex": pattern, "$options": "i" } },
            { "etiquetas": { "$regex": pattern, "$options": "i" } },
        ]
    };

    let posts: Vec<Post> = db
        .collection::<Post>("posts")
        .find(filter, newest_first())
        .await?
        .try_collect()
        .await?;

    let listed: Vec<_> = posts.iter().map(|post| post.to_json(None)).collect();
    Ok(HttpResponse::Ok().json(listed))
}

#[post("/{post_id}/like")]
pub async fn like_post(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let auth_user = require_auth(&req.extensions())?;
    let post_id = parse_post_id(&path)?;

    let posts = db.collection::<Post>("posts");
    let post = posts
        .find_one(doc! { "_id": post_id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    if post.likes.contains(&auth_user.id) {
        return Err(ApiError::Conflict("Post already liked".to_string()));
    }

    let updated = posts
        .find_one_and_update(
            doc! { "_id": post_id },
            doc! { "$push": { "likes": auth_user.id } },
            updated_post(),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    Ok(HttpResponse::Ok().json(updated.to_json(None)))
}

#[delete("/{post_id}/like")]
pub async fn unlike_post(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let auth_user = require_auth(&req.extensions())?;
    let post_id = parse_post_id(&path)?;

    let posts = db.collection::<Post>("posts");
    let post = posts
        .find_one(doc! { "_id": post_id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    if !post.likes.contains(&auth_user.id) {
        return Err(ApiError::BadRequest("Post not liked".to_string()));
    }

    let updated = posts
        .find_one_and_update(
            doc! { "_id": post_id },
            doc! { "$pull": { "likes": auth_user.id } },
            updated_post(),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    Ok(HttpResponse::Ok().json(updated.to_json(None)))
}

#[post("/{post_id}/comment")]
pub async fn add_comment(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<String>,
    body: web::Json<CreateCommentDto>,
) -> Result<HttpResponse, ApiError> {
    let auth_user = require_auth(&req.extensions())?;
    let post_id = parse_post_id(&path)?;

    if let Err(errors) = body.validate() {
        return Err(ApiError::BadRequest(errors.to_string()));
    }

    let comment = Comment {
        id: ObjectId::new(),
        usuario: auth_user.id,
        contenido: body.contenido.clone(),
        fecha: DateTime::now(),
    };

    let updated = db
        .collection::<Post>("posts")
        .find_one_and_update(
            doc! { "_id": post_id },
            doc! { "$push": { "comentarios": to_bson(&comment)? } },
            updated_post(),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    Ok(HttpResponse::Ok().json(updated.to_json(None)))
}

#[delete("/{post_id}/comment/{comment_id}")]
pub async fn delete_comment(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let auth_user = require_auth(&req.extensions())?;
    let (post_id, comment_id) = path.into_inner();
    let post_id = parse_post_id(&post_id)?;
    let comment_id = ObjectId::parse_str(&comment_id)
        .map_err(|_| ApiError::BadRequest("Invalid comment id".to_string()))?;

    // A comment is removed only when both the id and the author match the
    // caller. A matching id owned by someone else is left in place and the
    // post is returned unchanged.
    let updated = db
        .collection::<Post>("posts")
        .find_one_and_update(
            doc! { "_id": post_id },
            doc! { "$pull": { "comentarios": { "_id": comment_id, "usuario": auth_user.id } } },
            updated_post(),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    Ok(HttpResponse::Ok().json(updated.to_json(None)))
}

#[delete("/{post_id}")]
pub async fn delete_post(
    req: HttpRequest,
    db: web::Data<Database>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let auth_user = require_auth(&req.extensions())?;
    let post_id = parse_post_id(&path)?;

    let posts = db.collection::<Post>("posts");
    let post = posts
        .find_one(doc! { "_id": post_id }, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    if post.usuario != auth_user.id {
        return Err(ApiError::Forbidden(
            "Only the author can delete this post".to_string(),
        ));
    }

    posts.delete_one(doc! { "_id": post_id }, None).await?;

    // Retract the backreference from the author's post list.
    db.collection::<User>("users")
        .update_one(
            doc! { "_id": post.usuario },
            doc! { "$pull": { "posts": post_id } },
            None,
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Post deleted" })))
}

async fn load_author_cards(
    db: &Database,
    posts: &[Post],
) -> Result<HashMap<ObjectId, serde_json::Value>, ApiError> {
    let mut author_ids: Vec<ObjectId> = posts.iter().map(|post| post.usuario).collect();
    author_ids.sort();
    author_ids.dedup();
    if author_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let authors: Vec<User> = db
        .collection::<User>("users")
        .find(doc! { "_id": { "$in": author_ids } }, None)
        .await?
        .try_collect()
        .await?;

    Ok(authors
        .iter()
        .filter_map(|user| user.id.map(|id| (id, user.card_json())))
        .collect())
}
