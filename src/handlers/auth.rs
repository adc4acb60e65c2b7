use actix_web::{patch, post, web, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use mongodb::{
    bson::{doc, DateTime},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Database,
};
use serde_json::json;
use validator::Validate;

use crate::{
    errors::ApiError,
    middleware::auth::{issue_token, require_auth},
    models::user::{
        normalize_email, parse_birth_date, LoginDto, RegisterDto, UpdateProfileDto, User, UserRole,
    },
};

#[post("/register")]
pub async fn register(
    db: web::Data<Database>,
    body: web::Json<RegisterDto>,
) -> Result<HttpResponse, ApiError> {
    if let Err(errors) = body.validate() {
        return Err(ApiError::BadRequest(errors.to_string()));
    }

    let email = normalize_email(&body.email);
    let fecha_nacimiento = parse_birth_date(&body.fecha_nacimiento)
        .ok_or_else(|| ApiError::BadRequest("Invalid birth date".to_string()))?;

    let users = db.collection::<User>("users");
    if users.find_one(doc! { "email": &email }, None).await?.is_some() {
        return Err(ApiError::BadRequest("Email already registered".to_string()));
    }

    let hashed_password = hash(body.password.as_bytes(), DEFAULT_COST)
        .map_err(|_| ApiError::Internal("Password hashing failed".to_string()))?;

    let mut new_user = User {
        id: None,
        nombre: body.nombre.clone(),
        apellido: body.apellido.clone(),
        email,
        password: hashed_password,
        biografia: String::new(),
        foto_perfil: String::new(),
        programa: body.programa.clone(),
        fecha_nacimiento: Some(fecha_nacimiento),
        rol: UserRole::default(),
        fecha_registro: DateTime::now(),
        seguidores: Vec::new(),
        seguidos: Vec::new(),
        posts: Vec::new(),
    };

    let result = users.insert_one(&new_user, None).await?;
    let user_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::Internal("Insert returned no id".to_string()))?;
    new_user.id = Some(user_id);

    let token = issue_token(user_id)?;
    Ok(HttpResponse::Created().json(json!({
        "user": new_user.public_json(),
        "token": token,
    })))
}

#[post("/login")]
pub async fn login(
    db: web::Data<Database>,
    body: web::Json<LoginDto>,
) -> Result<HttpResponse, ApiError> {
    if let Err(errors) = body.validate() {
        return Err(ApiError::BadRequest(errors.to_string()));
    }

    let users = db.collection::<User>("users");
    let user = users
        .find_one(doc! { "email": normalize_email(&body.email) }, None)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid credentials".to_string()))?;

    if !verify(&body.password, &user.password).unwrap_or(false) {
        return Err(ApiError::BadRequest("Invalid credentials".to_string()));
    }

    let user_id = user
        .id
        .ok_or_else(|| ApiError::Internal("Stored user has no id".to_string()))?;
    let token = issue_token(user_id)?;

    Ok(HttpResponse::Ok().json(json!({
        "user": user.public_json(),
        "token": token,
    })))
}

#[patch("/profile")]
pub async fn update_profile(
    req: HttpRequest,
    db: web::Data<Database>,
    body: web::Json<UpdateProfileDto>,
) -> Result<HttpResponse, ApiError> {
    let auth_user = require_auth(&req.extensions())?;

    if let Err(errors) = body.validate() {
        return Err(ApiError::BadRequest(errors.to_string()));
    }

    let mut updates = doc! {};
    if let Some(nombre) = &body.nombre {
        updates.insert("nombre", nombre);
    }
    if let Some(apellido) = &body.apellido {
        updates.insert("apellido", apellido);
    }
    if let Some(biografia) = &body.biografia {
        updates.insert("biografia", biografia);
    }
    if let Some(foto_perfil) = &body.foto_perfil {
        updates.insert("fotoPerfil", foto_perfil);
    }
    if updates.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let users = db.collection::<User>("users");
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let updated = users
        .find_one_and_update(doc! { "_id": auth_user.id }, doc! { "$set": updates }, options)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(updated.public_json()))
}
