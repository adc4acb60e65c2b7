use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use super::format_date;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub nombre: String,
    pub apellido: String,
    /// Always stored trimmed and lowercased; uniqueness is checked on register.
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub biografia: String,
    #[serde(rename = "fotoPerfil", default)]
    pub foto_perfil: String,
    #[serde(default)]
    pub programa: String,
    #[serde(rename = "fechaNacimiento", skip_serializing_if = "Option::is_none")]
    pub fecha_nacimiento: Option<DateTime>,
    #[serde(default)]
    pub rol: UserRole,
    #[serde(rename = "fechaRegistro")]
    pub fecha_registro: DateTime,
    /// Users that follow this user. Mirror of `seguidos` on the other side;
    /// both lists are written by the follow handlers, nothing enforces the
    /// pairing at the storage layer.
    #[serde(default)]
    pub seguidores: Vec<ObjectId>,
    /// Users this user follows.
    #[serde(default)]
    pub seguidos: Vec<ObjectId>,
    /// Ids of posts authored by this user, kept in sync on create/delete.
    #[serde(default)]
    pub posts: Vec<ObjectId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Instructor,
    Administrator,
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Student
    }
}

impl User {
    /// Full record minus the credential hash.
    pub fn public_json(&self) -> Value {
        json!({
            "id": self.id.map(|id| id.to_hex()),
            "nombre": self.nombre,
            "apellido": self.apellido,
            "email": self.email,
            "biografia": self.biografia,
            "fotoPerfil": self.foto_perfil,
            "programa": self.programa,
            "fechaNacimiento": self.fecha_nacimiento.map(format_date),
            "rol": self.rol,
            "fechaRegistro": format_date(self.fecha_registro),
            "seguidores": hex_ids(&self.seguidores),
            "seguidos": hex_ids(&self.seguidos),
            "posts": hex_ids(&self.posts),
        })
    }

    /// Projection returned by user search and the paged listing.
    pub fn search_json(&self) -> Value {
        json!({
            "id": self.id.map(|id| id.to_hex()),
            "nombre": self.nombre,
            "apellido": self.apellido,
            "email": self.email,
            "fotoPerfil": self.foto_perfil,
            "programa": self.programa,
        })
    }

    /// Name/avatar projection used for follower listings and post authors.
    pub fn card_json(&self) -> Value {
        json!({
            "id": self.id.map(|id| id.to_hex()),
            "nombre": self.nombre,
            "apellido": self.apellido,
            "fotoPerfil": self.foto_perfil,
        })
    }
}

fn hex_ids(ids: &[ObjectId]) -> Vec<String> {
    ids.iter().map(|id| id.to_hex()).collect()
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Accepts either a full RFC 3339 timestamp or a plain `YYYY-MM-DD` date.
pub fn parse_birth_date(raw: &str) -> Option<DateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(DateTime::from_millis(dt.timestamp_millis()));
    }
    let date = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(DateTime::from_millis(midnight.and_utc().timestamp_millis()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterDto {
    #[validate(length(min = 1, max = 60))]
    pub nombre: String,
    #[validate(length(min = 1, max = 60))]
    pub apellido: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    #[validate(length(min = 1, max = 120))]
    pub programa: String,
    #[serde(rename = "fechaNacimiento")]
    pub fecha_nacimiento: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginDto {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileDto {
    #[validate(length(min = 1, max = 60))]
    pub nombre: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub apellido: Option<String>,
    #[validate(length(max = 500))]
    pub biografia: Option<String>,
    #[serde(rename = "fotoPerfil")]
    pub foto_perfil: Option<String>,
}
