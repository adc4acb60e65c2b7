use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use super::format_date;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Post {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Author reference, immutable after creation.
    pub usuario: ObjectId,
    pub contenido: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imagen: Option<String>,
    #[serde(default)]
    pub tipo: PostType,
    /// Stored but never used as a read filter.
    #[serde(default)]
    pub privacidad: Privacy,
    #[serde(default)]
    pub etiquetas: Vec<String>,
    /// Unique membership: a user id appears at most once. A duplicate like
    /// is rejected by the handler, not deduplicated.
    #[serde(default)]
    pub likes: Vec<ObjectId>,
    /// Append-only; each comment carries its own id for later deletion.
    #[serde(default)]
    pub comentarios: Vec<Comment>,
    #[serde(rename = "fechaPublicacion")]
    pub fecha_publicacion: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub usuario: ObjectId,
    pub contenido: String,
    pub fecha: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Text,
    Image,
    Video,
}

impl Default for PostType {
    fn default() -> Self {
        PostType::Text
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Followers,
    Private,
}

impl Default for Privacy {
    fn default() -> Self {
        Privacy::Public
    }
}

impl Post {
    /// Wire representation with ids as hex strings. `author` replaces the
    /// raw author id with a name/avatar projection when provided (feed).
    pub fn to_json(&self, author: Option<&Value>) -> Value {
        let usuario = match author {
            Some(card) => card.clone(),
            None => json!(self.usuario.to_hex()),
        };
        json!({
            "id": self.id.map(|id| id.to_hex()),
            "usuario": usuario,
            "contenido": self.contenido,
            "imagen": self.imagen,
            "tipo": self.tipo,
            "privacidad": self.privacidad,
            "etiquetas": self.etiquetas,
            "likes": self.likes.iter().map(|id| id.to_hex()).collect::<Vec<_>>(),
            "comentarios": self.comentarios.iter().map(Comment::to_json).collect::<Vec<_>>(),
            "fechaPublicacion": format_date(self.fecha_publicacion),
        })
    }
}

impl Comment {
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id.to_hex(),
            "usuario": self.usuario.to_hex(),
            "contenido": self.contenido,
            "fecha": format_date(self.fecha),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostDto {
    #[validate(length(min = 1, max = 5000))]
    pub contenido: String,
    pub imagen: Option<String>,
    pub tipo: Option<PostType>,
    pub privacidad: Option<Privacy>,
    pub etiquetas: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentDto {
    #[validate(length(min = 1, max = 1000))]
    pub contenido: String,
}
