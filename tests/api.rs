//! End-to-end tests against a running instance (server + MongoDB).
//! Start the server, then run `cargo test -- --ignored`.

use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

fn base_url() -> String {
    std::env::var("TEST_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string())
}

fn unique_email(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}_{}@test.example", prefix, nanos)
}

async fn register_user(client: &reqwest::Client, prefix: &str) -> (String, String) {
    let body = json!({
        "nombre": "Test",
        "apellido": prefix,
        "email": unique_email(prefix),
        "password": "secret123",
        "programa": "ADSI",
        "fechaNacimiento": "2000-01-15"
    });

    let resp = client
        .post(format!("{}/api/auth/register", base_url()))
        .json(&body)
        .send()
        .await
        .expect("register request failed");
    assert_eq!(resp.status(), 201);

    let data = resp.json::<Value>().await.unwrap();
    let token = data["token"].as_str().expect("token missing").to_string();
    let user_id = data["user"]["id"].as_str().expect("user id missing").to_string();
    (token, user_id)
}

async fn create_post(client: &reqwest::Client, token: &str, contenido: &str) -> String {
    let resp = client
        .post(format!("{}/api/posts", base_url()))
        .bearer_auth(token)
        .json(&json!({ "contenido": contenido }))
        .send()
        .await
        .expect("create post request failed");
    assert_eq!(resp.status(), 201);
    let post = resp.json::<Value>().await.unwrap();
    post["id"].as_str().expect("post id missing").to_string()
}

#[tokio::test]
#[ignore = "requires a running server and MongoDB"]
async fn register_then_login_yields_same_user() {
    let client = reqwest::Client::new();
    let email = unique_email("login");

    let resp = client
        .post(format!("{}/api/auth/register", base_url()))
        .json(&json!({
            "nombre": "Ana",
            "apellido": "Gomez",
            "email": &email,
            "password": "secret123",
            "programa": "ADSI",
            "fechaNacimiento": "1999-04-23"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let registered = resp.json::<Value>().await.unwrap();
    let user_id = registered["user"]["id"].as_str().unwrap().to_string();
    assert!(registered["user"]["password"].is_null(), "password hash must not leak");

    let resp = client
        .post(format!("{}/api/auth/login", base_url()))
        .json(&json!({ "email": &email, "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let logged_in = resp.json::<Value>().await.unwrap();
    assert_eq!(logged_in["user"]["id"].as_str().unwrap(), user_id);
    assert!(logged_in["token"].is_string());
}

#[tokio::test]
#[ignore = "requires a running server and MongoDB"]
async fn duplicate_email_is_rejected() {
    let client = reqwest::Client::new();
    let email = unique_email("dup");
    let body = json!({
        "nombre": "Ana",
        "apellido": "Gomez",
        "email": &email,
        "password": "secret123",
        "programa": "ADSI",
        "fechaNacimiento": "1999-04-23"
    });

    let first = client
        .post(format!("{}/api/auth/register", base_url()))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 201);

    let second = client
        .post(format!("{}/api/auth/register", base_url()))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 400);
    let error = second.json::<Value>().await.unwrap();
    assert!(error["error"].is_string());
}

#[tokio::test]
#[ignore = "requires a running server and MongoDB"]
async fn double_like_fails_and_unlike_restores() {
    let client = reqwest::Client::new();
    let (author_token, author_id) = register_user(&client, "author").await;
    let (liker_token, liker_id) = register_user(&client, "liker").await;
    let post_id = create_post(&client, &author_token, "hello").await;

    let like_url = format!("{}/api/posts/{}/like", base_url(), post_id);

    let resp = client.post(&like_url).bearer_auth(&liker_token).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let post = resp.json::<Value>().await.unwrap();
    assert_eq!(post["likes"], json!([liker_id]));

    // Second like by the same user is rejected, likes unchanged
    let resp = client.post(&like_url).bearer_auth(&liker_token).send().await.unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .get(format!("{}/api/posts/user/{}", base_url(), author_id))
        .bearer_auth(&liker_token)
        .send()
        .await
        .unwrap();
    let posts = resp.json::<Value>().await.unwrap();
    assert_eq!(posts[0]["likes"], json!([liker_id]));

    let resp = client.delete(&like_url).bearer_auth(&liker_token).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let post = resp.json::<Value>().await.unwrap();
    assert_eq!(post["likes"], json!([]));

    // Unliking again is a client error
    let resp = client.delete(&like_url).bearer_auth(&liker_token).send().await.unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
#[ignore = "requires a running server and MongoDB"]
async fn follow_is_mirrored_in_both_listings() {
    let client = reqwest::Client::new();
    let (token_a, id_a) = register_user(&client, "follower").await;
    let (_token_b, id_b) = register_user(&client, "followed").await;

    let follow_url = format!("{}/api/users/{}/follow", base_url(), id_b);
    let resp = client.post(&follow_url).bearer_auth(&token_a).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    // Duplicate follow is rejected
    let resp = client.post(&follow_url).bearer_auth(&token_a).send().await.unwrap();
    assert_eq!(resp.status(), 400);

    let following = client
        .get(format!("{}/api/users/{}/following", base_url(), id_a))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert!(following
        .as_array()
        .unwrap()
        .iter()
        .any(|card| card["id"] == json!(id_b)));

    let followers = client
        .get(format!("{}/api/users/{}/followers", base_url(), id_b))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert!(followers
        .as_array()
        .unwrap()
        .iter()
        .any(|card| card["id"] == json!(id_a)));

    let resp = client.delete(&follow_url).bearer_auth(&token_a).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    // Unfollowing a non-existent edge is a client error
    let resp = client.delete(&follow_url).bearer_auth(&token_a).send().await.unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
#[ignore = "requires a running server and MongoDB"]
async fn self_follow_is_rejected() {
    let client = reqwest::Client::new();
    let (token, id) = register_user(&client, "narcissist").await;

    let resp = client
        .post(format!("{}/api/users/{}/follow", base_url(), id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
#[ignore = "requires a running server and MongoDB"]
async fn only_the_author_can_delete_a_post() {
    let client = reqwest::Client::new();
    let (author_token, author_id) = register_user(&client, "owner").await;
    let (other_token, _other_id) = register_user(&client, "intruder").await;
    let post_id = create_post(&client, &author_token, "mine").await;

    let delete_url = format!("{}/api/posts/{}", base_url(), post_id);

    let resp = client.delete(&delete_url).bearer_auth(&other_token).send().await.unwrap();
    assert_eq!(resp.status(), 403);

    // Still retrievable after the failed delete
    let posts = client
        .get(format!("{}/api/posts/user/{}", base_url(), author_id))
        .bearer_auth(&author_token)
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert!(posts
        .as_array()
        .unwrap()
        .iter()
        .any(|post| post["id"] == json!(post_id)));

    let resp = client.delete(&delete_url).bearer_auth(&author_token).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let posts = client
        .get(format!("{}/api/posts/user/{}", base_url(), author_id))
        .bearer_auth(&author_token)
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert!(posts
        .as_array()
        .unwrap()
        .iter()
        .all(|post| post["id"] != json!(post_id)));
}

#[tokio::test]
#[ignore = "requires a running server and MongoDB"]
async fn feed_tracks_the_follow_graph() {
    let client = reqwest::Client::new();
    let (viewer_token, _viewer_id) = register_user(&client, "viewer").await;
    let (author_token, author_id) = register_user(&client, "feedauthor").await;

    // Following nobody yields an empty feed
    let feed = client
        .get(format!("{}/api/posts/feed", base_url()))
        .bearer_auth(&viewer_token)
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(feed, json!([]));

    // Viewer's own posts never show up in their feed
    create_post(&client, &viewer_token, "my own post").await;

    let follow_url = format!("{}/api/users/{}/follow", base_url(), author_id);
    let resp = client.post(&follow_url).bearer_auth(&viewer_token).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let post_id = create_post(&client, &author_token, "from someone I follow").await;

    let feed = client
        .get(format!("{}/api/posts/feed", base_url()))
        .bearer_auth(&viewer_token)
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    let entries = feed.as_array().unwrap();
    assert!(entries.iter().any(|post| post["id"] == json!(post_id)));
    assert!(entries
        .iter()
        .all(|post| post["contenido"] != json!("my own post")));
    // Feed entries carry the author projection, not a raw id
    let entry = entries
        .iter()
        .find(|post| post["id"] == json!(post_id))
        .unwrap();
    assert!(entry["usuario"]["nombre"].is_string());

    let resp = client.delete(&follow_url).bearer_auth(&viewer_token).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let feed = client
        .get(format!("{}/api/posts/feed", base_url()))
        .bearer_auth(&viewer_token)
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert!(feed
        .as_array()
        .unwrap()
        .iter()
        .all(|post| post["id"] != json!(post_id)));
}

#[tokio::test]
#[ignore = "requires a running server and MongoDB"]
async fn comments_are_removed_only_by_their_author() {
    let client = reqwest::Client::new();
    let (author_token, _author_id) = register_user(&client, "postowner").await;
    let (commenter_token, commenter_id) = register_user(&client, "commenter").await;
    let post_id = create_post(&client, &author_token, "comment on this").await;

    let resp = client
        .post(format!("{}/api/posts/{}/comment", base_url(), post_id))
        .bearer_auth(&commenter_token)
        .json(&json!({ "contenido": "nice post" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let post = resp.json::<Value>().await.unwrap();
    let comment = &post["comentarios"][0];
    assert_eq!(comment["usuario"], json!(commenter_id));
    let comment_id = comment["id"].as_str().unwrap().to_string();

    let delete_url = format!(
        "{}/api/posts/{}/comment/{}",
        base_url(),
        post_id,
        comment_id
    );

    // A non-author delete succeeds as a request but leaves the comment
    let resp = client.delete(&delete_url).bearer_auth(&author_token).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let post = resp.json::<Value>().await.unwrap();
    assert_eq!(post["comentarios"].as_array().unwrap().len(), 1);

    let resp = client.delete(&delete_url).bearer_auth(&commenter_token).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let post = resp.json::<Value>().await.unwrap();
    assert_eq!(post["comentarios"], json!([]));
}

#[tokio::test]
#[ignore = "requires a running server and MongoDB"]
async fn protected_routes_require_a_token() {
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/posts", base_url()))
        .json(&json!({ "contenido": "no auth" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{}/api/posts/feed", base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}
