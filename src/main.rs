mod config;
mod errors;
mod handlers;
mod middleware;
mod models;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use handlers::{
    auth::{login, register, update_profile},
    posts::{
        add_comment, create_post, delete_comment, delete_post, get_feed, get_user_posts,
        like_post, search_posts, unlike_post,
    },
    users::{
        follow_user, get_profile, list_followers, list_following, list_users, search_users,
        unfollow_user,
    },
};
use middleware::Authentication;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let database = config::init_database()
        .await
        .expect("Failed to connect to database");

    let port = config::get_port();
    let frontend_url = config::get_frontend_url();

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(Authentication)
            .app_data(web::Data::new(database.clone()))
            .service(
                web::scope("/api")
                    .service(
                        web::scope("/auth")
                            .service(register)
                            .service(login)
                            .service(update_profile),
                    )
                    .service(
                        web::scope("/users")
                            .service(search_users)
                            .service(get_profile)
                            .service(list_users)
                            .service(follow_user)
                            .service(unfollow_user)
                            .service(list_following)
                            .service(list_followers),
                    )
                    .service(
                        web::scope("/posts")
                            .service(get_feed)
                            .service(search_posts)
                            .service(get_user_posts)
                            .service(create_post)
                            .service(like_post)
                            .service(unlike_post)
                            .service(add_comment)
                            .service(delete_comment)
                            .service(delete_post),
                    ),
            )
    })
    .bind(("127.0.0.1", port))?
    .run()
    .await
}
