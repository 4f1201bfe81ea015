mod common;

use actix_web::http::StatusCode;
use actix_web::{test, App};
use portal_server::pages;
use portal_server::Storage;

#[actix_web::test]
async fn test_profile_owner_sees_current_values() {
    let ctx = common::test_state().await;
    let (user, session) = common::create_account(&ctx, "alice@example.com", "Alice", "s3cretpass").await;
    let app = test::init_service(
        App::new()
            .app_data(ctx.state.clone())
            .configure(pages::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri(&format!("/users/profile/{}", user.id))
        .cookie(common::cookie_for(&session))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = common::body_text(resp).await;
    assert!(body.contains("alice@example.com"));
    assert!(body.contains("Alice"));
}

#[actix_web::test]
async fn test_profile_update_saves_and_redirects() {
    let ctx = common::test_state().await;
    let (user, session) = common::create_account(&ctx, "alice@example.com", "Alice", "s3cretpass").await;
    let app = test::init_service(
        App::new()
            .app_data(ctx.state.clone())
            .configure(pages::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri(&format!("/users/profile/{}", user.id))
        .cookie(common::cookie_for(&session))
        .set_form(&[("email", "alice@example.net"), ("name", "Alice Renamed")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        common::location(&resp),
        format!("/users/profile/{}?saved=1", user.id)
    );

    let stored = ctx
        .storage
        .get_user_by_id(user.id)
        .await
        .unwrap()
        .expect("account should still exist");
    assert_eq!(stored.email, "alice@example.net");
    assert_eq!(stored.name, "Alice Renamed");

    // Following the redirect shows the saved notice.
    let req = test::TestRequest::get()
        .uri(&format!("/users/profile/{}?saved=1", user.id))
        .cookie(common::cookie_for(&session))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = common::body_text(resp).await;
    assert!(body.contains("Your profile has been updated."));
    assert!(body.contains("alice@example.net"));
}

#[actix_web::test]
async fn test_profile_update_rejects_taken_email() {
    let ctx = common::test_state().await;
    let (user, session) = common::create_account(&ctx, "alice@example.com", "Alice", "s3cretpass").await;
    common::create_account(&ctx, "bob@example.com", "Bob", "s3cretpass").await;
    let app = test::init_service(
        App::new()
            .app_data(ctx.state.clone())
            .configure(pages::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri(&format!("/users/profile/{}", user.id))
        .cookie(common::cookie_for(&session))
        .set_form(&[("email", "bob@example.com"), ("name", "Alice")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = common::body_text(resp).await;
    assert!(body.contains("A user with that email address already exists."));
}

#[actix_web::test]
async fn test_profile_of_another_account_is_not_found() {
    let ctx = common::test_state().await;
    let (_, session) = common::create_account(&ctx, "alice@example.com", "Alice", "s3cretpass").await;
    let (other, _) = common::create_account(&ctx, "bob@example.com", "Bob", "s3cretpass").await;
    let app = test::init_service(
        App::new()
            .app_data(ctx.state.clone())
            .configure(pages::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri(&format!("/users/profile/{}", other.id))
        .cookie(common::cookie_for(&session))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_profile_hidden_from_anonymous_visitors() {
    let ctx = common::test_state().await;
    let (user, _) = common::create_account(&ctx, "alice@example.com", "Alice", "s3cretpass").await;
    let app = test::init_service(
        App::new()
            .app_data(ctx.state.clone())
            .configure(pages::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri(&format!("/users/profile/{}", user.id))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_profile_with_malformed_id_is_not_found() {
    let ctx = common::test_state().await;
    let (_, session) = common::create_account(&ctx, "alice@example.com", "Alice", "s3cretpass").await;
    let app = test::init_service(
        App::new()
            .app_data(ctx.state.clone())
            .configure(pages::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/users/profile/not-a-uuid")
        .cookie(common::cookie_for(&session))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_denied_profile_looks_like_missing_page() {
    let ctx = common::test_state().await;
    let (_, session) = common::create_account(&ctx, "alice@example.com", "Alice", "s3cretpass").await;
    let (other, _) = common::create_account(&ctx, "bob@example.com", "Bob", "s3cretpass").await;
    let app = test::init_service(
        App::new()
            .app_data(ctx.state.clone())
            .configure(pages::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri(&format!("/users/profile/{}", other.id))
        .cookie(common::cookie_for(&session))
        .to_request();
    let denied = test::call_service(&app, req).await;
    assert_eq!(denied.status(), StatusCode::NOT_FOUND);
    let denied_body = common::body_text(denied).await;

    let req = test::TestRequest::get().uri("/no/such/page/").to_request();
    let missing = test::call_service(&app, req).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let missing_body = common::body_text(missing).await;

    // A probe for someone else's profile is indistinguishable from a
    // URL that never existed.
    assert_eq!(denied_body, missing_body);
}

#[actix_web::test]
async fn test_profile_nav_link_uses_account_id() {
    let ctx = common::test_state().await;
    let (user, session) = common::create_account(&ctx, "alice@example.com", "Alice", "s3cretpass").await;
    let app = test::init_service(
        App::new()
            .app_data(ctx.state.clone())
            .configure(pages::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/home/")
        .cookie(common::cookie_for(&session))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = common::body_text(resp).await;
    assert!(body.contains(&format!("/users/profile/{}", user.id)));
}
