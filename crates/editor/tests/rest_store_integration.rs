use std::sync::Arc;

use chrono::Utc;
use idox_common::types::{DocumentContent, DocumentPatch, NewDocument, Permission};
use idox_editor::session::{Identity, Session};
use idox_editor::store::{DocumentStore, RestStore, StoreError};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANON_KEY: &str = "anon-key";

fn document_row(id: Uuid, title: &str, html: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "content": { "html": html, "lastModified": "2024-05-01T10:00:00Z" },
        "owner_id": "user-1",
        "is_public": false,
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:00Z",
    })
}

fn store_for(server: &MockServer, session: Session) -> RestStore {
    RestStore::new(&server.uri(), ANON_KEY, Arc::new(session)).expect("valid base url")
}

#[tokio::test]
async fn insert_posts_row_and_returns_representation() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/rest/v1/documents"))
        .and(header("apikey", ANON_KEY))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({ "title": "Plan", "owner_id": "user-1" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([document_row(id, "Plan", "")])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server, Session::anonymous());
    let created = store
        .insert(NewDocument {
            title: "Plan".into(),
            content: DocumentContent::html("", Utc::now()),
            owner_id: "user-1".into(),
        })
        .await
        .expect("insert should succeed");
    assert_eq!(created.id, id);
    assert_eq!(created.title, "Plan");
}

#[tokio::test]
async fn signed_in_requests_carry_session_bearer() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/documents"))
        .and(query_param("id", format!("eq.{id}")))
        .and(header("authorization", "Bearer session-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([document_row(id, "Mine", "<p>x</p>")])))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::signed_in(Identity::new("user-1").with_access_token("session-token"));
    let store = store_for(&server, session);
    let fetched = store.fetch(id).await.expect("fetch").expect("row present");
    assert_eq!(fetched.html(), "<p>x</p>");
}

#[tokio::test]
async fn anonymous_requests_fall_back_to_anon_key_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/documents"))
        .and(header("authorization", format!("Bearer {ANON_KEY}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server, Session::anonymous());
    assert!(store.fetch(Uuid::new_v4()).await.expect("fetch").is_none());
}

#[tokio::test]
async fn update_sends_patch_with_timestamp() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/documents"))
        .and(query_param("id", format!("eq.{id}")))
        .and(body_partial_json(json!({ "title": "Renamed", "content": { "html": "<p>b</p>" } })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([document_row(id, "Renamed", "<p>b</p>")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server, Session::anonymous());
    let updated = store
        .update(id, DocumentPatch::content("<p>b</p>", Some("Renamed".into()), Utc::now()))
        .await
        .expect("update should succeed");
    assert_eq!(updated.title, "Renamed");

    let requests = server.received_requests().await.expect("recording enabled");
    let body: Value = serde_json::from_slice(&requests[0].body).expect("json body");
    assert!(body.get("updated_at").is_some());
    assert!(body.get("share_code").is_none());
}

#[tokio::test]
async fn update_matching_no_rows_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store_for(&server, Session::anonymous());
    let err = store.update(Uuid::new_v4(), DocumentPatch::default()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn rejection_surfaces_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/documents"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({ "message": "permission denied" })),
        )
        .mount(&server)
        .await;

    let store = store_for(&server, Session::anonymous());
    match store.delete(Uuid::new_v4()).await.unwrap_err() {
        StoreError::Rejected { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "permission denied");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn find_shared_filters_public_rows() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let mut row = document_row(id, "Public", "<p>hi</p>");
    row["is_public"] = json!(true);
    row["share_code"] = json!("abc123");
    Mock::given(method("GET"))
        .and(path("/rest/v1/documents"))
        .and(query_param("share_code", "eq.abc123"))
        .and(query_param("is_public", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server, Session::anonymous());
    let shared = store.find_shared("abc123").await.expect("lookup").expect("shared row");
    assert!(shared.is_public);
    assert_eq!(shared.share_code.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn add_collaborator_resolves_profile_by_email_prefix() {
    let server = MockServer::start().await;
    let doc_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("username", "eq.bob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "user_id": "user-2" }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/document_collaborators"))
        .and(body_partial_json(json!({ "user_id": "user-2", "permission": "edit" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server, Session::anonymous());
    let collaborator = store
        .add_collaborator(doc_id, "bob@example.com", Permission::Edit)
        .await
        .expect("invite should succeed");
    assert_eq!(collaborator.user_id.as_deref(), Some("user-2"));
    assert_eq!(collaborator.username.as_deref(), Some("bob"));
}

#[tokio::test]
async fn add_collaborator_unknown_user_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store_for(&server, Session::anonymous());
    let err = store
        .add_collaborator(Uuid::new_v4(), "ghost@example.com", Permission::View)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn list_collaborators_reads_embedded_profile() {
    let server = MockServer::start().await;
    let doc_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/document_collaborators"))
        .and(query_param("document_id", format!("eq.{doc_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "document_id": doc_id,
                "user_id": "user-2",
                "permission": "admin",
                "profiles": { "username": "bob", "avatar_url": null }
            }
        ])))
        .mount(&server)
        .await;

    let store = store_for(&server, Session::anonymous());
    let collaborators = store.list_collaborators(doc_id).await.expect("list");
    assert_eq!(collaborators.len(), 1);
    assert_eq!(collaborators[0].username.as_deref(), Some("bob"));
    assert_eq!(collaborators[0].permission, Permission::Admin);
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let store = RestStore::new("http://127.0.0.1:9", ANON_KEY, Arc::new(Session::anonymous()))
        .expect("valid base url");
    let err = store.fetch(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StoreError::Network(_)));
}
