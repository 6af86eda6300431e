//! Approval Tests
//!
//! Covers approval requests, management review and the moderation audit log.

mod common;

use axum::http::StatusCode;
use common::{app, TestApp, TestUser};
use serde_json::{json, Value};

use tutorly::app::approvals::{
    APPROVAL_ALREADY_REVIEWED, CAPACITY_BELOW_ENROLLMENT, MANAGEMENT_ONLY, STUDENTS_CANNOT_REQUEST,
};

async fn create_class(app: &TestApp, tutor: &TestUser) -> String {
    let resp = app
        .post_json(
            "/v1/classes",
            json!({
                "code": "CO2003-L01",
                "subject": "Cấu trúc dữ liệu",
                "day": "thursday",
                "startTime": "07:00",
                "endTime": "09:00",
                "maxStudents": 2,
                "location": "H2-303",
            }),
            tutor.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    resp.data()["id"].as_str().unwrap().to_string()
}

async fn request_room_change(app: &TestApp, tutor: &TestUser, class_id: &str, data: Value) -> String {
    let mut allocation = json!({ "classId": class_id });
    if let (Some(target), Some(extra)) = (allocation.as_object_mut(), data.as_object()) {
        for (key, value) in extra {
            target.insert(key.clone(), value.clone());
        }
    }
    let resp = app
        .post_json(
            "/v1/approvals",
            json!({
                "title": "Đổi phòng học",
                "description": "Phòng cũ đang sửa chữa",
                "resourceAllocationData": allocation,
            }),
            tutor.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    resp.data()["id"].as_str().unwrap().to_string()
}

async fn moderation_request(app: &TestApp, tutor: &TestUser) -> String {
    let resp = app
        .post_json(
            "/v1/approvals",
            json!({
                "title": "Gỡ bài viết spam",
                "contentModerationData": {
                    "contentType": "forum_post",
                    "contentId": "post_42",
                    "action": "hide",
                    "reason": "Quảng cáo"
                }
            }),
            tutor.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    resp.data()["id"].as_str().unwrap().to_string()
}

// ===========================================================================
// Requests
// ===========================================================================

#[tokio::test]
async fn tutor_submits_resource_request() {
    let app = app().await;
    let tutor = app.tutor("binh").await;
    let manager = app.manager("chi").await;
    let class_id = create_class(&app, &tutor).await;

    let resp = app
        .post_json(
            "/v1/approvals",
            json!({
                "title": "Đổi phòng học",
                "resourceAllocationData": { "classId": class_id, "location": "H6-404" }
            }),
            tutor.token(),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let data = resp.data();
    assert!(data["id"].as_str().unwrap().starts_with("apr_"));
    assert_eq!(data["status"], "pending");
    assert_eq!(data["requesterId"], tutor.id.as_str());
    assert_eq!(data["resourceAllocationData"]["location"], "H6-404");
    assert!(data["reviewedAt"].is_null());

    // Every manager hears about the new request.
    let queued: Vec<String> = sqlx::query_scalar(
        "SELECT user_id FROM notification_queue WHERE notification_type = 'approval_requested'",
    )
    .fetch_all(app.state.db.pool())
    .await
    .unwrap();
    assert_eq!(queued, vec![manager.id.clone()]);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let app = app().await;
    let student = app.student("an").await;
    let tutor = app.tutor("binh").await;
    let class_id = create_class(&app, &tutor).await;

    let resp = app
        .post_json(
            "/v1/approvals",
            json!({
                "title": "Đổi phòng",
                "resourceAllocationData": { "classId": class_id, "location": "H6-404" }
            }),
            student.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), STUDENTS_CANNOT_REQUEST);

    let resp = app
        .post_json(
            "/v1/approvals",
            json!({
                "title": "Không có gì",
                "resourceAllocationData": { "classId": class_id }
            }),
            tutor.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .post_json(
            "/v1/approvals",
            json!({
                "title": "Lớp không tồn tại",
                "resourceAllocationData": { "classId": "cls_missing", "location": "H6-404" }
            }),
            tutor.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    assert_eq!(app.count("approval_requests").await, 0);
}

// ===========================================================================
// Review
// ===========================================================================

#[tokio::test]
async fn approving_applies_allocation_once() {
    let app = app().await;
    let tutor = app.tutor("binh").await;
    let manager = app.manager("chi").await;
    let class_id = create_class(&app, &tutor).await;
    let approval_id = request_room_change(
        &app,
        &tutor,
        &class_id,
        json!({ "location": "H6-404", "maxStudents": 5 }),
    )
    .await;
    let path = format!("/v1/approvals/{}/approve", approval_id);

    let resp = app.post_json(&path, json!({}), tutor.token()).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), MANAGEMENT_ONLY);

    let resp = app
        .post_json(&path, json!({ "note": "Đồng ý" }), manager.token())
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert_eq!(data["status"], "approved");
    assert_eq!(data["reviewerId"], manager.id.as_str());
    assert_eq!(data["reviewNote"], "Đồng ý");
    assert!(data["reviewedAt"].is_string());

    let resp = app
        .get(&format!("/v1/classes/{}", class_id), tutor.token())
        .await;
    let class = resp.data();
    assert_eq!(class["location"], "H6-404");
    assert_eq!(class["maxStudents"], 5);

    let resp = app.post_json(&path, json!({}), manager.token()).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), APPROVAL_ALREADY_REVIEWED);

    let resp = app
        .post_json(&format!("/v1/approvals/{}/reject", approval_id), json!({}), manager.token())
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let reviewed: Vec<String> = sqlx::query_scalar(
        "SELECT user_id FROM notification_queue WHERE notification_type = 'approval_reviewed'",
    )
    .fetch_all(app.state.db.pool())
    .await
    .unwrap();
    assert_eq!(reviewed, vec![tutor.id.clone()]);
}

#[tokio::test]
async fn capacity_cannot_drop_below_enrollment() {
    let app = app().await;
    let tutor = app.tutor("binh").await;
    let manager = app.manager("chi").await;
    let first = app.student("an").await;
    let second = app.student("dung").await;
    let class_id = create_class(&app, &tutor).await;

    for student in [&first, &second] {
        let resp = app
            .post_json(&format!("/v1/classes/{}/enroll", class_id), json!({}), student.token())
            .await;
        assert_eq!(resp.status, StatusCode::OK);
    }

    let approval_id =
        request_room_change(&app, &tutor, &class_id, json!({ "maxStudents": 1 })).await;
    let resp = app
        .post_json(&format!("/v1/approvals/{}/approve", approval_id), json!({}), manager.token())
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), CAPACITY_BELOW_ENROLLMENT);

    // Nothing was applied and the request is still open.
    let resp = app
        .get(&format!("/v1/approvals/{}", approval_id), manager.token())
        .await;
    assert_eq!(resp.data()["status"], "pending");
    let resp = app
        .get(&format!("/v1/classes/{}", class_id), tutor.token())
        .await;
    assert_eq!(resp.data()["maxStudents"], 2);
}

#[tokio::test]
async fn online_class_keeps_only_its_link() {
    let app = app().await;
    let tutor = app.tutor("binh").await;
    let manager = app.manager("chi").await;
    let resp = app
        .post_json(
            "/v1/classes",
            json!({
                "code": "PH1003-L02",
                "subject": "Vật lý 1",
                "day": "wednesday",
                "startTime": "13:00",
                "endTime": "15:00",
                "maxStudents": 40,
                "isOnline": true,
                "meetingLink": "https://meet.example.com/ph1003",
            }),
            tutor.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let class_id = resp.data()["id"].as_str().unwrap().to_string();

    let approval_id =
        request_room_change(&app, &tutor, &class_id, json!({ "location": "H6-404" })).await;
    let resp = app
        .post_json(&format!("/v1/approvals/{}/approve", approval_id), json!({}), manager.token())
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .get(&format!("/v1/classes/{}", class_id), tutor.token())
        .await;
    let class = resp.data();
    assert_eq!(class["meetingLink"], "https://meet.example.com/ph1003");
    assert!(class["location"].is_null());

    let approval_id = request_room_change(
        &app,
        &tutor,
        &class_id,
        json!({ "meetingLink": "https://meet.example.com/ph1003-b" }),
    )
    .await;
    let resp = app
        .post_json(&format!("/v1/approvals/{}/approve", approval_id), json!({}), manager.token())
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .get(&format!("/v1/classes/{}", class_id), tutor.token())
        .await;
    assert_eq!(resp.data()["meetingLink"], "https://meet.example.com/ph1003-b");
}

#[tokio::test]
async fn rejection_leaves_class_untouched() {
    let app = app().await;
    let tutor = app.tutor("binh").await;
    let manager = app.manager("chi").await;
    let class_id = create_class(&app, &tutor).await;
    let approval_id =
        request_room_change(&app, &tutor, &class_id, json!({ "location": "H6-404" })).await;

    let resp = app
        .post_json(
            &format!("/v1/approvals/{}/reject", approval_id),
            json!({ "note": "Không còn phòng trống" }),
            manager.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["status"], "rejected");

    let resp = app
        .get(&format!("/v1/classes/{}", class_id), tutor.token())
        .await;
    assert_eq!(resp.data()["location"], "H2-303");
}

#[tokio::test]
async fn moderation_approval_is_audited() {
    let app = app().await;
    let tutor = app.tutor("binh").await;
    let manager = app.manager("chi").await;
    let approval_id = moderation_request(&app, &tutor).await;

    let resp = app
        .post_json(&format!("/v1/approvals/{}/approve", approval_id), json!({}), manager.token())
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app.get("/v1/moderation/audit", manager.token()).await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    let items = data["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["approvalId"], approval_id.as_str());
    assert_eq!(items[0]["actorId"], manager.id.as_str());
    assert_eq!(items[0]["contentType"], "forum_post");
    assert_eq!(items[0]["contentId"], "post_42");
    assert_eq!(items[0]["action"], "hide");
    assert!(data["nextCursor"].is_null());

    let resp = app.get("/v1/moderation/audit", tutor.token()).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn audit_log_pages_by_cursor() {
    let app = app().await;
    let tutor = app.tutor("binh").await;
    let manager = app.manager("chi").await;

    for _ in 0..3 {
        let id = moderation_request(&app, &tutor).await;
        let resp = app
            .post_json(&format!("/v1/approvals/{}/approve", id), json!({}), manager.token())
            .await;
        assert_eq!(resp.status, StatusCode::OK);
    }

    let resp = app.get("/v1/moderation/audit?limit=2", manager.token()).await;
    let data = resp.data();
    assert_eq!(data["items"].as_array().unwrap().len(), 2);
    let cursor = data["nextCursor"].as_str().unwrap().to_string();

    let resp = app
        .get(
            &format!("/v1/moderation/audit?limit=2&cursor={}", cursor),
            manager.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert_eq!(data["items"].as_array().unwrap().len(), 1);
    assert!(data["nextCursor"].is_null());
}

// ===========================================================================
// Visibility
// ===========================================================================

#[tokio::test]
async fn requesters_only_see_their_own() {
    let app = app().await;
    let tutor = app.tutor("binh").await;
    let other = app.tutor("cuong").await;
    let manager = app.manager("chi").await;
    let approval_id = moderation_request(&app, &tutor).await;
    moderation_request(&app, &other).await;

    let resp = app.get("/v1/approvals", tutor.token()).await;
    assert_eq!(resp.data()["pagination"]["total"], 1);

    let resp = app.get("/v1/approvals", manager.token()).await;
    assert_eq!(resp.data()["pagination"]["total"], 2);

    let resp = app.get("/v1/approvals?status=approved", manager.token()).await;
    assert_eq!(resp.data()["pagination"]["total"], 0);

    let path = format!("/v1/approvals/{}", approval_id);
    assert_eq!(app.get(&path, tutor.token()).await.status, StatusCode::OK);
    assert_eq!(app.get(&path, other.token()).await.status, StatusCode::FORBIDDEN);
}
