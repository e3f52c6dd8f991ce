mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn team_membership_grants_and_revokes_form_access() -> Result<()> {
    let app = TestApp::new();
    let owner = app.signup("owner@example.com").await?;
    let member = app.signup("member@example.com").await?;

    let team_id = app.team(&owner, "Research").await?;
    let form_id = app.form(&owner, &format!("/api/forms/team/{}", team_id), "Intake", json!([])).await?;

    let (status, _) = app.get(&format!("/api/forms/{}", form_id), &member.token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(&format!("/api/teams/{}/add-member", team_id), &owner.token, json!({"email": member.email}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["members"].as_array().map(Vec::len), Some(2));

    let (status, body) = app.get(&format!("/api/forms/{}", form_id), &member.token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["permissions"][&member.id], json!(["VIEW", "EDIT", "DELETE"]));

    let (status, _) = app
        .post(&format!("/api/teams/{}/remove-member", team_id), &owner.token, json!({"memberIds": [member.id]}))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/forms/{}", form_id), &member.token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get(&format!("/api/teams/{}", team_id), &member.token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn members_added_later_see_existing_team_folders() -> Result<()> {
    let app = TestApp::new();
    let owner = app.signup("owner@example.com").await?;
    let member = app.signup("member@example.com").await?;
    let team_id = app.team(&owner, "Research").await?;

    let (status, body) = app
        .post("/api/folders", &owner.token, json!({"name": "Q3", "teamId": team_id}))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let folder_id = body["data"]["id"].as_str().unwrap_or_default().to_string();

    app.post(&format!("/api/teams/{}/add-member", team_id), &owner.token, json!({"email": member.email}))
        .await?;

    let (status, body) = app.get(&format!("/api/folders/team/{}", team_id), &member.token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], folder_id.as_str());

    let (status, _) = app.get(&format!("/api/folders/{}", folder_id), &member.token).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn creator_cannot_be_removed_and_only_creator_deletes() -> Result<()> {
    let app = TestApp::new();
    let owner = app.signup("owner@example.com").await?;
    let member = app.signup("member@example.com").await?;
    let team_id = app.team(&owner, "Research").await?;
    app.post(&format!("/api/teams/{}/add-member", team_id), &owner.token, json!({"email": member.email}))
        .await?;

    let (status, _) = app
        .post(&format!("/api/teams/{}/remove-member", team_id), &member.token, json!({"memberIds": [owner.id]}))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.delete(&format!("/api/teams/{}", team_id), &member.token, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.delete(&format!("/api/teams/{}", team_id), &owner.token, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["teams"], 1);

    let (status, _) = app.get(&format!("/api/teams/{}", team_id), &owner.token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn invitation_is_bound_to_the_invited_email() -> Result<()> {
    let mut app = TestApp::new();
    let owner = app.signup("owner@example.com").await?;
    let team_id = app.team(&owner, "Research").await?;

    let (status, body) = app
        .post(&format!("/api/teams/{}/invite-member", team_id), &owner.token, json!({"email": "guest@example.com"}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap_or_default().to_string();
    assert!(!app.drain_outbox().is_empty());

    let stranger = app.signup("stranger@example.com").await?;
    let (status, _) = app
        .post("/api/teams/invitations/accept", &stranger.token, json!({"token": token}))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let guest = app.signup("guest@example.com").await?;
    let (status, body) = app
        .post("/api/teams/invitations/accept", &guest.token, json!({"token": token}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], team_id.as_str());

    let (_, body) = app.get("/api/teams", &guest.token).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}
