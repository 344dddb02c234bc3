mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn malformed_tour_id_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/api/v1/tours/not-a-uuid")).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = res.json::<Value>().await?;
    assert_eq!(body["message"], "Invalid id: not-a-uuid");

    Ok(())
}

#[tokio::test]
async fn monthly_plan_needs_a_numeric_year() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/api/v1/tours/monthly-plan/next")).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = res.json::<Value>().await?;
    assert_eq!(body["message"], "Invalid year: next");

    Ok(())
}

#[tokio::test]
async fn listing_answers_with_an_envelope() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/api/v1/tours?duration[gte]=5&sort=price&fields=name,price")).await?;
    let status = res.status();
    let body = res.json::<Value>().await?;

    // Depends on whether a database is reachable from the test environment
    match status {
        StatusCode::OK => {
            assert_eq!(body["status"], "success");
            assert!(body["data"]["tours"].is_array());
            assert_eq!(body["results"].as_u64(), body["data"]["tours"].as_array().map(|t| t.len() as u64));
        }
        StatusCode::SERVICE_UNAVAILABLE => assert_eq!(body["status"], "error"),
        other => panic!("unexpected status {}", other),
    }

    Ok(())
}
