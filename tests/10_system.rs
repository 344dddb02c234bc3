mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn health_reports_database_state() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/health")).await?;
    let status = res.status();
    let body = res.json::<Value>().await?;

    match status {
        StatusCode::OK => {
            assert_eq!(body["status"], "success");
            assert_eq!(body["data"]["database"], "ok");
        }
        StatusCode::SERVICE_UNAVAILABLE => {
            assert_eq!(body["status"], "error");
            assert_eq!(body["data"]["database"], "unavailable");
        }
        other => panic!("unexpected health status {}", other),
    }
    assert!(body["data"]["timestamp"].is_string());

    Ok(())
}

#[tokio::test]
async fn root_lists_endpoints() -> Result<()> {
    let server = common::ensure_server().await?;

    let body = reqwest::get(server.url("/")).await?.json::<Value>().await?;
    assert_eq!(body["status"], "success");
    assert!(body["data"]["endpoints"]["tours"].is_string());

    Ok(())
}

#[tokio::test]
async fn unknown_route_returns_json_404() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/api/v1/bookings")).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body = res.json::<Value>().await?;
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Can't find /api/v1/bookings on this server.");

    Ok(())
}
