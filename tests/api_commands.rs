//! The HTTP command surface over a real listener.

mod common;

use common::{ACCOUNT, CONTACT, Gateway, SECRET};
use jabgate::api;
use reqwest::StatusCode;
use tokio::net::TcpListener;

struct Api {
    base: String,
    http: reqwest::Client,
    gw: Gateway,
}

impl Api {
    async fn start() -> anyhow::Result<Self> {
        let gw = Gateway::new();
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base = format!("http://{}", listener.local_addr()?);
        tokio::spawn(api::serve(
            listener,
            gw.registry.clone(),
            std::future::pending::<()>(),
        ));
        Ok(Self {
            base,
            http: reqwest::Client::new(),
            gw,
        })
    }

    async fn post(&self, route: &str, form: &[(&str, &str)]) -> anyhow::Result<(StatusCode, String)> {
        let response = self
            .http
            .post(format!("{}{}", self.base, route))
            .form(form)
            .send()
            .await?;
        let status = response.status();
        Ok((status, response.text().await?))
    }

    async fn login(&self) -> anyhow::Result<String> {
        let (status, token) = self
            .post("/login", &[("username", ACCOUNT), ("auth", SECRET)])
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "login answered {status}");
        Ok(token)
    }
}

#[tokio::test]
async fn test_login_requires_both_fields() -> anyhow::Result<()> {
    let api = Api::start().await?;

    let (status, body) = api.post("/login", &[("username", ACCOUNT)]).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "400 - Bad Request");

    let (status, _) = api
        .post("/login", &[("username", ACCOUNT), ("auth", "")])
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_login_with_bad_secret_is_unauthorized() -> anyhow::Result<()> {
    let api = Api::start().await?;

    let (status, body) = api
        .post("/login", &[("username", ACCOUNT), ("auth", "nope")])
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "401 - Authentication Required");
    Ok(())
}

#[tokio::test]
async fn test_login_returns_token() -> anyhow::Result<()> {
    let api = Api::start().await?;
    let token = api.login().await?;

    assert_eq!(token.len(), 16);
    assert!(api.gw.registry.get(&token).is_some());
    Ok(())
}

#[tokio::test]
async fn test_roster_is_one_json_object_per_line() -> anyhow::Result<()> {
    let api = Api::start().await?;
    let token = api.login().await?;

    let (status, body) = api.post("/roster", &[("token", token.as_str())]).await?;
    assert_eq!(status, StatusCode::OK);
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 1);
    let entry: serde_json::Value = serde_json::from_str(lines[0])?;
    assert_eq!(entry["jid"], CONTACT);
    assert_eq!(entry["name"], "Bea");
    Ok(())
}

#[tokio::test]
async fn test_message_queue_drains() -> anyhow::Result<()> {
    let api = Api::start().await?;
    let token = api.login().await?;

    api.gw
        .upstream
        .deliver(ACCOUNT, &common::chat_from_contact("hi"));
    assert!(common::eventually(|| async { api.gw.store.queued(ACCOUNT) == 1 }).await);

    let (status, body) = api.post("/messagequeue", &[("token", token.as_str())]).await?;
    assert_eq!(status, StatusCode::OK);
    let event: serde_json::Value = serde_json::from_str(body.trim_end())?;
    assert_eq!(event["body"], "hi");

    let (_, body) = api.post("/messagequeue", &[("token", token.as_str())]).await?;
    assert!(body.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_message_is_sent() -> anyhow::Result<()> {
    let api = Api::start().await?;
    let token = api.login().await?;

    let (status, _) = api
        .post("/message", &[("token", token.as_str()), ("to", CONTACT), ("body", "yo")])
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(common::eventually(|| async { !api.gw.upstream.received().is_empty() }).await);

    let (status, _) = api
        .post("/message", &[("token", token.as_str()), ("to", CONTACT)])
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_register_validates_url() -> anyhow::Result<()> {
    let api = Api::start().await?;
    let token = api.login().await?;

    let (status, _) = api
        .post("/register", &[("token", token.as_str()), ("url", "not a url")])
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = api
        .post(
            "/register",
            &[("token", token.as_str()), ("url", "http://push.example.com/ch/1")],
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_unknown_token_and_route_are_not_found() -> anyhow::Result<()> {
    let api = Api::start().await?;

    let (status, body) = api.post("/roster", &[("token", "AAAAAAAAAAAAAAAA")]).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "404 - Not found");

    let (status, _) = api.post("/nothing", &[("token", "x")]).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_logout_then_token_is_gone() -> anyhow::Result<()> {
    let api = Api::start().await?;
    let token = api.login().await?;

    let (status, _) = api.post("/logout", &[("token", token.as_str())]).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = api.post("/logout", &[("token", token.as_str())]).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = api.post("/messagequeue", &[("token", token.as_str())]).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
