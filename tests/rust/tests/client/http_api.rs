//! HttpAdminApi against a wiremock admin service

use std::sync::Arc;

use mcpadmin_client::{ClientConfig, HttpAdminApi};
use mcpadmin_core::{
    ApiError, AuthConfig, AuthPerformer, AuthType, McpAdminApi, NewServer, OAuthConnectRequest,
    ServerId, ServerStatus, ToolId, Transport,
};
use mcpadmin_lifecycle::ServerLifecycle;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASE_PATH: &str = "/api/admin/mcp";

fn api_for(server: &MockServer) -> HttpAdminApi {
    let config = ClientConfig::new(&format!("{}{}", server.uri(), BASE_PATH))
        .unwrap()
        .with_bearer_token("admin-token");
    HttpAdminApi::new(config).unwrap()
}

fn endpoint(suffix: &str) -> String {
    format!("{}/{}", BASE_PATH, suffix)
}

fn server_json(id: i64, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": "Jira",
        "server_url": "https://jira.example.com/mcp",
        "status": status,
        "transport": "STREAMABLE_HTTP",
        "auth_type": "API_TOKEN",
        "auth_performer": "ADMIN",
        "tool_count": 0
    })
}

#[tokio::test]
async fn test_list_servers_parses_wire_format() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(endpoint("servers")))
        .and(header("authorization", "Bearer admin-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            server_json(1, "CONNECTED"),
            {
                "id": 2,
                "name": "Linear",
                "server_url": "https://linear.example.com/sse",
                "status": "AWAITING_AUTH",
                "transport": "SSE",
                "auth_type": "OAUTH",
                "auth_performer": "PER_USER"
            },
            {
                "id": 3,
                "name": "Draft",
                "server_url": "https://draft.example.com/mcp"
            }
        ])))
        .expect(1)
        .mount(&mock)
        .await;

    let servers = api_for(&mock).list_servers().await.unwrap();

    assert_eq!(servers.len(), 3);
    assert_eq!(servers[0].status, ServerStatus::Connected);
    assert_eq!(servers[1].transport, Some(Transport::ServerSentEvents));
    assert_eq!(servers[1].auth_type, AuthType::OAuth);
    assert_eq!(servers[1].auth_performer, Some(AuthPerformer::PerUser));
    assert_eq!(servers[2].status, ServerStatus::Created);
    assert_eq!(servers[2].auth_type, AuthType::None);
    assert_eq!(servers[2].tool_count, 0);
}

#[tokio::test]
async fn test_set_status_sends_query_parameter() {
    let mock = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(endpoint("server/7/status")))
        .and(query_param("status", "FETCHING_TOOLS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_json(7, "FETCHING_TOOLS")))
        .expect(1)
        .mount(&mock)
        .await;

    let server = api_for(&mock)
        .set_status(ServerId::new(7), ServerStatus::FetchingTools)
        .await
        .unwrap();
    assert_eq!(server.status, ServerStatus::FetchingTools);
}

#[tokio::test]
async fn test_not_found_maps_to_not_found() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(endpoint("server/9/tools")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Server not found"})))
        .mount(&mock)
        .await;

    let err = api_for(&mock).list_tools(ServerId::new(9)).await.unwrap_err();
    assert_eq!(err, ApiError::NotFound("server 9".into()));
}

#[tokio::test]
async fn test_error_detail_is_surfaced() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("server/4/tools/refresh")))
        .respond_with(
            ResponseTemplate::new(502).set_body_json(json!({"detail": "MCP server unreachable"})),
        )
        .mount(&mock)
        .await;

    let err = api_for(&mock).refresh_tools(ServerId::new(4)).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Status {
            status: 502,
            message: "MCP server unreachable".into()
        }
    );
}

#[tokio::test]
async fn test_undecodable_body_is_decode_error() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(endpoint("server/4/tools")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&mock)
        .await;

    let err = api_for(&mock).list_tools(ServerId::new(4)).await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn test_disable_tools_body_and_count() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("tools/disable-all")))
        .and(body_json(json!({"tool_ids": [11, 12, 13]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"updated_count": 2})))
        .expect(1)
        .mount(&mock)
        .await;

    let response = api_for(&mock)
        .disable_tools(&[ToolId::new(11), ToolId::new(12), ToolId::new(13)])
        .await
        .unwrap();
    assert_eq!(response.updated_count, 2);
}

#[tokio::test]
async fn test_set_tool_enabled_query() {
    let mock = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(endpoint("tool/21")))
        .and(query_param("enabled", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock)
        .await;

    api_for(&mock)
        .set_tool_enabled(ToolId::new(21), false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_connect_oauth_body() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("oauth/connect")))
        .and(body_json(json!({
            "server_id": 5,
            "oauth_client_id": "client-abc",
            "return_path": "/admin/actions/mcp",
            "include_resource_param": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "oauth_url": "https://auth.example.com/authorize?state=5"
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let response = api_for(&mock)
        .connect_oauth(&OAuthConnectRequest {
            server_id: ServerId::new(5),
            oauth_client_id: Some("client-abc".into()),
            oauth_client_secret: None,
            return_path: "/admin/actions/mcp".into(),
            include_resource_param: true,
        })
        .await
        .unwrap();
    assert_eq!(response.oauth_url, "https://auth.example.com/authorize?state=5");
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    // Nothing listens on port 1
    let api = HttpAdminApi::new(ClientConfig::new("http://127.0.0.1:1/api").unwrap()).unwrap();

    let err = api.list_servers().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}

#[tokio::test]
async fn test_lifecycle_over_http() {
    let mock = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(endpoint("server")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 12,
            "name": "Jira",
            "server_url": "https://jira.example.com/mcp",
            "status": "CREATED"
        })))
        .expect(2)
        .mount(&mock)
        .await;
    for status in ["FETCHING_TOOLS", "CONNECTED"] {
        Mock::given(method("PATCH"))
            .and(path(endpoint("server/12/status")))
            .and(query_param("status", status))
            .respond_with(ResponseTemplate::new(200).set_body_json(server_json(12, status)))
            .expect(1)
            .mount(&mock)
            .await;
    }
    Mock::given(method("POST"))
        .and(path(endpoint("server/12/tools/refresh")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path(endpoint("server/12/tools")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "server_id": 12, "name": "search_issues", "enabled": true},
            {"id": 2, "server_id": 12, "name": "create_issue", "enabled": false}
        ])))
        .expect(1)
        .mount(&mock)
        .await;

    let lifecycle = ServerLifecycle::builder()
        .with_api(Arc::new(api_for(&mock)))
        .build()
        .unwrap();

    let server = lifecycle
        .create_server(NewServer::new("Jira", "https://jira.example.com/mcp"))
        .await
        .unwrap();
    assert_eq!(server.id, ServerId::new(12));

    let connected = lifecycle
        .auth()
        .configure(
            server.id,
            Transport::StreamableHttp,
            AuthType::ApiToken,
            Some(AuthPerformer::Admin),
            AuthConfig::admin_token("jira-token"),
        )
        .await
        .unwrap();

    assert_eq!(connected.status, ServerStatus::Connected);
    assert_eq!(connected.tool_count, 2);
    let names: Vec<String> = lifecycle
        .registry()
        .tools(server.id)
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["create_issue", "search_issues"]);

    let requests = mock.received_requests().await.unwrap();
    let save = requests
        .iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path() == endpoint("server"))
        .nth(1)
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&save.body).unwrap();
    assert_eq!(body["id"], 12);
    assert_eq!(body["api_token"], "jira-token");
    assert_eq!(body["auth_type"], "API_TOKEN");
    assert_eq!(body["auth_performer"], "ADMIN");
}
