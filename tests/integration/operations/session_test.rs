// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integration tests for login, envelopes and API discovery

use crate::integration::{success, MockDsmServer, API_CRT, PATH_AUTH};
use dsm_cert_sync::{ApiRequest, SessionClient, SyncError};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_login_stores_session() {
    let mock = MockDsmServer::start().await;
    mock.mock_login_success().await;

    let client = SessionClient::new(mock.connection()).expect("Client creation failed");
    assert!(!client.has_session());

    let result = client.login().await;
    assert!(result.is_ok(), "login failed: {:?}", result.err());
    assert!(client.has_session());
}

#[tokio::test]
async fn test_login_rejected() {
    let mock = MockDsmServer::start().await;
    mock.mock_login_failure(400).await;

    let client = SessionClient::new(mock.connection()).expect("Client creation failed");
    let err = client.login().await.unwrap_err();

    assert!(matches!(err, SyncError::Authentication { .. }));
    assert_eq!(err.remote_code(), Some(400));
    assert!(!client.has_session());
}

#[tokio::test]
async fn test_failed_relogin_keeps_session() {
    let mock = MockDsmServer::start().await;
    mock.mock_login_success().await;

    let client = SessionClient::new(mock.connection()).expect("Client creation failed");
    client.login().await.expect("First login failed");

    mock.inner().reset().await;
    mock.mock_login_failure(401).await;

    assert!(client.login().await.is_err());
    assert!(client.has_session());
}

#[tokio::test]
async fn test_login_without_session_id() {
    let mock = MockDsmServer::start().await;
    Mock::given(method("GET"))
        .and(path(PATH_AUTH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(mock.inner())
        .await;

    let client = SessionClient::new(mock.connection()).expect("Client creation failed");
    let err = client.login().await.unwrap_err();

    match err {
        SyncError::Authentication { source } => {
            assert!(matches!(*source, SyncError::MissingData { .. }));
        }
        other => panic!("Expected Authentication, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_status() {
    let mock = MockDsmServer::start().await;
    mock.mock_raw(API_CRT, "list", ResponseTemplate::new(502))
        .await;

    let client = SessionClient::new(mock.connection()).expect("Client creation failed");
    let err = client.list_certificates().await.unwrap_err();

    assert!(matches!(err, SyncError::Http(_)));
}

#[tokio::test]
async fn test_execute_unit_ignores_data() {
    let mock = MockDsmServer::start().await;
    mock.mock_raw(API_CRT, "ping", success(json!({ "anything": [1, 2, 3] })))
        .await;

    let client = SessionClient::new(mock.connection()).expect("Client creation failed");
    let request = ApiRequest::new(API_CRT, 1, "entry.cgi", "ping");
    let builder = client.get(&request).expect("Request build failed");

    assert!(client.execute_unit(builder).await.is_ok());
}

#[tokio::test]
async fn test_query_apis_sorted() {
    let mock = MockDsmServer::start().await;
    mock.mock_api_info(json!({
        "SYNO.Core.Certificate": { "path": "entry.cgi", "minVersion": 1, "maxVersion": 1 },
        "SYNO.API.Auth": { "path": "auth.cgi", "minVersion": 1, "maxVersion": 7 },
        "SYNO.Core.Certificate.CRT": { "path": "entry.cgi", "minVersion": 1, "maxVersion": 1, "requestFormat": "JSON" }
    }))
    .await;

    let client = SessionClient::new(mock.connection()).expect("Client creation failed");
    let apis = client.query_apis().await.expect("query_apis failed");

    let names: Vec<&str> = apis.iter().map(|api| api.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "SYNO.API.Auth",
            "SYNO.Core.Certificate",
            "SYNO.Core.Certificate.CRT"
        ]
    );
    assert_eq!(apis[0].path, "auth.cgi");
    assert_eq!(apis[0].max_version, 7);
}
