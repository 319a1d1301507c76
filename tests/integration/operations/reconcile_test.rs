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

//! End-to-end reconciliation against a mock appliance

use crate::integration::fixtures::{certificate_json, write_local_pair};
use crate::integration::MockDsmServer;
use dsm_cert_sync::{Reconciler, SessionClient, SyncError, SyncOutcome, SyncTarget};
use std::sync::Arc;
use time::macros::datetime;
use time::OffsetDateTime;

const LOCAL_EXPIRY: OffsetDateTime = datetime!(2025-01-02 15:04:05 UTC);
const STALE_EXPIRY: OffsetDateTime = datetime!(2024-10-04 15:04:05 UTC);

fn reconciler(mock: &MockDsmServer, target: SyncTarget) -> (Reconciler, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let (cert, key) = write_local_pair(dir.path(), LOCAL_EXPIRY);
    let client = Arc::new(SessionClient::new(mock.connection()).expect("Client creation failed"));
    (Reconciler::new(client, target, cert, key), dir)
}

#[tokio::test]
async fn test_up_to_date_does_not_import() {
    let mock = MockDsmServer::start().await;
    mock.mock_login_success().await;
    mock.mock_list(vec![certificate_json("a1", "nas.example.com", LOCAL_EXPIRY)])
        .await;
    mock.mock_import("a1", 0).await;

    let (reconciler, _dir) = reconciler(&mock, SyncTarget::by_description("nas.example.com"));
    for _ in 0..2 {
        let outcome = reconciler.reconcile().await.expect("reconcile failed");
        assert_eq!(outcome, SyncOutcome::NoOp { id: "a1".to_string() });
    }
}

#[tokio::test]
async fn test_missing_description_creates() {
    let mock = MockDsmServer::start().await;
    mock.mock_login_success().await;
    mock.mock_list(vec![certificate_json("a1", "other", LOCAL_EXPIRY)])
        .await;
    mock.mock_import("b2", 1).await;

    let (reconciler, _dir) = reconciler(&mock, SyncTarget::by_description("nas.example.com"));
    let outcome = reconciler.reconcile().await.expect("reconcile failed");

    assert_eq!(outcome, SyncOutcome::Created { id: "b2".to_string() });
}

#[tokio::test]
async fn test_stale_certificate_replaced_in_place() {
    let mock = MockDsmServer::start().await;
    mock.mock_login_success().await;
    mock.mock_list(vec![
        certificate_json("a1", "nas.example.com", STALE_EXPIRY),
        certificate_json("b2", "other", STALE_EXPIRY),
    ])
    .await;
    mock.mock_import("b2", 1).await;

    let (reconciler, _dir) = reconciler(&mock, SyncTarget::by_id("b2"));
    let outcome = reconciler.reconcile().await.expect("reconcile failed");

    assert_eq!(outcome, SyncOutcome::Replaced { id: "b2".to_string() });
}

#[tokio::test]
async fn test_replace_with_changed_id_fails() {
    let mock = MockDsmServer::start().await;
    mock.mock_login_success().await;
    mock.mock_list(vec![certificate_json("a1", "nas.example.com", STALE_EXPIRY)])
        .await;
    mock.mock_import("zz9", 1).await;

    let (reconciler, _dir) = reconciler(&mock, SyncTarget::by_description("nas.example.com"));
    let err = reconciler.reconcile().await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::IdentityChanged { ref expected, ref actual } if expected == "a1" && actual == "zz9"
    ));
}

#[tokio::test]
async fn test_unknown_id_never_imports() {
    let mock = MockDsmServer::start().await;
    mock.mock_login_success().await;
    mock.mock_list(vec![certificate_json("a1", "nas.example.com", STALE_EXPIRY)])
        .await;
    mock.mock_import("x", 0).await;

    let (reconciler, _dir) = reconciler(&mock, SyncTarget::by_id("missing"));
    let err = reconciler.reconcile().await.unwrap_err();

    assert!(matches!(err, SyncError::CertificateNotFound { ref id } if id == "missing"));
}

#[tokio::test]
async fn test_login_failure_stops_attempt() {
    let mock = MockDsmServer::start().await;
    mock.mock_login_failure(400).await;
    mock.mock_import("x", 0).await;

    let (reconciler, _dir) = reconciler(&mock, SyncTarget::by_description("nas.example.com"));
    let err = reconciler.reconcile().await.unwrap_err();

    assert!(matches!(err, SyncError::Authentication { .. }));
}
