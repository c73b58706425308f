//! Upstream effect interpreter over the profile service REST API.

use reqwest::Method;
use serde_json::json;

use crate::effects::{UpstreamEffect, UpstreamInterpreter, UpstreamResponse};
use crate::types::{DynamicGroup, EligibilityRecord, MemberId};

use super::client::ProfileClient;
use super::error::UpstreamApiError;

/// Endpoint serving the range groups.
const GROUPS_ENDPOINT: &str = "kingdom-groups";

/// Endpoint receiving booster write-backs.
const BOOSTER_STATUS_ENDPOINT: &str = "booster-status";

impl UpstreamInterpreter for ProfileClient {
    type Error = UpstreamApiError;

    async fn interpret(&self, effect: UpstreamEffect) -> Result<UpstreamResponse, Self::Error> {
        interpret_upstream_effect(self, effect).await
    }
}

/// Executes an upstream effect against the profile service.
pub async fn interpret_upstream_effect(
    client: &ProfileClient,
    effect: UpstreamEffect,
) -> Result<UpstreamResponse, UpstreamApiError> {
    match effect {
        UpstreamEffect::FetchEligibility { endpoint, member } => {
            fetch_eligibility(client, &endpoint, member).await
        }
        UpstreamEffect::FetchDynamicGroups => fetch_groups(client).await,
        UpstreamEffect::WriteBoosterStatus { member, is_booster } => {
            write_booster_status(client, member, is_booster).await
        }
    }
}

async fn fetch_eligibility(
    client: &ProfileClient,
    endpoint: &str,
    member: Option<MemberId>,
) -> Result<UpstreamResponse, UpstreamApiError> {
    let path = ProfileClient::sync_path(endpoint);
    let mut request = client.request(Method::GET, &path);
    if let Some(member) = &member {
        request = request.query(&[("member_id", member.as_str())]);
    }
    let records: Vec<EligibilityRecord> = client.send_json(&path, request).await?;
    Ok(UpstreamResponse::Records(records))
}

async fn fetch_groups(client: &ProfileClient) -> Result<UpstreamResponse, UpstreamApiError> {
    let path = ProfileClient::sync_path(GROUPS_ENDPOINT);
    let groups: Vec<DynamicGroup> = client
        .send_json(&path, client.request(Method::GET, &path))
        .await?;
    Ok(UpstreamResponse::Groups(
        groups.into_iter().filter(|g| g.active).collect(),
    ))
}

async fn write_booster_status(
    client: &ProfileClient,
    member: MemberId,
    is_booster: bool,
) -> Result<UpstreamResponse, UpstreamApiError> {
    let path = ProfileClient::sync_path(BOOSTER_STATUS_ENDPOINT);
    let request = client.request(Method::POST, &path).json(&json!({
        "external_member_id": member,
        "is_booster": is_booster,
    }));
    client.send_empty(&path, request).await?;
    Ok(UpstreamResponse::Ok)
}
