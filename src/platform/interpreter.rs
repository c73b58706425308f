//! Platform effect interpreter over the guild REST API.

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use crate::effects::{PlatformEffect, PlatformInterpreter, PlatformResponse, TagData};
use crate::types::{ChannelId, Member, MemberId, TagId};

use super::client::{AUDIT_LOG_REASON_HEADER, GuildClient};
use super::error::PlatformApiError;

/// Page size of the member list endpoint.
const MEMBER_PAGE_SIZE: usize = 1000;

/// Safety limit to prevent runaway pagination (100k members).
const MAX_MEMBER_PAGES: usize = 100;

// ─── Wire Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct ApiMember {
    user: ApiUser,
    #[serde(default)]
    nick: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    premium_since: Option<String>,
}

impl From<ApiMember> for Member {
    fn from(m: ApiMember) -> Self {
        let display_name = m
            .nick
            .or(m.user.global_name)
            .unwrap_or(m.user.username);
        Member {
            id: MemberId(m.user.id),
            display_name,
            is_bot: m.user.bot,
            is_booster: m.premium_since.is_some(),
            tags: m.roles.into_iter().map(TagId).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiRole {
    id: String,
    name: String,
}

impl From<ApiRole> for TagData {
    fn from(r: ApiRole) -> Self {
        TagData {
            id: TagId(r.id),
            name: r.name,
        }
    }
}

// ─── Interpreter Implementation ───────────────────────────────────────────────

impl PlatformInterpreter for GuildClient {
    type Error = PlatformApiError;

    async fn interpret(&self, effect: PlatformEffect) -> Result<PlatformResponse, Self::Error> {
        interpret_platform_effect(self, effect).await
    }
}

/// Executes a platform effect against the guild API.
pub async fn interpret_platform_effect(
    client: &GuildClient,
    effect: PlatformEffect,
) -> Result<PlatformResponse, PlatformApiError> {
    match effect {
        PlatformEffect::ListMembers => list_members(client).await,
        PlatformEffect::GetMember { member } => get_member(client, member).await,
        PlatformEffect::ListTags => list_tags(client).await,
        PlatformEffect::CurrentIdentity => current_identity(client).await,
        PlatformEffect::AddTag {
            member,
            tag,
            reason,
        } => set_tag(client, Method::PUT, member, tag, reason).await,
        PlatformEffect::RemoveTag {
            member,
            tag,
            reason,
        } => set_tag(client, Method::DELETE, member, tag, reason).await,
        PlatformEffect::CreateTag { name } => create_tag(client, name).await,
        PlatformEffect::PostMessage { channel, content } => {
            post_message(client, channel, content).await
        }
    }
}

// ─── Member Operations ────────────────────────────────────────────────────────

async fn list_members(client: &GuildClient) -> Result<PlatformResponse, PlatformApiError> {
    let mut members = Vec::new();
    let mut after = String::from("0");

    for _ in 0..MAX_MEMBER_PAGES {
        let request = client.guild_request(Method::GET, "/members").query(&[
            ("limit", MEMBER_PAGE_SIZE.to_string()),
            ("after", after.clone()),
        ]);
        let page: Vec<ApiMember> = client.send_json(request).await?;
        let is_last_page = page.len() < MEMBER_PAGE_SIZE;

        if let Some(last) = page.last() {
            after = last.user.id.clone();
        }
        members.extend(page.into_iter().map(Member::from));

        if is_last_page {
            return Ok(PlatformResponse::Members(members));
        }
    }

    tracing::warn!(
        fetched = members.len(),
        "Member pagination hit the page limit, roster may be truncated"
    );
    Ok(PlatformResponse::Members(members))
}

async fn get_member(
    client: &GuildClient,
    member: MemberId,
) -> Result<PlatformResponse, PlatformApiError> {
    let request = client.guild_request(Method::GET, &format!("/members/{}", member));
    match client.send_json::<ApiMember>(request).await {
        Ok(m) => Ok(PlatformResponse::Member(Some(m.into()))),
        Err(e) if e.is_not_found() => Ok(PlatformResponse::Member(None)),
        Err(e) => Err(e),
    }
}

async fn current_identity(client: &GuildClient) -> Result<PlatformResponse, PlatformApiError> {
    let user: ApiUser = client
        .send_json(client.request(Method::GET, "/users/@me"))
        .await?;
    Ok(PlatformResponse::Identity(MemberId(user.id)))
}

async fn set_tag(
    client: &GuildClient,
    method: Method,
    member: MemberId,
    tag: TagId,
    reason: String,
) -> Result<PlatformResponse, PlatformApiError> {
    let request = client
        .guild_request(method, &format!("/members/{}/roles/{}", member, tag))
        .header(AUDIT_LOG_REASON_HEADER, urlencoding::encode(&reason).into_owned());
    client.send_empty(request).await?;
    Ok(PlatformResponse::Ok)
}

// ─── Tag Operations ───────────────────────────────────────────────────────────

async fn list_tags(client: &GuildClient) -> Result<PlatformResponse, PlatformApiError> {
    let roles: Vec<ApiRole> = client
        .send_json(client.guild_request(Method::GET, "/roles"))
        .await?;
    Ok(PlatformResponse::Tags(
        roles.into_iter().map(TagData::from).collect(),
    ))
}

async fn create_tag(client: &GuildClient, name: String) -> Result<PlatformResponse, PlatformApiError> {
    let request = client
        .guild_request(Method::POST, "/roles")
        .json(&json!({ "name": name, "mentionable": false, "hoist": false }));
    let role: ApiRole = client.send_json(request).await?;
    Ok(PlatformResponse::Tag(role.into()))
}

// ─── Messages ─────────────────────────────────────────────────────────────────

async fn post_message(
    client: &GuildClient,
    channel: ChannelId,
    content: String,
) -> Result<PlatformResponse, PlatformApiError> {
    let request = client
        .request(Method::POST, &format!("/channels/{}/messages", channel))
        .json(&json!({
            "content": content,
            "allowed_mentions": { "parse": ["users"] },
        }));
    client.send_empty(request).await?;
    Ok(PlatformResponse::Ok)
}
