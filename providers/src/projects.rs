//! Project service: team membership and assignment.

use proxima_types::{Category, ProfessionalId, ProjectId};
use serde::{Deserialize, Serialize};

use crate::retry::{RetryConfig, send_with_retry};
use crate::{Endpoint, ServiceError, decode_json, expect_success};

pub const SERVICE: &str = "projects";

/// A current member (or pending invitee) of a project team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMember {
    pub id: ProfessionalId,
    pub role: Option<Category>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMember {
    #[serde(alias = "userId", alias = "user_id", alias = "_id")]
    id: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTeam {
    List(Vec<WireMember>),
    Members { members: Vec<WireMember> },
    Team { team: Vec<WireMember> },
}

impl WireTeam {
    fn into_members(self) -> Vec<WireMember> {
        match self {
            Self::List(members) | Self::Members { members } | Self::Team { team: members } => {
                members
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignBody<'a> {
    user_id: &'a str,
    role: &'a str,
}

#[derive(Debug, Clone)]
pub struct ProjectClient {
    http: reqwest::Client,
    endpoint: Endpoint,
    read_retry: RetryConfig,
}

impl ProjectClient {
    #[must_use]
    pub fn new(http: reqwest::Client, endpoint: Endpoint, read_retry: RetryConfig) -> Self {
        Self {
            http,
            endpoint,
            read_retry,
        }
    }

    /// Authoritative team membership for `project`.
    pub async fn team(&self, project: &ProjectId) -> Result<Vec<TeamMember>, ServiceError> {
        let url = self.endpoint.url(&["projects", project.as_str(), "team"])?;
        let outcome = send_with_retry(
            || self.endpoint.authorize(self.http.get(url.clone())),
            &self.read_retry,
        )
        .await;
        let response = expect_success(SERVICE, outcome).await?;
        let wire: WireTeam = decode_json(SERVICE, response).await?;

        Ok(wire
            .into_members()
            .into_iter()
            .map(|m| TeamMember {
                id: ProfessionalId::new(m.id),
                role: m
                    .role
                    .filter(|r| !r.trim().is_empty())
                    .map(|r| Category::parse(&r)),
                status: m.status,
            })
            .collect())
    }

    /// Invite/assign `professional` to `project` as `role`.
    ///
    /// Sent exactly once. Any 2xx is success; the body is ignored.
    pub async fn assign(
        &self,
        project: &ProjectId,
        professional: &ProfessionalId,
        role: &Category,
    ) -> Result<(), ServiceError> {
        let url = self.endpoint.url(&["projects", project.as_str(), "assign"])?;
        let body = AssignBody {
            user_id: professional.as_str(),
            role: role.as_str(),
        };
        let outcome = send_with_retry(
            || self.endpoint.authorize(self.http.post(url.clone()).json(&body)),
            &RetryConfig::none(),
        )
        .await;
        expect_success(SERVICE, outcome).await?;
        tracing::info!(%project, %professional, role = role.as_str(), "Assignment accepted");
        Ok(())
    }
}
