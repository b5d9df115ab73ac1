use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use kernel::model::{id::UserId, role::Role};
use registry::AppRegistry;
use shared::error::AppError;

// 認証は外部のゲートウェイに委ねており、エンジンには検証済みの
// (userId, communityCode) とロールがヘッダーで渡ってくる。
pub struct AuthorizedMember {
    pub user_id: UserId,
    pub community_code: String,
    pub role: Role,
}

impl AuthorizedMember {
    pub fn id(&self) -> UserId {
        self.user_id
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[async_trait]
impl FromRequestParts<AppRegistry> for AuthorizedMember {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _registry: &AppRegistry,
    ) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
        };

        let user_id = header("x-user-id")
            .and_then(|v| v.parse::<UserId>().ok())
            .ok_or(AppError::UnauthenticatedError)?;
        let community_code = header("x-community-code")
            .map(str::to_owned)
            .ok_or(AppError::UnauthenticatedError)?;
        let role = header("x-user-role")
            .and_then(|v| v.parse::<Role>().ok())
            .unwrap_or_default();

        Ok(Self {
            user_id,
            community_code,
            role,
        })
    }
}
