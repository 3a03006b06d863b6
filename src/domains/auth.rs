// 登录领域管理器
//
// 选择垃圾桶并经远端校验密码后进入已登录状态

use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{ClassificationService, RemoteError};
use crate::event_bus::{AppEvent, EventBus};
use crate::store::SessionStore;
use crate::utils::validation;

/// 登录错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("请选择垃圾桶")]
    MissingBin,
    #[error("未知的垃圾桶: {0}")]
    UnknownBin(String),
    #[error("请输入密码")]
    MissingPassword,
    #[error("{0}")]
    InvalidPassword(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// 登录领域管理器
pub struct AuthDomain {
    service: Arc<dyn ClassificationService>,
    store: Arc<SessionStore>,
    event_bus: Arc<EventBus>,
}

impl AuthDomain {
    pub fn new(
        service: Arc<dyn ClassificationService>,
        store: Arc<SessionStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            service,
            store,
            event_bus,
        }
    }

    /// 登录指定垃圾桶
    pub async fn login(&self, bin_id: &str, password: &str) -> Result<(), AuthError> {
        let bin_id = bin_id.trim();
        if bin_id.is_empty() {
            return Err(AuthError::MissingBin);
        }
        if validation::bin_name(bin_id).is_none() {
            return Err(AuthError::UnknownBin(bin_id.to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::MissingPassword);
        }

        self.store.set_error(None);
        let check = match self.service.validate_password(password).await {
            Ok(check) => check,
            Err(err) => {
                self.store.set_error(Some(err.to_string()));
                return Err(err.into());
            }
        };

        if !check.valid {
            warn!("垃圾桶 {} 密码校验失败", bin_id);
            let message = if check.message.is_empty() {
                "密码错误".to_string()
            } else {
                check.message
            };
            self.store.set_error(Some(message.clone()));
            return Err(AuthError::InvalidPassword(message));
        }

        self.store.set_current_bin(bin_id);
        self.event_bus.publish(AppEvent::LoggedIn {
            bin_id: bin_id.to_string(),
        });
        Ok(())
    }

    /// 退出登录，清空分类状态
    pub fn logout(&self) {
        info!("用户退出登录");
        self.store.logout();
        self.event_bus.publish(AppEvent::LoggedOut);
    }

    pub fn is_logged_in(&self) -> bool {
        self.store.snapshot().auth.is_logged_in()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{prediction, FakeService};

    fn domain() -> (AuthDomain, Arc<SessionStore>, Arc<EventBus>) {
        let store = Arc::new(SessionStore::new());
        let bus = Arc::new(EventBus::new(16));
        let domain = AuthDomain::new(
            Arc::new(FakeService::with_labels(&[])),
            store.clone(),
            bus.clone(),
        );
        (domain, store, bus)
    }

    #[tokio::test]
    async fn test_login_success() {
        let (domain, store, bus) = domain();
        let mut events = bus.subscribe();

        domain.login("3", "admin").await.unwrap();

        let state = store.snapshot();
        assert!(state.auth.is_logged_in());
        assert_eq!(state.auth.current_bin_id(), Some("3"));
        assert!(matches!(
            events.try_recv(),
            Ok(AppEvent::LoggedIn { bin_id }) if bin_id == "3"
        ));
    }

    #[tokio::test]
    async fn test_login_input_checks() {
        let (domain, store, _) = domain();

        assert_eq!(domain.login("", "admin").await, Err(AuthError::MissingBin));
        assert_eq!(
            domain.login("9", "admin").await,
            Err(AuthError::UnknownBin("9".to_string()))
        );
        assert_eq!(domain.login("1", "").await, Err(AuthError::MissingPassword));
        assert!(!store.snapshot().auth.is_logged_in());
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let (domain, store, _) = domain();

        let err = domain.login("2", "guess").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidPassword("Invalid password".to_string()));

        let state = store.snapshot();
        assert!(!state.auth.is_logged_in());
        assert_eq!(state.ui.last_error.as_deref(), Some("Invalid password"));
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let (domain, store, _) = domain();
        domain.login("1", "admin").await.unwrap();
        store.add_prediction(prediction("paper", 0.7));

        domain.logout();

        let state = store.snapshot();
        assert!(!domain.is_logged_in());
        assert!(state.history.is_empty());
        assert_eq!(state.auth.current_bin_id(), None);
    }
}
