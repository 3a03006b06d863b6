// 会话状态容器 - 跨视图共享的登录、UI 与分类状态
//
// 所有字段只能通过具名动作修改；每个动作在写锁内一次性完成，
// 随后通知全部订阅者，订阅者拿到的永远是完整快照

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::api::{Metrics, Prediction};

/// 登录状态
///
/// 字段私有，只能经由 `SessionStore` 的动作整体修改，保证“有垃圾桶 ID 必已登录”
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthFlags {
    is_logged_in: bool,
    current_bin_id: Option<String>,
}

impl AuthFlags {
    pub fn is_logged_in(&self) -> bool {
        self.is_logged_in
    }

    pub fn current_bin_id(&self) -> Option<&str> {
        self.current_bin_id.as_deref()
    }
}

/// UI 状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiFlags {
    pub is_dark_mode: bool,
    pub is_loading: bool,
    pub last_error: Option<String>,
}

impl Default for UiFlags {
    fn default() -> Self {
        Self {
            is_dark_mode: true,
            is_loading: false,
            last_error: None,
        }
    }
}

/// 会话状态快照
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    /// 每次动作后递增
    pub revision: u64,
    pub auth: AuthFlags,
    pub ui: UiFlags,
    /// 分类历史，按时间顺序追加
    pub history: Vec<Prediction>,
    /// 最近一次拉取的统计数据，可能落后于历史
    pub metrics: Option<Metrics>,
}

impl SessionState {
    /// 最近一次分类结果，始终等于历史的最后一项
    pub fn last_prediction(&self) -> Option<&Prediction> {
        self.history.last()
    }

    fn clear_classification(&mut self) {
        self.history.clear();
        self.metrics = None;
        self.ui.last_error = None;
    }
}

/// 会话状态容器
///
/// 生产环境中全局只创建一个实例，通过 `Arc` 注入各个模块
pub struct SessionStore {
    sender: watch::Sender<SessionState>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_state(SessionState::default())
    }

    /// 使用指定的深色模式初始值创建
    pub fn with_dark_mode(is_dark_mode: bool) -> Self {
        let mut state = SessionState::default();
        state.ui.is_dark_mode = is_dark_mode;
        Self::with_state(state)
    }

    fn with_state(state: SessionState) -> Self {
        let (sender, _) = watch::channel(state);
        Self { sender }
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.sender.subscribe()
    }

    /// 当前状态的副本
    pub fn snapshot(&self) -> SessionState {
        self.sender.borrow().clone()
    }

    /// 在写锁内应用一个动作并通知订阅者
    fn dispatch(&self, action: &str, mutate: impl FnOnce(&mut SessionState)) {
        self.sender.send_modify(|state| {
            mutate(state);
            state.revision += 1;
        });
        debug!("会话动作: {}", action);
    }

    pub fn set_dark_mode(&self, is_dark_mode: bool) {
        self.dispatch("set_dark_mode", |s| s.ui.is_dark_mode = is_dark_mode);
    }

    pub fn set_loading(&self, is_loading: bool) {
        self.dispatch("set_loading", |s| s.ui.is_loading = is_loading);
    }

    /// 置为加载中，返回的 guard 离开作用域时（包括 future 被丢弃）自动清除
    pub fn begin_loading(&self) -> LoadingGuard<'_> {
        self.set_loading(true);
        LoadingGuard { store: self }
    }

    pub fn set_error(&self, error: Option<String>) {
        self.dispatch("set_error", |s| s.ui.last_error = error);
    }

    /// 选择垃圾桶，同时标记为已登录
    pub fn set_current_bin(&self, bin_id: impl Into<String>) {
        let bin_id = bin_id.into();
        info!("已登录垃圾桶: {}", bin_id);
        self.dispatch("set_current_bin", |s| {
            s.auth = AuthFlags {
                is_logged_in: true,
                current_bin_id: Some(bin_id),
            };
        });
    }

    /// 退出登录并清空分类状态
    pub fn logout(&self) {
        info!("退出登录");
        self.dispatch("logout", |s| {
            s.auth = AuthFlags::default();
            s.clear_classification();
        });
    }

    /// 追加一条分类结果
    pub fn add_prediction(&self, prediction: Prediction) {
        self.dispatch("add_prediction", |s| s.history.push(prediction));
    }

    /// 整体替换统计数据
    pub fn set_metrics(&self, metrics: Metrics) {
        self.dispatch("set_metrics", |s| s.metrics = Some(metrics));
    }

    /// 清空分类状态，保留登录与深色模式
    pub fn clear_session(&self) {
        info!("清空当前会话");
        self.dispatch("clear_session", |s| s.clear_classification());
    }
}

/// 加载标记，drop 时清除 `is_loading`
pub struct LoadingGuard<'a> {
    store: &'a SessionStore,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.set_loading(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{metrics, prediction};
    use std::sync::Arc;

    #[test]
    fn test_initial_state() {
        let store = SessionStore::new();
        let state = store.snapshot();

        assert!(state.ui.is_dark_mode);
        assert!(!state.ui.is_loading);
        assert!(!state.auth.is_logged_in());
        assert_eq!(state.auth.current_bin_id(), None);
        assert!(state.last_prediction().is_none());
        assert!(state.metrics.is_none());
    }

    #[test]
    fn test_add_prediction_appends_in_order() {
        let store = SessionStore::new();
        let p1 = prediction("plastic", 0.9);
        let p2 = prediction("glass", 0.7);

        store.add_prediction(p1.clone());
        assert_eq!(store.snapshot().history.len(), 1);
        assert_eq!(store.snapshot().last_prediction(), Some(&p1));

        store.add_prediction(p2.clone());
        let state = store.snapshot();
        assert_eq!(state.history, vec![p1, p2.clone()]);
        assert_eq!(state.last_prediction(), Some(&p2));
    }

    #[test]
    fn test_logout_resets_everything() {
        let store = SessionStore::new();
        store.set_current_bin("3");
        store.add_prediction(prediction("metal", 0.6));
        store.set_metrics(metrics(4));
        store.set_error(Some("boom".to_string()));

        store.logout();
        let state = store.snapshot();

        assert!(!state.auth.is_logged_in());
        assert_eq!(state.auth.current_bin_id(), None);
        assert!(state.history.is_empty());
        assert!(state.last_prediction().is_none());
        assert!(state.metrics.is_none());
        assert!(state.ui.last_error.is_none());
    }

    #[test]
    fn test_logout_from_fresh_state() {
        let store = SessionStore::new();
        store.logout();
        let state = store.snapshot();
        assert!(!state.auth.is_logged_in());
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_clear_session_keeps_login_and_theme() {
        let store = SessionStore::new();
        store.set_current_bin("5");
        store.set_dark_mode(false);
        store.add_prediction(prediction("paper", 0.8));
        store.set_metrics(metrics(1));
        store.set_error(Some("timeout".to_string()));

        store.clear_session();
        let state = store.snapshot();

        assert!(state.auth.is_logged_in());
        assert_eq!(state.auth.current_bin_id(), Some("5"));
        assert!(!state.ui.is_dark_mode);
        assert!(state.history.is_empty());
        assert!(state.metrics.is_none());
        assert!(state.ui.last_error.is_none());
    }

    #[test]
    fn test_set_metrics_replaces() {
        let store = SessionStore::new();
        store.set_metrics(metrics(10));
        store.set_metrics(metrics(2));
        assert_eq!(store.snapshot().metrics.unwrap().total, 2);
    }

    #[test]
    fn test_loading_guard_clears_on_drop() {
        let store = SessionStore::new();

        let guard = store.begin_loading();
        assert!(store.snapshot().ui.is_loading);

        drop(guard);
        assert!(!store.snapshot().ui.is_loading);
    }

    #[tokio::test]
    async fn test_every_action_notifies() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();

        store.set_loading(false);
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        // 值不变同样通知
        store.set_loading(false);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().revision, 2);
    }

    #[tokio::test]
    async fn test_set_current_bin_is_atomic() {
        let store = Arc::new(SessionStore::new());
        let mut rx = store.subscribe();

        let observer = tokio::spawn(async move {
            let mut seen = 0;
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                assert_eq!(
                    state.auth.is_logged_in(),
                    state.auth.current_bin_id().is_some()
                );
                seen += 1;
            }
            seen
        });

        for round in 0..50 {
            store.set_current_bin(format!("{}", round % 8 + 1));
            store.logout();
            tokio::task::yield_now().await;
        }
        drop(store);

        let seen = observer.await.unwrap();
        assert!(seen > 0);
    }
}
