// Acuvera 垃圾分类客户端 - 主库

// 声明模块
pub mod api;
pub mod app;
pub mod capture;
pub mod commands;
pub mod domains;
pub mod event_bus;
pub mod logger;
pub mod models;
pub mod settings;
pub mod store;
pub mod utils;

use anyhow::Context;
use reqwest::Url;
use std::sync::Arc;

use api::ClassificationService;
use capture::{CaptureOptions, MediaDevices};
use domains::{AuthDomain, CaptureDomain, ClassifyDomain, ReviewDomain};
use event_bus::EventBus;
use settings::SettingsManager;
use store::SessionStore;

pub use app::run;

/// 事件缓冲区大小
const EVENT_BUS_CAPACITY: usize = 256;

/// 应用状态（按领域分组）
///
/// - 拍照领域：摄像头会话
/// - 分类领域：分类与纠错
/// - 回顾领域：统计与导入导出
/// - 登录领域：垃圾桶与密码
/// - 会话状态与事件总线由各领域共享
#[derive(Clone)]
pub struct AppState {
    /// 拍照领域管理器
    pub capture_domain: Arc<CaptureDomain>,
    /// 分类领域管理器
    pub classify_domain: Arc<ClassifyDomain>,
    /// 回顾领域管理器
    pub review_domain: Arc<ReviewDomain>,
    /// 登录领域管理器
    pub auth_domain: Arc<AuthDomain>,
    /// 会话状态
    pub store: Arc<SessionStore>,
    /// 事件总线
    pub event_bus: Arc<EventBus>,
    /// 配置管理器
    pub settings: Arc<SettingsManager>,
}

impl AppState {
    /// 按当前配置组装各领域
    pub async fn new(
        settings: Arc<SettingsManager>,
        service: Arc<dyn ClassificationService>,
        devices: Arc<dyn MediaDevices>,
    ) -> anyhow::Result<Self> {
        let config = settings.effective().await;

        let origin = config
            .origin
            .as_deref()
            .map(Url::parse)
            .transpose()
            .with_context(|| format!("页面来源格式错误: {:?}", config.origin))?;

        let event_bus = Arc::new(EventBus::new(EVENT_BUS_CAPACITY));
        let store = Arc::new(SessionStore::with_dark_mode(config.ui_settings.dark_mode));

        let capture_domain = Arc::new(CaptureDomain::new(
            devices,
            CaptureOptions::from_settings(&config.capture_settings, origin),
            event_bus.clone(),
        ));
        let classify_domain = Arc::new(ClassifyDomain::new(
            service.clone(),
            store.clone(),
            event_bus.clone(),
        ));
        let review_domain = Arc::new(ReviewDomain::new(
            service.clone(),
            store.clone(),
            event_bus.clone(),
        ));
        let auth_domain = Arc::new(AuthDomain::new(service, store.clone(), event_bus.clone()));

        Ok(Self {
            capture_domain,
            classify_domain,
            review_domain,
            auth_domain,
            store,
            event_bus,
            settings,
        })
    }
}
