//! Gateway 应用状态

use std::sync::Arc;

use crate::chat::PayloadDefaults;
use crate::config::Config;
use crate::upstream::Upstream;

/// Gateway 应用状态
///
/// 启动时构造一次，请求之间只读共享。
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    defaults: Arc<PayloadDefaults>,
    upstream: Arc<dyn Upstream>,
}

impl AppState {
    pub fn new(config: Config, upstream: Arc<dyn Upstream>) -> Self {
        let defaults = PayloadDefaults::from(&config);
        Self {
            config: Arc::new(config),
            defaults: Arc::new(defaults),
            upstream,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn defaults(&self) -> &PayloadDefaults {
        &self.defaults
    }

    pub fn upstream(&self) -> &Arc<dyn Upstream> {
        &self.upstream
    }
}
