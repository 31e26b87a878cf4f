use crate::assets::AssetHost;
use crate::config::Config;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub assets: Arc<dyn AssetHost>,
    pub config: Config,
}
