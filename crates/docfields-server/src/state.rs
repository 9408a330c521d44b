use docfields_core::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
}
