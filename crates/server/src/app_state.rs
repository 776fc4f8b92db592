use crate::auth::SessionConfig;
use server_api::ApiContext;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) session: SessionConfig,
}
