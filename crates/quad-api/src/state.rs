use std::sync::Arc;

use quad_db::Database;
use quad_gateway::dispatcher::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    /// Institutional email domain registrations are bound to,
    /// e.g. "bsu.edu.az".
    pub email_domain: String,
}
