use std::sync::{Arc, Mutex};

use crate::settings::Settings;
use crate::tagger::Tagger;

// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub tagger: Arc<Tagger>,
    pub settings: Arc<Mutex<Settings>>,
    /// Where settings changes are written back, if anywhere.
    pub config_path: Option<std::path::PathBuf>,
}
