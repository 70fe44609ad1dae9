//! Shared fakes for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use cadence_bot::application::commands::CommandCatalog;
use cadence_bot::application::services::{EngineSettings, Services};
use cadence_bot::domain::entities::{Control, Interaction, Item, Session, SessionId};
use cadence_bot::domain::traits::{Acknowledgement, Bot, BotInfo, MediaConnection, SessionStore, VoiceGateway};
use cadence_bot::infrastructure::media::SimulatedGateway;
use cadence_bot::infrastructure::storage::JsonSessionStore;
use cadence_bot::{BotError, InteractionDispatcher, StorageError};

static INIT: Once = Once::new();

pub fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Records every acknowledgement and status render
#[derive(Default)]
pub struct RecordingBot {
    acks: Mutex<Vec<(String, Acknowledgement)>>,
    renders: Mutex<Vec<(SessionId, Vec<Vec<Control>>)>>,
    posted: AtomicUsize,
    deleted: Mutex<Vec<String>>,
}

impl RecordingBot {
    pub fn acks(&self) -> Vec<(String, Acknowledgement)> {
        self.acks.lock().unwrap().clone()
    }

    pub fn acks_for(&self, interaction: &Interaction) -> Vec<Acknowledgement> {
        self.acks()
            .into_iter()
            .filter(|(id, _)| id == &interaction.id)
            .map(|(_, ack)| ack)
            .collect()
    }

    pub fn render_count(&self) -> usize {
        self.renders.lock().unwrap().len()
    }

    pub fn last_render(&self) -> Option<Vec<Vec<Control>>> {
        self.renders.lock().unwrap().last().map(|(_, rows)| rows.clone())
    }

    /// Number of status messages posted rather than edited
    pub fn posted_count(&self) -> usize {
        self.posted.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Bot for RecordingBot {
    async fn start(&self) -> Result<(), BotError> {
        Ok(())
    }

    async fn send_message(&self, _channel_id: &str, _text: &str) -> Result<String, BotError> {
        Ok("message".to_string())
    }

    async fn acknowledge(&self, interaction: &Interaction, ack: Acknowledgement) -> Result<(), BotError> {
        self.acks.lock().unwrap().push((interaction.id.clone(), ack));
        Ok(())
    }

    async fn update_status(&self, session: &Session, rows: Vec<Vec<Control>>) -> Result<String, BotError> {
        self.renders.lock().unwrap().push((session.session_id.clone(), rows));
        let message_id = match &session.message_id {
            Some(id) => id.clone(),
            None => format!("status-{}", self.posted.fetch_add(1, Ordering::SeqCst)),
        };
        Ok(message_id)
    }

    async fn delete_message(&self, _channel_id: &str, message_id: &str) -> Result<(), BotError> {
        self.deleted.lock().unwrap().push(message_id.to_string());
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        BotInfo {
            id: "test".to_string(),
            name: "test".to_string(),
            username: "test".to_string(),
        }
    }
}

/// In-memory store whose writes can be made to fail
pub struct FlakyStore {
    inner: JsonSessionStore,
    fail_saves: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: JsonSessionStore::in_memory(),
            fail_saves: AtomicBool::new(false),
        }
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn find_session(&self, id: &SessionId) -> Result<Option<Session>, StorageError> {
        self.inner.find_session(id).await
    }

    async fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("disk on fire".to_string()));
        }
        self.inner.save_session(session).await
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), StorageError> {
        self.inner.delete_session(id).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StorageError> {
        self.inner.list_sessions().await
    }
}

#[derive(Default)]
pub struct CountingConnection {
    pub disconnects: AtomicUsize,
}

impl MediaConnection for CountingConnection {
    fn channel_id(&self) -> &str {
        "voice"
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub dispatcher: InteractionDispatcher,
    pub bot: Arc<RecordingBot>,
    pub store: Arc<FlakyStore>,
    pub gateway: Arc<SimulatedGateway>,
}

impl Harness {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_catalog(settings, CommandCatalog::standard())
    }

    pub fn with_catalog(settings: EngineSettings, catalog: CommandCatalog) -> Self {
        ensure_init();
        let bot = Arc::new(RecordingBot::default());
        let store = Arc::new(FlakyStore::new());
        let gateway = Arc::new(SimulatedGateway::new());
        let services = Arc::new(Services::new(store.clone(), bot.clone(), gateway.clone(), catalog, settings));
        Self {
            dispatcher: InteractionDispatcher::new(services),
            bot,
            store,
            gateway,
        }
    }

    pub fn services(&self) -> &Arc<Services> {
        self.dispatcher.services()
    }

    /// Store a session for `group` holding `items` numbered items
    pub async fn seed(&self, group: &str, items: usize) -> Session {
        let session =
            Session::new(group, "channel").with_items((0..items).map(|i| Item::new(format!("item {}", i))));
        self.store.save_session(&session).await.unwrap();
        session
    }

    /// Attach a connection and an idle player to the session
    pub async fn connect(&self, group: &str) -> Arc<CountingConnection> {
        let id = SessionId::new(group);
        let (_, player) = self.gateway.connect(&id, "voice").await.unwrap();
        let connection = Arc::new(CountingConnection::default());
        let resources = &self.services().resources;
        resources.set_connection(&id, Some(connection.clone() as Arc<dyn MediaConnection>));
        resources.set_player(&id, Some(player));
        connection
    }

    pub async fn session(&self, group: &str) -> Option<Session> {
        self.store.find_session(&SessionId::new(group)).await.unwrap()
    }
}

pub fn settings(items_per_page: usize) -> EngineSettings {
    EngineSettings {
        items_per_page,
        ..EngineSettings::default()
    }
}
