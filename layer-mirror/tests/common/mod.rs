#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use layer_mirror::types::Chat;
use layer_mirror::{
    AuthRequest, Config, Prompt, Session, Transport, TransportError, TransportFactory, UpdateHandler,
};
use tokio::sync::mpsc;

// ── Recording transport ───────────────────────────────────────────────────────

/// One request as seen by the transport.
#[derive(Debug)]
pub struct Sent {
    /// Which transport instance (0 = first) carried it.
    pub transport:  usize,
    pub request_id: u64,
    pub request:    AuthRequest,
}

struct RecordingTransport {
    index: usize,
    tx:    mpsc::UnboundedSender<Sent>,
}

impl Transport for RecordingTransport {
    fn send(&self, request_id: u64, request: AuthRequest) -> Result<(), TransportError> {
        self.tx
            .send(Sent { transport: self.index, request_id, request })
            .map_err(|_| TransportError::Closed)
    }
}

pub struct RecordingFactory {
    created:  AtomicUsize,
    tx:       mpsc::UnboundedSender<Sent>,
    handlers: Mutex<Vec<UpdateHandler>>,
}

impl RecordingFactory {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Sent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let factory = Arc::new(Self {
            created:  AtomicUsize::new(0),
            tx,
            handlers: Mutex::new(Vec::new()),
        });
        (factory, rx)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Handler given to the most recent transport.
    pub fn handler(&self) -> UpdateHandler {
        self.handlers.lock().unwrap().last().cloned().expect("no transport created")
    }
}

impl TransportFactory for RecordingFactory {
    fn create(&self, handler: UpdateHandler) -> Result<Arc<dyn Transport>, TransportError> {
        let index = self.created.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().unwrap().push(handler);
        Ok(Arc::new(RecordingTransport { index, tx: self.tx.clone() }))
    }
}

pub struct FailingFactory;

impl TransportFactory for FailingFactory {
    fn create(&self, _: UpdateHandler) -> Result<Arc<dyn Transport>, TransportError> {
        Err(TransportError::Rejected("offline".into()))
    }
}

// ── Scripted prompt ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
    labels:  Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new(answers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().map(|s| s.to_string()).collect()),
            labels:  Mutex::new(Vec::new()),
        })
    }

    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }
}

impl Prompt for ScriptedPrompt {
    fn prompt_string(&self, label: &str) -> io::Result<String> {
        self.labels.lock().unwrap().push(label.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no more answers"))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

pub fn start(
    config:  Config,
    answers: &[&str],
) -> (Session, Arc<RecordingFactory>, Arc<ScriptedPrompt>, mpsc::UnboundedReceiver<Sent>) {
    let (factory, rx) = RecordingFactory::new();
    let prompt  = ScriptedPrompt::new(answers);
    let session = Session::start(config, factory.clone(), prompt.clone()).unwrap();
    (session, factory, prompt, rx)
}

pub async fn next_sent(rx: &mut mpsc::UnboundedReceiver<Sent>) -> Sent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no request within 5s")
        .expect("transport channel closed")
}

/// Give the auth task time to act, then check it sent nothing.
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Sent>) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    if let Ok(sent) = rx.try_recv() {
        panic!("unexpected request: {sent:?}");
    }
}

pub fn chat(id: i64, order: u64) -> Chat {
    Chat { id, order, title: format!("chat {id}"), ..Default::default() }
}
