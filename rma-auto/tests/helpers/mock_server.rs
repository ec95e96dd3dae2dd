//! Scripted playout server
//!
//! Accepts any number of connections, records every command line, and
//! answers `CLS` with the configured listing, `INFO` from a queue of status
//! documents (the last one repeats), verbs marked as rejected with their
//! scripted error line, and everything else with a plain `202 <VERB> OK`
//! acknowledgment.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Default)]
struct Script {
    commands: Mutex<Vec<String>>,
    listing: Mutex<String>,
    info: Mutex<VecDeque<String>>,
    rejections: Mutex<HashMap<String, String>>,
    connections: AtomicUsize,
    /// Connections to drop right after their first command, unanswered
    drops_remaining: AtomicUsize,
}

pub struct MockServer {
    addr: SocketAddr,
    script: Arc<Script>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let script = Arc::new(Script::default());
        *script.listing.lock().unwrap() = "200 CLS OK\r\n\r\n".to_string();

        let task = tokio::spawn({
            let script = script.clone();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    script.connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(handle(stream, script.clone()));
                }
            }
        });

        Self { addr, script, task }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn set_listing(&self, response: String) {
        *self.script.listing.lock().unwrap() = response;
    }

    /// Queue status documents, answered in order
    pub fn push_info(&self, response: String) {
        self.script.info.lock().unwrap().push_back(response);
    }

    /// Answer every `verb` command with `status` (e.g. `404 PLAY FAILED`)
    pub fn reject(&self, verb: &str, status: &str) {
        self.script
            .rejections
            .lock()
            .unwrap()
            .insert(verb.to_string(), format!("{}\r\n", status));
    }

    pub fn accept(&self, verb: &str) {
        self.script.rejections.lock().unwrap().remove(verb);
    }

    pub fn drop_next_connections(&self, count: usize) {
        self.script.drops_remaining.store(count, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<String> {
        self.script.commands.lock().unwrap().clone()
    }

    /// Recorded commands starting with `prefix`
    pub fn commands_matching(&self, prefix: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.script.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(stream: TcpStream, script: Arc<Script>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let command = line.trim_end_matches('\r').to_string();
        script.commands.lock().unwrap().push(command.clone());

        let drop_now = script
            .drops_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if drop_now {
            return;
        }

        let response = respond(&command, &script);
        if write_half.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

fn respond(command: &str, script: &Script) -> String {
    let verb = command.split_whitespace().next().unwrap_or("");
    if let Some(status) = script.rejections.lock().unwrap().get(verb) {
        return status.clone();
    }
    match verb {
        "CLS" => script.listing.lock().unwrap().clone(),
        "INFO" => {
            let mut queue = script.info.lock().unwrap();
            let response = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            response.unwrap_or_else(|| {
                "201 INFO OK\r\n<channel><stage></stage></channel>\r\n".to_string()
            })
        }
        _ => format!("202 {} OK\r\n", verb),
    }
}
