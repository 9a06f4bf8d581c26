#![allow(dead_code)]

use async_trait::async_trait;
use dacp_link::{
    DacpLinkClient, DacpLinkClientBuilder, DacpLinkError, DacpLinkTimeouts, HttpReply, Transport,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const LOGIN: &str = "/sql/login";
pub const EXECUTE: &str = "/sql/execute";
pub const RESULT: &str = "/sql/getResult";

/// One scripted answer for an endpoint
pub enum Step {
    Reply(HttpReply),
    Delayed(Duration, HttpReply),
    Fail(DacpLinkError),
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub body: Value,
    pub at: Instant,
}

/// In-memory transport that answers each endpoint from a FIFO script and
/// records every request it sees.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, path: &str, step: Step) {
        self.script
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(step);
    }

    /// Queue a reply ahead of anything already scripted for `path`
    pub fn push_front_json(&self, path: &str, body: Value) {
        self.script
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_front(Step::Reply(HttpReply::ok_json(&body)));
    }

    pub fn push_json(&self, path: &str, body: Value) {
        self.push(path, Step::Reply(HttpReply::ok_json(&body)));
    }

    pub fn push_status(&self, path: &str, status: u16, body: &str) {
        self.push(path, Step::Reply(HttpReply::new(status, body)));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }

    pub fn remaining(&self, path: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .get(path)
            .map(VecDeque::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_json(
        &self,
        path: &str,
        body: &Value,
        _timeout: Option<Duration>,
    ) -> dacp_link::Result<HttpReply> {
        self.calls.lock().unwrap().push(RecordedCall {
            path: path.to_string(),
            body: body.clone(),
            at: Instant::now(),
        });

        let step = self
            .script
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(VecDeque::pop_front);

        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Delayed(delay, reply)) => {
                tokio::time::sleep(delay).await;
                Ok(reply)
            }
            Some(Step::Fail(err)) => Err(err),
            None => Ok(HttpReply::new(500, format!("no scripted reply for {}", path))),
        }
    }
}

// ==================== Response builders ====================

pub fn login_ok(token: &str) -> Value {
    json!({"accessToken": token, "expires": 3600, "user": "alice", "code": "000", "msg": "ok"})
}

pub fn login_ok_with_engine(token: &str, engine_url: &str) -> Value {
    json!({
        "accessToken": token, "expires": 3600, "user": "alice", "code": "000",
        "olkURL": engine_url
    })
}

pub fn execute_ok(task_id: &str, result_type: &str) -> Value {
    json!({"taskId": task_id, "type": result_type, "success": true, "code": "000", "message": "ok"})
}

pub fn execute_failed(code: &str, message: &str, detail: &str) -> Value {
    json!({"success": false, "code": code, "message": message, "errDetail": detail})
}

pub fn id_schema() -> Value {
    json!([{"name": "id", "type": "bigint"}])
}

/// A page of `count` rows with ids starting at `first_id`
pub fn page(page_num: u32, page_size: u32, total: u64, first_id: u64, count: u64) -> Value {
    let data: Vec<Value> = (first_id..first_id + count).map(|id| json!([id.to_string()])).collect();
    json!({
        "data": data,
        "schema": id_schema(),
        "pageNum": page_num,
        "pageSize": page_size,
        "total": total
    })
}

pub fn page_code(code: &str, msg: &str) -> Value {
    json!({"code": code, "msg": msg})
}

// ==================== Client builders ====================

pub fn builder(transport: Arc<ScriptedTransport>) -> DacpLinkClientBuilder {
    DacpLinkClient::builder()
        .base_url("http://dacp.test")
        .user("alice")
        .password("secret")
        .database("sales")
        .transport(transport)
}

pub fn client(transport: Arc<ScriptedTransport>, page_size: u32) -> DacpLinkClient {
    builder(transport)
        .page_size(page_size)
        .timeouts(DacpLinkTimeouts::default())
        .build()
        .expect("client should build")
}
