//! Test doubles shared by the unit tests.
use crate::error::FetchError;
use crate::message::{Attack, AttackDetail, AttackInfo, AttackSummary, Bucket, Snapshot};
use crate::provider::AttackSource;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub fn summary(id: u64, ended: bool) -> AttackSummary {
    AttackSummary {
        id,
        target: format!("203.0.113.{}", id),
        description: "UDP flood".to_string(),
        mbps: 100 * id,
        pps: 1000 * id,
        ended,
    }
}

pub fn snapshot(entries: &[(u64, bool)]) -> Snapshot {
    Snapshot::new(entries.iter().map(|&(id, ended)| summary(id, ended)).collect())
}

pub fn bucket(name: &str) -> Bucket {
    Bucket {
        name: name.to_string(),
        value: 1.0,
    }
}

pub fn detail(id: u64, ended: bool) -> AttackDetail {
    AttackDetail {
        attack: Attack {
            id,
            target: format!("203.0.113.{}", id),
            description: "UDP flood".to_string(),
            mbps: 100 * id,
            pps: 1000 * id,
            ended,
            started_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            ended_at: ended.then(|| Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap()),
            total_duration: ended.then_some(300),
            total_volume: ended.then_some(5120),
        },
        info: AttackInfo {
            destination_ports: vec![bucket("80"), bucket("other")],
            source_ports: vec![bucket("53"), bucket("123")],
            protocols: vec![bucket("17"), bucket("6"), bucket("other")],
            packets: vec![bucket("1024-1500")],
            source_ips: vec![bucket("198.51.100.1"), bucket("other")],
            source_asns: vec![bucket("AS64500")],
            source_countries: vec![],
        },
    }
}

/// Attack source replaying a fixed script of snapshot responses.
#[derive(Default)]
pub struct ScriptedSource {
    snapshots: Mutex<VecDeque<Result<Snapshot, FetchError>>>,
    details: Mutex<HashMap<u64, AttackDetail>>,
    detail_calls: Mutex<Vec<u64>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_snapshot(&self, entries: &[(u64, bool)]) -> &Self {
        self.snapshots.lock().unwrap().push_back(Ok(snapshot(entries)));
        self
    }

    pub fn push_error(&self, error: FetchError) -> &Self {
        self.snapshots.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn set_detail(&self, detail: AttackDetail) -> &Self {
        self.details.lock().unwrap().insert(detail.id(), detail);
        self
    }

    pub fn detail_calls(&self) -> Vec<u64> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttackSource for ScriptedSource {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        self.snapshots
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Network("script exhausted".to_string())))
    }

    async fn fetch_detail(&self, id: u64) -> Result<AttackDetail, FetchError> {
        self.detail_calls.lock().unwrap().push(id);
        self.details
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(FetchError::Status(StatusCode::NOT_FOUND))
    }

    async fn fetch_ips(&self) -> Result<Vec<String>, FetchError> {
        Ok(vec!["203.0.113.1".to_string()])
    }
}
