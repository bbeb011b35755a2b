//! Step profiler attached to a request when profiling is enabled.
//!
//! `start` opens a labelled run, each `done` closes a step measured from the
//! previous mark, and `end` seals the run with its total.

use std::time::{Duration, Instant};

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct ProfilerStep {
    pub name: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct Profiler {
    label: Option<String>,
    started_at: Option<Instant>,
    last_mark: Option<Instant>,
    steps: Vec<ProfilerStep>,
    total: Option<Duration>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, label: impl Into<String>) {
        let now = Instant::now();
        self.label = Some(label.into());
        self.started_at = Some(now);
        self.last_mark = Some(now);
        self.steps.clear();
        self.total = None;
    }

    /// Close a step. Ignored before `start` or after `end`.
    pub fn done(&mut self, step: impl Into<String>) {
        if self.total.is_some() {
            return;
        }
        let Some(last) = self.last_mark else {
            return;
        };
        let now = Instant::now();
        self.steps.push(ProfilerStep {
            name: step.into(),
            elapsed: now.duration_since(last),
        });
        self.last_mark = Some(now);
    }

    pub fn end(&mut self) -> Option<Duration> {
        if self.total.is_none() {
            self.total = self.started_at.map(|s| s.elapsed());
        }
        self.total
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn steps(&self) -> &[ProfilerStep] {
        &self.steps
    }

    /// `{"total": ms, "<step>": ms, ...}` in recording order.
    pub fn to_json_string(&self) -> String {
        let mut map = Map::new();
        if let Some(total) = self.total {
            map.insert("total".to_string(), millis(total));
        }
        for step in &self.steps {
            map.insert(step.name.clone(), millis(step.elapsed));
        }
        Value::Object(map).to_string()
    }
}

fn millis(duration: Duration) -> Value {
    Value::from(duration.as_millis() as u64)
}
