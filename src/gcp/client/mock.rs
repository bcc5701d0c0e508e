use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;

use super::{ComputeClient, Firewall, GoogleApiError};

/// A scripted reply for one mock call.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    /// Fail with a Google API 404.
    NotFound,
    /// Fail with an arbitrary error.
    Fail(String),
}

impl<T> Reply<T> {
    fn into_result(self, resource: &str) -> Result<T> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::NotFound => Err(GoogleApiError::not_found(resource).into()),
            Reply::Fail(message) => Err(anyhow!(message)),
        }
    }
}

/// A call the mock received, with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Get {
        project_id: String,
        name: String,
    },
    Insert {
        project_id: String,
        rule: Firewall,
    },
    Update {
        project_id: String,
        name: String,
        rule: Firewall,
    },
    Delete {
        project_id: String,
        name: String,
    },
}

#[derive(Default)]
struct Script {
    get: VecDeque<Reply<Firewall>>,
    insert: VecDeque<Reply<()>>,
    update: VecDeque<Reply<()>>,
    delete: VecDeque<Reply<()>>,
}

/// A scripted compute client for tests. Each operation answers from its own
/// queue in order; a call with nothing scripted fails.
#[derive(Default)]
pub struct MockComputeClient {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
}

impl MockComputeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_get(self, reply: Reply<Firewall>) -> Self {
        self.with_script(|s| s.get.push_back(reply))
    }

    pub fn on_insert(self, reply: Reply<()>) -> Self {
        self.with_script(|s| s.insert.push_back(reply))
    }

    pub fn on_update(self, reply: Reply<()>) -> Self {
        self.with_script(|s| s.update.push_back(reply))
    }

    pub fn on_delete(self, reply: Reply<()>) -> Self {
        self.with_script(|s| s.delete.push_back(reply))
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rules passed to `insert_firewall_rule`.
    pub fn inserted(&self) -> Vec<Firewall> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Insert { rule, .. } => Some(rule),
                _ => None,
            })
            .collect()
    }

    /// Rules passed to `update_firewall_rule`.
    pub fn updated(&self) -> Vec<Firewall> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Update { rule, .. } => Some(rule),
                _ => None,
            })
            .collect()
    }

    fn with_script(self, f: impl FnOnce(&mut Script)) -> Self {
        // A test that panicked mid-call must not swallow later scripting.
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *script);
        drop(script);
        self
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn next<T>(
        &self,
        op: &str,
        pick: impl FnOnce(&mut Script) -> &mut VecDeque<Reply<T>>,
    ) -> Result<Reply<T>> {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        match pick(&mut *script).pop_front() {
            Some(reply) => Ok(reply),
            None => bail!("MockComputeClient: unexpected call to {op}"),
        }
    }
}

#[async_trait]
impl ComputeClient for MockComputeClient {
    async fn get_firewall_rule(&self, project_id: &str, name: &str) -> Result<Firewall> {
        self.record(Call::Get {
            project_id: project_id.to_string(),
            name: name.to_string(),
        });
        self.next("get_firewall_rule", |s| &mut s.get)?
            .into_result(name)
    }

    async fn insert_firewall_rule(&self, project_id: &str, rule: &Firewall) -> Result<()> {
        self.record(Call::Insert {
            project_id: project_id.to_string(),
            rule: rule.clone(),
        });
        self.next("insert_firewall_rule", |s| &mut s.insert)?
            .into_result(&rule.name)
    }

    async fn update_firewall_rule(
        &self,
        project_id: &str,
        name: &str,
        rule: &Firewall,
    ) -> Result<()> {
        self.record(Call::Update {
            project_id: project_id.to_string(),
            name: name.to_string(),
            rule: rule.clone(),
        });
        self.next("update_firewall_rule", |s| &mut s.update)?
            .into_result(name)
    }

    async fn delete_firewall_rule(&self, project_id: &str, name: &str) -> Result<()> {
        self.record(Call::Delete {
            project_id: project_id.to_string(),
            name: name.to_string(),
        });
        self.next("delete_firewall_rule", |s| &mut s.delete)?
            .into_result(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::client::is_not_found;

    #[tokio::test]
    async fn replies_in_order() {
        let mock = MockComputeClient::new()
            .on_delete(Reply::Ok(()))
            .on_delete(Reply::NotFound);

        assert!(mock.delete_firewall_rule("p", "r").await.is_ok());
        let err = mock.delete_firewall_rule("p", "r").await.unwrap_err();
        assert!(is_not_found(&err));
    }

    #[tokio::test]
    async fn unscripted_call_fails() {
        let mock = MockComputeClient::new();
        let err = mock.get_firewall_rule("p", "r").await.unwrap_err();
        assert!(err.to_string().contains("unexpected call to get_firewall_rule"));
    }

    #[tokio::test]
    async fn records_arguments() {
        let rule = Firewall {
            name: "r".to_string(),
            ..Firewall::default()
        };
        let mock = MockComputeClient::new().on_insert(Reply::Fail("nope".to_string()));

        let err = mock.insert_firewall_rule("p", &rule).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert_eq!(
            mock.calls(),
            vec![Call::Insert {
                project_id: "p".to_string(),
                rule: rule.clone(),
            }]
        );
        assert_eq!(mock.inserted(), vec![rule]);
        assert!(mock.updated().is_empty());
    }

    #[tokio::test]
    async fn scripting_survives_poisoned_lock() {
        let mock = MockComputeClient::new();
        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = mock.script.lock().unwrap();
            panic!("test panicked while holding the script");
        }));
        assert!(poisoned.is_err());
        assert!(mock.script.is_poisoned());

        let mock = mock.on_delete(Reply::Ok(()));
        mock.delete_firewall_rule("p", "r").await.unwrap();
        assert_eq!(mock.calls().len(), 1);
    }
}
