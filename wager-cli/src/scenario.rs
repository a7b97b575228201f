//! Scripted replays against an in-memory desk.
//!
//! A scenario seeds balances, then applies timed steps in order. Bets are
//! referred to by labels chosen in the `create` step, since ids are only known
//! once the bet exists.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::Arc,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::debug;
use wager_core::{
    BetId, BetLifecycle, ChannelOracle, ClockSource, DeskConfig, ManualClock, MemoryLedger, NewBet,
    OracleAnswer, OracleAttestation, OracleRequest, Principal, Release, Timestamp, WagerError,
};

/// A scripted sequence of escrow operations.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Scenario {
    /// Starting balance per principal
    #[serde(default)]
    pub balances: BTreeMap<String, u64>,

    pub steps: Vec<Step>,
}

/// One operation, optionally preceded by moving the clock to `at`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Timestamp>,

    #[serde(flatten)]
    pub action: Action,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    Create {
        caller: String,
        label: String,
        terms: NewBet,
    },
    Delete {
        caller: String,
        bet: String,
    },
    Agree {
        caller: String,
        bet: String,
    },
    Expire {
        bet: String,
    },
    Send {
        caller: String,
        bet: String,
    },
    Answer {
        bet: String,
        answer: bool,
        /// Hex Schnorr signature; when present the answer must be attested
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    Sweep,
}

/// What a successful step did.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    Created(BetId),
    Updated(BetId),
    Released(Release),
    NotDue(BetId),
    Swept(Vec<Release>),
}

type ReplayDesk = BetLifecycle<Arc<MemoryLedger>, ChannelOracle, Arc<ManualClock>>;

/// Desk, ledger and clock a scenario runs against.
pub struct Replay {
    desk: ReplayDesk,
    ledger: Arc<MemoryLedger>,
    clock: Arc<ManualClock>,
    requests: UnboundedReceiver<OracleRequest>,
    labels: HashMap<String, BetId>,
}

impl Scenario {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    /// Creator stakes 100 on P, counterparty agrees at 500, oracle answers `true` after 2000.
    pub fn happy_path() -> Self {
        Self {
            balances: demo_balances(),
            steps: vec![
                create_step("bet", true),
                step(500, Action::Agree {
                    caller: "bob".to_string(),
                    bet: "bet".to_string(),
                }),
                step(2500, Action::Send {
                    caller: "alice".to_string(),
                    bet: "bet".to_string(),
                }),
                step(2600, Action::Answer {
                    bet: "bet".to_string(),
                    answer: true,
                    signature: None,
                }),
            ],
        }
    }

    /// Counterparty agrees too late, then the proposal expires at its window end.
    pub fn expiry() -> Self {
        Self {
            balances: demo_balances(),
            steps: vec![
                create_step("bet", true),
                step(1000, Action::Agree {
                    caller: "bob".to_string(),
                    bet: "bet".to_string(),
                }),
                step(2000, Action::Expire {
                    bet: "bet".to_string(),
                }),
            ],
        }
    }
}

fn demo_balances() -> BTreeMap<String, u64> {
    BTreeMap::from([("alice".to_string(), 1000), ("bob".to_string(), 1000)])
}

fn step(at: Timestamp, action: Action) -> Step {
    Step {
        at: Some(at),
        action,
    }
}

fn create_step(label: &str, creator_affirms: bool) -> Step {
    step(0, Action::Create {
        caller: "alice".to_string(),
        label: label.to_string(),
        terms: NewBet {
            counterparty: Principal::from("bob"),
            proposition: "It rains in Paris on 2025-01-01".to_string(),
            amount: 100,
            odds: 1.0,
            creator_affirms,
            window_start: 1000,
            window_end: 2000,
        },
    })
}

impl Replay {
    pub fn new(balances: &BTreeMap<String, u64>, config: DeskConfig) -> Result<Self> {
        let ledger = Arc::new(MemoryLedger::new());
        for (name, amount) in balances {
            ledger.credit(&Principal::from(name.as_str()), *amount)?;
        }
        let clock = Arc::new(ManualClock::new(0));
        let (oracle, requests) = ChannelOracle::new();
        let desk = BetLifecycle::new(ledger.clone(), oracle, clock.clone(), config)?;

        Ok(Self {
            desk,
            ledger,
            clock,
            requests,
            labels: HashMap::new(),
        })
    }

    /// Apply one step. The outer error means the scenario itself is broken;
    /// the inner one is the desk refusing the operation.
    ///
    /// Unsigned answers are delivered over a channel to the desk's answer loop,
    /// the way a live oracle feed would be.
    pub async fn apply(&mut self, step: &Step) -> Result<std::result::Result<Outcome, WagerError>> {
        if let Some(at) = step.at {
            self.clock.set(at);
        }
        debug!(now = self.clock.now(), action = ?step.action, "applying step");

        let outcome = match &step.action {
            Action::Create {
                caller,
                label,
                terms,
            } => {
                if self.labels.contains_key(label) {
                    anyhow::bail!("Bet label '{label}' is used twice");
                }
                let created = self.desk.create_bet(&principal(caller), terms.clone());
                if let Ok(id) = &created {
                    self.labels.insert(label.clone(), id.clone());
                }
                created.map(Outcome::Created)
            }
            Action::Delete { caller, bet } => {
                let id = self.resolve(bet)?;
                self.desk.delete_bet(&principal(caller), &id).map(Outcome::Released)
            }
            Action::Agree { caller, bet } => {
                let id = self.resolve(bet)?;
                self.desk
                    .agree_to_bet(&principal(caller), &id)
                    .map(|()| Outcome::Updated(id))
            }
            Action::Expire { bet } => {
                let id = self.resolve(bet)?;
                self.desk.handle_expired_bet(&id).map(|released| match released {
                    Some(release) => Outcome::Released(release),
                    None => Outcome::NotDue(id),
                })
            }
            Action::Send { caller, bet } => {
                let id = self.resolve(bet)?;
                self.desk
                    .send_to_oracle(&principal(caller), &id)
                    .map(|()| Outcome::Updated(id))
            }
            Action::Answer {
                bet,
                answer,
                signature,
            } => {
                let id = self.resolve(bet)?;
                match signature {
                    Some(signature) => self.desk.process_attested_answer(&OracleAttestation {
                        bet_id: id,
                        answer: *answer,
                        signature: signature.clone(),
                    }),
                    None => self.deliver_answer(id, *answer).await?,
                }
                .map(Outcome::Released)
            }
            Action::Sweep => Ok(Outcome::Swept(self.desk.expire_due())),
        };
        Ok(outcome)
    }

    async fn deliver_answer(
        &self,
        bet_id: BetId,
        answer: bool,
    ) -> Result<std::result::Result<Release, WagerError>> {
        let (answers, feed) = mpsc::channel(1);
        answers
            .send(OracleAnswer { bet_id, answer })
            .await
            .context("Oracle answer feed closed")?;
        drop(answers);

        self.desk
            .consume_answers(feed)
            .await
            .pop()
            .context("Oracle answer was not consumed")
    }

    /// Oracle requests submitted since the last call.
    pub fn drain_oracle_requests(&mut self) -> Vec<OracleRequest> {
        let mut drained = Vec::new();
        while let Ok(request) = self.requests.try_recv() {
            drained.push(request);
        }
        drained
    }

    pub fn desk(&self) -> &ReplayDesk {
        &self.desk
    }

    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    /// Whether balances plus escrow still add up to everything minted.
    pub fn is_conserved(&self) -> bool {
        self.ledger.total_balances() + self.desk.total_escrowed() == self.ledger.total_supply()
    }

    fn resolve(&self, label: &str) -> Result<BetId> {
        self.labels
            .get(label)
            .cloned()
            .with_context(|| format!("Unknown bet label '{label}'"))
    }
}

fn principal(name: &str) -> Principal {
    Principal::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wager_core::BetStatus;

    async fn run(scenario: &Scenario) -> (Replay, Vec<std::result::Result<Outcome, WagerError>>) {
        let mut replay = Replay::new(&scenario.balances, DeskConfig::default()).unwrap();
        let mut outcomes = Vec::new();
        for step in &scenario.steps {
            outcomes.push(replay.apply(step).await.unwrap());
        }
        (replay, outcomes)
    }

    #[tokio::test]
    async fn test_happy_path_replay() {
        let (mut replay, outcomes) = run(&Scenario::happy_path()).await;
        assert!(outcomes.iter().all(|outcome| outcome.is_ok()));

        match outcomes.last() {
            Some(Ok(Outcome::Released(release))) => {
                assert_eq!(release.status, BetStatus::Settled);
                assert_eq!(release.paid_to(&Principal::from("alice")), 200);
            }
            other => panic!("expected a release, got {other:?}"),
        }
        assert_eq!(replay.ledger().balance(&Principal::from("alice")), 1100);
        assert_eq!(replay.drain_oracle_requests().len(), 1);
        assert!(replay.is_conserved());
    }

    #[tokio::test]
    async fn test_expiry_replay() {
        let (replay, outcomes) = run(&Scenario::expiry()).await;
        assert!(matches!(outcomes[1], Err(WagerError::WindowClosed { .. })));
        assert!(matches!(
            &outcomes[2],
            Ok(Outcome::Released(release)) if release.status == BetStatus::Expired
        ));
        assert_eq!(replay.ledger().balance(&Principal::from("alice")), 1000);
        assert_eq!(replay.ledger().balance(&Principal::from("bob")), 1000);
        assert!(replay.desk().bets().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_label_is_fatal() {
        let mut replay = Replay::new(&BTreeMap::new(), DeskConfig::default()).unwrap();
        let step = Step {
            at: None,
            action: Action::Expire {
                bet: "missing".to_string(),
            },
        };
        assert!(replay.apply(&step).await.is_err());
    }

    #[tokio::test]
    async fn test_scenario_from_json_file() {
        let json = r#"{
            "balances": {"alice": 500, "bob": 500},
            "steps": [
                {"at": 10, "op": "create", "caller": "alice", "label": "rain",
                 "terms": {"counterparty": "bob", "proposition": "Rain", "amount": 50,
                           "creator_affirms": false, "window_start": 100, "window_end": 200}},
                {"op": "agree", "caller": "bob", "bet": "rain"},
                {"at": 201, "op": "send", "caller": "bob", "bet": "rain"},
                {"op": "answer", "bet": "rain", "answer": true},
                {"op": "sweep"}
            ]
        }"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let scenario = Scenario::from_json_file(file.path()).unwrap();
        assert_eq!(scenario.steps.len(), 5);
        assert_eq!(scenario.steps[4].action, Action::Sweep);

        let (replay, outcomes) = run(&scenario).await;
        assert!(outcomes.iter().all(|outcome| outcome.is_ok()));
        assert_eq!(replay.ledger().balance(&Principal::from("bob")), 550);
        assert!(replay.is_conserved());
    }
}
