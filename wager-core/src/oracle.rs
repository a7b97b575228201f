//! # Oracle Port
//!
//! The oracle is an external collaborator. Submitting a bet is
//! fire-and-forget; the answer comes back later as an [`OracleAnswer`] and is
//! fed to [`crate::BetLifecycle::process_oracle_answer`] as a separate call.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{error::Result, BetId, WagerError};

/// Resolution request sent to the oracle.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OracleRequest {
    pub bet_id: BetId,
    pub proposition: String,
}

/// Binary resolution delivered by the oracle.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OracleAnswer {
    pub bet_id: BetId,
    pub answer: bool,
}

/// Outbound half of the oracle protocol.
pub trait OraclePort: Send + Sync {
    /// Ask the oracle to resolve `proposition` for bet `id`. Must not block.
    fn submit(&self, id: &BetId, proposition: &str) -> Result<()>;
}

impl<O: OraclePort + ?Sized> OraclePort for Arc<O> {
    fn submit(&self, id: &BetId, proposition: &str) -> Result<()> {
        (**self).submit(id, proposition)
    }
}

/// Oracle port backed by an unbounded tokio channel.
///
/// The receiving end is handed to whatever process resolves propositions.
#[derive(Debug, Clone)]
pub struct ChannelOracle {
    requests: mpsc::UnboundedSender<OracleRequest>,
}

impl ChannelOracle {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OracleRequest>) {
        let (requests, receiver) = mpsc::unbounded_channel();
        (Self { requests }, receiver)
    }
}

impl OraclePort for ChannelOracle {
    fn submit(&self, id: &BetId, proposition: &str) -> Result<()> {
        let request = OracleRequest {
            bet_id: id.clone(),
            proposition: proposition.to_string(),
        };
        self.requests
            .send(request)
            .map_err(|_| WagerError::Oracle(format!("request channel closed for bet {id}")))?;
        debug!(bet_id = %id, "submitted bet to oracle");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_oracle_delivers_requests() {
        let (oracle, mut requests) = ChannelOracle::new();
        oracle.submit(&BetId::from("B1"), "It rains").unwrap();

        let request = requests.recv().await.unwrap();
        assert_eq!(
            request,
            OracleRequest {
                bet_id: BetId::from("B1"),
                proposition: "It rains".to_string(),
            }
        );
    }

    #[test]
    fn test_channel_oracle_closed() {
        let (oracle, requests) = ChannelOracle::new();
        drop(requests);
        let err = oracle.submit(&BetId::from("B1"), "It rains").unwrap_err();
        assert!(matches!(err, WagerError::Oracle(_)));
    }
}
